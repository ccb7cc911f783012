//! Zoom and device pixel ratio of the page view.

use crate::geometry::{DisplayTransform, GeometryError, PageBounds};

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    zoom: f32,
    device_pixel_ratio: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl ViewState {
    pub fn new(zoom: f32, device_pixel_ratio: f32) -> Self {
        let mut view = Self::default();
        view.set_zoom(zoom);
        view.set_device_pixel_ratio(device_pixel_ratio);
        view
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    /// Set the zoom, clamped to `[MIN_ZOOM, MAX_ZOOM]`. Non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    /// Non-positive or non-finite ratios are ignored
    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.device_pixel_ratio = ratio;
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - ZOOM_STEP);
    }

    /// Zoom so a page `page_width` points wide fills `container_width` CSS pixels
    pub fn fit_width(&mut self, container_width: f32, page_width: f32) {
        if container_width <= 0.0 || page_width <= 0.0 {
            return;
        }
        self.set_zoom(container_width / page_width);
    }

    /// Bitmap scale for rendered page surfaces
    pub fn surface_scale(&self) -> f32 {
        self.zoom * self.device_pixel_ratio
    }

    pub fn transform_for(&self, bounds: PageBounds) -> Result<DisplayTransform, GeometryError> {
        DisplayTransform::new(bounds, self.zoom, self.device_pixel_ratio)
    }
}
