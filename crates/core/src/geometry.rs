//! Coordinate geometry shared by the interactive overlay and the stamping pipeline.
//!
//! Two coordinate spaces exist:
//! - Document space: points (1/72 inch), origin bottom-left, Y up. Canonical and persisted.
//! - Display space: CSS pixels, origin top-left, Y down, at the current zoom.
//!
//! Every conversion between them goes through a [`DisplayTransform`], and every
//! anchor offset goes through [`anchor_to_box_origin`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum drift (display pixels) tolerated by [`DisplayTransform::verify_round_trip`]
pub const ROUND_TRIP_TOLERANCE_PX: f32 = 0.5;

/// Point in document space (PDF user space units)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentPoint {
    pub x: f32,
    pub y: f32,
}

impl DocumentPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Translate by a document-space delta
    pub fn offset(&self, delta: DocumentDelta) -> Self {
        Self::new(self.x + delta.dx, self.y + delta.dy)
    }

    pub fn distance_to(&self, other: &DocumentPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Point in display space (CSS pixels, top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayPoint {
    pub x: f32,
    pub y: f32,
}

impl DisplayPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &DisplayPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Displacement in document points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DocumentDelta {
    pub dx: f32,
    pub dy: f32,
}

impl DocumentDelta {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx.abs() <= f32::EPSILON && self.dy.abs() <= f32::EPSILON
    }
}

/// Pixel offset applied to an element positioned at its anchor's display point
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayOffset {
    pub dx: f32,
    pub dy: f32,
}

/// Axis-aligned rectangle in display space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> DisplayPoint {
        DisplayPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive containment test
    pub fn contains(&self, point: DisplayPoint) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Grow to at least `min_size` on each axis, keeping the center fixed
    pub fn inflate_to(&self, min_size: f32) -> Self {
        let width = self.width.max(min_size);
        let height = self.height.max(min_size);
        let center = self.center();
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }
}

/// Annotation box size in document points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxSize {
    pub width: f32,
    pub height: f32,
}

impl BoxSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Raise each side to at least `min`
    pub fn with_floor(&self, min: f32) -> Self {
        Self::new(self.width.max(min), self.height.max(min))
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }
}

/// Page size in points plus its display rotation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBounds {
    pub width: f32,
    pub height: f32,
    /// Clockwise rotation in degrees, normalized to `[0, 360)`
    pub rotation: u16,
}

impl PageBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            rotation: 0,
        }
    }

    /// Set the rotation, normalizing negative and over-range values (e.g. -90 → 270)
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation = degrees.rem_euclid(360) as u16;
        self
    }

    pub fn is_quarter_turn(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }

    fn validate(&self) -> Result<(), GeometryError> {
        if !self.width.is_finite()
            || !self.height.is_finite()
            || self.width < 0.0
            || self.height < 0.0
        {
            return Err(GeometryError::InvalidPageBounds {
                width: self.width,
                height: self.height,
            });
        }
        if self.rotation % 90 != 0 || self.rotation >= 360 {
            return Err(GeometryError::UnsupportedRotation(self.rotation));
        }
        Ok(())
    }
}

/// Which part of an annotation's box coincides with its stored point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Anchor {
    Center,
    /// Text baseline start; the glyph box sits above the point
    BaselineLeft,
    TopLeft,
    BottomLeft,
}

/// Invalid inputs to transform construction, or a violated round-trip
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("scale must be finite and positive, got {0}")]
    InvalidScale(f32),

    #[error("device pixel ratio must be finite and positive, got {0}")]
    InvalidDevicePixelRatio(f32),

    #[error("page bounds must be finite and non-negative, got {width}x{height}")]
    InvalidPageBounds { width: f32, height: f32 },

    #[error("unsupported page rotation: {0} degrees")]
    UnsupportedRotation(u16),

    #[error("display round trip drifted by {drift}px")]
    RoundTripDrift { drift: f32 },
}

/// Affine mapping from document space to display space for one page
///
/// Matrix layout is `[a, b, c, d, e, f]` with
/// `x' = a*x + c*y + e` and `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    matrix: [f32; 6],
    inverse: [f32; 6],
    scale: f32,
    device_pixel_ratio: f32,
    bounds: PageBounds,
}

impl DisplayTransform {
    /// Build the transform for a page at `scale` (zoom) and device pixel ratio
    pub fn new(bounds: PageBounds, scale: f32, device_pixel_ratio: f32) -> Result<Self, GeometryError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(GeometryError::InvalidScale(scale));
        }
        if !device_pixel_ratio.is_finite() || device_pixel_ratio <= 0.0 {
            return Err(GeometryError::InvalidDevicePixelRatio(device_pixel_ratio));
        }
        bounds.validate()?;

        let (ra, rb, rc, rd) = match bounds.rotation {
            0 => (1.0, 0.0, 0.0, -1.0),
            90 => (0.0, 1.0, 1.0, 0.0),
            180 => (-1.0, 0.0, 0.0, 1.0),
            270 => (0.0, -1.0, -1.0, 0.0),
            other => return Err(GeometryError::UnsupportedRotation(other)),
        };

        let center_x = bounds.width / 2.0;
        let center_y = bounds.height / 2.0;
        let (offset_x, offset_y) = if ra == 0.0 {
            (center_y * scale, center_x * scale)
        } else {
            (center_x * scale, center_y * scale)
        };

        let matrix = [
            ra * scale,
            rb * scale,
            rc * scale,
            rd * scale,
            offset_x - ra * scale * center_x - rc * scale * center_y,
            offset_y - rb * scale * center_x - rd * scale * center_y,
        ];

        Ok(Self {
            matrix,
            inverse: invert(&matrix),
            scale,
            device_pixel_ratio,
            bounds,
        })
    }

    pub fn to_display(&self, point: DocumentPoint) -> DisplayPoint {
        let [a, b, c, d, e, f] = self.matrix;
        DisplayPoint::new(a * point.x + c * point.y + e, b * point.x + d * point.y + f)
    }

    pub fn to_document(&self, point: DisplayPoint) -> DocumentPoint {
        let [a, b, c, d, e, f] = self.inverse;
        DocumentPoint::new(a * point.x + c * point.y + e, b * point.x + d * point.y + f)
    }

    /// Scale a document-space box size to display pixels. Not rotated.
    pub fn box_size_to_display(&self, width: f32, height: f32) -> (f32, f32) {
        (width * self.scale, height * self.scale)
    }

    pub fn box_size_to_document(&self, width: f32, height: f32) -> (f32, f32) {
        (width / self.scale, height / self.scale)
    }

    /// Size of the whole page in display pixels, after rotation
    pub fn viewport_size(&self) -> (f32, f32) {
        let (w, h) = self.box_size_to_display(self.bounds.width, self.bounds.height);
        if self.bounds.is_quarter_turn() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Check `to_display(to_document(p)) == p` within [`ROUND_TRIP_TOLERANCE_PX`]
    pub fn verify_round_trip(&self, point: DisplayPoint) -> Result<(), GeometryError> {
        let drift = self.to_display(self.to_document(point)).distance_to(&point);
        if drift.is_finite() && drift <= ROUND_TRIP_TOLERANCE_PX {
            Ok(())
        } else {
            Err(GeometryError::RoundTripDrift { drift })
        }
    }

    /// Zoom factor between document points and CSS pixels
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    /// Bitmap scale for page surfaces (zoom × device pixel ratio)
    pub fn surface_scale(&self) -> f32 {
        self.scale * self.device_pixel_ratio
    }

    pub fn rotation(&self) -> u16 {
        self.bounds.rotation
    }

    pub fn page_bounds(&self) -> &PageBounds {
        &self.bounds
    }

    pub fn matrix(&self) -> [f32; 6] {
        self.matrix
    }

    fn apply_linear(&self, dx: f32, dy: f32) -> (f32, f32) {
        let [a, b, c, d, _, _] = self.matrix;
        (a * dx + c * dy, b * dx + d * dy)
    }
}

fn invert(m: &[f32; 6]) -> [f32; 6] {
    let [a, b, c, d, e, f] = *m;
    let det = a * d - b * c;
    [
        d / det,
        -b / det,
        -c / det,
        a / det,
        (c * f - d * e) / det,
        (b * e - a * f) / det,
    ]
}

/// Bottom-left corner of the box whose `anchor` sits at `point`
///
/// This is the single source of anchor offsets. Display placement, clamping,
/// hit-testing and stamping all derive from it.
pub fn anchor_to_box_origin(point: DocumentPoint, size: BoxSize, anchor: Anchor) -> DocumentPoint {
    match anchor {
        Anchor::Center => DocumentPoint::new(point.x - size.width / 2.0, point.y - size.height / 2.0),
        Anchor::BaselineLeft | Anchor::BottomLeft => point,
        Anchor::TopLeft => DocumentPoint::new(point.x, point.y - size.height),
    }
}

/// Inverse of [`anchor_to_box_origin`]
pub fn box_origin_to_anchor(origin: DocumentPoint, size: BoxSize, anchor: Anchor) -> DocumentPoint {
    let offset = anchor_to_box_origin(DocumentPoint::default(), size, anchor);
    DocumentPoint::new(origin.x - offset.x, origin.y - offset.y)
}

/// Offset from the anchor's display position to the top-left of the element's display box
pub fn display_transform_for_anchor(
    transform: &DisplayTransform,
    anchor: Anchor,
    size: BoxSize,
) -> DisplayOffset {
    let origin = anchor_to_box_origin(DocumentPoint::default(), size, anchor);
    let corners = [
        (origin.x, origin.y),
        (origin.x + size.width, origin.y),
        (origin.x, origin.y + size.height),
        (origin.x + size.width, origin.y + size.height),
    ];

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    for (dx, dy) in corners {
        let (x, y) = transform.apply_linear(dx, dy);
        min_x = min_x.min(x);
        min_y = min_y.min(y);
    }
    DisplayOffset { dx: min_x, dy: min_y }
}

/// On-screen box of an annotation anchored at `point`
pub fn display_rect(
    transform: &DisplayTransform,
    point: DocumentPoint,
    size: BoxSize,
    anchor: Anchor,
) -> DisplayRect {
    let anchor_display = transform.to_display(point);
    let offset = display_transform_for_anchor(transform, anchor, size);
    let (w, h) = transform.box_size_to_display(size.width, size.height);
    let (width, height) = if transform.page_bounds().is_quarter_turn() {
        (h, w)
    } else {
        (w, h)
    };
    DisplayRect::new(
        anchor_display.x + offset.dx,
        anchor_display.y + offset.dy,
        width,
        height,
    )
}

/// Document-space displacement between two display positions
pub fn drag_delta(transform: &DisplayTransform, start: DisplayPoint, end: DisplayPoint) -> DocumentDelta {
    let a = transform.to_document(start);
    let b = transform.to_document(end);
    DocumentDelta::new(b.x - a.x, b.y - a.y)
}

/// Move `point` so its box lies inside the page
///
/// Oversized boxes pin their origin to 0 on the offending axis.
pub fn clamp_to_page(point: DocumentPoint, size: BoxSize, anchor: Anchor, bounds: &PageBounds) -> DocumentPoint {
    let origin = anchor_to_box_origin(point, size, anchor);
    let x = (bounds.width - size.width).min(origin.x).max(0.0);
    let y = (bounds.height - size.height).min(origin.y).max(0.0);
    box_origin_to_anchor(DocumentPoint::new(x, y), size, anchor)
}

/// Whether a box of `size` can lie fully inside the page
pub fn fits_on_page(size: BoxSize, bounds: &PageBounds) -> bool {
    size.width <= bounds.width && size.height <= bounds.height
}
