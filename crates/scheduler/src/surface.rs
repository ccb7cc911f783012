//! Rendered page bitmaps and the arena that owns them

use std::collections::BTreeMap;
use std::sync::Arc;

use image::{imageops, RgbaImage};

/// RGBA bitmap of one page at one scale
#[derive(Debug, Clone, PartialEq)]
pub struct PageSurface {
    /// One-based page number
    pub page_number: u32,
    /// Bitmap pixels per document point
    pub scale: f32,
    pub image: RgbaImage,
}

impl PageSurface {
    pub fn new(page_number: u32, scale: f32, image: RgbaImage) -> Self {
        Self {
            page_number,
            scale,
            image,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }
}

/// Read-only shared view of a surface held by the arena
#[derive(Debug, Clone)]
pub struct SurfaceHandle(Arc<PageSurface>);

impl SurfaceHandle {
    pub fn page_number(&self) -> u32 {
        self.0.page_number
    }

    pub fn scale(&self) -> f32 {
        self.0.scale
    }

    pub fn width(&self) -> u32 {
        self.0.image.width()
    }

    pub fn height(&self) -> u32 {
        self.0.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0.image
    }

    /// Downscaled copy fitting `max_width`×`max_height`, keeping aspect ratio
    pub fn thumbnail(&self, max_width: u32, max_height: u32) -> RgbaImage {
        let (w, h) = (self.width().max(1), self.height().max(1));
        let ratio = (max_width as f32 / w as f32).min(max_height as f32 / h as f32);
        let tw = ((w as f32 * ratio).round() as u32).max(1);
        let th = ((h as f32 * ratio).round() as u32).max(1);
        imageops::thumbnail(&self.0.image, tw, th)
    }
}

/// Surfaces keyed by page number
///
/// Surfaces are only dropped through [`SurfaceArena::release`] or
/// [`SurfaceArena::clear`]; handles already given out keep their bitmap alive
/// until dropped.
#[derive(Debug, Default)]
pub struct SurfaceArena {
    slots: BTreeMap<u32, SurfaceHandle>,
    bytes: usize,
}

impl SurfaceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a surface, replacing any previous one for the page
    pub fn install(&mut self, surface: PageSurface) -> SurfaceHandle {
        let page = surface.page_number;
        self.release(page);
        self.bytes += surface.byte_len();
        let handle = SurfaceHandle(Arc::new(surface));
        self.slots.insert(page, handle.clone());
        handle
    }

    /// Release a page's surface, returning whether one was held
    pub fn release(&mut self, page_number: u32) -> bool {
        match self.slots.remove(&page_number) {
            Some(handle) => {
                self.bytes -= handle.0.byte_len();
                true
            }
            None => false,
        }
    }

    /// Release every surface, returning the released page numbers
    pub fn clear(&mut self) -> Vec<u32> {
        let pages = self.pages();
        self.slots.clear();
        self.bytes = 0;
        pages
    }

    pub fn get(&self, page_number: u32) -> Option<SurfaceHandle> {
        self.slots.get(&page_number).cloned()
    }

    pub fn contains(&self, page_number: u32) -> bool {
        self.slots.contains_key(&page_number)
    }

    /// Page numbers with a surface, ascending
    pub fn pages(&self) -> Vec<u32> {
        self.slots.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bitmap bytes currently held
    pub fn bytes_in_use(&self) -> usize {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn surface(page: u32, w: u32, h: u32) -> PageSurface {
        PageSurface::new(page, 1.0, RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn test_install_and_release() {
        let mut arena = SurfaceArena::new();
        arena.install(surface(1, 10, 10));
        arena.install(surface(2, 10, 20));
        assert_eq!(arena.pages(), vec![1, 2]);
        assert_eq!(arena.bytes_in_use(), 10 * 10 * 4 + 10 * 20 * 4);

        assert!(arena.release(1));
        assert!(!arena.release(1));
        assert_eq!(arena.bytes_in_use(), 10 * 20 * 4);
    }

    #[test]
    fn test_reinstall_replaces() {
        let mut arena = SurfaceArena::new();
        arena.install(surface(3, 10, 10));
        arena.install(surface(3, 20, 20));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(3).unwrap().width(), 20);
        assert_eq!(arena.bytes_in_use(), 20 * 20 * 4);
    }

    #[test]
    fn test_handles_outlive_release() {
        let mut arena = SurfaceArena::new();
        let handle = arena.install(surface(1, 8, 8));
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(handle.width(), 8);
    }

    #[test]
    fn test_thumbnail_keeps_aspect() {
        let mut arena = SurfaceArena::new();
        let handle = arena.install(surface(1, 200, 400));
        let thumb = handle.thumbnail(100, 100);
        assert_eq!(thumb.dimensions(), (50, 100));
    }
}
