//! Page metadata collaborator.
//!
//! The document backend reports page sizes and rotations; the overlay never
//! parses the document itself.

use crate::geometry::PageBounds;

/// Source of page sizes for placement and hit-testing
pub trait PageMetadataProvider {
    fn page_count(&self) -> u32;

    /// Bounds of a zero-based page, `None` when out of range or unknown
    fn page_bounds(&self, page_index: u32) -> Option<PageBounds>;
}

/// Fixed list of page bounds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticPages {
    pages: Vec<PageBounds>,
}

impl StaticPages {
    pub fn new(pages: Vec<PageBounds>) -> Self {
        Self { pages }
    }

    /// `count` pages of identical size
    pub fn uniform(count: u32, bounds: PageBounds) -> Self {
        Self {
            pages: vec![bounds; count as usize],
        }
    }
}

impl PageMetadataProvider for StaticPages {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_bounds(&self, page_index: u32) -> Option<PageBounds> {
        self.pages.get(page_index as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_pages() {
        let pages = StaticPages::uniform(3, PageBounds::new(612.0, 792.0));
        assert_eq!(pages.page_count(), 3);
        assert_eq!(pages.page_bounds(2), Some(PageBounds::new(612.0, 792.0)));
        assert_eq!(pages.page_bounds(3), None);
    }
}
