//! lopdf-backed document access and annotation stamping.
//!
//! [`LopdfDocument`] answers page-size queries for placement, produces page
//! bitmaps for the render window and hands out the original bytes for
//! stamping. Rasterization is a placeholder: a white page with a grey border at
//! the requested scale.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use lopdf::Document;
use pdf_signer_core::{PageBounds, PageMetadataProvider};
use pdf_signer_scheduler::{CancellationToken, PageRenderer, PageSurface, RenderError};

pub mod page_tree;
pub mod source;
pub mod stamp;

pub use page_tree::PageInfo;
pub use source::{DocumentSource, FileSource, MemorySource};
pub use stamp::{stamp, StampError, StampOptions, StampOutput, StampWarning, StampingPipeline};

/// Largest bitmap side the placeholder renderer will allocate
const MAX_RENDER_DIMENSION: f32 = 16_384.0;

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
}

/// An opened document: original bytes plus per-page geometry
#[derive(Debug, Clone)]
pub struct LopdfDocument {
    bytes: Vec<u8>,
    pages: Vec<PageInfo>,
}

impl LopdfDocument {
    pub fn open(source: impl Into<OpenSource>) -> Result<Self, PdfEngineError> {
        let bytes = match source.into() {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };
        Self::from_bytes(bytes)
    }

    pub fn from_source(source: &dyn DocumentSource) -> Result<Self, PdfEngineError> {
        Self::from_bytes(source.load_bytes()?)
    }

    fn from_bytes(bytes: Vec<u8>) -> Result<Self, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(&bytes)?;
        let pages: Vec<PageInfo> = doc
            .get_pages()
            .into_values()
            .map(|page_id| page_tree::read_page_info(&doc, page_id))
            .collect();
        if pages.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        log::debug!("opened document with {} pages", pages.len());
        Ok(Self { bytes, pages })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    /// Geometry of a zero-based page
    pub fn page_info(&self, page_index: u32) -> Result<PageInfo, PdfEngineError> {
        self.pages
            .get(page_index as usize)
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange {
                page: page_index,
                page_count: self.page_count(),
            })
    }

    /// Placeholder bitmap of a zero-based page, rotated as displayed
    pub fn render_page_image(&self, page_index: u32, scale: f32) -> Result<RgbaImage, PdfEngineError> {
        let info = self.page_info(page_index)?;
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };

        let (mut w, mut h) = (info.width, info.height);
        if info.bounds().is_quarter_turn() {
            std::mem::swap(&mut w, &mut h);
        }
        let width = (w * scale).round().clamp(1.0, MAX_RENDER_DIMENSION) as u32;
        let height = (h * scale).round().clamp(1.0, MAX_RENDER_DIMENSION) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        if width >= 4 && height >= 4 {
            let border = Rgba([220, 220, 220, 255]);
            for x in 0..width {
                image.put_pixel(x, 0, border);
                image.put_pixel(x, height - 1, border);
            }
            for y in 0..height {
                image.put_pixel(0, y, border);
                image.put_pixel(width - 1, y, border);
            }
        }

        Ok(image)
    }
}

impl PageMetadataProvider for LopdfDocument {
    fn page_count(&self) -> u32 {
        LopdfDocument::page_count(self)
    }

    fn page_bounds(&self, page_index: u32) -> Option<PageBounds> {
        self.pages.get(page_index as usize).map(PageInfo::bounds)
    }
}

impl PageRenderer for LopdfDocument {
    fn render_page(
        &self,
        page_number: u32,
        scale: f32,
        token: &CancellationToken,
    ) -> Result<PageSurface, RenderError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::InvalidScale(scale));
        }
        let page_index = page_number
            .checked_sub(1)
            .ok_or(RenderError::PageOutOfRange(page_number))?;
        if token.is_cancelled() {
            return Err(RenderError::Backend("cancelled before start".to_string()));
        }

        let image = self.render_page_image(page_index, scale).map_err(|err| match err {
            PdfEngineError::PageOutOfRange { .. } => RenderError::PageOutOfRange(page_number),
            other => RenderError::Backend(other.to_string()),
        })?;
        Ok(PageSurface::new(page_number, scale, image))
    }
}

impl DocumentSource for LopdfDocument {
    fn load_bytes(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}
