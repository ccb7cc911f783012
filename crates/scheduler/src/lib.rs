//! PDF Signer Scheduler Library
//!
//! Windowed page rendering: pages near the current page are rendered one at a
//! time on a dedicated worker thread, pages that scroll out of the window are
//! cancelled and their surfaces released.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pdf_signer_scheduler::{PageRenderWindow, PageRenderer};
//!
//! fn show(renderer: Arc<dyn PageRenderer>, page_count: u32) -> std::io::Result<()> {
//!     let mut window = PageRenderWindow::new(renderer, page_count, 1, 1.0)?;
//!     window.set_current_page(5);
//!     window.wait_until_idle(Duration::from_secs(1));
//!     if let Some(surface) = window.surface(5) {
//!         let _thumb = surface.thumbnail(120, 160);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod surface;
pub mod window;
pub mod worker;

pub use cancel::CancellationToken;
pub use surface::{PageSurface, SurfaceArena, SurfaceHandle};
pub use window::{window_pages, PageRenderWindow, WindowStats, WindowUpdate};
pub use worker::{PageRenderer, RenderError, RenderOutcome};
