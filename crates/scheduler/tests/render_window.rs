use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use pdf_signer_scheduler::{
    CancellationToken, PageRenderWindow, PageRenderer, PageSurface, RenderError,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// 100×150pt pages rendered as flat white bitmaps
#[derive(Default)]
struct FakeRenderer {
    rendered: Mutex<Vec<u32>>,
    cancelled: Mutex<Vec<u32>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    delay: Duration,
    fail_page: Option<u32>,
    /// Page that blocks until its token is cancelled
    hold_page: Option<u32>,
}

impl PageRenderer for FakeRenderer {
    fn render_page(
        &self,
        page_number: u32,
        scale: f32,
        token: &CancellationToken,
    ) -> Result<PageSurface, RenderError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if self.hold_page == Some(page_number) {
            let started = Instant::now();
            while !token.is_cancelled() && started.elapsed() < TIMEOUT {
                thread::sleep(Duration::from_millis(1));
            }
        }
        thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_page == Some(page_number) {
            return Err(RenderError::Backend("corrupt page".into()));
        }
        self.rendered.lock().unwrap().push(page_number);
        let w = (100.0 * scale) as u32;
        let h = (150.0 * scale) as u32;
        Ok(PageSurface::new(
            page_number,
            scale,
            RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])),
        ))
    }

    fn cancel(&self, page_number: u32) {
        self.cancelled.lock().unwrap().push(page_number);
    }
}

#[test]
fn moving_the_window_releases_and_renders() {
    let renderer = Arc::new(FakeRenderer::default());
    let mut window = PageRenderWindow::new(renderer, 10, 1, 1.0).unwrap();
    assert!(window.wait_until_idle(TIMEOUT));
    assert_eq!(window.rendered_pages(), vec![1, 2]);

    let update = window.set_current_page(5);
    assert_eq!(update.released, vec![1, 2]);
    assert!(window.wait_until_idle(TIMEOUT));
    assert_eq!(window.rendered_pages(), vec![4, 5, 6]);

    let update = window.set_current_page(8);
    assert_eq!(update.released, vec![4, 5, 6]);
    assert_eq!(update.enqueued, vec![7, 8, 9]);
    assert!(window.wait_until_idle(TIMEOUT));
    assert_eq!(window.rendered_pages(), vec![7, 8, 9]);
    for page in [1, 2, 3, 4, 5, 6, 10] {
        assert!(window.surface(page).is_none());
    }
}

#[test]
fn leaving_page_cancels_in_flight_render() {
    let renderer = Arc::new(FakeRenderer {
        hold_page: Some(1),
        ..FakeRenderer::default()
    });
    let mut window = PageRenderWindow::new(renderer.clone(), 10, 0, 1.0).unwrap();

    let update = window.set_current_page(5);
    assert_eq!(update.cancelled, vec![1]);
    assert_eq!(*renderer.cancelled.lock().unwrap(), vec![1]);

    assert!(window.wait_until_idle(TIMEOUT));
    assert_eq!(window.rendered_pages(), vec![5]);
    assert!(!window.is_rendered(1));
    assert_eq!(window.stats().cancelled, 1);
}

#[test]
fn renders_are_serialized() {
    let renderer = Arc::new(FakeRenderer {
        delay: Duration::from_millis(2),
        ..FakeRenderer::default()
    });
    let mut window = PageRenderWindow::new(renderer.clone(), 30, 2, 1.0).unwrap();
    for page in [3, 9, 4, 20, 21, 30, 1] {
        window.set_current_page(page);
        thread::sleep(Duration::from_millis(3));
    }
    assert!(window.wait_until_idle(TIMEOUT));

    assert_eq!(renderer.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(window.rendered_pages(), vec![1, 2, 3]);
}

#[test]
fn failed_render_leaves_page_empty() {
    let renderer = Arc::new(FakeRenderer {
        fail_page: Some(2),
        ..FakeRenderer::default()
    });
    let mut window = PageRenderWindow::new(renderer, 3, 1, 1.0).unwrap();
    assert!(window.wait_until_idle(TIMEOUT));

    assert_eq!(window.rendered_pages(), vec![1]);
    assert_eq!(window.stats().failed, 1);
}

#[test]
fn scale_change_rerenders_every_page() {
    let renderer = Arc::new(FakeRenderer::default());
    let mut window = PageRenderWindow::new(renderer, 3, 1, 1.0).unwrap();
    assert!(window.wait_until_idle(TIMEOUT));
    assert_eq!(window.surface(1).unwrap().width(), 100);

    let update = window.set_scale(2.0);
    assert_eq!(update.released, vec![1, 2]);
    assert_eq!(update.enqueued, vec![1, 2]);
    assert!(window.wait_until_idle(TIMEOUT));

    let surface = window.surface(1).unwrap();
    assert_eq!(surface.scale(), 2.0);
    assert_eq!((surface.width(), surface.height()), (200, 300));
}

#[test]
fn thumbnails_come_from_rendered_surfaces() {
    let renderer = Arc::new(FakeRenderer::default());
    let mut window = PageRenderWindow::new(renderer, 1, 1, 1.0).unwrap();
    assert!(window.wait_until_idle(TIMEOUT));

    let thumb = window.surface(1).unwrap().thumbnail(50, 50);
    assert_eq!(thumb.dimensions(), (33, 50));
}

#[test]
fn reset_document_starts_over() {
    let renderer = Arc::new(FakeRenderer::default());
    let mut window = PageRenderWindow::new(renderer, 10, 1, 1.0).unwrap();
    window.set_current_page(6);
    assert!(window.wait_until_idle(TIMEOUT));

    let update = window.reset_document(Arc::new(FakeRenderer::default()), 2);
    assert_eq!(update.released, vec![5, 6, 7]);
    assert_eq!(window.current_page(), 1);
    assert!(window.wait_until_idle(TIMEOUT));
    assert_eq!(window.rendered_pages(), vec![1, 2]);
    assert_eq!(window.page_count(), 2);
}

#[test]
fn empty_document_renders_nothing() {
    let renderer = Arc::new(FakeRenderer::default());
    let mut window = PageRenderWindow::new(renderer.clone(), 0, 2, 1.0).unwrap();
    assert!(window.is_idle());
    assert!(window.wait_until_idle(TIMEOUT));
    assert!(window.rendered_pages().is_empty());
    assert!(renderer.rendered.lock().unwrap().is_empty());
}
