//! Windowed page rendering
//!
//! Only pages within `radius` of the current page keep a rendered surface.
//! Renders run one at a time on the worker thread; pages that leave the
//! window are cancelled and their surfaces released.

use std::collections::VecDeque;
use std::io;
use std::ops::RangeInclusive;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::CancellationToken;
use crate::surface::{SurfaceArena, SurfaceHandle};
use crate::worker::{PageRenderer, RenderCompletion, RenderJob, RenderOutcome, RenderWorker};

/// One-based page numbers kept rendered around `current_page`
///
/// Empty when the document has no pages.
pub fn window_pages(current_page: u32, radius: u32, page_count: u32) -> RangeInclusive<u32> {
    let current = current_page.clamp(1, page_count.max(1));
    let start = current.saturating_sub(radius).max(1);
    let end = current.saturating_add(radius).min(page_count);
    start..=end
}

/// Pages affected by a window change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowUpdate {
    /// Surfaces dropped from the arena
    pub released: Vec<u32>,
    /// Queued or in-flight renders that were abandoned
    pub cancelled: Vec<u32>,
    /// Pages newly queued for rendering
    pub enqueued: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub dispatched: u64,
    pub installed: u64,
    pub cancelled: u64,
    pub failed: u64,
    /// Completed renders thrown away because they were no longer wanted
    pub discarded: u64,
    pub released: u64,
}

#[derive(Debug)]
struct InFlight {
    page_number: u32,
    generation: u64,
    token: CancellationToken,
}

/// Render-on-demand window over a document's pages
pub struct PageRenderWindow {
    renderer: Arc<dyn PageRenderer>,
    page_count: u32,
    radius: u32,
    current_page: u32,
    scale: f32,
    /// Bumped whenever every existing surface becomes invalid
    generation: u64,
    arena: SurfaceArena,
    queue: VecDeque<u32>,
    in_flight: Option<InFlight>,
    completions: Receiver<RenderCompletion>,
    worker: RenderWorker,
    stats: WindowStats,
}

impl PageRenderWindow {
    /// Open a window at page 1 and start rendering
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        page_count: u32,
        radius: u32,
        scale: f32,
    ) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = RenderWorker::spawn(tx)?;

        let mut window = Self {
            renderer,
            page_count,
            radius,
            current_page: 1,
            scale,
            generation: 0,
            arena: SurfaceArena::new(),
            queue: VecDeque::new(),
            in_flight: None,
            completions: rx,
            worker,
            stats: WindowStats::default(),
        };
        window.refresh(WindowUpdate::default());
        Ok(window)
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn visible_pages(&self) -> RangeInclusive<u32> {
        window_pages(self.current_page, self.radius, self.page_count)
    }

    /// Move the window; clamped to the document's pages
    pub fn set_current_page(&mut self, page_number: u32) -> WindowUpdate {
        self.current_page = page_number.clamp(1, self.page_count.max(1));
        self.pump();
        self.refresh(WindowUpdate::default())
    }

    /// Change the surface scale (zoom × device pixel ratio). Every surface is re-rendered.
    pub fn set_scale(&mut self, scale: f32) -> WindowUpdate {
        if (scale - self.scale).abs() <= f32::EPSILON {
            return self.refresh(WindowUpdate::default());
        }
        log::debug!("render scale {} -> {}", self.scale, scale);
        self.scale = scale;
        let update = self.invalidate_all();
        self.refresh(update)
    }

    /// Switch to another document, starting again at page 1
    pub fn reset_document(&mut self, renderer: Arc<dyn PageRenderer>, page_count: u32) -> WindowUpdate {
        let update = self.invalidate_all();
        self.renderer = renderer;
        self.page_count = page_count;
        self.current_page = 1;
        self.refresh(update)
    }

    pub fn surface(&self, page_number: u32) -> Option<SurfaceHandle> {
        self.arena.get(page_number)
    }

    pub fn is_rendered(&self, page_number: u32) -> bool {
        self.arena.contains(page_number)
    }

    /// Pages holding a surface, ascending
    pub fn rendered_pages(&self) -> Vec<u32> {
        self.arena.pages()
    }

    pub fn bytes_in_use(&self) -> usize {
        self.arena.bytes_in_use()
    }

    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    /// No render queued or in flight
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    /// Settle every finished render without blocking; returns surfaces installed
    pub fn pump(&mut self) -> usize {
        let mut installed = 0;
        while let Ok(completion) = self.completions.try_recv() {
            if self.settle(completion) {
                installed += 1;
            }
        }
        installed
    }

    /// Block until idle or `timeout` elapses; returns whether the window went idle
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.is_idle() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.completions.recv_timeout(deadline - now) {
                Ok(completion) => {
                    self.settle(completion);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }
    }

    fn is_visible(&self, page_number: u32) -> bool {
        self.visible_pages().contains(&page_number)
    }

    /// Drop every surface and pending render
    fn invalidate_all(&mut self) -> WindowUpdate {
        self.generation += 1;
        let released = self.arena.clear();
        self.stats.released += released.len() as u64;

        let mut cancelled: Vec<u32> = self.queue.drain(..).collect();
        if let Some(in_flight) = &self.in_flight {
            if !in_flight.token.is_cancelled() {
                in_flight.token.cancel();
                self.renderer.cancel(in_flight.page_number);
                cancelled.push(in_flight.page_number);
            }
        }

        WindowUpdate {
            released,
            cancelled,
            enqueued: Vec::new(),
        }
    }

    fn refresh(&mut self, mut update: WindowUpdate) -> WindowUpdate {
        let visible = self.visible_pages();

        for page in self.arena.pages() {
            if !visible.contains(&page) && self.arena.release(page) {
                self.stats.released += 1;
                update.released.push(page);
            }
        }

        let mut kept = VecDeque::with_capacity(self.queue.len());
        for page in self.queue.drain(..) {
            if visible.contains(&page) {
                kept.push_back(page);
            } else {
                update.cancelled.push(page);
            }
        }
        self.queue = kept;

        if let Some(in_flight) = &self.in_flight {
            let stale = in_flight.generation != self.generation
                || !visible.contains(&in_flight.page_number);
            if stale && !in_flight.token.is_cancelled() {
                in_flight.token.cancel();
                self.renderer.cancel(in_flight.page_number);
                update.cancelled.push(in_flight.page_number);
            }
        }

        for page in visible {
            let rendering = self.in_flight.as_ref().is_some_and(|f| {
                f.page_number == page && f.generation == self.generation && !f.token.is_cancelled()
            });
            if !rendering && !self.arena.contains(page) && !self.queue.contains(&page) {
                self.queue.push_back(page);
                update.enqueued.push(page);
            }
        }

        if !update.released.is_empty() || !update.cancelled.is_empty() {
            log::debug!(
                "render window at page {}: released {:?}, cancelled {:?}",
                self.current_page,
                update.released,
                update.cancelled
            );
        }

        self.dispatch_next();
        update
    }

    fn dispatch_next(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(page_number) = self.queue.pop_front() else {
            return;
        };

        let token = CancellationToken::new();
        let job = RenderJob {
            renderer: Arc::clone(&self.renderer),
            page_number,
            scale: self.scale,
            generation: self.generation,
            token: token.clone(),
        };
        if !self.worker.submit(job) {
            log::warn!("render worker unavailable, page {} left queued", page_number);
            self.queue.push_front(page_number);
            return;
        }

        self.stats.dispatched += 1;
        self.in_flight = Some(InFlight {
            page_number,
            generation: self.generation,
            token,
        });
    }

    /// Apply one completion; returns whether a surface was installed
    fn settle(&mut self, completion: RenderCompletion) -> bool {
        let frees_slot = self.in_flight.as_ref().is_some_and(|f| {
            f.page_number == completion.page_number && f.token.same_as(&completion.token)
        });
        if frees_slot {
            self.in_flight = None;
        }

        let installed = match completion.outcome {
            RenderOutcome::Rendered(surface) => {
                let wanted = completion.generation == self.generation
                    && !completion.token.is_cancelled()
                    && self.is_visible(completion.page_number);
                if wanted {
                    self.arena.install(surface);
                    self.stats.installed += 1;
                    true
                } else {
                    log::trace!(
                        "discarding stale render of page {} (generation {})",
                        completion.page_number,
                        completion.generation
                    );
                    self.stats.discarded += 1;
                    false
                }
            }
            RenderOutcome::Cancelled => {
                log::debug!("render of page {} cancelled", completion.page_number);
                self.stats.cancelled += 1;
                false
            }
            RenderOutcome::Failed(err) => {
                log::warn!("render of page {} failed: {}", completion.page_number, err);
                self.stats.failed += 1;
                false
            }
        };

        self.dispatch_next();
        installed
    }
}

impl Drop for PageRenderWindow {
    fn drop(&mut self) {
        if let Some(in_flight) = &self.in_flight {
            in_flight.token.cancel();
            self.renderer.cancel(in_flight.page_number);
        }
    }
}
