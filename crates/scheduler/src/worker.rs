//! Dedicated render worker thread.
//!
//! The worker receives one render job at a time over a channel, runs the page
//! renderer and reports a [`RenderCompletion`] for every job it receives,
//! including cancelled and failed ones, so the window always learns when the
//! render slot is free again.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::cancel::CancellationToken;
use crate::surface::PageSurface;

/// Page rasterization backend
///
/// Implementations should poll the token during long renders and may return
/// early once it is cancelled; the result is then reported as
/// [`RenderOutcome::Cancelled`].
pub trait PageRenderer: Send + Sync {
    /// Render a one-based page at `scale` bitmap pixels per point
    fn render_page(
        &self,
        page_number: u32,
        scale: f32,
        token: &CancellationToken,
    ) -> Result<PageSurface, RenderError>;

    /// Best-effort notification that the page's render is no longer wanted
    fn cancel(&self, _page_number: u32) {}
}

/// Render failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("page {0} is out of range")]
    PageOutOfRange(u32),

    #[error("invalid render scale {0}")]
    InvalidScale(f32),

    #[error("render backend failed: {0}")]
    Backend(String),
}

/// How a render job settled
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered(PageSurface),
    Cancelled,
    Failed(RenderError),
}

pub(crate) struct RenderJob {
    pub renderer: Arc<dyn PageRenderer>,
    pub page_number: u32,
    pub scale: f32,
    pub generation: u64,
    pub token: CancellationToken,
}

#[derive(Debug)]
pub(crate) struct RenderCompletion {
    pub page_number: u32,
    pub generation: u64,
    pub token: CancellationToken,
    pub outcome: RenderOutcome,
}

/// Single render thread fed by a job channel
pub(crate) struct RenderWorker {
    jobs: Option<Sender<RenderJob>>,
    thread: Option<JoinHandle<()>>,
}

impl RenderWorker {
    pub fn spawn(completions: Sender<RenderCompletion>) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("pdf-page-render".to_string())
            .spawn(move || Self::run(rx, completions))?;

        Ok(Self {
            jobs: Some(tx),
            thread: Some(thread),
        })
    }

    /// Hand a job to the worker; `false` if the thread is gone
    pub fn submit(&self, job: RenderJob) -> bool {
        match &self.jobs {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    fn run(jobs: Receiver<RenderJob>, completions: Sender<RenderCompletion>) {
        while let Ok(job) = jobs.recv() {
            let outcome = Self::execute(&job);
            let completion = RenderCompletion {
                page_number: job.page_number,
                generation: job.generation,
                token: job.token,
                outcome,
            };
            if completions.send(completion).is_err() {
                break;
            }
        }
    }

    fn execute(job: &RenderJob) -> RenderOutcome {
        if job.token.is_cancelled() {
            return RenderOutcome::Cancelled;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            job.renderer.render_page(job.page_number, job.scale, &job.token)
        }));

        match result {
            _ if job.token.is_cancelled() => RenderOutcome::Cancelled,
            Ok(Ok(surface)) => RenderOutcome::Rendered(surface),
            Ok(Err(err)) => RenderOutcome::Failed(err),
            Err(_) => RenderOutcome::Failed(RenderError::Backend(format!(
                "renderer panicked on page {}",
                job.page_number
            ))),
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        // Closing the channel ends the loop after the current job
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("render worker thread panicked");
            }
        }
    }
}
