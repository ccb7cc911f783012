//! Cancellation tokens for page renders
//!
//! A render that falls out of the window is cancelled cooperatively: the
//! renderer polls its token and the window refuses to install results whose
//! token was cancelled.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token for cooperative render cancellation
///
/// Clones share the same underlying flag.
///
/// # Example
///
/// ```
/// use pdf_signer_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let render_token = token.clone();
///
/// // Renderer side:
/// // if render_token.is_cancelled() { return early }
///
/// token.cancel();
/// assert!(render_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether two handles share the same flag
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
