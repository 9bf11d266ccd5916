//! Cooperative cancellation
//!
//! Rust cannot kill a thread from the outside. A cancelled token instead
//! unwinds the thread that polls it at its next checkpoint, using a
//! [`ThreadAbort`] payload that the engine absorbs where it issued the
//! cancellation. Bodies that never reach a checkpoint cannot be stopped.

use futures::future::select_all;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Polling granularity for cancellable sleeps
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Unwind payload raised at a checkpoint of a cancelled token
#[derive(Debug)]
pub struct ThreadAbort;

/// True when a caught panic payload is a checkpoint abort
pub fn is_thread_abort(payload: &(dyn Any + Send)) -> bool {
    payload.is::<ThreadAbort>()
}

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    /// Wakes async waiters of this token and of its children
    notify: Notify,
    parent: Option<CancellationToken>,
}

/// Shared cancellation flag, optionally linked to a parent token
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled by either itself or this token
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Request cancellation of this token and every token derived from it
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
    }

    /// Unwind the current thread if cancellation was requested
    pub fn checkpoint(&self) {
        if self.is_cancelled() {
            std::panic::resume_unwind(Box::new(ThreadAbort));
        }
    }

    /// Sleep for `duration`, waking early and unwinding on cancellation
    pub fn sleep(&self, duration: Duration) {
        let deadline = Instant::now().checked_add(duration);
        loop {
            self.checkpoint();

            let step = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return;
                    }
                    remaining.min(POLL_INTERVAL)
                }
                None => POLL_INTERVAL,
            };
            std::thread::sleep(step);
        }
    }

    /// Resolves once the token or one of its ancestors is cancelled
    pub async fn cancelled(&self) {
        loop {
            let mut waits: Vec<_> = self
                .lineage()
                .map(|state| Box::pin(state.notify.notified()))
                .collect();
            // Register before checking the flag so a concurrent cancel is not missed
            for wait in &mut waits {
                wait.as_mut().enable();
            }
            if self.is_cancelled() {
                return;
            }
            select_all(waits).await;
        }
    }

    fn lineage(&self) -> impl Iterator<Item = &TokenState> {
        std::iter::successors(Some(self), |token| token.inner.parent.as_ref())
            .map(|token| token.inner.as_ref())
    }
}
