//! Cancellation token for cooperative cancellation of in-flight handler calls.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct TokenState {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
    callbacks: RwLock<Vec<CancelCallback>>,
    notify: Notify,
}

/// A token for cooperative cancellation.
///
/// Clones share state: cancelling any clone cancels them all. Cancellation is
/// idempotent and only the first reason is kept. Handlers observe it either by
/// polling [`is_cancelled`](Self::is_cancelled) or by awaiting
/// [`cancelled`](Self::cancelled).
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason.
    ///
    /// Callbacks are invoked immediately. Panics in callbacks are logged and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .state
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.state.reason.write() = Some(reason.into());

            let callbacks = self.state.callbacks.read();
            for callback in callbacks.iter() {
                run_callback(callback.as_ref());
            }
            drop(callbacks);

            self.state.notify.notify_waiters();
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.is_cancelled() {
            run_callback(&callback);
        } else {
            self.state.callbacks.write().push(Box::new(callback));
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.reason.read().clone()
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

fn run_callback(callback: &(dyn Fn() + Send + Sync)) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
