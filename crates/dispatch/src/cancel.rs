//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// A cooperative cancellation signal.
///
/// One token serves one top-level operation. Firing it never stops a thread:
/// in-flight work observes the token at its own await points, and callers
/// must tolerate a bounded tail of already-started work finishing after
/// cancellation was requested.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    canceled: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

impl CancellationToken {
    /// A fresh, unfired token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::Release);
        let _guard = lock(&self.inner.lock);
        self.inner.signal.notify_all();
    }

    /// Whether the signal has fired.
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::Acquire)
    }

    /// Block up to `timeout` waiting for the signal. Returns whether the
    /// token is canceled by the time this returns.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_canceled() {
            return true;
        }
        let guard = lock(&self.inner.lock);
        let _unused = self
            .inner
            .signal
            .wait_timeout(guard, timeout)
            .map(|(g, _)| g);
        self.is_canceled()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
