//! The ordered handoff queue between worker and origin.

use crate::events::OutputEvent;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Thread-safe FIFO queue of pending output events.
///
/// Events are delivered to the origin in strict submission order. The
/// condition variable is also notified on operation completion so a waiting
/// origin wakes up without polling.
#[derive(Debug, Default)]
pub(crate) struct OutputQueue {
    pending: Mutex<VecDeque<OutputEvent>>,
    available: Condvar,
}

impl OutputQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event, preserving submission order.
    pub(crate) fn push(&self, event: OutputEvent) {
        lock(&self.pending).push_back(event);
        self.available.notify_all();
    }

    /// Take every pending event, oldest first.
    pub(crate) fn drain(&self) -> Vec<OutputEvent> {
        lock(&self.pending).drain(..).collect()
    }

    /// Wake anything blocked in [`wait`](Self::wait).
    pub(crate) fn notify(&self) {
        let _guard = lock(&self.pending);
        self.available.notify_all();
    }

    /// Block until an event arrives or `timeout` passes. The timeout bounds
    /// the window between a missed notification and the next check; callers
    /// re-check their own completion condition after every wakeup.
    pub(crate) fn wait(&self, timeout: Duration) {
        let guard = lock(&self.pending);
        if !guard.is_empty() {
            return;
        }
        let _unused = self.available.wait_timeout(guard, timeout).map(|(g, _)| g);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_submission_order() {
        let queue = OutputQueue::new();
        queue.push(OutputEvent::Verbose("one".to_string()));
        queue.push(OutputEvent::Warning("two".to_string()));
        queue.push(OutputEvent::Verbose("three".to_string()));

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert!(matches!(&drained[0], OutputEvent::Verbose(m) if m == "one"));
        assert!(matches!(&drained[1], OutputEvent::Warning(m) if m == "two"));
        assert!(matches!(&drained[2], OutputEvent::Verbose(m) if m == "three"));
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn wait_returns_immediately_when_events_pending() {
        let queue = OutputQueue::new();
        queue.push(OutputEvent::Verbose("ready".to_string()));
        // Must not block.
        queue.wait(Duration::from_secs(5));
    }
}
