//! The async command: origin-thread bookkeeping, worker handoff and the
//! drain-then-check wait loop.

use crate::cancel::CancellationToken;
use crate::error::{Error, WaitError};
use crate::events::{OutputEvent, OutputSink, ProgressState};
use crate::queue::OutputQueue;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// How long the origin sleeps between drain passes when nothing woke it.
/// Purely a backstop; pushes and completion both notify the queue.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Capability of the calling execution context.
///
/// This is an explicit flag, not an OS thread property: a restricted context
/// cannot make blocking re-entrant calls into the provider layer, so those
/// calls move to a worker thread. An unrestricted context runs them inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Blocking provider calls must be marshaled to a worker thread.
    Restricted,
    /// Blocking provider calls may run on the calling thread.
    Unrestricted,
}

enum State<T, E> {
    Pending,
    Done(Result<T, E>),
    Panicked(String),
    Taken,
}

struct Completion<T, E> {
    state: Mutex<State<T, E>>,
    done: Condvar,
}

/// Handle to a running (or finished) operation. Await it with
/// [`AsyncCommand::wait`] from the origin thread.
pub struct CompletionHandle<T, E> {
    inner: Arc<Completion<T, E>>,
}

impl<T, E> CompletionHandle<T, E> {
    fn pending() -> Self {
        Self {
            inner: Arc::new(Completion {
                state: Mutex::new(State::Pending),
                done: Condvar::new(),
            }),
        }
    }

    fn finisher(&self) -> Arc<Completion<T, E>> {
        Arc::clone(&self.inner)
    }

    /// Whether the operation has finished (successfully or not).
    pub fn is_complete(&self) -> bool {
        !matches!(*lock(&self.inner.state), State::Pending)
    }

    /// Take the outcome if the operation has finished.
    fn try_take(&self) -> Option<Result<Result<T, E>, String>> {
        let mut state = lock(&self.inner.state);
        match std::mem::replace(&mut *state, State::Taken) {
            State::Pending => {
                *state = State::Pending;
                None
            }
            State::Done(outcome) => Some(Ok(outcome)),
            State::Panicked(message) => Some(Err(message)),
            State::Taken => None,
        }
    }
}

impl<T, E> Completion<T, E> {
    fn finish(&self, outcome: Result<Result<T, E>, String>) {
        let mut state = lock(&self.state);
        *state = match outcome {
            Ok(result) => State::Done(result),
            Err(message) => State::Panicked(message),
        };
        self.done.notify_all();
    }
}

/// An async operation bound to the thread that created it.
///
/// The creating thread is the *origin*: the only thread allowed to start
/// workers and wait on them, and the only thread output is delivered on.
/// Output written from any other thread is queued in FIFO submission order
/// and drained while the origin waits.
pub struct AsyncCommand {
    origin: ThreadId,
    context: ExecutionContext,
    sink: Arc<dyn OutputSink>,
    queue: Arc<OutputQueue>,
    // Tracks which progress activities already completed so a finished
    // progress bar cannot reopen.
    progress: Mutex<HashMap<u32, ProgressState>>,
    next_activity: AtomicU32,
    token: CancellationToken,
}

impl AsyncCommand {
    /// Create a command on the current thread, which becomes its origin.
    pub fn new(context: ExecutionContext, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            origin: thread::current().id(),
            context,
            sink,
            queue: Arc::new(OutputQueue::new()),
            progress: Mutex::new(HashMap::new()),
            next_activity: AtomicU32::new(0),
            token: CancellationToken::new(),
        }
    }

    /// The cancellation token observed by this command's operations.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request cancellation. Cooperative: in-flight provider calls receive
    /// the signal but no thread is forcibly stopped.
    pub fn cancel(&self) {
        self.token.cancel();
        self.queue.notify();
    }

    /// Allocate a progress activity id.
    pub fn next_activity_id(&self) -> u32 {
        self.next_activity.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Run `operation` to completion on an unrestricted context.
    ///
    /// Must be called from the origin thread. When the origin itself is
    /// unrestricted the operation runs inline; otherwise a fresh worker
    /// thread runs it, and success, failure or panic is captured into the
    /// returned handle.
    pub fn run_on_worker<T, E, F>(&self, operation: F) -> Result<CompletionHandle<T, E>, Error>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        if thread::current().id() != self.origin {
            return Err(Error::WrongThread);
        }

        let handle = CompletionHandle::pending();
        let completion = handle.finisher();
        let queue = Arc::clone(&self.queue);

        let run = move || {
            let outcome = catch_unwind(AssertUnwindSafe(operation)).map_err(panic_message);
            completion.finish(outcome);
            // Wake the origin: it may be blocked waiting for output that
            // will never come.
            queue.notify();
        };

        match self.context {
            ExecutionContext::Unrestricted => {
                log::debug!("origin context is unrestricted, running inline");
                run();
            }
            ExecutionContext::Restricted => {
                log::debug!("origin context is restricted, spawning worker");
                thread::Builder::new()
                    .name("attune-worker".to_string())
                    .spawn(run)
                    .map_err(|source| Error::Spawn { source })?;
            }
        }
        Ok(handle)
    }

    /// Block the origin until the operation completes, draining queued
    /// output in order the whole time.
    ///
    /// The sequencing here is load-bearing: drain, then check completion,
    /// then drain again once completion is observed. An event enqueued
    /// before the completion handle was set is therefore always delivered
    /// before `wait` returns.
    pub fn wait<T, E>(&self, handle: CompletionHandle<T, E>) -> Result<T, WaitError<E>>
    where
        E: std::error::Error + 'static,
    {
        if thread::current().id() != self.origin {
            return Err(WaitError::Dispatch(Error::WrongThread));
        }

        loop {
            self.flush();
            if let Some(outcome) = handle.try_take() {
                // Trailing events enqueued before completion was set.
                self.flush();
                return match outcome {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(error)) => Err(WaitError::Failed(error)),
                    Err(message) => Err(WaitError::Panicked { message }),
                };
            }
            self.queue.wait(WAIT_SLICE);
        }
    }

    /// Emit an event: dispatched immediately when called on the origin
    /// thread, enqueued in submission order otherwise.
    pub fn write(&self, event: OutputEvent) {
        if thread::current().id() == self.origin {
            self.dispatch(&event);
        } else {
            self.queue.push(event);
        }
    }

    /// Drain and dispatch everything queued. Only meaningful on the origin
    /// thread; `wait` calls this continuously.
    fn flush(&self) {
        for event in self.queue.drain() {
            self.dispatch(&event);
        }
    }

    fn dispatch(&self, event: &OutputEvent) {
        if let OutputEvent::Progress(record) = event {
            let mut progress = lock(&self.progress);
            let already_completed =
                progress.get(&record.activity_id) == Some(&ProgressState::Completed);
            // A completed activity never reopens; only another completion
            // record for it may pass.
            if already_completed && record.state == ProgressState::Processing {
                return;
            }
            progress.insert(record.activity_id, record.state);
        }
        self.sink.emit(event);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
