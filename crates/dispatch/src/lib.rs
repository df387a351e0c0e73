//! # dispatch
//!
//! Execution model for callers bound to a restricted context: one that
//! cannot safely make blocking, re-entrant calls into the provider layer.
//!
//! An [`AsyncCommand`] captures its creating thread as the *origin*. Work
//! started with [`AsyncCommand::run_on_worker`] runs inline when the origin
//! is unrestricted, or on a single ad hoc worker thread otherwise. Output
//! written from the worker is queued in strict FIFO submission order and
//! delivered on the origin while it blocks in [`AsyncCommand::wait`], so
//! diagnostics and progress appear to originate from the caller thread.
//!
//! Cancellation is cooperative: a [`CancellationToken`] is observed at the
//! operation's own await points, and no thread is ever forcibly stopped.
//!
//! ```
//! use dispatch::{AsyncCommand, ExecutionContext, NullOutput, OutputEvent};
//! use std::sync::Arc;
//!
//! let command = Arc::new(AsyncCommand::new(
//!     ExecutionContext::Restricted,
//!     Arc::new(NullOutput),
//! ));
//!
//! let worker_view = Arc::clone(&command);
//! let handle = command
//!     .run_on_worker(move || {
//!         worker_view.write(OutputEvent::Verbose("working".to_string()));
//!         Ok::<_, std::io::Error>(2 + 2)
//!     })
//!     .unwrap();
//!
//! assert_eq!(command.wait(handle).unwrap(), 4);
//! ```

#![warn(missing_docs)]

pub mod cancel;
pub mod command;
pub mod error;
pub mod events;
mod queue;

pub use cancel::CancellationToken;
pub use command::{AsyncCommand, CompletionHandle, ExecutionContext};
pub use error::{Error, WaitError};
pub use events::{NullOutput, OutputEvent, OutputSink, ProgressRecord, ProgressState};
