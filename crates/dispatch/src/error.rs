//! Error types for the execution model.

/// Errors from setting up or awaiting an operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `run_on_worker` and `wait` are only valid from the thread that
    /// created the command.
    #[error("this call is only valid from the command's origin thread")]
    WrongThread,

    /// The worker thread could not be spawned.
    #[error("could not spawn worker thread: {source}")]
    Spawn {
        /// Underlying spawn failure.
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of awaiting a completion handle.
#[derive(Debug, thiserror::Error)]
pub enum WaitError<E: std::error::Error + 'static> {
    /// A dispatch-level failure (wrong thread).
    #[error(transparent)]
    Dispatch(#[from] Error),

    /// The worker panicked; the panic payload is re-raised here as an error
    /// on the origin thread.
    #[error("worker panicked: {message}")]
    Panicked {
        /// Stringified panic payload.
        message: String,
    },

    /// The operation itself failed; re-raised on the origin thread.
    #[error(transparent)]
    Failed(E),
}
