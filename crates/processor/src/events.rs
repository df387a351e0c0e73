//! Diagnostics and progress surfaces.
//!
//! These traits let the engine report without depending on a UI framework;
//! callers bridge them to whatever transport or terminal they own.

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// Step-by-step narration; emitted on every significant step.
    Verbose,
    /// Something unexpected that did not stop processing.
    Warning,
    /// A failure worth surfacing on its own.
    Error,
}

/// Receiver for diagnostic messages. Subscribing is optional; the engine
/// emits regardless.
pub trait DiagnosticsSink: Send + Sync {
    /// Receive one diagnostic.
    fn diagnostic(&self, level: DiagnosticLevel, message: &str);
}

/// Progress of a long-running multi-unit operation.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Units finished so far.
    pub current: usize,
    /// Total units in the operation.
    pub total: usize,
    /// What is being worked on.
    pub message: String,
    /// Whether the operation just finished.
    pub completed: bool,
}

/// Receiver for progress updates.
pub trait ProgressSink: Send + Sync {
    /// Receive one progress update.
    fn progress(&self, update: &ProgressUpdate);
}

/// Sink that drops everything.
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn diagnostic(&self, _level: DiagnosticLevel, _message: &str) {}
}

impl ProgressSink for NullSink {
    fn progress(&self, _update: &ProgressUpdate) {}
}

/// Sink that forwards diagnostics to the `log` facade, for callers that do
/// not need them as data.
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn diagnostic(&self, level: DiagnosticLevel, message: &str) {
        match level {
            DiagnosticLevel::Verbose => log::debug!("{message}"),
            DiagnosticLevel::Warning => log::warn!("{message}"),
            DiagnosticLevel::Error => log::error!("{message}"),
        }
    }
}
