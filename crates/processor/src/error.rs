//! Error types for unit processing.

use unitkit::Intent;

/// Result type alias for processor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised synchronously by unit processing.
///
/// These represent programming or configuration mistakes, not transient
/// conditions; nothing here is retried. Provider invocation failures never
/// appear as errors - they are translated into result records so a
/// multi-unit run can continue past one unit's failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation is not allowed for the unit's intent.
    #[error("unit '{unit}' has intent '{intent}', {operation} is not supported")]
    UnsupportedOperation {
        /// Operation that was attempted.
        operation: &'static str,
        /// The unit's authored intent.
        intent: Intent,
        /// Unit identifier.
        unit: String,
    },

    /// A limit-mode processor already spent its one allowed attempt.
    #[error("unit '{unit}': {operation} was already invoked on this processor")]
    AlreadyInvoked {
        /// Operation that was attempted a second time.
        operation: &'static str,
        /// Unit identifier.
        unit: String,
    },

    /// A second high-level operation was attempted while one is in flight.
    /// Concurrent attempts fail fast instead of queueing.
    #[error("the configuration set is already being processed")]
    SetBusy,

    /// Resolution or installation failed for the unit.
    #[error(transparent)]
    Provider(#[from] provider::Error),

    /// Directive parsing or settings expansion failed.
    #[error(transparent)]
    Unit(#[from] unitkit::Error),
}
