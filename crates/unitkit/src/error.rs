//! Error types for unit handling.

use std::fmt;

/// Result type alias for unit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while normalizing or expanding configuration units.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A setting references the configuration-root placeholder but the unit
    /// was not loaded from a file, so there is no root to expand it with.
    #[error("unit '{unit}': settings reference {placeholder} but no configuration root is available")]
    MissingConfigRoot {
        /// Unit that carried the placeholder.
        unit: String,
        /// The literal placeholder token.
        placeholder: &'static str,
    },

    /// A version directive could not be parsed.
    #[error("invalid version '{text}': {reason}")]
    InvalidVersion {
        /// The literal version text.
        text: String,
        /// What was wrong with it.
        reason: VersionErrorReason,
    },
}

/// Why a version string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionErrorReason {
    /// The version string was empty.
    Empty,
    /// A dotted segment was not a number or wildcard.
    BadSegment(String),
}

impl fmt::Display for VersionErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty version string"),
            Self::BadSegment(segment) => write!(f, "segment '{segment}' is not numeric"),
        }
    }
}
