//! Error types for resource resolution and installation.
//!
//! Errors are categorized so callers can tell configuration mistakes from
//! trust failures without matching on every variant. None of these are
//! retried automatically.

use crate::types::SignatureStatus;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A resource or module could not be resolved.
    Resolution,
    /// The host runtime does not meet requirements.
    Precondition,
    /// A staged package failed signature verification.
    Trust,
    /// Installation went through but the resource still cannot be resolved.
    Installation,
    /// Filesystem failure while staging or cleaning up.
    Io,
    /// Anything else.
    Other,
}

impl ErrorCategory {
    /// User-facing description of this category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Resolution => "Resource could not be resolved",
            Self::Precondition => "Host runtime requirement not met",
            Self::Trust => "Package failed trust verification",
            Self::Installation => "Installation did not produce the resource",
            Self::Io => "Filesystem failure",
            Self::Other => "Unexpected error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors raised while resolving or installing resource providers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The repository returned zero matches. Terminal; there is no retry.
    #[error("resource '{resource}' not found{}", module_suffix(.module.as_deref()))]
    ResourceNotFound {
        /// Requested resource name.
        resource: String,
        /// Module constraint, if one was supplied.
        module: Option<String>,
    },

    /// A module named by a constraint is not present locally.
    #[error("module '{module}' not found")]
    ModuleNotFound {
        /// Requested module name.
        module: String,
    },

    /// An unconstrained lookup matched more than one module; the caller must
    /// supply a module name to disambiguate.
    #[error("resource '{resource}' is ambiguous: found in {count} modules, specify a module")]
    AmbiguousMatch {
        /// Requested resource name.
        resource: String,
        /// Number of modules that matched.
        count: usize,
    },

    /// Two descriptors with the same module, resource and version were
    /// presented to the index. The caller must not supply duplicates.
    #[error("duplicate descriptor: {descriptor}")]
    DuplicateDescriptor {
        /// Qualified name of the colliding descriptor.
        descriptor: String,
    },

    /// The host automation runtime is the wrong edition or too old.
    /// Fail-fast and non-retryable.
    #[error("unsupported host runtime: {reason}")]
    UnsupportedRuntime {
        /// What requirement was violated.
        reason: String,
    },

    /// A staged file's signature is not valid.
    #[error("untrusted signature ({status}) on {path}")]
    UntrustedSignature {
        /// File that failed verification.
        path: PathBuf,
        /// The signature status observed.
        status: SignatureStatus,
    },

    /// The repository reported a successful install but the resource still
    /// does not resolve locally.
    #[error("resource '{resource}' not found after installation")]
    InstallFailed {
        /// Resource that was installed.
        resource: String,
    },

    /// The repository collaborator failed.
    #[error("repository error: {message}")]
    Repository {
        /// What the repository reported.
        message: String,
    },

    /// IO failure during staging or cleanup.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Failure from directive parsing on the unit being resolved.
    #[error(transparent)]
    Unit(#[from] unitkit::Error),
}

fn module_suffix(module: Option<&str>) -> String {
    match module {
        Some(module) => format!(" in module '{module}'"),
        None => String::new(),
    }
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ResourceNotFound { .. }
            | Self::ModuleNotFound { .. }
            | Self::AmbiguousMatch { .. }
            | Self::DuplicateDescriptor { .. } => ErrorCategory::Resolution,
            Self::UnsupportedRuntime { .. } => ErrorCategory::Precondition,
            Self::UntrustedSignature { .. } => ErrorCategory::Trust,
            Self::InstallFailed { .. } => ErrorCategory::Installation,
            Self::Io { .. } => ErrorCategory::Io,
            Self::Repository { .. } | Self::Unit(_) => ErrorCategory::Other,
        }
    }
}
