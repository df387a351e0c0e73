//! The resource provider invocation boundary.

use std::fmt;
use unitkit::{ModuleConstraint, ValueMap};

/// A classified failure from a provider invocation.
///
/// Providers return this directly instead of the engine recovering structure
/// from opaque exception types after the fact. `declared` distinguishes a
/// failure the provider itself described (it keeps its own description and
/// classification) from an internal one the engine translated.
#[derive(Debug, Clone)]
pub struct InvokeError {
    /// Stable error token, when the provider declared one.
    pub code: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// Full error text, when more detail than the description exists.
    pub details: Option<String>,
    /// Whether the provider itself classified this failure.
    pub declared: bool,
}

impl InvokeError {
    /// A failure the provider described itself.
    pub fn declared(
        code: impl Into<String>,
        description: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            code: Some(code.into()),
            description: description.into(),
            details,
            declared: true,
        }
    }

    /// An internal failure with a bare message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: None,
            description: message.into(),
            details: None,
            declared: false,
        }
    }

    /// An internal failure built from an error chain: the innermost error's
    /// message becomes the description, the full chain the details.
    pub fn internal_from(error: &dyn std::error::Error) -> Self {
        let mut chain = vec![error.to_string()];
        let mut cursor = error.source();
        while let Some(inner) = cursor {
            chain.push(inner.to_string());
            cursor = inner.source();
        }

        let innermost = chain.last().cloned().unwrap_or_default();
        let details = if chain.len() > 1 {
            Some(chain.join(": "))
        } else {
            None
        };
        Self {
            code: None,
            description: innermost,
            details,
            declared: false,
        }
    }
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl std::error::Error for InvokeError {}

/// The resource provider runtime: the component that knows how to read,
/// test and write one resource type's state.
///
/// Calls are keyed by resource name plus module constraint; the provider is
/// responsible for routing to the right implementation. These are treated as
/// opaque blocking calls by the execution model.
pub trait ResourceProvider: Send + Sync {
    /// Read the resource's current settings.
    fn invoke_get(
        &self,
        settings: &ValueMap,
        resource: &str,
        module: Option<&ModuleConstraint>,
    ) -> Result<ValueMap, InvokeError>;

    /// Test whether the resource is already in the declared state.
    fn invoke_test(
        &self,
        settings: &ValueMap,
        resource: &str,
        module: Option<&ModuleConstraint>,
    ) -> Result<bool, InvokeError>;

    /// Converge the resource to the declared state. Returns whether a reboot
    /// is required to finish the change.
    fn invoke_set(
        &self,
        settings: &ValueMap,
        resource: &str,
        module: Option<&ModuleConstraint>,
    ) -> Result<bool, InvokeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn internal_from_unwraps_to_innermost() {
        let root = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let wrapped = io::Error::new(io::ErrorKind::Other, root);

        let invoke = InvokeError::internal_from(&wrapped);
        assert!(!invoke.declared);
        assert_eq!(invoke.description, "access denied");
        assert!(invoke.details.unwrap().contains("access denied"));
    }

    #[test]
    fn internal_from_single_error_has_no_details() {
        let error = io::Error::new(io::ErrorKind::NotFound, "missing");
        let invoke = InvokeError::internal_from(&error);
        assert_eq!(invoke.description, "missing");
        assert!(invoke.details.is_none());
    }

    #[test]
    fn declared_keeps_code() {
        let invoke = InvokeError::declared("0x80070005", "provider said no", None);
        assert!(invoke.declared);
        assert_eq!(invoke.code.as_deref(), Some("0x80070005"));
    }
}
