//! Result records returned by unit processing.

use crate::invoke::InvokeError;
use serde::Serialize;
use unitkit::{ConfigurationUnit, ValueMap};

/// Where a failure recorded in a result originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// No failure.
    #[default]
    None,
    /// The provider declared the failure itself.
    Provider,
    /// The engine translated an unclassified failure.
    Internal,
    /// A precondition (such as a failed assert) was not met.
    Precondition,
}

/// Description of how an operation concluded.
///
/// A `result_code` of `None` means success; failures carry the provider's
/// token when one was declared.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultInformation {
    /// Human-readable description of the failure, empty on success.
    pub description: String,
    /// Full failure text, when more detail exists.
    pub details: Option<String>,
    /// Stable error token; `None` on success.
    pub result_code: Option<String>,
    /// Failure origin classification.
    pub source: ResultSource,
}

impl ResultInformation {
    /// A successful outcome.
    pub fn success() -> Self {
        Self::default()
    }

    /// Whether this records a success.
    pub fn is_success(&self) -> bool {
        self.result_code.is_none() && self.source == ResultSource::None
    }

    /// Translate a provider invocation failure.
    ///
    /// Declared failures keep the provider's description and classify as
    /// [`ResultSource::Provider`]; everything else classifies as internal.
    pub fn from_invoke_error(error: &InvokeError) -> Self {
        Self {
            description: error.description.clone(),
            details: error.details.clone(),
            result_code: Some(
                error
                    .code
                    .clone()
                    .unwrap_or_else(|| "internal-error".to_string()),
            ),
            source: if error.declared {
                ResultSource::Provider
            } else {
                ResultSource::Internal
            },
        }
    }

    /// A failed precondition (assert not satisfied, unit skipped by policy).
    pub fn precondition(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            details: None,
            result_code: Some("precondition-failed".to_string()),
            source: ResultSource::Precondition,
        }
    }
}

/// Outcome of a test invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    /// The system is in the declared state.
    Positive,
    /// The system differs from the declared state.
    Negative,
    /// The provider failed before producing an answer.
    Failed,
}

/// Result of reading a unit's current settings.
#[derive(Debug, Clone, Serialize)]
pub struct GetResult {
    /// The unit that was processed.
    pub unit: ConfigurationUnit,
    /// How the operation concluded.
    pub info: ResultInformation,
    /// The settings the provider reported; empty on failure.
    pub settings: ValueMap,
}

/// Result of testing a unit.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// The unit that was processed.
    pub unit: ConfigurationUnit,
    /// How the operation concluded.
    pub info: ResultInformation,
    /// The test verdict.
    pub outcome: TestOutcome,
}

/// Result of applying a unit.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    /// The unit that was processed.
    pub unit: ConfigurationUnit,
    /// How the operation concluded.
    pub info: ResultInformation,
    /// Whether the provider asked for a reboot to finish the change.
    pub reboot_required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_no_code() {
        let info = ResultInformation::success();
        assert!(info.is_success());
        assert!(info.result_code.is_none());
    }

    #[test]
    fn declared_error_classifies_as_provider() {
        let invoke = InvokeError::declared("E42", "broken", Some("very broken".to_string()));
        let info = ResultInformation::from_invoke_error(&invoke);
        assert_eq!(info.source, ResultSource::Provider);
        assert_eq!(info.result_code.as_deref(), Some("E42"));
        assert_eq!(info.description, "broken");
        assert_eq!(info.details.as_deref(), Some("very broken"));
    }

    #[test]
    fn internal_error_classifies_as_internal() {
        let invoke = InvokeError::internal("boom");
        let info = ResultInformation::from_invoke_error(&invoke);
        assert_eq!(info.source, ResultSource::Internal);
        assert!(info.result_code.is_some());
        assert!(!info.is_success());
    }
}
