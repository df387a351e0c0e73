//! The configuration unit: a named, versioned declaration of desired state.

use crate::value::ValueMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the author wants done with a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Only report current state; never test or apply.
    Inform,
    /// Verify the system is already in the declared state.
    Assert,
    /// Converge the system to the declared state.
    #[default]
    Apply,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inform => write!(f, "inform"),
            Self::Assert => write!(f, "assert"),
            Self::Apply => write!(f, "apply"),
        }
    }
}

/// A single configuration unit as authored.
///
/// Immutable once built; every downstream component reads it through a
/// [`NormalizedUnit`](crate::NormalizedUnit) wrapper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationUnit {
    /// Resource (type) name this unit configures.
    pub resource: String,
    /// Caller-assigned instance identifier, used in diagnostics.
    #[serde(default)]
    pub instance_id: String,
    /// What to do with the unit.
    #[serde(default)]
    pub intent: Intent,
    /// Desired settings, possibly nested.
    #[serde(default)]
    pub settings: ValueMap,
    /// Resolution directives (module, version bounds, repository, ...).
    #[serde(default)]
    pub directives: ValueMap,
    /// Identifiers of units that must be processed before this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ConfigurationUnit {
    /// Create a unit for a resource with the given intent.
    pub fn new(resource: impl Into<String>, intent: Intent) -> Self {
        Self {
            resource: resource.into(),
            intent,
            ..Self::default()
        }
    }

    /// Identifier used in logs: the instance id when present, else the
    /// resource name.
    pub fn display_id(&self) -> &str {
        if self.instance_id.is_empty() {
            &self.resource
        } else {
            &self.instance_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intent_is_apply() {
        let unit = ConfigurationUnit::new("registry", Intent::default());
        assert_eq!(unit.intent, Intent::Apply);
    }

    #[test]
    fn display_id_falls_back_to_resource() {
        let mut unit = ConfigurationUnit::new("registry", Intent::Apply);
        assert_eq!(unit.display_id(), "registry");
        unit.instance_id = "registry-0".to_string();
        assert_eq!(unit.display_id(), "registry-0");
    }
}
