//! Module constraints derived from unit directives.

use crate::version::SemanticVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A constraint on which provider module may satisfy a unit.
///
/// Exact and min/max bounds are independent: a max version alone is a valid
/// constraint, and an exact version does not imply bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConstraint {
    /// Module name.
    pub name: String,
    /// Exact required version.
    pub version: Option<SemanticVersion>,
    /// Inclusive minimum version.
    pub min_version: Option<SemanticVersion>,
    /// Inclusive maximum version.
    pub max_version: Option<SemanticVersion>,
    /// Optional module identity guid.
    pub guid: Option<String>,
}

impl ModuleConstraint {
    /// Constraint on name alone.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            min_version: None,
            max_version: None,
            guid: None,
        }
    }

    /// Constraint on name plus an exact version.
    pub fn exact(name: impl Into<String>, version: SemanticVersion) -> Self {
        Self {
            version: Some(version),
            ..Self::named(name)
        }
    }

    /// Whether a descriptor version satisfies this constraint.
    ///
    /// An unversioned descriptor only satisfies a constraint that carries no
    /// version requirements at all.
    pub fn accepts(&self, candidate: Option<&SemanticVersion>) -> bool {
        let Some(candidate) = candidate else {
            return self.version.is_none()
                && self.min_version.is_none()
                && self.max_version.is_none();
        };

        if let Some(exact) = &self.version
            && candidate != exact
        {
            return false;
        }
        if let Some(min) = &self.min_version
            && candidate < min
        {
            return false;
        }
        if let Some(max) = &self.max_version
            && candidate > max
        {
            return false;
        }
        true
    }
}

impl fmt::Display for ModuleConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        } else {
            if let Some(min) = &self.min_version {
                write!(f, " >={min}")?;
            }
            if let Some(max) = &self.max_version {
                write!(f, " <={max}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> SemanticVersion {
        text.parse().unwrap()
    }

    #[test]
    fn exact_version_must_match() {
        let constraint = ModuleConstraint::exact("mymod", v("1.0"));
        assert!(constraint.accepts(Some(&v("1.0"))));
        assert!(!constraint.accepts(Some(&v("1.1"))));
        assert!(!constraint.accepts(None));
    }

    #[test]
    fn max_alone_is_a_valid_constraint() {
        let constraint = ModuleConstraint {
            max_version: Some(v("2.0")),
            ..ModuleConstraint::named("mymod")
        };
        assert!(constraint.accepts(Some(&v("1.5"))));
        assert!(constraint.accepts(Some(&v("2.0"))));
        assert!(!constraint.accepts(Some(&v("2.1"))));
    }

    #[test]
    fn bounds_combine() {
        let constraint = ModuleConstraint {
            min_version: Some(v("1.0")),
            max_version: Some(v("1.9.*")),
            ..ModuleConstraint::named("mymod")
        };
        assert!(constraint.accepts(Some(&v("1.9.250"))));
        assert!(!constraint.accepts(Some(&v("0.9"))));
        assert!(!constraint.accepts(Some(&v("2.0"))));
    }

    #[test]
    fn unversioned_candidate_needs_unversioned_constraint() {
        assert!(ModuleConstraint::named("mymod").accepts(None));
        let bounded = ModuleConstraint {
            min_version: Some(v("1.0")),
            ..ModuleConstraint::named("mymod")
        };
        assert!(!bounded.accepts(None));
    }

    #[test]
    fn display_forms() {
        assert_eq!(
            ModuleConstraint::exact("mymod", v("1.0")).to_string(),
            "mymod@1.0"
        );
        assert_eq!(ModuleConstraint::named("mymod").to_string(), "mymod");
    }
}
