//! # unitkit
//!
//! Data model for declarative configuration units: the unit itself, the
//! settings value tree, directive normalization with case-insensitive
//! lookup, configuration-root placeholder expansion, semantic versions with
//! wildcard bounds, and module constraints.
//!
//! A raw [`ConfigurationUnit`] is authored by a caller (usually a document
//! loader) and wrapped in a [`NormalizedUnit`] for the duration of one
//! processing pass:
//!
//! ```
//! use unitkit::{ConfigurationUnit, Intent, NormalizedUnit};
//! use std::path::Path;
//!
//! let mut unit = ConfigurationUnit::new("Registry", Intent::Apply);
//! unit.directives.insert("Module", "MyDsc");
//! unit.directives.insert("Version", "1.0");
//! unit.settings.insert("Path", "${ConfigRoot}/x");
//!
//! let normalized = NormalizedUnit::new(unit, Some(Path::new("/cfg")));
//! let constraint = normalized.module_constraint().unwrap().unwrap();
//! assert_eq!(constraint.to_string(), "MyDsc@1.0");
//!
//! let settings = normalized.expanded_settings().unwrap();
//! assert_eq!(settings.get("Path").unwrap().as_str(), Some("/cfg/x"));
//! ```

#![warn(missing_docs)]

pub mod constraint;
pub mod error;
pub mod normalized;
pub mod unit;
pub mod value;
pub mod version;

pub use constraint::ModuleConstraint;
pub use error::{Error, Result};
pub use normalized::{CONFIG_ROOT_TOKEN, NormalizedUnit, directives};
pub use unit::{ConfigurationUnit, Intent};
pub use value::{Value, ValueMap};
pub use version::SemanticVersion;
