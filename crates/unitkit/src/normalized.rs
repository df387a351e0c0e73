//! Directive normalization and settings expansion.

use crate::constraint::ModuleConstraint;
use crate::error::{Error, Result};
use crate::unit::{ConfigurationUnit, Intent};
use crate::value::{Value, ValueMap};
use crate::version::SemanticVersion;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The reserved placeholder token expanded in string-valued settings when the
/// unit was loaded from a file. Matching is case-insensitive.
pub const CONFIG_ROOT_TOKEN: &str = "${ConfigRoot}";

/// Well-known directive names, stored case-folded.
pub mod directives {
    /// Provider module name.
    pub const MODULE: &str = "module";
    /// Exact module version.
    pub const VERSION: &str = "version";
    /// Inclusive minimum module version.
    pub const MIN_VERSION: &str = "minversion";
    /// Inclusive maximum module version.
    pub const MAX_VERSION: &str = "maxversion";
    /// Module identity guid.
    pub const MODULE_GUID: &str = "moduleguid";
    /// Repository to search for the module.
    pub const REPOSITORY: &str = "repository";
    /// Whether prerelease module versions are acceptable.
    pub const ALLOW_PRERELEASE: &str = "allowprerelease";
}

/// A configuration unit plus the derived state every processing pass needs:
/// a case-folded directive map, the optional configuration root used for
/// placeholder expansion, and parsed module constraints.
///
/// Created per unit per processing pass and discarded afterwards.
#[derive(Debug, Clone)]
pub struct NormalizedUnit {
    unit: ConfigurationUnit,
    // Keys lower-cased once at construction; lookups always go through the
    // folded key, so any authored casing resolves.
    directives: BTreeMap<String, Value>,
    base_path: Option<PathBuf>,
}

impl NormalizedUnit {
    /// Wrap a unit. `base_path` is the configuration root (the directory the
    /// document was loaded from), absent when the unit did not come from a
    /// file.
    pub fn new(unit: ConfigurationUnit, base_path: Option<&Path>) -> Self {
        let directives = unit
            .directives
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        Self {
            unit,
            directives,
            base_path: base_path.map(Path::to_path_buf),
        }
    }

    /// The wrapped unit.
    pub fn unit(&self) -> &ConfigurationUnit {
        &self.unit
    }

    /// Resource (type) name.
    pub fn resource_name(&self) -> &str {
        &self.unit.resource
    }

    /// Authored intent.
    pub fn intent(&self) -> Intent {
        self.unit.intent
    }

    /// Name used in diagnostics: `module/resource` when a module directive is
    /// present, the bare resource name otherwise.
    pub fn qualified_name(&self) -> String {
        match self.directive_string(directives::MODULE) {
            Some(module) => format!("{module}/{}", self.unit.resource),
            None => self.unit.resource.clone(),
        }
    }

    /// Look up a directive by name, any casing. Absent keys yield `None`,
    /// never an error.
    pub fn directive(&self, name: &str) -> Option<&Value> {
        self.directives.get(&name.to_lowercase())
    }

    /// A directive's string value, trimmed; `None` when absent, non-string,
    /// or blank.
    pub fn directive_string(&self, name: &str) -> Option<String> {
        let text = self.directive(name)?.as_str()?.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// A directive's boolean value; `None` when absent or not a boolean.
    pub fn directive_bool(&self, name: &str) -> Option<bool> {
        self.directive(name)?.as_bool()
    }

    /// The exact-version directive, parsed.
    pub fn semantic_version(&self) -> Result<Option<SemanticVersion>> {
        self.version_directive(directives::VERSION)
    }

    /// The minimum-version directive, parsed.
    pub fn min_version(&self) -> Result<Option<SemanticVersion>> {
        self.version_directive(directives::MIN_VERSION)
    }

    /// The maximum-version directive, parsed.
    pub fn max_version(&self) -> Result<Option<SemanticVersion>> {
        self.version_directive(directives::MAX_VERSION)
    }

    fn version_directive(&self, name: &str) -> Result<Option<SemanticVersion>> {
        match self.directive_string(name) {
            Some(text) => SemanticVersion::parse(&text).map(Some),
            None => Ok(None),
        }
    }

    /// Derive the module constraint from directives.
    ///
    /// No (or an empty) module directive means module resolution is
    /// unconstrained. Version, min/max and guid are each optional and
    /// independent of one another.
    pub fn module_constraint(&self) -> Result<Option<ModuleConstraint>> {
        let Some(name) = self.directive_string(directives::MODULE) else {
            return Ok(None);
        };

        Ok(Some(ModuleConstraint {
            name,
            version: self.semantic_version()?,
            min_version: self.min_version()?,
            max_version: self.max_version()?,
            guid: self.directive_string(directives::MODULE_GUID),
        }))
    }

    /// The settings map with the configuration-root placeholder expanded in
    /// every string value, including strings nested in maps and sequences.
    ///
    /// Fails when a placeholder is present but the unit was not loaded from a
    /// file; the literal token is never passed through silently.
    pub fn expanded_settings(&self) -> Result<ValueMap> {
        self.unit
            .settings
            .iter()
            .map(|(k, v)| Ok((k.to_string(), self.expand_value(v)?)))
            .collect::<Result<Vec<_>>>()
            .map(ValueMap::from_iter)
    }

    fn expand_value(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(text) => self.expand_string(text).map(Value::String),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| Ok((k.to_string(), self.expand_value(v)?)))
                .collect::<Result<Vec<_>>>()
                .map(|entries| Value::Map(ValueMap::from_iter(entries))),
            Value::Sequence(items) => items
                .iter()
                .map(|v| self.expand_value(v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other.clone()),
        }
    }

    fn expand_string(&self, text: &str) -> Result<String> {
        if find_token(text, 0).is_none() {
            return Ok(text.to_string());
        }

        let Some(base) = &self.base_path else {
            return Err(Error::MissingConfigRoot {
                unit: self.unit.display_id().to_string(),
                placeholder: CONFIG_ROOT_TOKEN,
            });
        };
        let base = base.to_string_lossy();

        let mut expanded = String::with_capacity(text.len());
        let mut cursor = 0;
        while let Some(at) = find_token(text, cursor) {
            expanded.push_str(&text[cursor..at]);
            expanded.push_str(&base);
            cursor = at + CONFIG_ROOT_TOKEN.len();
        }
        expanded.push_str(&text[cursor..]);
        Ok(expanded)
    }
}

/// Byte offset of the next placeholder occurrence at or after `from`,
/// ignoring ASCII case. The token is pure ASCII, so byte-window comparison is
/// safe on any UTF-8 input.
fn find_token(haystack: &str, from: usize) -> Option<usize> {
    let token = CONFIG_ROOT_TOKEN.as_bytes();
    let bytes = haystack.as_bytes();
    if bytes.len() < from + token.len() {
        return None;
    }
    (from..=bytes.len() - token.len())
        .find(|&i| bytes[i..i + token.len()].eq_ignore_ascii_case(token))
}
