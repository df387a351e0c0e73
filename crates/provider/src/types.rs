//! Descriptor and host types shared across resolution and installation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use unitkit::{ModuleConstraint, NormalizedUnit, SemanticVersion, directives};

/// Declared type of a provider property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    /// Boolean.
    Bool,
    /// Integer.
    Int,
    /// String.
    String,
    /// Nested map.
    Map,
    /// Ordered sequence.
    Sequence,
}

/// One property a resource provider accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInfo {
    /// Property name.
    pub name: String,
    /// Whether the provider requires the property.
    pub required: bool,
    /// Declared type tag.
    pub property_type: PropertyType,
}

impl PropertyInfo {
    /// Shorthand constructor.
    pub fn new(name: impl Into<String>, required: bool, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            required,
            property_type,
        }
    }
}

/// A resolvable resource provider, as reported by a repository or the host
/// runtime. The typed property list replaces any need to reflect over
/// provider objects at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Module the resource ships in. System-provided resources may have none.
    pub module: Option<String>,
    /// Resource (type) name.
    pub resource: String,
    /// Module version. Legacy/system resources may be unversioned.
    pub version: Option<SemanticVersion>,
    /// Properties the provider accepts.
    pub properties: Vec<PropertyInfo>,
}

impl ResourceDescriptor {
    /// Descriptor for a versioned resource in a module.
    pub fn new(
        module: impl Into<String>,
        resource: impl Into<String>,
        version: SemanticVersion,
    ) -> Self {
        Self {
            module: Some(module.into()),
            resource: resource.into(),
            version: Some(version),
            properties: Vec::new(),
        }
    }

    /// Descriptor for an unversioned, module-less system resource.
    pub fn system(resource: impl Into<String>) -> Self {
        Self {
            module: None,
            resource: resource.into(),
            version: None,
            properties: Vec::new(),
        }
    }

    /// Attach the property list.
    pub fn with_properties(mut self, properties: Vec<PropertyInfo>) -> Self {
        self.properties = properties;
        self
    }

    /// `module/resource@version` form for diagnostics.
    pub fn qualified_name(&self) -> String {
        let mut name = match &self.module {
            Some(module) => format!("{module}/{}", self.resource),
            None => self.resource.clone(),
        };
        if let Some(version) = &self.version {
            name.push('@');
            name.push_str(&version.to_string());
        }
        name
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// Verification outcome for one staged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Signed by a trusted certificate.
    Valid,
    /// The file carries no signature.
    NotSigned,
    /// Signed, but the signature does not verify.
    Invalid,
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::NotSigned => write!(f, "not signed"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// A signer certificate, identified by thumbprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Certificate thumbprint; the deduplication key for provenance.
    pub thumbprint: String,
    /// Subject line for display.
    pub subject: String,
}

/// Signature state of one file in a staged package.
#[derive(Debug, Clone)]
pub struct Signature {
    /// The file inspected.
    pub path: PathBuf,
    /// Verification outcome.
    pub status: SignatureStatus,
    /// The signer, when the file is signed.
    pub signer: Option<Certificate>,
}

/// Edition of the host automation runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEdition {
    /// The supported, free-threaded edition.
    Core,
    /// Older editions the engine refuses to run on.
    Legacy,
}

impl fmt::Display for RuntimeEdition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// Host automation runtime identity.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    /// Runtime edition.
    pub edition: RuntimeEdition,
    /// Runtime version.
    pub version: SemanticVersion,
}

/// Where installed provider modules land.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InstallLocation {
    /// The current user's module location.
    #[default]
    CurrentUser,
    /// The machine-wide module location.
    AllUsers,
    /// A caller-supplied directory; installs become saves into it.
    Custom(PathBuf),
}

/// A repository search request derived from a unit's directives.
#[derive(Debug, Clone, Default)]
pub struct ResourceQuery {
    /// Resource name to find.
    pub resource: String,
    /// Module constraint, when the unit pinned one.
    pub module: Option<ModuleConstraint>,
    /// Specific repository to search, from the `repository` directive.
    pub repository: Option<String>,
    /// Whether prerelease versions are acceptable.
    pub allow_prerelease: bool,
}

impl ResourceQuery {
    /// Query for a bare resource name.
    pub fn named(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    /// Build the query a normalized unit implies.
    pub fn from_unit(unit: &NormalizedUnit) -> unitkit::Result<Self> {
        Ok(Self {
            resource: unit.resource_name().to_string(),
            module: unit.module_constraint()?,
            repository: unit.directive_string(directives::REPOSITORY),
            allow_prerelease: unit.directive_bool(directives::ALLOW_PRERELEASE).unwrap_or(false),
        })
    }
}
