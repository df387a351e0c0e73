//! The provider environment: runtime validation, search-path state, and the
//! resolve-or-install flow.

use crate::error::{Error, Result};
use crate::index::ResourceIndex;
use crate::repository::ProviderRepository;
use crate::runtime::HostRuntime;
use crate::types::{
    Certificate, InstallLocation, ResourceDescriptor, ResourceQuery, RuntimeEdition,
    SignatureStatus,
};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use unitkit::{ModuleConstraint, NormalizedUnit, SemanticVersion};

/// Session variable holding the provider search path.
pub const SEARCH_PATH_VARIABLE: &str = "ProviderPath";

/// Separator between search-path entries.
pub const SEARCH_PATH_SEPARATOR: char = ';';

/// Minimum supported host runtime version.
const MIN_RUNTIME_VERSION: &str = "3.0";

/// Name of the provider-discovery tooling module the environment needs.
const DISCOVERY_TOOLING: &str = "ResourceDiscovery";

/// Minimum acceptable discovery-tooling version.
const MIN_TOOLING_VERSION: &str = "2.2";

static QUARANTINE_NONCE: AtomicU64 = AtomicU64::new(0);

/// Whether installed packages must pass signature verification before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationPolicy {
    /// Skip verification. The quarantine step remains an extension point.
    #[default]
    Off,
    /// Stage the package and require a valid signature on every file.
    Require,
}

/// A resolved, installed resource provider plus its provenance.
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// The installed descriptor.
    pub descriptor: ResourceDescriptor,
    /// Distinct signer certificates collected during verification; empty
    /// when verification is off or the package is locally present.
    pub certificates: Vec<Certificate>,
}

/// A processing session's view of the host: one runtime, one repository, one
/// install location. Owned by a single session; never shared across origins.
pub struct Environment {
    runtime: Box<dyn HostRuntime>,
    repository: Box<dyn ProviderRepository>,
    location: InstallLocation,
    verification: VerificationPolicy,
}

impl Environment {
    /// Create an environment over a runtime and repository.
    pub fn new(runtime: Box<dyn HostRuntime>, repository: Box<dyn ProviderRepository>) -> Self {
        Self {
            runtime,
            repository,
            location: InstallLocation::default(),
            verification: VerificationPolicy::default(),
        }
    }

    /// Choose where installed modules land.
    pub fn with_location(mut self, location: InstallLocation) -> Self {
        self.location = location;
        self
    }

    /// Choose the signature verification policy.
    pub fn with_verification(mut self, verification: VerificationPolicy) -> Self {
        self.verification = verification;
        self
    }

    /// The host runtime.
    pub fn runtime(&self) -> &dyn HostRuntime {
        self.runtime.as_ref()
    }

    // =========================================================================
    // Runtime validation
    // =========================================================================

    /// Validate the host runtime and make sure the discovery tooling is
    /// usable. Fails fast; none of these conditions are retryable.
    pub fn validate(&self) -> Result<()> {
        let info = self.runtime.info();
        if info.edition != RuntimeEdition::Core {
            return Err(Error::UnsupportedRuntime {
                reason: format!("requires the core edition, found {}", info.edition),
            });
        }

        let min_version: SemanticVersion = parse_static(MIN_RUNTIME_VERSION);
        if info.version < min_version {
            return Err(Error::UnsupportedRuntime {
                reason: format!(
                    "requires runtime {MIN_RUNTIME_VERSION} or later, found {}",
                    info.version
                ),
            });
        }

        let min_tooling: SemanticVersion = parse_static(MIN_TOOLING_VERSION);
        match self.runtime.tooling_version() {
            Some(version) if version >= min_tooling => {
                debug!("discovery tooling {version} present");
                Ok(())
            }
            found => {
                info!(
                    "discovery tooling {} - installing {DISCOVERY_TOOLING} {MIN_TOOLING_VERSION}",
                    found.map_or_else(|| "missing".to_string(), |v| format!("{v} is too old"))
                );
                self.install_tooling(min_tooling)
            }
        }
    }

    fn install_tooling(&self, min_version: SemanticVersion) -> Result<()> {
        let query = ResourceQuery {
            module: Some(ModuleConstraint {
                min_version: Some(min_version),
                ..ModuleConstraint::named(DISCOVERY_TOOLING)
            }),
            ..ResourceQuery::named(DISCOVERY_TOOLING)
        };
        match self.repository.find(&query)? {
            Some(descriptor) => self.repository.install(&descriptor),
            None => Err(Error::UnsupportedRuntime {
                reason: format!(
                    "discovery tooling {DISCOVERY_TOOLING} >= {MIN_TOOLING_VERSION} is unavailable"
                ),
            }),
        }
    }

    // =========================================================================
    // Provider search path
    // =========================================================================

    /// Current search-path entries, in order.
    pub fn search_path(&self) -> Vec<String> {
        self.runtime
            .variable(SEARCH_PATH_VARIABLE)
            .unwrap_or_default()
            .split(SEARCH_PATH_SEPARATOR)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Replace the search path wholesale.
    pub fn set_search_path(&self, entries: &[String]) {
        let joined = entries.join(&SEARCH_PATH_SEPARATOR.to_string());
        self.runtime.set_variable(SEARCH_PATH_VARIABLE, &joined);
    }

    /// Put an entry at the front of the search path. Idempotent: an entry
    /// already present anywhere is left where it is.
    pub fn prepend_search_path(&self, entry: &str) {
        let current = self.search_path();
        if current.iter().any(|e| e == entry) {
            return;
        }
        let mut updated = vec![entry.to_string()];
        updated.extend(current);
        self.set_search_path(&updated);
    }

    /// Put an entry at the back of the search path. Idempotent.
    pub fn append_search_path(&self, entry: &str) {
        let mut current = self.search_path();
        if current.iter().any(|e| e == entry) {
            return;
        }
        current.push(entry.to_string());
        self.set_search_path(&current);
    }

    /// Remove every occurrence of an entry from the search path.
    pub fn cleanup_search_path(&self, entry: &str) {
        let remaining: Vec<String> = self
            .search_path()
            .into_iter()
            .filter(|e| e != entry)
            .collect();
        self.set_search_path(&remaining);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Index over the locally installed descriptors, filtered down to those
    /// a constraint accepts.
    fn local_index(&self, constraint: Option<&ModuleConstraint>) -> Result<ResourceIndex> {
        let descriptors = self
            .runtime
            .resources()?
            .into_iter()
            .filter(|d| match constraint {
                Some(c) => {
                    d.module
                        .as_deref()
                        .is_some_and(|m| m.eq_ignore_ascii_case(&c.name))
                        && c.accepts(d.version.as_ref())
                }
                None => true,
            })
            .collect();
        ResourceIndex::build(descriptors)
    }

    /// Resolve a resource against what is installed locally.
    ///
    /// An unconstrained lookup that matches the resource in more than one
    /// module is inherently ambiguous and errors rather than guessing.
    pub fn find_local(
        &self,
        resource: &str,
        constraint: Option<&ModuleConstraint>,
    ) -> Result<Option<ResourceDescriptor>> {
        let index = self.local_index(constraint)?;
        match constraint {
            Some(constraint) => Ok(index
                .resolve(resource, Some(&constraint.name), constraint.version.as_ref())
                .cloned()),
            None => {
                let matches = index.resolve_all(resource);
                match matches.len() {
                    0 => Ok(None),
                    1 => Ok(Some(matches[0].clone())),
                    count => Err(Error::AmbiguousMatch {
                        resource: resource.to_string(),
                        count,
                    }),
                }
            }
        }
    }

    /// All locally installed resources of one module.
    pub fn resources_in_module(
        &self,
        constraint: &ModuleConstraint,
    ) -> Result<Vec<ResourceDescriptor>> {
        let matching: Vec<ResourceDescriptor> = self
            .runtime
            .resources()?
            .into_iter()
            .filter(|d| {
                d.module
                    .as_deref()
                    .is_some_and(|m| m.eq_ignore_ascii_case(&constraint.name))
                    && constraint.accepts(d.version.as_ref())
            })
            .collect();
        if matching.is_empty() {
            return Err(Error::ModuleNotFound {
                module: constraint.name.clone(),
            });
        }
        Ok(matching)
    }

    /// Make the resource a unit names available locally, installing it from
    /// the repository when needed.
    pub fn ensure_resource(&self, unit: &NormalizedUnit) -> Result<ResolvedResource> {
        let resource = unit.resource_name();
        let constraint = unit.module_constraint()?;

        if let Some(descriptor) = self.find_local(resource, constraint.as_ref())? {
            debug!("{} already installed", descriptor.qualified_name());
            return Ok(ResolvedResource {
                descriptor,
                certificates: Vec::new(),
            });
        }

        let query = ResourceQuery::from_unit(unit)?;
        let Some(found) = self.repository.find(&query)? else {
            // Terminal: the repository has nothing to offer, there is no
            // retry path.
            return Err(Error::ResourceNotFound {
                resource: resource.to_string(),
                module: constraint.map(|c| c.name),
            });
        };

        let certificates = match self.verification {
            VerificationPolicy::Off => Vec::new(),
            VerificationPolicy::Require => self.verify_package(&found)?,
        };

        info!("installing {}", found.qualified_name());
        self.install(&found)?;

        match self.find_local(resource, unit.module_constraint()?.as_ref())? {
            Some(descriptor) => Ok(ResolvedResource {
                descriptor,
                certificates,
            }),
            None => Err(Error::InstallFailed {
                resource: resource.to_string(),
            }),
        }
    }

    fn install(&self, descriptor: &ResourceDescriptor) -> Result<()> {
        match &self.location {
            InstallLocation::Custom(location) => {
                self.repository.save(descriptor, location)?;
                self.prepend_search_path(&location.to_string_lossy());
                Ok(())
            }
            InstallLocation::CurrentUser | InstallLocation::AllUsers => {
                self.repository.install(descriptor)
            }
        }
    }

    // =========================================================================
    // Trust
    // =========================================================================

    /// Stage the package in a quarantine directory and verify every file's
    /// signature. Returns the distinct signer certificates, deduplicated by
    /// thumbprint, for provenance reporting.
    pub fn verify_package(&self, descriptor: &ResourceDescriptor) -> Result<Vec<Certificate>> {
        let stage = quarantine_dir(descriptor);
        fs::create_dir_all(&stage).map_err(|e| Error::io(&stage, e))?;

        let outcome = self.verify_staged(descriptor, &stage);

        if let Err(e) = fs::remove_dir_all(&stage) {
            warn!("could not clean quarantine {}: {e}", stage.display());
        }
        outcome
    }

    fn verify_staged(
        &self,
        descriptor: &ResourceDescriptor,
        stage: &std::path::Path,
    ) -> Result<Vec<Certificate>> {
        self.repository.save(descriptor, stage)?;

        let mut seen = HashSet::new();
        let mut certificates = Vec::new();
        for signature in self.runtime.signatures(stage)? {
            if signature.status != SignatureStatus::Valid {
                return Err(Error::UntrustedSignature {
                    path: signature.path,
                    status: signature.status,
                });
            }
            if let Some(signer) = signature.signer
                && seen.insert(signer.thumbprint.clone())
            {
                certificates.push(signer);
            }
        }
        Ok(certificates)
    }
}

fn quarantine_dir(descriptor: &ResourceDescriptor) -> PathBuf {
    let nonce = QUARANTINE_NONCE.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "attune-quarantine-{}-{}-{nonce}",
        std::process::id(),
        descriptor.resource.to_lowercase()
    ))
}

fn parse_static(text: &str) -> SemanticVersion {
    text.parse().expect("static version literal")
}
