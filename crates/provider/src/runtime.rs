//! The host automation runtime collaborator.

use crate::error::Result;
use crate::types::{
    ResourceDescriptor, RuntimeEdition, RuntimeInfo, Signature, SignatureStatus,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// The host automation runtime the engine runs providers inside.
///
/// Session variables (used for provider search-path manipulation) are scoped
/// to the runtime session; nothing here persists outside it.
pub trait HostRuntime: Send + Sync {
    /// Edition and version of the runtime.
    fn info(&self) -> RuntimeInfo;

    /// Read a session variable.
    fn variable(&self, name: &str) -> Option<String>;

    /// Set a session variable.
    fn set_variable(&self, name: &str, value: &str);

    /// Version of the provider-discovery tooling, when present.
    fn tooling_version(&self) -> Option<unitkit::SemanticVersion>;

    /// Enumerate the resource providers installed and visible to this
    /// session.
    fn resources(&self) -> Result<Vec<ResourceDescriptor>>;

    /// Inspect signatures of every file under `root` (a quarantine staging
    /// directory).
    fn signatures(&self, root: &Path) -> Result<Vec<Signature>>;
}

/// In-memory host runtime for tests.
///
/// The installed-resource store is shared as an `Arc` so a
/// [`MockRepository`](crate::repository::MockRepository) can deliver installs
/// into it.
#[derive(Debug)]
pub struct MockRuntime {
    info: RuntimeInfo,
    tooling: Mutex<Option<unitkit::SemanticVersion>>,
    variables: Mutex<BTreeMap<String, String>>,
    resources: Arc<Mutex<Vec<ResourceDescriptor>>>,
    signatures: Mutex<Vec<Signature>>,
}

impl MockRuntime {
    /// A supported core-edition runtime with current tooling.
    #[must_use]
    pub fn supported() -> Self {
        Self {
            info: RuntimeInfo {
                edition: RuntimeEdition::Core,
                version: "3.2".parse().expect("static version literal"),
            },
            tooling: Mutex::new("2.2.5".parse().ok()),
            variables: Mutex::new(BTreeMap::new()),
            resources: Arc::new(Mutex::new(Vec::new())),
            signatures: Mutex::new(Vec::new()),
        }
    }

    /// A legacy-edition runtime the environment must reject.
    #[must_use]
    pub fn legacy() -> Self {
        let mut runtime = Self::supported();
        runtime.info.edition = RuntimeEdition::Legacy;
        runtime
    }

    /// Remove the discovery tooling.
    pub fn without_tooling(self) -> Self {
        *lock(&self.tooling) = None;
        self
    }

    /// Pre-install a resource descriptor.
    pub fn add_resource(&self, descriptor: ResourceDescriptor) {
        lock(&self.resources).push(descriptor);
    }

    /// Handle to the installed-resource store, for wiring a mock repository.
    pub fn resource_store(&self) -> Arc<Mutex<Vec<ResourceDescriptor>>> {
        Arc::clone(&self.resources)
    }

    /// Queue signature results for the next staging inspection.
    pub fn set_signatures(&self, signatures: Vec<Signature>) {
        *lock(&self.signatures) = signatures;
    }
}

impl HostRuntime for MockRuntime {
    fn info(&self) -> RuntimeInfo {
        self.info.clone()
    }

    fn variable(&self, name: &str) -> Option<String> {
        lock(&self.variables).get(name).cloned()
    }

    fn set_variable(&self, name: &str, value: &str) {
        lock(&self.variables).insert(name.to_string(), value.to_string());
    }

    fn tooling_version(&self) -> Option<unitkit::SemanticVersion> {
        lock(&self.tooling).clone()
    }

    fn resources(&self) -> Result<Vec<ResourceDescriptor>> {
        Ok(lock(&self.resources).clone())
    }

    fn signatures(&self, root: &Path) -> Result<Vec<Signature>> {
        let configured = lock(&self.signatures);
        if configured.is_empty() {
            // Nothing configured: report every staged file as validly signed.
            return Ok(walk_files(root)?
                .into_iter()
                .map(|path| Signature {
                    path,
                    status: SignatureStatus::Valid,
                    signer: None,
                })
                .collect());
        }
        Ok(configured.clone())
    }
}

fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    use crate::error::Error;
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Io {
            path: root.to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_round_trip() {
        let runtime = MockRuntime::supported();
        assert!(runtime.variable("ProviderPath").is_none());
        runtime.set_variable("ProviderPath", "/a;/b");
        assert_eq!(runtime.variable("ProviderPath").as_deref(), Some("/a;/b"));
    }

    #[test]
    fn shared_store_sees_additions() {
        let runtime = MockRuntime::supported();
        let store = runtime.resource_store();
        store.lock().unwrap().push(ResourceDescriptor::system("Environment"));
        assert_eq!(runtime.resources().unwrap().len(), 1);
    }
}
