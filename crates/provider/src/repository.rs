//! The provider repository collaborator.
//!
//! Discovery and installation of resource providers is delegated to an
//! external repository. This module defines the trait boundary and an
//! in-memory [`MockRepository`] for tests:
//!
//! ```
//! use provider::repository::{MockRepository, ProviderRepository};
//! use provider::types::{ResourceDescriptor, ResourceQuery};
//!
//! let repo = MockRepository::new();
//! repo.add(ResourceDescriptor::new("MyDsc", "Registry", "1.0".parse().unwrap()));
//!
//! let found = repo.find(&ResourceQuery::named("Registry")).unwrap();
//! assert!(found.is_some());
//! ```

use crate::error::Result;
use crate::types::{ResourceDescriptor, ResourceQuery};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use unitkit::SemanticVersion;

/// External repository of installable resource providers.
///
/// Treated as a black box: it either produces a descriptor or it does not,
/// and installation either succeeds or errors. No retry logic lives here.
pub trait ProviderRepository: Send + Sync {
    /// Find the best descriptor matching a query, or `None` when the
    /// repository has no match.
    fn find(&self, query: &ResourceQuery) -> Result<Option<ResourceDescriptor>>;

    /// Install a previously found descriptor into the host.
    fn install(&self, descriptor: &ResourceDescriptor) -> Result<()>;

    /// Stage a package's files under `location` without installing it.
    fn save(&self, descriptor: &ResourceDescriptor, location: &Path) -> Result<()>;
}

/// In-memory repository for tests.
///
/// Stores descriptors and records install/save calls so tests can assert on
/// them. `deliver_to` wires installs into a shared descriptor store, letting
/// a mock host runtime "see" what was installed.
#[derive(Debug, Clone, Default)]
pub struct MockRepository {
    descriptors: Arc<Mutex<Vec<ResourceDescriptor>>>,
    installed: Arc<Mutex<Vec<ResourceDescriptor>>>,
    saved: Arc<Mutex<Vec<(ResourceDescriptor, PathBuf)>>>,
    deliver_to: Arc<Mutex<Option<Arc<Mutex<Vec<ResourceDescriptor>>>>>>,
}

impl MockRepository {
    /// Create an empty mock repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a findable descriptor.
    pub fn add(&self, descriptor: ResourceDescriptor) {
        lock(&self.descriptors).push(descriptor);
    }

    /// Route installed descriptors into a shared store (typically a mock
    /// runtime's installed-resource list).
    pub fn deliver_to(&self, store: Arc<Mutex<Vec<ResourceDescriptor>>>) {
        *lock(&self.deliver_to) = Some(store);
    }

    /// Descriptors installed so far.
    pub fn installed(&self) -> Vec<ResourceDescriptor> {
        lock(&self.installed).clone()
    }

    /// Save calls recorded so far.
    pub fn saved(&self) -> Vec<(ResourceDescriptor, PathBuf)> {
        lock(&self.saved).clone()
    }
}

impl ProviderRepository for MockRepository {
    fn find(&self, query: &ResourceQuery) -> Result<Option<ResourceDescriptor>> {
        let descriptors = lock(&self.descriptors);
        let best = descriptors
            .iter()
            .filter(|d| d.resource.eq_ignore_ascii_case(&query.resource))
            .filter(|d| match &query.module {
                Some(constraint) => {
                    d.module
                        .as_deref()
                        .is_some_and(|m| m.eq_ignore_ascii_case(&constraint.name))
                        && constraint.accepts(d.version.as_ref())
                }
                None => true,
            })
            .filter(|d| {
                query.allow_prerelease
                    || !d.version.as_ref().is_some_and(SemanticVersion::is_prerelease)
            })
            .max_by(|a, b| a.version.cmp(&b.version));
        Ok(best.cloned())
    }

    fn install(&self, descriptor: &ResourceDescriptor) -> Result<()> {
        lock(&self.installed).push(descriptor.clone());
        if let Some(store) = lock(&self.deliver_to).as_ref() {
            lock(store).push(descriptor.clone());
        }
        Ok(())
    }

    fn save(&self, descriptor: &ResourceDescriptor, location: &Path) -> Result<()> {
        lock(&self.saved).push((descriptor.clone(), location.to_path_buf()));
        // A staged module is visible to the runtime once its location is on
        // the search path; the mock shortcuts that by delivering directly.
        if let Some(store) = lock(&self.deliver_to).as_ref() {
            lock(store).push(descriptor.clone());
        }
        Ok(())
    }
}

// Mutex poisoning only happens after a panic in another test thread; recover
// with the inner value rather than cascading the panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitkit::ModuleConstraint;

    fn v(text: &str) -> SemanticVersion {
        text.parse().unwrap()
    }

    #[test]
    fn find_returns_greatest_matching_version() {
        let repo = MockRepository::new();
        repo.add(ResourceDescriptor::new("MyDsc", "Registry", v("1.0")));
        repo.add(ResourceDescriptor::new("MyDsc", "Registry", v("1.4")));

        let found = repo.find(&ResourceQuery::named("Registry")).unwrap().unwrap();
        assert_eq!(found.version, Some(v("1.4")));
    }

    #[test]
    fn find_honors_module_constraint() {
        let repo = MockRepository::new();
        repo.add(ResourceDescriptor::new("MyDsc", "Registry", v("1.0")));
        repo.add(ResourceDescriptor::new("OtherDsc", "Registry", v("3.0")));

        let query = ResourceQuery {
            module: Some(ModuleConstraint::exact("MyDsc", v("1.0"))),
            ..ResourceQuery::named("Registry")
        };
        let found = repo.find(&query).unwrap().unwrap();
        assert_eq!(found.module.as_deref(), Some("MyDsc"));
    }

    #[test]
    fn find_skips_prerelease_unless_allowed() {
        let repo = MockRepository::new();
        repo.add(ResourceDescriptor::new("MyDsc", "Registry", v("2.0.0-beta")));
        repo.add(ResourceDescriptor::new("MyDsc", "Registry", v("1.0")));

        let found = repo.find(&ResourceQuery::named("Registry")).unwrap().unwrap();
        assert_eq!(found.version, Some(v("1.0")));

        let query = ResourceQuery {
            allow_prerelease: true,
            ..ResourceQuery::named("Registry")
        };
        let found = repo.find(&query).unwrap().unwrap();
        assert_eq!(found.version, Some(v("2.0.0-beta")));
    }

    #[test]
    fn find_returns_none_for_unknown_resource() {
        let repo = MockRepository::new();
        assert!(repo.find(&ResourceQuery::named("Nope")).unwrap().is_none());
    }

    #[test]
    fn install_delivers_to_wired_store() {
        let repo = MockRepository::new();
        let store = Arc::new(Mutex::new(Vec::new()));
        repo.deliver_to(Arc::clone(&store));

        let descriptor = ResourceDescriptor::new("MyDsc", "Registry", v("1.0"));
        repo.install(&descriptor).unwrap();

        assert_eq!(repo.installed().len(), 1);
        assert_eq!(store.lock().unwrap().len(), 1);
    }
}
