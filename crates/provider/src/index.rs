//! The versioned resource index.

use crate::error::{Error, Result};
use crate::types::ResourceDescriptor;
use unitkit::SemanticVersion;

/// A two-level lookup table over resource descriptors:
/// module name → resource name → version → descriptor.
///
/// Built once per processing session from a flat descriptor list. Buckets are
/// plain vectors in insertion order, so the "first match wins" rule for
/// module-unconstrained lookups is deterministic by construction
/// (first-inserted module wins), not an artifact of hash iteration order.
///
/// Names are matched case-insensitively. Descriptors with no module name live
/// in an empty-string bucket; descriptors with no version live under an empty
/// version slot that only a version-less lookup can return.
#[derive(Debug, Default)]
pub struct ResourceIndex {
    modules: Vec<ModuleBucket>,
}

#[derive(Debug)]
struct ModuleBucket {
    /// Case-folded module name; empty for module-less descriptors.
    key: String,
    resources: Vec<ResourceBucket>,
}

#[derive(Debug)]
struct ResourceBucket {
    /// Case-folded resource name.
    key: String,
    descriptors: Vec<ResourceDescriptor>,
}

impl ResourceIndex {
    /// Build the index from a flat descriptor list.
    ///
    /// Two descriptors with the same module, resource and version are a
    /// contract violation on the caller's side and fail the build.
    pub fn build(descriptors: Vec<ResourceDescriptor>) -> Result<Self> {
        let mut index = Self::default();
        for descriptor in descriptors {
            index.insert(descriptor)?;
        }
        Ok(index)
    }

    fn insert(&mut self, descriptor: ResourceDescriptor) -> Result<()> {
        let module_key = descriptor
            .module
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let resource_key = descriptor.resource.to_lowercase();

        let module_at = match self.modules.iter().position(|m| m.key == module_key) {
            Some(at) => at,
            None => {
                self.modules.push(ModuleBucket {
                    key: module_key,
                    resources: Vec::new(),
                });
                self.modules.len() - 1
            }
        };
        let module = &mut self.modules[module_at];

        let resource_at = match module.resources.iter().position(|r| r.key == resource_key) {
            Some(at) => at,
            None => {
                module.resources.push(ResourceBucket {
                    key: resource_key,
                    descriptors: Vec::new(),
                });
                module.resources.len() - 1
            }
        };
        let bucket = &mut module.resources[resource_at];

        let collides = bucket
            .descriptors
            .iter()
            .any(|existing| same_version(existing.version.as_ref(), descriptor.version.as_ref()));
        if collides {
            return Err(Error::DuplicateDescriptor {
                descriptor: descriptor.qualified_name(),
            });
        }

        bucket.descriptors.push(descriptor);
        Ok(())
    }

    /// Number of descriptors in the index.
    pub fn len(&self) -> usize {
        self.modules
            .iter()
            .flat_map(|m| &m.resources)
            .map(|r| r.descriptors.len())
            .sum()
    }

    /// Whether the index holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a descriptor.
    ///
    /// With no module, module buckets are scanned in insertion order and the
    /// first resource match wins; callers that need a specific provider must
    /// supply the module name. With no version, the numerically-greatest
    /// version in the bucket is returned, falling back to an unversioned
    /// entry only when no versioned one exists. An explicit version matches
    /// exactly or not at all.
    pub fn resolve(
        &self,
        resource: &str,
        module: Option<&str>,
        version: Option<&SemanticVersion>,
    ) -> Option<&ResourceDescriptor> {
        let resource_key = resource.to_lowercase();

        match module {
            Some(module) => {
                let module_key = module.to_lowercase();
                let bucket = self
                    .modules
                    .iter()
                    .find(|m| m.key == module_key)?
                    .resources
                    .iter()
                    .find(|r| r.key == resource_key)?;
                pick_version(bucket, version)
            }
            None => self.modules.iter().find_map(|m| {
                let bucket = m.resources.iter().find(|r| r.key == resource_key)?;
                pick_version(bucket, version)
            }),
        }
    }

    /// All module buckets holding the resource, best version per bucket,
    /// in insertion order. Used to detect ambiguity of unconstrained lookups.
    pub fn resolve_all(&self, resource: &str) -> Vec<&ResourceDescriptor> {
        let resource_key = resource.to_lowercase();
        self.modules
            .iter()
            .filter_map(|m| {
                let bucket = m.resources.iter().find(|r| r.key == resource_key)?;
                pick_version(bucket, None)
            })
            .collect()
    }

    /// Whether a descriptor resolves.
    pub fn exists(
        &self,
        resource: &str,
        module: Option<&str>,
        version: Option<&SemanticVersion>,
    ) -> bool {
        self.resolve(resource, module, version).is_some()
    }
}

fn same_version(a: Option<&SemanticVersion>, b: Option<&SemanticVersion>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn pick_version<'a>(
    bucket: &'a ResourceBucket,
    version: Option<&SemanticVersion>,
) -> Option<&'a ResourceDescriptor> {
    match version {
        // Explicit version: exact match only; the unversioned slot never
        // satisfies an explicit request.
        Some(version) => bucket
            .descriptors
            .iter()
            .find(|d| d.version.as_ref() == Some(version)),
        None => bucket
            .descriptors
            .iter()
            .filter(|d| d.version.is_some())
            .max_by(|a, b| a.version.cmp(&b.version))
            .or_else(|| bucket.descriptors.iter().find(|d| d.version.is_none())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> SemanticVersion {
        text.parse().unwrap()
    }

    fn sample_index() -> ResourceIndex {
        ResourceIndex::build(vec![
            ResourceDescriptor::new("MyDsc", "Registry", v("1.0")),
            ResourceDescriptor::new("MyDsc", "Registry", v("1.2")),
            ResourceDescriptor::new("MyDsc", "Registry", v("2.0")),
            ResourceDescriptor::new("OtherDsc", "Registry", v("9.0")),
            ResourceDescriptor::new("MyDsc", "Service", v("1.2")),
            ResourceDescriptor::system("Environment"),
        ])
        .unwrap()
    }

    #[test]
    fn no_version_returns_greatest() {
        let index = sample_index();
        let found = index.resolve("Registry", Some("MyDsc"), None).unwrap();
        assert_eq!(found.version, Some(v("2.0")));
    }

    #[test]
    fn explicit_version_is_exact() {
        let index = sample_index();
        let found = index
            .resolve("Registry", Some("MyDsc"), Some(&v("1.2")))
            .unwrap();
        assert_eq!(found.version, Some(v("1.2")));

        assert!(index
            .resolve("Registry", Some("MyDsc"), Some(&v("9.9")))
            .is_none());
    }

    #[test]
    fn unconstrained_lookup_takes_first_inserted_module() {
        let index = sample_index();
        let found = index.resolve("Registry", None, None).unwrap();
        assert_eq!(found.module.as_deref(), Some("MyDsc"));
    }

    #[test]
    fn lookups_fold_case() {
        let index = sample_index();
        assert!(index.exists("registry", Some("mydsc"), None));
        assert!(index.exists("REGISTRY", Some("MYDSC"), Some(&v("1.2"))));
    }

    #[test]
    fn unversioned_descriptor_only_matches_versionless_lookup() {
        let index = sample_index();
        assert!(index.exists("Environment", None, None));
        assert!(!index.exists("Environment", None, Some(&v("1.0"))));
    }

    #[test]
    fn versioned_entries_outrank_the_unversioned_slot() {
        let index = ResourceIndex::build(vec![
            ResourceDescriptor {
                module: Some("Mixed".to_string()),
                resource: "Thing".to_string(),
                version: None,
                properties: Vec::new(),
            },
            ResourceDescriptor::new("Mixed", "Thing", v("0.5")),
        ])
        .unwrap();

        let found = index.resolve("Thing", Some("Mixed"), None).unwrap();
        assert_eq!(found.version, Some(v("0.5")));
    }

    #[test]
    fn duplicate_descriptor_fails_build() {
        let result = ResourceIndex::build(vec![
            ResourceDescriptor::new("MyDsc", "Registry", v("1.0")),
            ResourceDescriptor::new("mydsc", "registry", v("1.0")),
        ]);
        assert!(matches!(
            result.unwrap_err(),
            Error::DuplicateDescriptor { .. }
        ));
    }

    #[test]
    fn resolve_all_reports_every_module() {
        let index = sample_index();
        let matches = index.resolve_all("Registry");
        assert_eq!(matches.len(), 2);
        // Insertion order.
        assert_eq!(matches[0].module.as_deref(), Some("MyDsc"));
        assert_eq!(matches[1].module.as_deref(), Some("OtherDsc"));
    }
}
