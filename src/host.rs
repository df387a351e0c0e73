//! In-process host: the built-in runtime, an offline repository, and the
//! bundled resource providers the binary ships with.

use log::debug;
use processor::{InvokeError, ResourceProvider};
use provider::{
    Error as ProviderError, HostRuntime, PropertyInfo, PropertyType, ProviderRepository,
    ResourceDescriptor, ResourceQuery, RuntimeEdition, RuntimeInfo, Signature, SignatureStatus,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use unitkit::{ModuleConstraint, Value, ValueMap};

/// Module name the bundled providers live under.
pub const BUILTIN_MODULE: &str = "corefs";

/// Version reported for the bundled providers.
const BUILTIN_VERSION: &str = "1.0";

/// Runtime version the in-process host reports.
const RUNTIME_VERSION: &str = "3.2";

/// Discovery tooling version bundled with the in-process host.
const TOOLING_VERSION: &str = "2.2.0";

/// The in-process host runtime: session variables live in memory, and the
/// installed resources are the bundled providers.
pub struct LocalRuntime {
    variables: Mutex<BTreeMap<String, String>>,
}

impl LocalRuntime {
    /// Create the runtime. The provider search path starts at the user's
    /// provider directory.
    pub fn new() -> Self {
        let mut variables = BTreeMap::new();
        if let Some(home) = dirs::home_dir() {
            let default_path = home.join(".attune").join("providers");
            variables.insert(
                provider::SEARCH_PATH_VARIABLE.to_string(),
                default_path.display().to_string(),
            );
        }
        Self {
            variables: Mutex::new(variables),
        }
    }
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for LocalRuntime {
    fn info(&self) -> RuntimeInfo {
        RuntimeInfo {
            edition: RuntimeEdition::Core,
            version: RUNTIME_VERSION.parse().expect("static version literal"),
        }
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.variables
            .lock()
            .map(|vars| vars.get(name).cloned())
            .unwrap_or(None)
    }

    fn set_variable(&self, name: &str, value: &str) {
        if let Ok(mut vars) = self.variables.lock() {
            vars.insert(name.to_string(), value.to_string());
        }
    }

    fn tooling_version(&self) -> Option<unitkit::SemanticVersion> {
        TOOLING_VERSION.parse().ok()
    }

    fn resources(&self) -> provider::Result<Vec<ResourceDescriptor>> {
        let version = BUILTIN_VERSION
            .parse()
            .expect("static version literal");
        Ok(vec![
            ResourceDescriptor::new(BUILTIN_MODULE, "file", version).with_properties(vec![
                PropertyInfo::new("path", true, PropertyType::String),
                PropertyInfo::new("content", false, PropertyType::String),
                PropertyInfo::new("ensure", false, PropertyType::String),
            ]),
        ])
    }

    fn signatures(&self, root: &Path) -> provider::Result<Vec<Signature>> {
        // The in-process host has no signature inspection; everything staged
        // reports as unsigned, so a Require policy correctly refuses it.
        let mut signatures = Vec::new();
        for entry in walk_files(root)? {
            signatures.push(Signature {
                path: entry,
                status: SignatureStatus::NotSigned,
                signer: None,
            });
        }
        Ok(signatures)
    }
}

fn walk_files(root: &Path) -> provider::Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    let entries = fs::read_dir(root).map_err(|e| ProviderError::io(root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ProviderError::io(root, e))?;
        let path = entry.path();
        if path.is_dir() {
            files.extend(walk_files(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

/// Repository stub for offline operation: nothing can be found or installed,
/// so anything not bundled resolves to a terminal not-found.
pub struct OfflineRepository;

impl ProviderRepository for OfflineRepository {
    fn find(&self, query: &ResourceQuery) -> provider::Result<Option<ResourceDescriptor>> {
        debug!("offline repository: no match for '{}'", query.resource);
        Ok(None)
    }

    fn install(&self, descriptor: &ResourceDescriptor) -> provider::Result<()> {
        Err(ProviderError::Repository {
            message: format!(
                "no provider repository is configured, cannot install {descriptor}"
            ),
        })
    }

    fn save(&self, descriptor: &ResourceDescriptor, _location: &Path) -> provider::Result<()> {
        Err(ProviderError::Repository {
            message: format!("no provider repository is configured, cannot stage {descriptor}"),
        })
    }
}

/// The bundled resource providers, dispatched by resource name.
pub struct BuiltinProvider;

impl BuiltinProvider {
    /// Create the provider set.
    pub fn new() -> Self {
        Self
    }
}

impl Default for BuiltinProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProvider for BuiltinProvider {
    fn invoke_get(
        &self,
        settings: &ValueMap,
        resource: &str,
        _module: Option<&ModuleConstraint>,
    ) -> Result<ValueMap, InvokeError> {
        match resource.to_lowercase().as_str() {
            "file" => file::get(settings),
            other => Err(unknown_resource(other)),
        }
    }

    fn invoke_test(
        &self,
        settings: &ValueMap,
        resource: &str,
        _module: Option<&ModuleConstraint>,
    ) -> Result<bool, InvokeError> {
        match resource.to_lowercase().as_str() {
            "file" => file::test(settings),
            other => Err(unknown_resource(other)),
        }
    }

    fn invoke_set(
        &self,
        settings: &ValueMap,
        resource: &str,
        _module: Option<&ModuleConstraint>,
    ) -> Result<bool, InvokeError> {
        match resource.to_lowercase().as_str() {
            "file" => file::set(settings),
            other => Err(unknown_resource(other)),
        }
    }
}

fn unknown_resource(resource: &str) -> InvokeError {
    InvokeError::internal(format!("no bundled provider for resource '{resource}'"))
}

/// The `file` resource: declare a path present with given content, or
/// absent.
mod file {
    use super::*;

    const CODE: &str = "file-io";

    struct FileSettings {
        path: PathBuf,
        content: Option<String>,
        present: bool,
    }

    fn parse(settings: &ValueMap) -> Result<FileSettings, InvokeError> {
        let path = settings
            .get_ignore_case("path")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                InvokeError::declared(CODE, "the 'path' setting is required", None)
            })?;

        let present = match settings.get_ignore_case("ensure").and_then(Value::as_str) {
            None => true,
            Some(text) if text.eq_ignore_ascii_case("present") => true,
            Some(text) if text.eq_ignore_ascii_case("absent") => false,
            Some(other) => {
                return Err(InvokeError::declared(
                    CODE,
                    format!("'ensure' must be present or absent, got '{other}'"),
                    None,
                ));
            }
        };

        Ok(FileSettings {
            path: PathBuf::from(shellexpand::tilde(path).into_owned()),
            content: settings
                .get_ignore_case("content")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            present,
        })
    }

    pub(super) fn get(settings: &ValueMap) -> Result<ValueMap, InvokeError> {
        let desired = parse(settings)?;
        let mut current = ValueMap::new();
        current.insert("path", desired.path.display().to_string());
        if desired.path.is_file() {
            current.insert("ensure", "present");
            let content = fs::read_to_string(&desired.path)
                .map_err(|e| io_error("read", &desired.path, &e))?;
            current.insert("content", content);
        } else {
            current.insert("ensure", "absent");
        }
        Ok(current)
    }

    pub(super) fn test(settings: &ValueMap) -> Result<bool, InvokeError> {
        let desired = parse(settings)?;
        if !desired.present {
            return Ok(!desired.path.exists());
        }
        if !desired.path.is_file() {
            return Ok(false);
        }
        match &desired.content {
            None => Ok(true),
            Some(content) => {
                let actual = fs::read_to_string(&desired.path)
                    .map_err(|e| io_error("read", &desired.path, &e))?;
                Ok(actual == *content)
            }
        }
    }

    pub(super) fn set(settings: &ValueMap) -> Result<bool, InvokeError> {
        let desired = parse(settings)?;
        if desired.present {
            if let Some(parent) = desired.path.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error("create", parent, &e))?;
            }
            fs::write(&desired.path, desired.content.as_deref().unwrap_or(""))
                .map_err(|e| io_error("write", &desired.path, &e))?;
        } else if desired.path.exists() {
            fs::remove_file(&desired.path).map_err(|e| io_error("remove", &desired.path, &e))?;
        }
        // File changes never need a reboot.
        Ok(false)
    }

    fn io_error(what: &str, path: &Path, error: &std::io::Error) -> InvokeError {
        InvokeError::declared(
            CODE,
            format!("could not {what} {}", path.display()),
            Some(error.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_settings(path: &Path, content: Option<&str>, ensure: Option<&str>) -> ValueMap {
        let mut settings = ValueMap::new();
        settings.insert("path", path.display().to_string());
        if let Some(content) = content {
            settings.insert("content", content);
        }
        if let Some(ensure) = ensure {
            settings.insert("ensure", ensure);
        }
        settings
    }

    #[test]
    fn file_set_then_test_then_get() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("hello.txt");
        let provider = BuiltinProvider::new();
        let settings = file_settings(&target, Some("hi"), None);

        assert!(!provider.invoke_test(&settings, "file", None).unwrap());
        let reboot = provider.invoke_set(&settings, "file", None).unwrap();
        assert!(!reboot);
        assert!(provider.invoke_test(&settings, "file", None).unwrap());

        let current = provider.invoke_get(&settings, "file", None).unwrap();
        assert_eq!(
            current.get("content"),
            Some(&Value::String("hi".to_string()))
        );
        assert_eq!(
            current.get("ensure"),
            Some(&Value::String("present".to_string()))
        );
    }

    #[test]
    fn file_absent_removes() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("remove-me.txt");
        fs::write(&target, "x").unwrap();

        let provider = BuiltinProvider::new();
        let settings = file_settings(&target, None, Some("absent"));
        assert!(!provider.invoke_test(&settings, "file", None).unwrap());
        provider.invoke_set(&settings, "file", None).unwrap();
        assert!(!target.exists());
        assert!(provider.invoke_test(&settings, "file", None).unwrap());
    }

    #[test]
    fn missing_path_setting_is_a_declared_error() {
        let provider = BuiltinProvider::new();
        let err = provider
            .invoke_test(&ValueMap::new(), "file", None)
            .unwrap_err();
        assert!(err.declared);
        assert_eq!(err.code.as_deref(), Some("file-io"));
    }

    #[test]
    fn unknown_resource_is_internal() {
        let provider = BuiltinProvider::new();
        let err = provider
            .invoke_get(&ValueMap::new(), "nonsense", None)
            .unwrap_err();
        assert!(!err.declared);
    }

    #[test]
    fn local_runtime_passes_environment_validation() {
        let environment = provider::Environment::new(
            Box::new(LocalRuntime::new()),
            Box::new(OfflineRepository),
        );
        environment.validate().unwrap();
    }

    #[test]
    fn bundled_file_resource_resolves() {
        let environment = provider::Environment::new(
            Box::new(LocalRuntime::new()),
            Box::new(OfflineRepository),
        );
        let found = environment.find_local("file", None).unwrap();
        assert_eq!(found.unwrap().module.as_deref(), Some(BUILTIN_MODULE));
    }
}
