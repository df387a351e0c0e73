//! Set-level run coordination.

use crate::error::{Error, Result};
use crate::events::{DiagnosticLevel, DiagnosticsSink, NullSink, ProgressSink, ProgressUpdate};
use crate::invoke::{InvokeError, ResourceProvider};
use crate::results::{ApplyResult, GetResult, ResultInformation, ResultSource, TestOutcome, TestResult};
use crate::unit::UnitProcessor;
use chrono::{DateTime, Utc};
use provider::{Environment, ErrorCategory, ResourceDescriptor};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use unitkit::{ConfigurationUnit, Intent, NormalizedUnit};

/// Resolved details for one unit, without invoking its provider.
#[derive(Debug, Clone)]
pub struct UnitDetails {
    /// The unit.
    pub unit: ConfigurationUnit,
    /// The locally resolved descriptor, when one exists.
    pub descriptor: Option<ResourceDescriptor>,
}

/// Aggregate result of testing a whole set.
#[derive(Debug)]
pub struct SetTestResult {
    /// Per-unit results, in processing order.
    pub results: Vec<TestResult>,
    /// Worst per-unit outcome: any failure wins over any negative, which
    /// wins over all-positive.
    pub outcome: TestOutcome,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Aggregate result of applying a whole set.
#[derive(Debug)]
pub struct SetApplyResult {
    /// Per-unit results, in processing order.
    pub results: Vec<ApplyResult>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl SetApplyResult {
    /// Whether every unit succeeded.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.info.is_success())
    }

    /// Whether any unit asked for a reboot.
    pub fn reboot_required(&self) -> bool {
        self.results.iter().any(|r| r.reboot_required)
    }

    /// Number of failed units.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.info.is_success()).count()
    }
}

/// Aggregate result of reading a whole set.
#[derive(Debug)]
pub struct SetGetResult {
    /// Per-unit results, in processing order.
    pub results: Vec<GetResult>,
}

/// Drives one configuration set through the engine.
///
/// Owns the environment for the duration of the session. High-level
/// operations are mutually exclusive: the `can_process`/`done_processing`
/// pair is a non-reentrant flag, and a second concurrent operation fails
/// fast with [`Error::SetBusy`] instead of queueing.
pub struct SetRun {
    environment: Environment,
    provider: Arc<dyn ResourceProvider>,
    units: Vec<ConfigurationUnit>,
    base_path: Option<PathBuf>,
    limit_mode: bool,
    in_flight: AtomicBool,
    diagnostics: Arc<dyn DiagnosticsSink>,
    progress: Arc<dyn ProgressSink>,
}

impl SetRun {
    /// Create a run over an environment, a provider runtime and the set's
    /// units.
    pub fn new(
        environment: Environment,
        provider: Arc<dyn ResourceProvider>,
        units: Vec<ConfigurationUnit>,
    ) -> Self {
        Self {
            environment,
            provider,
            units,
            base_path: None,
            limit_mode: false,
            in_flight: AtomicBool::new(false),
            diagnostics: Arc::new(NullSink),
            progress: Arc::new(NullSink),
        }
    }

    /// Configuration root used for placeholder expansion; the directory the
    /// document was loaded from.
    pub fn with_base_path(mut self, base_path: Option<PathBuf>) -> Self {
        self.base_path = base_path;
        self
    }

    /// Restrict each unit's Test and Apply to a single invocation attempt.
    pub fn with_limit_mode(mut self, limit_mode: bool) -> Self {
        self.limit_mode = limit_mode;
        self
    }

    /// Subscribe a diagnostics sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Subscribe a progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// The units in this set.
    pub fn units(&self) -> &[ConfigurationUnit] {
        &self.units
    }

    /// Try to claim the set for one high-level operation. Returns `false`
    /// when another operation is in flight.
    pub fn can_process(&self) -> bool {
        !self.in_flight.swap(true, Ordering::AcqRel)
    }

    /// Release the set after a high-level operation.
    pub fn done_processing(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    fn begin(&self) -> Result<ProcessingGuard<'_>> {
        if self.can_process() {
            Ok(ProcessingGuard(self))
        } else {
            Err(Error::SetBusy)
        }
    }

    /// Resolve every unit's descriptor without invoking providers or
    /// installing anything.
    pub fn get_details(&self) -> Result<Vec<UnitDetails>> {
        let _guard = self.begin()?;
        let mut details = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let normalized = NormalizedUnit::new(unit.clone(), self.base_path.as_deref());
            self.verbose(format!(
                "Getting unit details for: {}",
                normalized.qualified_name()
            ));
            let descriptor = self
                .environment
                .find_local(normalized.resource_name(), normalized.module_constraint()?.as_ref())?;
            details.push(UnitDetails {
                unit: unit.clone(),
                descriptor,
            });
        }
        Ok(details)
    }

    /// Read current settings for every unit.
    pub fn get_all(&self) -> Result<SetGetResult> {
        let _guard = self.begin()?;
        let mut results = Vec::with_capacity(self.units.len());
        for (at, unit) in self.units.iter().enumerate() {
            self.report_progress(at, unit, false);
            let result = match self.create_unit_processor(unit) {
                Ok(mut processor) => match processor.get_settings() {
                    Ok(result) => result,
                    Err(error) => GetResult {
                        unit: unit.clone(),
                        info: unit_failure(&error),
                        settings: unitkit::ValueMap::new(),
                    },
                },
                Err(error) => GetResult {
                    unit: unit.clone(),
                    info: unit_failure(&error),
                    settings: unitkit::ValueMap::new(),
                },
            };
            results.push(result);
        }
        self.finish_progress();
        Ok(SetGetResult { results })
    }

    /// Test every unit that carries a testable intent. `Inform` units are
    /// skipped with a diagnostic.
    pub fn test_all(&self) -> Result<SetTestResult> {
        let _guard = self.begin()?;
        let started_at = Utc::now();

        let mut results = Vec::new();
        for (at, unit) in self.units.iter().enumerate() {
            self.report_progress(at, unit, false);
            if unit.intent == Intent::Inform {
                self.verbose(format!(
                    "Skipping test for inform unit: {}",
                    unit.display_id()
                ));
                continue;
            }

            let result = match self.create_unit_processor(unit) {
                Ok(mut processor) => match processor.test_settings() {
                    Ok(result) => result,
                    Err(error) => failed_test(unit, &error),
                },
                Err(error) => failed_test(unit, &error),
            };
            results.push(result);
        }
        self.finish_progress();

        let outcome = aggregate_outcome(&results);
        Ok(SetTestResult {
            results,
            outcome,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Apply the set: assert units are tested first, apply units are
    /// converged, inform units are skipped. One unit's failure is recorded
    /// and the run continues.
    pub fn apply_all(&self) -> Result<SetApplyResult> {
        let _guard = self.begin()?;
        let started_at = Utc::now();
        self.check_dependencies();

        let mut results = Vec::new();
        for (at, unit) in self.units.iter().enumerate() {
            self.report_progress(at, unit, false);
            match unit.intent {
                Intent::Inform => {
                    self.verbose(format!("Skipping inform unit: {}", unit.display_id()));
                }
                Intent::Assert => results.push(self.apply_assert(unit)),
                Intent::Apply => results.push(self.apply_unit(unit)),
            }
        }
        self.finish_progress();

        Ok(SetApplyResult {
            results,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn apply_assert(&self, unit: &ConfigurationUnit) -> ApplyResult {
        let tested = match self.create_unit_processor(unit) {
            Ok(mut processor) => match processor.test_settings() {
                Ok(result) => result,
                Err(error) => failed_test(unit, &error),
            },
            Err(error) => failed_test(unit, &error),
        };

        let info = match tested.outcome {
            TestOutcome::Positive => ResultInformation::success(),
            TestOutcome::Negative => ResultInformation::precondition(format!(
                "assert unit '{}' is not in the declared state",
                unit.display_id()
            )),
            TestOutcome::Failed => tested.info,
        };
        ApplyResult {
            unit: unit.clone(),
            info,
            reboot_required: false,
        }
    }

    fn apply_unit(&self, unit: &ConfigurationUnit) -> ApplyResult {
        match self.create_unit_processor(unit) {
            Ok(mut processor) => match processor.apply_settings() {
                Ok(result) => result,
                Err(error) => failed_apply(unit, &error),
            },
            Err(error) => failed_apply(unit, &error),
        }
    }

    /// Resolve the unit's provider (installing it when needed) and bind a
    /// processor to it.
    pub fn create_unit_processor(&self, unit: &ConfigurationUnit) -> Result<UnitProcessor> {
        let normalized = NormalizedUnit::new(unit.clone(), self.base_path.as_deref());
        self.verbose(format!(
            "Creating unit processor for: {}",
            normalized.qualified_name()
        ));

        let resolved = self.environment.ensure_resource(&normalized)?;
        self.verbose(format!(
            "Using provider: {}",
            resolved.descriptor.qualified_name()
        ));

        Ok(UnitProcessor::new(
            normalized,
            resolved.descriptor,
            Arc::clone(&self.provider),
            Arc::clone(&self.diagnostics),
            self.limit_mode,
        ))
    }

    /// Warn about dependencies that are missing or appear after their
    /// dependents; units run in authored order.
    fn check_dependencies(&self) {
        for (at, unit) in self.units.iter().enumerate() {
            for dependency in &unit.depends_on {
                let position = self
                    .units
                    .iter()
                    .position(|candidate| candidate.display_id() == dependency);
                match position {
                    None => self.diagnostics.diagnostic(
                        DiagnosticLevel::Warning,
                        &format!(
                            "unit '{}' depends on unknown unit '{dependency}'",
                            unit.display_id()
                        ),
                    ),
                    Some(there) if there > at => self.diagnostics.diagnostic(
                        DiagnosticLevel::Warning,
                        &format!(
                            "unit '{}' depends on '{dependency}' which is declared after it",
                            unit.display_id()
                        ),
                    ),
                    Some(_) => {}
                }
            }
        }
    }

    fn report_progress(&self, at: usize, unit: &ConfigurationUnit, completed: bool) {
        self.progress.progress(&ProgressUpdate {
            current: at,
            total: self.units.len(),
            message: unit.display_id().to_string(),
            completed,
        });
    }

    fn finish_progress(&self) {
        self.progress.progress(&ProgressUpdate {
            current: self.units.len(),
            total: self.units.len(),
            message: String::new(),
            completed: true,
        });
    }

    fn verbose(&self, message: String) {
        self.diagnostics
            .diagnostic(DiagnosticLevel::Verbose, &message);
    }
}

/// Releases the busy flag when a high-level operation ends, on every path.
struct ProcessingGuard<'a>(&'a SetRun);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.done_processing();
    }
}

/// Translate a synchronous processing error into result information so the
/// rest of the set can keep going.
fn unit_failure(error: &Error) -> ResultInformation {
    let source = match error {
        Error::Unit(_) | Error::UnsupportedOperation { .. } => ResultSource::Precondition,
        Error::Provider(provider_error) => match provider_error.category() {
            ErrorCategory::Precondition => ResultSource::Precondition,
            _ => ResultSource::Internal,
        },
        _ => ResultSource::Internal,
    };

    let translated = InvokeError::internal_from(error);
    ResultInformation {
        description: translated.description,
        details: translated.details,
        result_code: Some(error_token(error).to_string()),
        source,
    }
}

fn error_token(error: &Error) -> &'static str {
    match error {
        Error::UnsupportedOperation { .. } => "unsupported-operation",
        Error::AlreadyInvoked { .. } => "already-invoked",
        Error::SetBusy => "set-busy",
        Error::Unit(_) => "precondition-failed",
        Error::Provider(provider_error) => match provider_error.category() {
            ErrorCategory::Resolution => "resolution-failed",
            ErrorCategory::Precondition => "precondition-failed",
            ErrorCategory::Trust => "untrusted-signature",
            ErrorCategory::Installation => "install-failed",
            ErrorCategory::Io | ErrorCategory::Other => "internal-error",
        },
    }
}

fn failed_test(unit: &ConfigurationUnit, error: &Error) -> TestResult {
    TestResult {
        unit: unit.clone(),
        info: unit_failure(error),
        outcome: TestOutcome::Failed,
    }
}

fn failed_apply(unit: &ConfigurationUnit, error: &Error) -> ApplyResult {
    ApplyResult {
        unit: unit.clone(),
        info: unit_failure(error),
        reboot_required: false,
    }
}

fn aggregate_outcome(results: &[TestResult]) -> TestOutcome {
    if results.iter().any(|r| r.outcome == TestOutcome::Failed) {
        TestOutcome::Failed
    } else if results.iter().any(|r| r.outcome == TestOutcome::Negative) {
        TestOutcome::Negative
    } else {
        TestOutcome::Positive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::InvokeError;
    use provider::{MockRepository, MockRuntime};
    use std::sync::Mutex;
    use unitkit::{ModuleConstraint, ValueMap};

    /// Provider that answers by resource name.
    #[derive(Default)]
    struct TableProvider {
        test_answers: Vec<(String, bool)>,
        reboot_on_set: bool,
        applied: Mutex<Vec<String>>,
    }

    impl ResourceProvider for TableProvider {
        fn invoke_get(
            &self,
            _settings: &ValueMap,
            _resource: &str,
            _module: Option<&ModuleConstraint>,
        ) -> std::result::Result<ValueMap, InvokeError> {
            Ok(ValueMap::new())
        }

        fn invoke_test(
            &self,
            _settings: &ValueMap,
            resource: &str,
            _module: Option<&ModuleConstraint>,
        ) -> std::result::Result<bool, InvokeError> {
            self.test_answers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(resource))
                .map(|(_, answer)| *answer)
                .ok_or_else(|| InvokeError::internal(format!("no test answer for {resource}")))
        }

        fn invoke_set(
            &self,
            _settings: &ValueMap,
            resource: &str,
            _module: Option<&ModuleConstraint>,
        ) -> std::result::Result<bool, InvokeError> {
            self.applied.lock().unwrap().push(resource.to_string());
            Ok(self.reboot_on_set)
        }
    }

    fn unit(resource: &str, intent: Intent, module: &str) -> ConfigurationUnit {
        let mut unit = ConfigurationUnit::new(resource, intent);
        unit.directives.insert("module", module);
        unit
    }

    fn run_with(
        units: Vec<ConfigurationUnit>,
        provider: Arc<dyn ResourceProvider>,
    ) -> SetRun {
        let runtime = MockRuntime::supported();
        for name in ["Registry", "Service", "File"] {
            runtime.add_resource(provider::ResourceDescriptor::new(
                "MyDsc",
                name,
                "1.0".parse().unwrap(),
            ));
        }
        let environment =
            Environment::new(Box::new(runtime), Box::new(MockRepository::new()));
        SetRun::new(environment, provider, units)
    }

    #[test]
    fn busy_flag_rejects_second_operation() {
        let run = run_with(Vec::new(), Arc::new(TableProvider::default()));

        assert!(run.can_process());
        assert!(!run.can_process());
        assert!(matches!(run.test_all().unwrap_err(), Error::SetBusy));

        run.done_processing();
        assert!(run.test_all().is_ok());
        // The guard released the flag.
        assert!(run.can_process());
    }

    #[test]
    fn apply_tests_asserts_and_applies_applies() {
        let provider = Arc::new(TableProvider {
            test_answers: vec![("Registry".to_string(), true)],
            ..TableProvider::default()
        });
        let units = vec![
            unit("Registry", Intent::Assert, "MyDsc"),
            unit("Service", Intent::Apply, "MyDsc"),
            unit("File", Intent::Inform, "MyDsc"),
        ];
        let run = run_with(units, provider.clone());

        let result = run.apply_all().unwrap();
        assert!(result.is_success());
        // Inform unit was skipped entirely.
        assert_eq!(result.results.len(), 2);
        assert_eq!(*provider.applied.lock().unwrap(), vec!["Service".to_string()]);
    }

    #[test]
    fn failed_assert_is_recorded_and_run_continues() {
        let provider = Arc::new(TableProvider {
            test_answers: vec![("Registry".to_string(), false)],
            ..TableProvider::default()
        });
        let units = vec![
            unit("Registry", Intent::Assert, "MyDsc"),
            unit("Service", Intent::Apply, "MyDsc"),
        ];
        let run = run_with(units, provider.clone());

        let result = run.apply_all().unwrap();
        assert!(!result.is_success());
        assert_eq!(result.failed(), 1);
        assert_eq!(result.results[0].info.source, ResultSource::Precondition);
        // The later unit still ran.
        assert_eq!(provider.applied.lock().unwrap().len(), 1);
    }

    #[test]
    fn unresolvable_unit_fails_but_does_not_abort_set() {
        let provider = Arc::new(TableProvider {
            test_answers: vec![("Registry".to_string(), true)],
            ..TableProvider::default()
        });
        let units = vec![
            unit("Missing", Intent::Assert, "NoSuchModule"),
            unit("Registry", Intent::Assert, "MyDsc"),
        ];
        let run = run_with(units, provider);

        let result = run.test_all().unwrap();
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].outcome, TestOutcome::Failed);
        assert_eq!(
            result.results[0].info.result_code.as_deref(),
            Some("resolution-failed")
        );
        assert_eq!(result.results[1].outcome, TestOutcome::Positive);
        assert_eq!(result.outcome, TestOutcome::Failed);
    }

    #[test]
    fn test_outcome_aggregation() {
        let provider = Arc::new(TableProvider {
            test_answers: vec![
                ("Registry".to_string(), true),
                ("Service".to_string(), false),
            ],
            ..TableProvider::default()
        });
        let units = vec![
            unit("Registry", Intent::Assert, "MyDsc"),
            unit("Service", Intent::Assert, "MyDsc"),
        ];
        let run = run_with(units, provider);

        let result = run.test_all().unwrap();
        assert_eq!(result.outcome, TestOutcome::Negative);
    }

    #[test]
    fn reboot_flag_propagates() {
        let provider = Arc::new(TableProvider {
            reboot_on_set: true,
            ..TableProvider::default()
        });
        let units = vec![unit("Service", Intent::Apply, "MyDsc")];
        let run = run_with(units, provider);

        let result = run.apply_all().unwrap();
        assert!(result.reboot_required());
    }

    #[test]
    fn dependency_warnings() {
        struct Recorder(Mutex<Vec<String>>);
        impl DiagnosticsSink for Recorder {
            fn diagnostic(&self, level: DiagnosticLevel, message: &str) {
                if level == DiagnosticLevel::Warning {
                    self.0.lock().unwrap().push(message.to_string());
                }
            }
        }

        let mut first = unit("Registry", Intent::Apply, "MyDsc");
        first.instance_id = "first".to_string();
        first.depends_on = vec!["second".to_string(), "ghost".to_string()];
        let mut second = unit("Service", Intent::Apply, "MyDsc");
        second.instance_id = "second".to_string();

        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let run = run_with(vec![first, second], Arc::new(TableProvider::default()))
            .with_diagnostics(Arc::clone(&recorder) as Arc<dyn DiagnosticsSink>);

        let _ = run.apply_all().unwrap();
        let warnings = recorder.0.lock().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("ghost")));
        assert!(warnings.iter().any(|w| w.contains("declared after")));
    }

    /// End to end: directive-driven resolution, repository install,
    /// placeholder expansion and a successful provider set call.
    #[test]
    fn apply_resolves_installs_expands_and_applies() {
        struct RecordingProvider {
            reboot: bool,
            seen: Mutex<Vec<(ValueMap, String, Option<String>)>>,
        }

        impl ResourceProvider for RecordingProvider {
            fn invoke_get(
                &self,
                _settings: &ValueMap,
                _resource: &str,
                _module: Option<&ModuleConstraint>,
            ) -> std::result::Result<ValueMap, InvokeError> {
                Ok(ValueMap::new())
            }

            fn invoke_test(
                &self,
                _settings: &ValueMap,
                _resource: &str,
                _module: Option<&ModuleConstraint>,
            ) -> std::result::Result<bool, InvokeError> {
                Ok(false)
            }

            fn invoke_set(
                &self,
                settings: &ValueMap,
                resource: &str,
                module: Option<&ModuleConstraint>,
            ) -> std::result::Result<bool, InvokeError> {
                self.seen.lock().unwrap().push((
                    settings.clone(),
                    resource.to_string(),
                    module.map(ToString::to_string),
                ));
                Ok(self.reboot)
            }
        }

        let mut unit = ConfigurationUnit::new("Registry", Intent::Apply);
        unit.settings.insert("Path", "${ConfigRoot}/x");
        unit.directives.insert("module", "MyDsc");
        unit.directives.insert("version", "1.0");

        // Nothing installed locally; the repository has the provider.
        let runtime = MockRuntime::supported();
        let repository = MockRepository::new();
        repository.deliver_to(runtime.resource_store());
        repository.add(provider::ResourceDescriptor::new(
            "MyDsc",
            "Registry",
            "1.0".parse().unwrap(),
        ));
        let environment =
            Environment::new(Box::new(runtime), Box::new(repository.clone()));

        let provider_handle = Arc::new(RecordingProvider {
            reboot: true,
            seen: Mutex::new(Vec::new()),
        });
        let run = SetRun::new(environment, provider_handle.clone(), vec![unit])
            .with_base_path(Some(PathBuf::from("/cfg")));

        let result = run.apply_all().unwrap();

        assert!(result.is_success());
        assert_eq!(result.results.len(), 1);
        assert!(result.results[0].info.result_code.is_none());
        assert!(result.results[0].reboot_required);
        assert_eq!(repository.installed().len(), 1);

        let seen = provider_handle.seen.lock().unwrap();
        let (settings, resource, module) = &seen[0];
        assert_eq!(resource, "Registry");
        assert_eq!(module.as_deref(), Some("MyDsc@1.0"));
        assert_eq!(
            settings.get("Path").and_then(unitkit::Value::as_str),
            Some("/cfg/x")
        );
    }

    #[test]
    fn get_details_resolves_without_installing() {
        let units = vec![
            unit("Registry", Intent::Apply, "MyDsc"),
            unit("Unknown", Intent::Apply, "OtherMod"),
        ];
        let run = run_with(units, Arc::new(TableProvider::default()));

        let details = run.get_details().unwrap();
        assert_eq!(details.len(), 2);
        assert!(details[0].descriptor.is_some());
        assert!(details[1].descriptor.is_none());
    }
}
