//! The per-unit processor: Get/Test/Apply with invocation discipline.

use crate::error::{Error, Result};
use crate::events::{DiagnosticLevel, DiagnosticsSink};
use crate::invoke::ResourceProvider;
use crate::results::{ApplyResult, GetResult, ResultInformation, TestOutcome, TestResult};
use provider::ResourceDescriptor;
use std::sync::Arc;
use unitkit::{Intent, NormalizedUnit, ValueMap};

/// Binds a normalized unit to its resolved provider and exposes the three
/// verbs.
///
/// `Get` is unconstrained and repeatable. In limit mode, `Test` and `Apply`
/// are each allowed a single invocation attempt for the lifetime of the
/// processor; a second attempt fails without reaching the provider. One
/// processor instance serves one unit for one configuration-set run.
pub struct UnitProcessor {
    unit: NormalizedUnit,
    descriptor: ResourceDescriptor,
    provider: Arc<dyn ResourceProvider>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    limit_mode: bool,
    test_invoked: bool,
    apply_invoked: bool,
}

impl UnitProcessor {
    /// Bind a unit to a resolved descriptor and provider handle.
    pub fn new(
        unit: NormalizedUnit,
        descriptor: ResourceDescriptor,
        provider: Arc<dyn ResourceProvider>,
        diagnostics: Arc<dyn DiagnosticsSink>,
        limit_mode: bool,
    ) -> Self {
        Self {
            unit,
            descriptor,
            provider,
            diagnostics,
            limit_mode,
            test_invoked: false,
            apply_invoked: false,
        }
    }

    /// The unit this processor serves.
    pub fn unit(&self) -> &NormalizedUnit {
        &self.unit
    }

    /// The resolved descriptor backing this processor.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Read the resource's current settings. Allowed for every intent, any
    /// number of times.
    pub fn get_settings(&mut self) -> Result<GetResult> {
        self.verbose("Invoking get", None);
        let outcome = self.get_inner();
        self.verbose("Done invoking get", outcome_code(&outcome));
        outcome
    }

    fn get_inner(&mut self) -> Result<GetResult> {
        let (settings, constraint) = self.prepare()?;
        let record = match self.provider.invoke_get(
            &settings,
            &self.descriptor.resource,
            constraint.as_ref(),
        ) {
            Ok(current) => GetResult {
                unit: self.unit.unit().clone(),
                info: ResultInformation::success(),
                settings: current,
            },
            Err(error) => GetResult {
                unit: self.unit.unit().clone(),
                info: ResultInformation::from_invoke_error(&error),
                settings: ValueMap::new(),
            },
        };
        Ok(record)
    }

    /// Test whether the resource is in the declared state. Not supported for
    /// `Inform` units.
    pub fn test_settings(&mut self) -> Result<TestResult> {
        self.verbose("Invoking test", None);
        let outcome = self.test_inner();
        self.verbose("Done invoking test", outcome_code(&outcome));
        outcome
    }

    fn test_inner(&mut self) -> Result<TestResult> {
        if self.unit.intent() == Intent::Inform {
            return Err(self.unsupported("test"));
        }
        if self.limit_mode {
            if self.test_invoked {
                return Err(Error::AlreadyInvoked {
                    operation: "test",
                    unit: self.unit.unit().display_id().to_string(),
                });
            }
            self.test_invoked = true;
        }

        let (settings, constraint) = self.prepare()?;
        let record = match self.provider.invoke_test(
            &settings,
            &self.descriptor.resource,
            constraint.as_ref(),
        ) {
            Ok(in_desired_state) => TestResult {
                unit: self.unit.unit().clone(),
                info: ResultInformation::success(),
                outcome: if in_desired_state {
                    TestOutcome::Positive
                } else {
                    TestOutcome::Negative
                },
            },
            // The provider failed before producing an answer; the verdict
            // defaults to Failed rather than guessing.
            Err(error) => TestResult {
                unit: self.unit.unit().clone(),
                info: ResultInformation::from_invoke_error(&error),
                outcome: TestOutcome::Failed,
            },
        };
        Ok(record)
    }

    /// Converge the resource to the declared state. Only supported for
    /// `Apply` units.
    pub fn apply_settings(&mut self) -> Result<ApplyResult> {
        self.verbose("Invoking apply", None);
        let outcome = self.apply_inner();
        self.verbose("Done invoking apply", outcome_code(&outcome));
        outcome
    }

    fn apply_inner(&mut self) -> Result<ApplyResult> {
        if matches!(self.unit.intent(), Intent::Inform | Intent::Assert) {
            return Err(self.unsupported("apply"));
        }
        if self.limit_mode {
            if self.apply_invoked {
                return Err(Error::AlreadyInvoked {
                    operation: "apply",
                    unit: self.unit.unit().display_id().to_string(),
                });
            }
            self.apply_invoked = true;
        }

        let (settings, constraint) = self.prepare()?;
        let record = match self.provider.invoke_set(
            &settings,
            &self.descriptor.resource,
            constraint.as_ref(),
        ) {
            Ok(reboot_required) => ApplyResult {
                unit: self.unit.unit().clone(),
                info: ResultInformation::success(),
                reboot_required,
            },
            Err(error) => ApplyResult {
                unit: self.unit.unit().clone(),
                info: ResultInformation::from_invoke_error(&error),
                reboot_required: false,
            },
        };
        Ok(record)
    }

    fn prepare(&self) -> Result<(ValueMap, Option<unitkit::ModuleConstraint>)> {
        let settings = self.unit.expanded_settings()?;
        let constraint = self.unit.module_constraint()?;
        Ok((settings, constraint))
    }

    fn unsupported(&self, operation: &'static str) -> Error {
        Error::UnsupportedOperation {
            operation,
            intent: self.unit.intent(),
            unit: self.unit.unit().display_id().to_string(),
        }
    }

    fn verbose(&self, what: &str, code: Option<String>) {
        let message = match code {
            Some(code) => format!("{what}: {} ({code})", self.unit.qualified_name()),
            None => format!("{what}: {}", self.unit.qualified_name()),
        };
        self.diagnostics.diagnostic(DiagnosticLevel::Verbose, &message);
    }
}

fn outcome_code<T>(outcome: &Result<T>) -> Option<String> {
    outcome.as_ref().err().map(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::invoke::InvokeError;
    use crate::results::ResultSource;
    use std::sync::Mutex;
    use unitkit::{ConfigurationUnit, ModuleConstraint, Value};

    /// Scripted provider: returns configured answers and counts calls.
    #[derive(Default)]
    struct ScriptedProvider {
        get_result: Option<ValueMap>,
        test_result: Option<std::result::Result<bool, InvokeError>>,
        set_result: Option<std::result::Result<bool, InvokeError>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedProvider {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ResourceProvider for ScriptedProvider {
        fn invoke_get(
            &self,
            _settings: &ValueMap,
            _resource: &str,
            _module: Option<&ModuleConstraint>,
        ) -> std::result::Result<ValueMap, InvokeError> {
            self.calls.lock().unwrap().push("get");
            match &self.get_result {
                Some(map) => Ok(map.clone()),
                None => Err(InvokeError::internal("get not scripted")),
            }
        }

        fn invoke_test(
            &self,
            _settings: &ValueMap,
            _resource: &str,
            _module: Option<&ModuleConstraint>,
        ) -> std::result::Result<bool, InvokeError> {
            self.calls.lock().unwrap().push("test");
            self.test_result
                .clone()
                .unwrap_or(Err(InvokeError::internal("test not scripted")))
        }

        fn invoke_set(
            &self,
            _settings: &ValueMap,
            _resource: &str,
            _module: Option<&ModuleConstraint>,
        ) -> std::result::Result<bool, InvokeError> {
            self.calls.lock().unwrap().push("set");
            self.set_result
                .clone()
                .unwrap_or(Err(InvokeError::internal("set not scripted")))
        }
    }

    fn processor_with(
        intent: Intent,
        provider: Arc<ScriptedProvider>,
        limit_mode: bool,
    ) -> UnitProcessor {
        let unit = ConfigurationUnit::new("Registry", intent);
        let descriptor =
            ResourceDescriptor::new("MyDsc", "Registry", "1.0".parse().unwrap());
        UnitProcessor::new(
            NormalizedUnit::new(unit, None),
            descriptor,
            provider,
            Arc::new(NullSink),
            limit_mode,
        )
    }

    #[test]
    fn get_works_for_every_intent() {
        for intent in [Intent::Inform, Intent::Assert, Intent::Apply] {
            let mut map = ValueMap::new();
            map.insert("key", "value");
            let provider = Arc::new(ScriptedProvider {
                get_result: Some(map),
                ..ScriptedProvider::default()
            });
            let mut processor = processor_with(intent, Arc::clone(&provider), false);

            let result = processor.get_settings().unwrap();
            assert!(result.info.is_success());
            assert_eq!(
                result.settings.get("key"),
                Some(&Value::String("value".to_string()))
            );
        }
    }

    #[test]
    fn get_failure_becomes_result_record() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut processor = processor_with(Intent::Inform, provider, false);

        let result = processor.get_settings().unwrap();
        assert!(!result.info.is_success());
        assert_eq!(result.info.source, ResultSource::Internal);
        assert!(result.settings.is_empty());
    }

    #[test]
    fn test_rejects_inform_intent() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut processor = processor_with(Intent::Inform, Arc::clone(&provider), false);

        let err = processor.test_settings().unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
        // The provider was never reached.
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn test_maps_provider_boolean() {
        for (answer, expected) in [(true, TestOutcome::Positive), (false, TestOutcome::Negative)] {
            let provider = Arc::new(ScriptedProvider {
                test_result: Some(Ok(answer)),
                ..ScriptedProvider::default()
            });
            let mut processor = processor_with(Intent::Assert, provider, false);

            let result = processor.test_settings().unwrap();
            assert_eq!(result.outcome, expected);
        }
    }

    #[test]
    fn test_provider_failure_defaults_to_failed() {
        let provider = Arc::new(ScriptedProvider {
            test_result: Some(Err(InvokeError::declared("E1", "no answer", None))),
            ..ScriptedProvider::default()
        });
        let mut processor = processor_with(Intent::Assert, provider, false);

        let result = processor.test_settings().unwrap();
        assert_eq!(result.outcome, TestOutcome::Failed);
        assert_eq!(result.info.source, ResultSource::Provider);
        assert_eq!(result.info.result_code.as_deref(), Some("E1"));
    }

    #[test]
    fn apply_rejects_inform_and_assert() {
        for intent in [Intent::Inform, Intent::Assert] {
            let provider = Arc::new(ScriptedProvider::default());
            let mut processor = processor_with(intent, provider, false);
            let err = processor.apply_settings().unwrap_err();
            assert!(matches!(err, Error::UnsupportedOperation { .. }));
        }
    }

    #[test]
    fn apply_surfaces_reboot_flag() {
        for reboot in [true, false] {
            let provider = Arc::new(ScriptedProvider {
                set_result: Some(Ok(reboot)),
                ..ScriptedProvider::default()
            });
            let mut processor = processor_with(Intent::Apply, provider, false);

            let result = processor.apply_settings().unwrap();
            assert!(result.info.is_success());
            assert_eq!(result.reboot_required, reboot);
        }
    }

    #[test]
    fn limit_mode_allows_one_test_and_one_apply() {
        let mut map = ValueMap::new();
        map.insert("key", "value");
        let provider = Arc::new(ScriptedProvider {
            get_result: Some(map),
            test_result: Some(Ok(true)),
            set_result: Some(Ok(false)),
            ..ScriptedProvider::default()
        });
        let mut processor = processor_with(Intent::Apply, Arc::clone(&provider), true);

        // Get stays unrestricted.
        processor.get_settings().unwrap();
        processor.get_settings().unwrap();

        processor.test_settings().unwrap();
        let err = processor.test_settings().unwrap_err();
        assert!(matches!(err, Error::AlreadyInvoked { operation: "test", .. }));

        processor.apply_settings().unwrap();
        let err = processor.apply_settings().unwrap_err();
        assert!(matches!(err, Error::AlreadyInvoked { operation: "apply", .. }));

        // The second attempts never reached the provider.
        assert_eq!(provider.calls(), vec!["get", "get", "test", "set"]);
    }

    #[test]
    fn outside_limit_mode_repeat_calls_are_fine() {
        let provider = Arc::new(ScriptedProvider {
            test_result: Some(Ok(true)),
            ..ScriptedProvider::default()
        });
        let mut processor = processor_with(Intent::Assert, Arc::clone(&provider), false);

        processor.test_settings().unwrap();
        processor.test_settings().unwrap();
        assert_eq!(provider.calls(), vec!["test", "test"]);
    }

    #[test]
    fn missing_config_root_raises_synchronously() {
        let mut unit = ConfigurationUnit::new("file", Intent::Apply);
        unit.settings.insert("path", "${ConfigRoot}/x");
        let descriptor = ResourceDescriptor::new("corefs", "file", "1.0".parse().unwrap());
        let mut processor = UnitProcessor::new(
            NormalizedUnit::new(unit, None),
            descriptor,
            Arc::new(ScriptedProvider::default()),
            Arc::new(NullSink),
            false,
        );

        let err = processor.get_settings().unwrap_err();
        assert!(matches!(err, Error::Unit(unitkit::Error::MissingConfigRoot { .. })));
    }
}
