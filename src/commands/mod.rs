pub mod apply;
pub mod get;
pub mod show;
pub mod test;

use crate::host::{BuiltinProvider, LocalRuntime, OfflineRepository};
use crate::output::CommandBridge;
use anyhow::{Context as AnyhowContext, Result};
use dispatch::AsyncCommand;
use processor::{DiagnosticsSink, ProgressSink, SetRun};
use provider::Environment;
use std::path::PathBuf;
use std::sync::Arc;
use unitkit::ConfigurationUnit;

/// Build the environment over the in-process host and validate it.
pub fn environment() -> Result<Environment> {
    let environment = Environment::new(
        Box::new(LocalRuntime::new()),
        Box::new(OfflineRepository),
    );
    environment
        .validate()
        .context("the host runtime does not meet requirements")?;
    Ok(environment)
}

/// Wire a set run over the bundled providers, with its events marshaled
/// through `command`.
pub fn set_run(
    units: Vec<ConfigurationUnit>,
    base_path: Option<PathBuf>,
    limit_mode: bool,
    command: &Arc<AsyncCommand>,
) -> Result<SetRun> {
    let bridge = Arc::new(CommandBridge::new(Arc::clone(command)));
    Ok(SetRun::new(
        environment()?,
        Arc::new(BuiltinProvider::new()),
        units,
    )
    .with_base_path(base_path)
    .with_limit_mode(limit_mode)
    .with_diagnostics(Arc::clone(&bridge) as Arc<dyn DiagnosticsSink>)
    .with_progress(bridge as Arc<dyn ProgressSink>))
}
