//! `attune test` - check whether the system matches a document.

use crate::cli::TestArgs;
use crate::document::Document;
use crate::output::TerminalSink;
use crate::ui;
use crate::Context;
use anyhow::{Result, bail};
use dispatch::{AsyncCommand, ExecutionContext};
use processor::TestOutcome;
use std::sync::Arc;

pub fn run(ctx: &Context, args: TestArgs) -> Result<()> {
    let document = Document::load(&args.document)?;
    ui::header(&format!("Testing {}", document.path.display()));

    let sink = Arc::new(TerminalSink::new(ctx.verbose > 0));
    let command = Arc::new(AsyncCommand::new(ExecutionContext::Restricted, sink));
    let run = crate::commands::set_run(document.units, document.base_path, false, &command)?;

    let handle = command.run_on_worker(move || run.test_all())?;
    let result = command.wait(handle)?;

    println!();
    for unit_result in &result.results {
        match unit_result.outcome {
            TestOutcome::Positive => ui::success(&format!(
                "{}: in the declared state",
                unit_result.unit.display_id()
            )),
            TestOutcome::Negative => ui::warn(&format!(
                "{}: differs from the declared state",
                unit_result.unit.display_id()
            )),
            TestOutcome::Failed => ui::error(&format!(
                "{}: {}",
                unit_result.unit.display_id(),
                unit_result.info.description
            )),
        }
    }

    println!();
    match result.outcome {
        TestOutcome::Positive => {
            ui::success("system matches the configuration");
            Ok(())
        }
        TestOutcome::Negative => bail!("system differs from the configuration"),
        TestOutcome::Failed => bail!("one or more units could not be tested"),
    }
}
