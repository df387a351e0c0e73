//! `attune apply` - converge the system to a configuration document.

use crate::cli::ApplyArgs;
use crate::document::Document;
use crate::output::TerminalSink;
use crate::ui;
use crate::Context;
use anyhow::{Result, bail};
use colored::Colorize;
use dispatch::{AsyncCommand, ExecutionContext};
use processor::SetApplyResult;
use std::sync::Arc;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let document = Document::load(&args.document)?;
    if document.units.is_empty() {
        ui::info("the document declares no units, nothing to do");
        return Ok(());
    }

    ui::header(&format!("Applying {}", document.path.display()));
    if !ctx.quiet {
        for unit in &document.units {
            ui::dim(&format!("{} ({})", unit.display_id(), unit.intent));
        }
    }

    if !args.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let sink = Arc::new(TerminalSink::new(ctx.verbose > 0));
    let command = Arc::new(AsyncCommand::new(ExecutionContext::Restricted, sink));
    let run = crate::commands::set_run(
        document.units,
        document.base_path,
        args.limit_mode,
        &command,
    )?;

    // The caller thread stays free to render output while the worker drives
    // the providers.
    let handle = command.run_on_worker(move || run.apply_all())?;
    let result = command.wait(handle)?;

    print_summary(&result);
    if !result.is_success() {
        bail!("{} unit(s) failed", result.failed());
    }
    Ok(())
}

fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn print_summary(result: &SetApplyResult) {
    println!();
    for unit_result in &result.results {
        if unit_result.info.is_success() {
            ui::success(unit_result.unit.display_id());
        } else {
            ui::error(&format!(
                "{}: {}",
                unit_result.unit.display_id(),
                unit_result.info.description
            ));
            if let Some(details) = &unit_result.info.details {
                ui::dim(details);
            }
        }
    }

    println!();
    let elapsed = result.finished_at - result.started_at;
    if result.is_success() {
        ui::success(&format!(
            "Configuration applied in {}.{:03}s",
            elapsed.num_seconds(),
            elapsed.num_milliseconds().rem_euclid(1000)
        ));
    } else {
        ui::warn(&format!("{} unit(s) failed", result.failed()));
    }
    if result.reboot_required() {
        ui::warn("a reboot is required to finish applying changes");
    }
}
