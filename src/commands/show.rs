//! `attune show` - resolution details without invoking providers.

use crate::cli::ShowArgs;
use crate::document::Document;
use crate::output::TerminalSink;
use crate::ui;
use crate::Context;
use anyhow::Result;
use dispatch::{AsyncCommand, ExecutionContext};
use std::sync::Arc;
use unitkit::ModuleConstraint;

pub fn run(ctx: &Context, args: ShowArgs) -> Result<()> {
    if let Some(module) = &args.module {
        return show_module(module);
    }

    let document = Document::load(&args.document)?;
    ui::header(&format!("Resolution for {}", document.path.display()));

    let sink = Arc::new(TerminalSink::new(ctx.verbose > 0));
    let command = Arc::new(AsyncCommand::new(ExecutionContext::Restricted, sink));
    let run = crate::commands::set_run(document.units, document.base_path, false, &command)?;

    let handle = command.run_on_worker(move || run.get_details())?;
    let details = command.wait(handle)?;

    for detail in &details {
        println!();
        match &detail.descriptor {
            Some(descriptor) => {
                ui::success(detail.unit.display_id());
                ui::kv("provider", &descriptor.qualified_name());
                if !descriptor.properties.is_empty() {
                    let names: Vec<&str> = descriptor
                        .properties
                        .iter()
                        .map(|p| p.name.as_str())
                        .collect();
                    ui::kv("properties", &names.join(", "));
                }
            }
            None => {
                ui::warn(&format!(
                    "{}: not installed locally",
                    detail.unit.display_id()
                ));
            }
        }
    }
    Ok(())
}

fn show_module(module: &str) -> Result<()> {
    let environment = crate::commands::environment()?;
    let resources = environment.resources_in_module(&ModuleConstraint::named(module))?;

    ui::header(&format!("Resources in module {module}"));
    for descriptor in &resources {
        ui::kv(&descriptor.resource, &descriptor.qualified_name());
    }
    Ok(())
}
