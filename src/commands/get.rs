//! `attune get` - read each unit's current settings.

use crate::cli::{GetArgs, OutputFormat};
use crate::document::Document;
use crate::output::TerminalSink;
use crate::ui;
use crate::Context;
use anyhow::{Result, bail};
use dispatch::{AsyncCommand, ExecutionContext};
use std::sync::Arc;
use unitkit::Value;

pub fn run(ctx: &Context, args: GetArgs) -> Result<()> {
    let document = Document::load(&args.document)?;

    let units = match &args.unit {
        None => document.units,
        Some(wanted) => {
            let selected: Vec<_> = document
                .units
                .into_iter()
                .filter(|u| u.display_id() == wanted)
                .collect();
            if selected.is_empty() {
                bail!("no unit with identifier '{wanted}' in the document");
            }
            selected
        }
    };

    let sink = Arc::new(TerminalSink::new(ctx.verbose > 0));
    let command = Arc::new(AsyncCommand::new(ExecutionContext::Restricted, sink));
    let run = crate::commands::set_run(units, document.base_path, false, &command)?;

    let handle = command.run_on_worker(move || run.get_all())?;
    let result = command.wait(handle)?;

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result.results)?);
        }
        OutputFormat::Text => {
            for unit_result in &result.results {
                println!();
                if unit_result.info.is_success() {
                    ui::success(unit_result.unit.display_id());
                    print_settings(&unit_result.settings, 1);
                } else {
                    ui::error(&format!(
                        "{}: {}",
                        unit_result.unit.display_id(),
                        unit_result.info.description
                    ));
                }
            }
        }
    }
    Ok(())
}

fn print_settings(settings: &unitkit::ValueMap, depth: usize) {
    for (key, value) in settings.iter() {
        match value {
            Value::Map(nested) => {
                println!("{}{}:", "  ".repeat(depth), key);
                print_settings(nested, depth + 1);
            }
            Value::Sequence(items) => {
                println!("{}{}: [{} items]", "  ".repeat(depth), key, items.len());
            }
            Value::Bool(b) => ui::kv(key, &b.to_string()),
            Value::Integer(i) => ui::kv(key, &i.to_string()),
            Value::String(s) => ui::kv(key, s),
        }
    }
}
