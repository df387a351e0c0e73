//! Bridges between the engine's event surfaces and the terminal.
//!
//! The engine reports through `processor`'s diagnostics/progress traits; the
//! worker marshals those to the origin thread as `dispatch` output events;
//! this module renders them.

use crate::ui;
use colored::Colorize;
use dispatch::{AsyncCommand, OutputEvent, OutputSink, ProgressRecord, ProgressState};
use indicatif::{ProgressBar, ProgressStyle};
use processor::{DiagnosticLevel, DiagnosticsSink, ProgressSink, ProgressUpdate};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Renders output events on the origin thread: diagnostics to the terminal,
/// progress records to `indicatif` bars keyed by activity id.
pub struct TerminalSink {
    verbose: bool,
    bars: Mutex<HashMap<u32, ProgressBar>>,
}

impl TerminalSink {
    /// Create a sink. With `verbose` off, verbose diagnostics go to the log
    /// facade instead of the terminal.
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn progress(&self, record: &ProgressRecord) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        match record.state {
            ProgressState::Processing => {
                let bar = bars.entry(record.activity_id).or_insert_with(|| {
                    let bar = ProgressBar::new(record.total);
                    bar.set_style(
                        ProgressStyle::with_template("  {bar:24.cyan/dim} {pos}/{len} {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_bar()),
                    );
                    bar
                });
                bar.set_length(record.total);
                bar.set_position(record.current);
                bar.set_message(record.message.clone());
            }
            ProgressState::Completed => {
                if let Some(bar) = bars.remove(&record.activity_id) {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

impl OutputSink for TerminalSink {
    fn emit(&self, event: &OutputEvent) {
        match event {
            OutputEvent::Verbose(message) => {
                if self.verbose {
                    println!("  {}", message.dimmed());
                } else {
                    log::debug!("{message}");
                }
            }
            OutputEvent::Warning(message) => ui::warn(message),
            OutputEvent::Error(message) => ui::error(message),
            OutputEvent::Progress(record) => self.progress(record),
        }
    }
}

/// Forwards engine diagnostics and progress from the worker thread into an
/// [`AsyncCommand`], which queues them for ordered delivery on the origin.
pub struct CommandBridge {
    command: Arc<AsyncCommand>,
    activity_id: u32,
}

impl CommandBridge {
    /// Create a bridge with its own progress activity.
    pub fn new(command: Arc<AsyncCommand>) -> Self {
        let activity_id = command.next_activity_id();
        Self {
            command,
            activity_id,
        }
    }
}

impl DiagnosticsSink for CommandBridge {
    fn diagnostic(&self, level: DiagnosticLevel, message: &str) {
        let event = match level {
            DiagnosticLevel::Verbose => OutputEvent::Verbose(message.to_string()),
            DiagnosticLevel::Warning => OutputEvent::Warning(message.to_string()),
            DiagnosticLevel::Error => OutputEvent::Error(message.to_string()),
        };
        self.command.write(event);
    }
}

impl ProgressSink for CommandBridge {
    fn progress(&self, update: &ProgressUpdate) {
        let record = if update.completed {
            ProgressRecord::completed(self.activity_id, update.message.clone())
        } else {
            ProgressRecord::processing(
                self.activity_id,
                update.current as u64,
                update.total as u64,
                update.message.clone(),
            )
        };
        self.command.write(OutputEvent::Progress(record));
    }
}
