use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "attune")]
#[command(version)]
#[command(about = "Resolve configuration units to providers and drive them through Get/Test/Apply", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a configuration document
    Apply(ApplyArgs),

    /// Test whether the system matches a configuration document
    Test(TestArgs),

    /// Read the current settings of each unit in a document
    Get(GetArgs),

    /// Show how each unit in a document resolves, without invoking providers
    Show(ShowArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Configuration document to apply
    pub document: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Restrict each unit's test/apply to a single invocation attempt
    #[arg(long)]
    pub limit_mode: bool,
}

#[derive(Parser)]
pub struct TestArgs {
    /// Configuration document to test against
    pub document: PathBuf,
}

#[derive(Parser)]
pub struct GetArgs {
    /// Configuration document to read
    pub document: PathBuf,

    /// Only read the unit with this identifier
    #[arg(short, long)]
    pub unit: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Parser)]
pub struct ShowArgs {
    /// Configuration document to resolve
    pub document: PathBuf,

    /// List every locally installed resource of this module instead
    #[arg(short, long)]
    pub module: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
