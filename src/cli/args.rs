//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::ModeKind;

/// Rewrite static HTML files in place for faster page loads
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: <ROOT>/pageopt.toml, if present)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Optimize every HTML file under ROOT in place
    #[command(visible_alias = "r")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Report what would change without writing anything
    #[command(visible_alias = "c")]
    Check {
        #[command(flatten)]
        args: RunArgs,
    },
}

/// Shared arguments for Run and Check
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory to scan for HTML files
    #[arg(default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub root: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Write a `.bak` copy of each file before overwriting it
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub backup: Option<bool>,

    /// Disable the in-run change cache (always reprocess)
    #[arg(long)]
    pub no_cache: bool,

    /// Persist the change cache under `<ROOT>/.pageopt/` across runs
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub persist_cache: Option<bool>,

    /// Build mode (production also minifies)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeKind>,

    /// Report output path (relative to ROOT)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub report: Option<PathBuf>,
}

impl Cli {
    pub const fn args(&self) -> &RunArgs {
        match &self.command {
            Commands::Run { args } | Commands::Check { args } => args,
        }
    }

    pub const fn is_check(&self) -> bool {
        matches!(self.command, Commands::Check { .. })
    }
}
