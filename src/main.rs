//! pageopt - rewrite a tree of static HTML files in place for faster page loads.

mod asset;
mod cli;
mod config;
mod core;
mod freshness;
mod logger;
mod metrics;
mod pipeline;
mod report;
mod scan;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, optimize::optimize_site};
use config::OptimizeConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = OptimizeConfig::load(&cli)?;
    logger::set_verbose(config.run.verbose);

    let summary = optimize_site(&config)?;
    if summary.has_failures() {
        summary.print_failures();
        std::process::exit(1);
    }
    Ok(())
}
