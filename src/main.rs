mod cli;
mod commands;
mod config;
mod cookbook;
mod platform;
mod providers;
mod recipe;
mod role;
mod run_context;
mod run_list;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use config::AgentConfig;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let config = match &cli.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::for_dir(Path::new(".")),
    };

    match cli.command {
        Command::Apply(args) => commands::apply::run(&config, args),
        Command::Expand(args) => commands::expand::run(&config, args),
    }
}
