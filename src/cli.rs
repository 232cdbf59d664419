use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "caldera")]
#[command(version)]
#[command(about = "Converge a node onto its declared configuration", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults anchor at the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Expand the run list, evaluate recipes, and converge the node
    Apply(ApplyArgs),

    /// Show the expanded run list without converging
    Expand(ExpandArgs),
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Node document, overriding the config file
    #[arg(short, long)]
    pub node: Option<PathBuf>,

    /// Roles directory, overriding the config file
    #[arg(long)]
    pub roles: Option<PathBuf>,

    /// Cookbooks directory, overriding the config file
    #[arg(long)]
    pub cookbooks: Option<PathBuf>,

    /// Write the run report as JSON to this path
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Print the run report as JSON to stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ExpandArgs {
    /// Node document, overriding the config file
    #[arg(short, long)]
    pub node: Option<PathBuf>,

    /// Roles directory, overriding the config file
    #[arg(long)]
    pub roles: Option<PathBuf>,

    /// Print the expansion as JSON
    #[arg(long)]
    pub json: bool,
}
