use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "recipe",
    about = "Replay and inspect preparation step histories",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file overriding the history settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a JSON script of history mutations and print the result
    Run(RunArgs),
    /// List the registered actions
    Actions,
    /// Show the effective configuration
    Config,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the script
    pub script: PathBuf,
    /// Report failed operations and continue with the next one
    #[arg(long)]
    pub keep_going: bool,
    /// Collect unreachable objects after the last operation
    #[arg(long)]
    pub gc: bool,
}
