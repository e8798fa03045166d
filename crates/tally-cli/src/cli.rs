use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tally",
    about = "tally -- schema-typed state store with file-backed persistence",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load the state and keep saving it until interrupted
    Serve(ServeArgs),
    /// Print the loaded state as JSON
    Dump(DumpArgs),
    /// Load every backing file and report errors
    Check(CheckArgs),
}

/// Where the definitions and the saved state live.
#[derive(Args)]
pub struct StoreArgs {
    /// State definition document (JSON)
    #[arg(long)]
    pub defs: PathBuf,
    /// Store configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Overrides `base_path` from the configuration
    #[arg(long)]
    pub base_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args)]
pub struct DumpArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Only this top-level entry
    #[arg(long)]
    pub name: Option<String>,
    /// Leave out transient values, as they would be saved
    #[arg(long)]
    pub persisted: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}
