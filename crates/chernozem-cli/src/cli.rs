use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chz",
    about = "Chernozem: inspect and resolve container snapshots",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List keys with their locks, services and type hints
    Inspect(InspectArgs),
    /// Resolve one key and print it as JSON
    Get(GetArgs),
    /// Resolve every key and print the mapping as JSON
    Export(ExportArgs),
}

#[derive(Args)]
pub struct InspectArgs {
    /// Snapshot file
    pub file: PathBuf,
}

#[derive(Args)]
pub struct GetArgs {
    /// Snapshot file
    pub file: PathBuf,
    /// Key to resolve; integers address integer keys
    pub key: String,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Snapshot file
    pub file: PathBuf,
    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}
