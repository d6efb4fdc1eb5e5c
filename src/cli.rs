use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "phone-sync")]
#[command(about = "Mirror local music folders onto a phone over adb", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./Config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Mirror a local folder onto the phone (every configured mapping by default)
    Sync(SyncArgs),
    /// Give every music file in a phone folder the same timestamp and re-index it
    Normalize(NormalizeArgs),
    /// Check whether a device is reachable
    Probe,
    /// Convert a Windows Explorer phone path into an adb path
    RemotePath {
        /// e.g. "This PC\Pixel 7\Internal shared storage\Music"
        explorer_path: String,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Local music folder
    #[arg(long, requires = "remote")]
    pub local: Option<PathBuf>,
    /// Phone folder, as an adb path or an Explorer path
    #[arg(long, requires = "local")]
    pub remote: Option<String>,
    /// Write the per-file outcome of every phase to this CSV file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Phone folder, as an adb path or an Explorer path
    #[arg(long)]
    pub remote: Option<String>,
}
