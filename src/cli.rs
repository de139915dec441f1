//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "ferry",
    version,
    about = "rclone orchestration: concurrent transfers, live progress, retry with backoff"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the rclone binary (overrides the config file).
    #[arg(long, global = true, env = "FERRY_RCLONE")]
    pub rclone: Option<String>,

    /// Config file to load instead of the default location.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy source to destination
    Copy(TransferArgs),
    /// Move source to destination
    Move(TransferArgs),
    /// Make destination identical to source
    Sync(TransferArgs),
    /// List entries under a local or remote path
    Ls {
        path: String,
        /// Recurse into subdirectories
        #[arg(short = 'R', long)]
        recursive: bool,
    },
    /// List configured remotes
    Remotes,
    /// Show the installed rclone version
    Version,
    /// Run the pre-flight checks without transferring anything
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct TransferArgs {
    /// Source path (local or remote:path)
    pub source: String,
    /// Destination path (local or remote:path)
    pub destination: String,

    /// Single-file mode (rclone copyto/moveto); not valid for sync
    #[arg(long)]
    pub single: bool,

    /// Simulate without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip pre-flight validation
    #[arg(long)]
    pub no_checks: bool,

    /// Log lines instead of the live dashboard
    #[arg(long)]
    pub no_dashboard: bool,

    /// Maximum attempts, including the first
    #[arg(long)]
    pub retries: Option<u32>,

    /// Initial backoff delay in milliseconds
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Backoff delay cap in milliseconds
    #[arg(long)]
    pub max_delay_ms: Option<u64>,

    /// Progress reporting interval in milliseconds
    #[arg(long)]
    pub stats_interval_ms: Option<u64>,

    /// Parallel file transfers inside rclone
    #[arg(long)]
    pub transfers: Option<u32>,

    /// Parallel checkers inside rclone
    #[arg(long)]
    pub checkers: Option<u32>,

    /// Bandwidth limit in KiB/s
    #[arg(long)]
    pub bwlimit: Option<u32>,

    /// Skip checksum verification
    #[arg(long)]
    pub ignore_checksum: bool,

    /// Disable directory traversal optimization
    #[arg(long)]
    pub no_traverse: bool,

    /// Exclude pattern (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Include pattern (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Only transfer files older than this (e.g. "1d")
    #[arg(long)]
    pub min_age: Option<String>,

    /// Only transfer files younger than this
    #[arg(long)]
    pub max_age: Option<String>,

    /// Extra flags passed to rclone verbatim, after `--`
    #[arg(last = true)]
    pub extra: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Source path (local or remote:path)
    pub source: String,
    /// Destination path (local or remote:path)
    pub destination: String,

    /// Timeout in seconds for remote reachability
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
}
