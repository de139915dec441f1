//! Subprocess execution driver for rclone.
//!
//! Builds the argument vector, spawns rclone with piped stderr, streams
//! that stderr through the progress parser on its own task, and waits for
//! both the process and the parser before returning. Status transitions on
//! the store (`start`/`complete`/`fail`) are left to the caller so this
//! composes with the retry layer.

pub mod options;
pub mod remote;

use crate::error::{FerryError, Result};
use crate::progress::ProgressParser;
use crate::transfer::TransferStore;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

pub use options::{CommonFlags, TransferOptions};

/// Stats reporting interval used when none is configured.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_millis(500);

/// The rclone operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcloneCommand {
    /// Copy files from source to destination.
    Copy,
    /// Copy a single file to a specific destination path.
    CopyTo,
    /// Move files from source to destination.
    Move,
    /// Move a single file to a specific destination path.
    MoveTo,
    /// Make destination identical to source, modifying destination only.
    Sync,
}

impl RcloneCommand {
    pub fn verb(self) -> &'static str {
        match self {
            RcloneCommand::Copy => "copy",
            RcloneCommand::CopyTo => "copyto",
            RcloneCommand::Move => "move",
            RcloneCommand::MoveTo => "moveto",
            RcloneCommand::Sync => "sync",
        }
    }
}

impl fmt::Display for RcloneCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Configuration for one rclone invocation.
#[derive(Debug, Clone)]
pub struct RcloneOptions {
    pub command: RcloneCommand,
    pub source: String,
    pub destination: String,
    /// Extra flags appended after the built-in ones.
    pub flags: Vec<String>,
    /// How often rclone reports progress. Zero means the default.
    pub stats_interval: Duration,
    pub dry_run: bool,
    /// Cooperative cancellation signal. The default token never fires.
    pub cancel: CancellationToken,
}

impl RcloneOptions {
    pub fn new(
        command: RcloneCommand,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        RcloneOptions {
            command,
            source: source.into(),
            destination: destination.into(),
            flags: Vec::new(),
            stats_interval: DEFAULT_STATS_INTERVAL,
            dry_run: false,
            cancel: CancellationToken::new(),
        }
    }
}

/// Runs rclone commands and feeds their progress into a [`TransferStore`].
#[derive(Debug, Clone)]
pub struct Executor {
    store: TransferStore,
    binary: String,
}

impl Executor {
    pub fn new(store: TransferStore) -> Self {
        Self::with_binary(store, "rclone")
    }

    /// Use a specific rclone binary instead of whatever is on PATH.
    pub fn with_binary(store: TransferStore, binary: impl Into<String>) -> Self {
        Executor {
            store,
            binary: binary.into(),
        }
    }

    pub fn store(&self) -> &TransferStore {
        &self.store
    }

    /// Run one rclone invocation for `transfer_id`, streaming progress into
    /// the store as a side effect.
    ///
    /// Blocks until the subprocess exits and the stderr consumer has
    /// drained, so no buffered progress update can race past the return.
    /// Returns the subprocess failure with its diagnostic tail attached;
    /// the text is left inspectable for classification.
    pub async fn execute(&self, transfer_id: &str, opts: &RcloneOptions) -> Result<()> {
        let args = build_args(opts);
        tracing::debug!(id = transfer_id, binary = %self.binary, ?args, "spawning rclone");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FerryError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FerryError::Output("rclone stderr pipe unavailable".into()))?;

        // Single consumer per stream: progress updates apply in exactly the
        // order rclone emitted them.
        let mut parser = ProgressParser::new(transfer_id, self.store.clone());
        let consumer = tokio::spawn(async move {
            let mut stderr = stderr;
            let mut chunk = [0u8; 8192];
            loop {
                match stderr.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => parser.feed(&chunk[..n]),
                }
            }
            parser.finish()
        });

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = opts.cancel.cancelled() => None,
        };
        let status = match waited {
            Some(status) => status?,
            None => {
                tracing::debug!(id = transfer_id, "cancellation requested, killing rclone");
                if let Err(err) = child.start_kill() {
                    tracing::warn!(id = transfer_id, %err, "failed to kill rclone");
                }
                let _ = child.wait().await;
                let _ = consumer.await;
                return Err(FerryError::Cancelled);
            }
        };

        // The pipe may still hold buffered output after exit; always join
        // the consumer before returning.
        let tail = match consumer.await {
            Ok(tail) => tail,
            Err(err) => {
                tracing::warn!(id = transfer_id, %err, "stderr consumer task failed");
                Vec::new()
            }
        };

        if status.success() {
            tracing::debug!(id = transfer_id, "rclone finished");
            Ok(())
        } else {
            let detail = if tail.is_empty() {
                "no diagnostic output".to_string()
            } else {
                tail.join("; ")
            };
            Err(FerryError::Rclone { status, detail })
        }
    }
}

/// Deterministic argument order: verb, verbosity, stats interval, dry-run,
/// caller flags, then source and destination positionally last.
fn build_args(opts: &RcloneOptions) -> Vec<String> {
    let interval = if opts.stats_interval.is_zero() {
        DEFAULT_STATS_INTERVAL
    } else {
        opts.stats_interval
    };

    let mut args = vec![
        opts.command.verb().to_string(),
        // Verbose: enables "Transferred:" progress lines on stderr.
        "-v".to_string(),
        "--stats".to_string(),
        format!("{}ms", interval.as_millis()),
    ];
    if opts.dry_run {
        args.push("--dry-run".to_string());
    }
    args.extend(opts.flags.iter().cloned());
    args.push(opts.source.clone());
    args.push(opts.destination.clone());
    args
}
