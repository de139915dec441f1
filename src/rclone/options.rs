//! Commonly used rclone flags and a builder for transfer options.

use crate::rclone::{RcloneCommand, RcloneOptions};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Frequently used rclone tuning flags, rendered with [`CommonFlags::to_flags`].
#[derive(Debug, Clone, Default)]
pub struct CommonFlags {
    /// Number of file transfers to run in parallel (`--transfers`).
    pub transfers: u32,
    /// Number of checkers to run in parallel (`--checkers`).
    pub checkers: u32,
    /// Bandwidth limit in KiB/s, 0 = unlimited (`--bwlimit`).
    pub bandwidth_kbps: u32,
    /// Skip checksum verification for faster transfers.
    pub ignore_checksum: bool,
    /// Disable the directory traversal optimization.
    pub no_traverse: bool,
    /// Show rclone's own progress display (`-P`).
    pub progress: bool,
    /// Extra verbosity (`-v`).
    pub verbose: bool,
    /// Patterns to exclude from the transfer.
    pub exclude: Vec<String>,
    /// Patterns to include in the transfer.
    pub include: Vec<String>,
    /// Only transfer files older than this, e.g. "1d".
    pub min_age: Option<String>,
    /// Only transfer files younger than this.
    pub max_age: Option<String>,
}

impl CommonFlags {
    /// Render the populated flags as rclone command-line arguments, in a
    /// fixed order.
    pub fn to_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();

        if self.transfers > 0 {
            flags.push("--transfers".to_string());
            flags.push(self.transfers.to_string());
        }
        if self.checkers > 0 {
            flags.push("--checkers".to_string());
            flags.push(self.checkers.to_string());
        }
        if self.bandwidth_kbps > 0 {
            flags.push("--bwlimit".to_string());
            flags.push(format!("{}k", self.bandwidth_kbps));
        }
        if self.ignore_checksum {
            flags.push("--ignore-checksum".to_string());
        }
        if self.no_traverse {
            flags.push("--no-traverse".to_string());
        }
        if self.progress {
            flags.push("-P".to_string());
        }
        if self.verbose {
            flags.push("-v".to_string());
        }
        for pattern in &self.exclude {
            flags.push("--exclude".to_string());
            flags.push(pattern.clone());
        }
        for pattern in &self.include {
            flags.push("--include".to_string());
            flags.push(pattern.clone());
        }
        if let Some(age) = &self.min_age {
            flags.push("--min-age".to_string());
            flags.push(age.clone());
        }
        if let Some(age) = &self.max_age {
            flags.push("--max-age".to_string());
            flags.push(age.clone());
        }

        flags
    }
}

/// Builder for [`RcloneOptions`].
///
/// ```no_run
/// use ferry::rclone::{RcloneCommand, TransferOptions};
/// use std::time::Duration;
///
/// let opts = TransferOptions::new("/data", "backup:data")
///     .command(RcloneCommand::Sync)
///     .stats_interval(Duration::from_secs(1))
///     .dry_run()
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TransferOptions {
    opts: RcloneOptions,
}

impl TransferOptions {
    /// Start building a copy from `source` to `destination`.
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        TransferOptions {
            opts: RcloneOptions::new(RcloneCommand::Copy, source, destination),
        }
    }

    pub fn command(mut self, command: RcloneCommand) -> Self {
        self.opts.command = command;
        self
    }

    /// Append custom flags.
    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opts.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Append the rendered [`CommonFlags`].
    pub fn common_flags(mut self, common: &CommonFlags) -> Self {
        self.opts.flags.extend(common.to_flags());
        self
    }

    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.opts.stats_interval = interval;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.opts.dry_run = true;
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.opts.cancel = token;
        self
    }

    pub fn build(self) -> RcloneOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_flags() {
        assert!(CommonFlags::default().to_flags().is_empty());
    }

    #[test]
    fn test_all_flags_in_order() {
        let common = CommonFlags {
            transfers: 4,
            checkers: 8,
            bandwidth_kbps: 1024,
            ignore_checksum: true,
            no_traverse: true,
            progress: true,
            verbose: true,
            exclude: vec!["*.tmp".into()],
            include: vec!["*.iso".into()],
            min_age: Some("1d".into()),
            max_age: Some("30d".into()),
        };
        assert_eq!(
            common.to_flags(),
            vec![
                "--transfers",
                "4",
                "--checkers",
                "8",
                "--bwlimit",
                "1024k",
                "--ignore-checksum",
                "--no-traverse",
                "-P",
                "-v",
                "--exclude",
                "*.tmp",
                "--include",
                "*.iso",
                "--min-age",
                "1d",
                "--max-age",
                "30d",
            ]
        );
    }

    #[test]
    fn test_zero_counts_are_omitted() {
        let common = CommonFlags {
            transfers: 0,
            checkers: 0,
            bandwidth_kbps: 0,
            ..CommonFlags::default()
        };
        assert!(common.to_flags().is_empty());
    }

    #[test]
    fn test_builder() {
        let opts = TransferOptions::new("/src", "remote:dst")
            .command(RcloneCommand::MoveTo)
            .flags(["--fast-list"])
            .stats_interval(Duration::from_millis(250))
            .dry_run()
            .build();

        assert_eq!(opts.command, RcloneCommand::MoveTo);
        assert_eq!(opts.source, "/src");
        assert_eq!(opts.destination, "remote:dst");
        assert_eq!(opts.flags, vec!["--fast-list"]);
        assert_eq!(opts.stats_interval, Duration::from_millis(250));
        assert!(opts.dry_run);
    }

    #[test]
    fn test_builder_defaults_to_copy() {
        let opts = TransferOptions::new("a", "b").build();
        assert_eq!(opts.command, RcloneCommand::Copy);
        assert!(!opts.dry_run);
        assert!(opts.flags.is_empty());
    }

    #[test]
    fn test_common_flags_appended_after_custom() {
        let common = CommonFlags {
            transfers: 2,
            ..CommonFlags::default()
        };
        let opts = TransferOptions::new("a", "b")
            .flags(["--fast-list"])
            .common_flags(&common)
            .build();
        assert_eq!(opts.flags, vec!["--fast-list", "--transfers", "2"]);
    }
}
