//! ferry - orchestration around rclone.
//!
//! Launches rclone as a subprocess, tracks any number of concurrent
//! transfers in a shared [`transfer::TransferStore`], parses rclone's
//! carriage-return-updated progress stream into structured updates,
//! retries transient failures with exponential backoff, classifies
//! whatever still fails, and renders a live terminal dashboard. rclone
//! does all of the actual data movement.
//!
//! ```no_run
//! use ferry::rclone::{Executor, RcloneCommand, TransferOptions};
//! use ferry::retry::RetryConfig;
//! use ferry::transfer::TransferStore;
//!
//! # async fn run() -> ferry::error::Result<()> {
//! let store = TransferStore::new();
//! let executor = Executor::new(store.clone());
//!
//! store.add("docs", "/home/me/docs", "backup:docs");
//! let opts = TransferOptions::new("/home/me/docs", "backup:docs")
//!     .command(RcloneCommand::Sync)
//!     .build();
//!
//! store.start("docs");
//! match executor.execute_with_retry("docs", &opts, RetryConfig::default()).await {
//!     Ok(()) => store.complete("docs"),
//!     Err(err) => store.fail("docs", err),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod disk;
pub mod error;
pub mod path;
pub mod progress;
pub mod rclone;
pub mod retry;
pub mod transfer;
pub mod ui;
pub mod validate;

pub use error::{classify, Classified, ErrorKind, FerryError, Result};
pub use rclone::{Executor, RcloneCommand, RcloneOptions};
pub use retry::RetryConfig;
pub use transfer::{Status, Transfer, TransferStore};
