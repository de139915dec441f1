//! Listing and query helpers backed by short-lived rclone invocations.

use crate::error::{FerryError, Result};
use std::collections::HashSet;
use std::process::Stdio;
use tokio::process::Command;

/// Run rclone with `args`, returning stdout on success.
pub(crate) async fn rclone_stdout(args: &[&str]) -> Result<String> {
    let output = Command::new("rclone")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| FerryError::Spawn {
            program: "rclone".to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = match stderr.trim() {
            "" => "no diagnostic output".to_string(),
            text => text.to_string(),
        };
        return Err(FerryError::Rclone {
            status: output.status,
            detail,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// List entries under a local or remote path (`rclone lsf`).
pub async fn list_files(path: &str, recursive: bool) -> Result<Vec<String>> {
    let mut args = vec!["lsf", path];
    if !recursive {
        args.extend(["--max-depth", "1"]);
    }
    let output = rclone_stdout(&args).await?;
    Ok(parse_listing(&output))
}

/// List configured remote names (`rclone listremotes`), without the
/// trailing colon.
pub async fn list_remotes() -> Result<Vec<String>> {
    let output = rclone_stdout(&["listremotes"]).await?;
    Ok(parse_remotes(&output))
}

/// First line of `rclone version`.
pub async fn rclone_version() -> Result<String> {
    let output = rclone_stdout(&["version", "--check=false"]).await?;
    match output.lines().next().map(str::trim) {
        Some(line) if !line.is_empty() => Ok(line.to_string()),
        _ => Err(FerryError::Output("no version output from rclone".into())),
    }
}

/// Which of `names` already exist at `destination`, by listing it once.
pub async fn check_duplicates(destination: &str, names: &[String]) -> Result<HashSet<String>> {
    if names.is_empty() {
        return Ok(HashSet::new());
    }

    let existing: HashSet<String> = list_files(destination, false).await?.into_iter().collect();
    Ok(names
        .iter()
        .filter(|name| existing.contains(*name))
        .cloned()
        .collect())
}

fn parse_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn parse_remotes(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.trim_end_matches(':').to_string())
        .collect()
}
