//! Pre-flight validation checks run before a transfer is attempted.
//!
//! Everything here fails with the structural `Validation` variant, which
//! the classifier maps to `InvalidInput` without any text inspection.

use crate::disk;
use crate::error::{FerryError, Result};
use crate::path::is_remote_path;
use crate::rclone::remote::{rclone_stdout, rclone_version};
use indicatif::HumanBytes;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// File suffixes left behind by interrupted downloads.
const PARTIAL_SUFFIXES: &[&str] = &[".partial", ".rclonepart", ".tmp", ".crdownload", ".part"];

/// Check that rclone is installed and reachable via PATH.
pub fn ensure_rclone_installed() -> Result<()> {
    which::which("rclone")
        .map(|_| ())
        .map_err(|err| FerryError::validation("rclone", format!("rclone not found in PATH: {err}")))
}

/// Check the installed rclone against a minimum version and return the
/// version line. The comparison is a substring check on rclone's own
/// output, as precise as the original tooling ever was.
pub async fn ensure_min_version(min_version: &str) -> Result<String> {
    let version = rclone_version().await?;
    if !version.contains("rclone") {
        return Err(FerryError::Output(format!(
            "unexpected rclone version output: {version}"
        )));
    }
    if !min_version.is_empty() && !version.contains(min_version) {
        return Err(FerryError::validation(
            "rclone",
            format!("version check failed: want {min_version}, got {version}"),
        ));
    }
    Ok(version)
}

/// Check that a source path is non-empty and, when local, exists.
pub fn validate_source_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(FerryError::validation(
            "source",
            "source path cannot be empty",
        ));
    }
    if is_remote_path(path) {
        return Ok(());
    }

    match std::fs::metadata(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(FerryError::validation(
            "source",
            format!("path does not exist: {path}"),
        )),
        Err(err) => Err(FerryError::validation(
            "source",
            format!("cannot access path: {err}"),
        )),
    }
}

/// Check that a destination path is non-empty and, when local, has an
/// existing parent directory.
pub fn validate_destination_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(FerryError::validation(
            "destination",
            "destination path cannot be empty",
        ));
    }
    if is_remote_path(path) {
        return Ok(());
    }

    let Some(parent) = Path::new(path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent == Path::new(".") {
        return Ok(());
    }

    match std::fs::metadata(parent) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(FerryError::validation(
            "destination",
            format!("parent directory does not exist: {}", parent.display()),
        )),
        Err(err) => Err(FerryError::validation(
            "destination",
            format!("cannot access parent directory: {err}"),
        )),
    }
}

/// Check that a configured remote responds to a shallow listing within
/// `timeout` (zero means the 10s default).
pub async fn validate_remote(remote_name: &str, timeout: Duration) -> Result<()> {
    if remote_name.is_empty() {
        return Err(FerryError::validation(
            "remote",
            "remote name cannot be empty",
        ));
    }

    let name = remote_name.trim_end_matches(':');
    let timeout = if timeout.is_zero() {
        DEFAULT_REMOTE_TIMEOUT
    } else {
        timeout
    };

    let target = format!("{name}:");
    let listing = tokio::time::timeout(
        timeout,
        rclone_stdout(&["lsf", target.as_str(), "--max-depth", "1"]),
    )
    .await;

    match listing {
        Err(_) => Err(FerryError::validation(
            "remote",
            format!("timeout validating remote: {name}"),
        )),
        Ok(Err(err)) => Err(FerryError::validation(
            "remote",
            format!("remote not accessible: {name} ({err})"),
        )),
        Ok(Ok(_)) => Ok(()),
    }
}

/// Check that the filesystem holding `path` has at least `required_bytes`
/// available. Remote destinations are skipped.
pub fn check_disk_space(path: &str, required_bytes: u64) -> Result<()> {
    if is_remote_path(path) {
        return Ok(());
    }

    // Fall back to the nearest existing directory so the check works for
    // destinations that do not exist yet.
    let mut probe = PathBuf::from(path);
    match std::fs::metadata(&probe) {
        Ok(meta) if !meta.is_dir() => {
            if let Some(parent) = probe.parent() {
                probe = parent.to_path_buf();
            }
        }
        Err(_) => {
            if let Some(parent) = probe.parent() {
                probe = parent.to_path_buf();
            }
        }
        Ok(_) => {}
    }
    if probe.as_os_str().is_empty() {
        probe = PathBuf::from(".");
    }

    let available = disk::available_space(&probe)?;
    if available < required_bytes {
        return Err(FerryError::validation(
            "destination",
            format!(
                "insufficient disk space: need {}, have {}",
                HumanBytes(required_bytes),
                HumanBytes(available)
            ),
        ));
    }
    Ok(())
}

/// Whether `dir` contains leftovers of interrupted transfers.
pub fn has_partial_files(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Debug, Deserialize)]
struct SizeReport {
    #[allow(dead_code)]
    count: u64,
    bytes: u64,
}

/// Byte size of a local path or, via `rclone size --json`, a remote one.
pub async fn file_size(path: &str) -> Result<u64> {
    if !is_remote_path(path) {
        return Ok(std::fs::metadata(path)?.len());
    }

    let output = rclone_stdout(&["size", path, "--json"]).await?;
    let report: SizeReport = serde_json::from_str(output.trim())
        .map_err(|err| FerryError::Output(format!("unparseable size report: {err}")))?;
    Ok(report.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify, ErrorKind};
    use tempfile::TempDir;

    #[test]
    fn test_empty_source_rejected() {
        let err = validate_source_path("").unwrap_err();
        assert!(matches!(err, FerryError::Validation { field: "source", .. }));
        assert_eq!(classify(&err).kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn test_remote_source_skipped() {
        assert!(validate_source_path("gdrive:anything/at/all").is_ok());
    }

    #[test]
    fn test_missing_local_source_rejected() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.bin");
        let err = validate_source_path(missing.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_existing_local_source_ok() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("data.bin");
        std::fs::write(&file, b"contents").unwrap();
        assert!(validate_source_path(file.to_str().unwrap()).is_ok());
    }

    #[test]
    fn test_destination_parent_must_exist() {
        let tmp = TempDir::new().unwrap();
        let ok_dest = tmp.path().join("new-file.bin");
        assert!(validate_destination_path(ok_dest.to_str().unwrap()).is_ok());

        let bad_dest = tmp.path().join("no-such-dir").join("file.bin");
        let err = validate_destination_path(bad_dest.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("parent directory does not exist"));
    }

    #[test]
    fn test_bare_relative_destination_ok() {
        assert!(validate_destination_path("file.bin").is_ok());
    }

    #[test]
    fn test_disk_space_small_requirement() {
        let tmp = TempDir::new().unwrap();
        assert!(check_disk_space(tmp.path().to_str().unwrap(), 1).is_ok());
    }

    #[test]
    fn test_disk_space_absurd_requirement() {
        let tmp = TempDir::new().unwrap();
        let err = check_disk_space(tmp.path().to_str().unwrap(), u64::MAX).unwrap_err();
        assert!(err.to_string().contains("insufficient disk space"));
        assert_eq!(classify(&err).kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn test_disk_space_remote_skipped() {
        assert!(check_disk_space("gdrive:backups", u64::MAX).is_ok());
    }

    #[test]
    fn test_partial_files_detected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("done.bin"), b"x").unwrap();
        assert!(!has_partial_files(tmp.path()).unwrap());

        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("nested").join("half.PART"), b"x").unwrap();
        assert!(has_partial_files(tmp.path()).unwrap());
    }

    #[test]
    fn test_partial_files_missing_dir() {
        assert!(!has_partial_files(Path::new("/no/such/dir/anywhere")).unwrap());
    }

    #[tokio::test]
    async fn test_local_file_size() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("sized.bin");
        std::fs::write(&file, vec![0u8; 4096]).unwrap();
        assert_eq!(file_size(file.to_str().unwrap()).await.unwrap(), 4096);
    }

    #[test]
    fn test_size_report_parsing() {
        let report: SizeReport = serde_json::from_str(r#"{"count":3,"bytes":123456}"#).unwrap();
        assert_eq!(report.bytes, 123_456);
    }
}
