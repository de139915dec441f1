//! Path-string helpers for rclone's `remote:path` convention.

/// True if the path names an rclone remote (contains the `:` marker).
pub fn is_remote_path(path: &str) -> bool {
    path.contains(':')
}

/// Split a remote-qualified path into `(remote, path)`.
///
/// `"gdrive:backups/2026"` becomes `("gdrive", "backups/2026")`. A path
/// with no remote marker comes back with an empty remote name.
pub fn split_remote_path(path: &str) -> (&str, &str) {
    match path.split_once(':') {
        Some((remote, rest)) => (remote, rest),
        None => ("", path),
    }
}

/// Join a remote name and a sub-path back into rclone form. An empty
/// remote yields the bare path.
pub fn join_remote_path(remote: &str, path: &str) -> String {
    if remote.is_empty() {
        path.to_string()
    } else {
        format!("{remote}:{path}")
    }
}
