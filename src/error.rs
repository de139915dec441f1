//! Error types for ferry operations, plus best-effort classification of
//! rclone failures into a retryable/temporary taxonomy.

use std::fmt;
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T, E = FerryError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum FerryError {
    /// Pre-flight validation failure. Checked structurally by the
    /// classifier, never by substring matching.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero rclone exit. `detail` carries the tail of rclone's own
    /// diagnostic output so classification can see the real failure text.
    #[error("rclone exited with {status}: {detail}")]
    Rclone { status: ExitStatus, detail: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("cancelled after {attempts} attempts: {source}")]
    CancelledAfter {
        attempts: u32,
        #[source]
        source: Box<FerryError>,
    },

    #[error("failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FerryError>,
    },

    #[error("unexpected rclone output: {0}")]
    Output(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FerryError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        FerryError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Error taxonomy for classified failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Timeout,
    Auth,
    NotFound,
    FileSystem,
    InvalidInput,
    InsufficientSpace,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::FileSystem => "filesystem",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InsufficientSpace => "insufficient_space",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification verdict. Produced on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub kind: ErrorKind,
    pub retryable: bool,
    pub temporary: bool,
}

impl Classified {
    const fn of(kind: ErrorKind, retryable: bool, temporary: bool) -> Self {
        Classified {
            kind,
            retryable,
            temporary,
        }
    }
}

// Keyword tables for free-text matching, checked in this order. rclone
// reports failures only through exit codes and diagnostic text, so
// everything past the structural Validation check is heuristic.
const NETWORK_KEYWORDS: &[&str] = &[
    "network",
    "connection",
    "dial",
    "no route to host",
    "host is down",
];
const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "deadline exceeded", "i/o timeout"];
const AUTH_KEYWORDS: &[&str] = &[
    "auth",
    "unauthorized",
    "forbidden",
    "permission denied",
    "access denied",
];
const NOT_FOUND_KEYWORDS: &[&str] = &["not found", "no such file", "does not exist", "404"];
const SPACE_KEYWORDS: &[&str] = &[
    "no space left",
    "insufficient space",
    "disk full",
    "quota exceeded",
];
const FILESYSTEM_KEYWORDS: &[&str] = &["filesystem", "i/o error", "read-only"];

/// Walks retry/cancellation wrappers looking for a structural validation
/// failure, the one case classified without text inspection.
fn wraps_validation(err: &FerryError) -> bool {
    match err {
        FerryError::Validation { .. } => true,
        FerryError::CancelledAfter { source, .. }
        | FerryError::RetriesExhausted { source, .. } => wraps_validation(source),
        _ => false,
    }
}

/// Classify an error into the taxonomy.
///
/// Unrecognized errors are marked retryable so unrecognized transient
/// conditions are not permanently given up on. They are not marked
/// temporary.
pub fn classify(err: &FerryError) -> Classified {
    if wraps_validation(err) {
        return Classified::of(ErrorKind::InvalidInput, false, false);
    }

    let text = err.to_string().to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    if matches(NETWORK_KEYWORDS) {
        Classified::of(ErrorKind::Network, true, true)
    } else if matches(TIMEOUT_KEYWORDS) {
        Classified::of(ErrorKind::Timeout, true, true)
    } else if matches(AUTH_KEYWORDS) {
        Classified::of(ErrorKind::Auth, false, false)
    } else if matches(NOT_FOUND_KEYWORDS) {
        Classified::of(ErrorKind::NotFound, false, false)
    } else if matches(SPACE_KEYWORDS) {
        Classified::of(ErrorKind::InsufficientSpace, false, false)
    } else if matches(FILESYSTEM_KEYWORDS) {
        Classified::of(ErrorKind::FileSystem, false, false)
    } else {
        Classified::of(ErrorKind::Unknown, true, false)
    }
}

pub fn is_retryable(err: &FerryError) -> bool {
    classify(err).retryable
}

pub fn is_temporary(err: &FerryError) -> bool {
    classify(err).temporary
}

pub fn kind_of(err: &FerryError) -> ErrorKind {
    classify(err).kind
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(msg: &str) -> FerryError {
        FerryError::Output(msg.to_string())
    }

    #[test]
    fn test_validation_is_invalid_input() {
        let err = FerryError::validation("source", "path does not exist: /nope");
        let c = classify(&err);
        assert_eq!(c.kind, ErrorKind::InvalidInput);
        assert!(!c.retryable);
        assert!(!c.temporary);
    }

    #[test]
    fn test_validation_beats_keywords() {
        // Message contains "timeout" but the structural check wins.
        let err = FerryError::validation("remote", "timeout validating remote: gdrive");
        assert_eq!(classify(&err).kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn test_wrapped_validation_is_invalid_input() {
        let err = FerryError::RetriesExhausted {
            attempts: 3,
            source: Box::new(FerryError::validation("source", "empty")),
        };
        assert_eq!(classify(&err).kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn test_network_errors() {
        for msg in ["connection reset by peer", "no route to host", "dial tcp"] {
            let c = classify(&output(msg));
            assert_eq!(c.kind, ErrorKind::Network, "msg: {msg}");
            assert!(c.retryable);
            assert!(c.temporary);
        }
    }

    #[test]
    fn test_timeout_errors() {
        let c = classify(&output("context deadline exceeded"));
        assert_eq!(c.kind, ErrorKind::Timeout);
        assert!(c.retryable);
        assert!(c.temporary);
    }

    #[test]
    fn test_auth_errors() {
        for msg in ["401 unauthorized", "permission denied", "access denied"] {
            let c = classify(&output(msg));
            assert_eq!(c.kind, ErrorKind::Auth, "msg: {msg}");
            assert!(!c.retryable);
        }
    }

    #[test]
    fn test_not_found_errors() {
        let c = classify(&output("directory does not exist"));
        assert_eq!(c.kind, ErrorKind::NotFound);
        assert!(!c.retryable);
    }

    #[test]
    fn test_space_errors() {
        let c = classify(&output("write failed: no space left on device"));
        assert_eq!(c.kind, ErrorKind::InsufficientSpace);
        assert!(!c.retryable);
    }

    #[test]
    fn test_filesystem_errors() {
        let c = classify(&output("read-only file system"));
        assert_eq!(c.kind, ErrorKind::FileSystem);
        assert!(!c.retryable);
    }

    #[test]
    fn test_priority_network_before_auth() {
        // Both a network keyword and an auth keyword present: the network
        // table is checked first, so Network wins.
        let c = classify(&output("connection refused: permission denied"));
        assert_eq!(c.kind, ErrorKind::Network);
        assert!(c.retryable);
    }

    #[test]
    fn test_unknown_is_retryable_not_temporary() {
        let c = classify(&output("something inexplicable happened"));
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(c.retryable);
        assert!(!c.temporary);
    }

    #[test]
    fn test_retries_exhausted_display_names_attempts() {
        let err = FerryError::RetriesExhausted {
            attempts: 3,
            source: Box::new(output("connection reset")),
        };
        let text = err.to_string();
        assert!(text.contains("failed after 3 attempts"), "got: {text}");
        assert!(text.contains("connection reset"), "got: {text}");
        // The inner text stays inspectable through the wrapper.
        assert_eq!(classify(&err).kind, ErrorKind::Network);
    }

    #[test]
    fn test_predicates() {
        assert!(is_retryable(&output("connection lost")));
        assert!(is_temporary(&output("i/o timeout")));
        assert!(!is_retryable(&output("quota exceeded")));
        assert_eq!(kind_of(&output("404")), ErrorKind::NotFound);
    }
}
