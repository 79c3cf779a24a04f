use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Why the policy rejected a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The resolved path is outside every configured boundary.
    OutsideBoundaries,
    /// Strict mode with no allowed root: only the data directory is reachable.
    NoBoundaryConfigured,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::OutsideBoundaries => f.write_str("outside the allowed directories"),
            DenyReason::NoBoundaryConfigured => {
                f.write_str("no allowed root directory is configured (strict mode)")
            }
        }
    }
}

/// Errors raised by the policy and the guarded filesystem adapter.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error(
        "Path '{}' is not allowed: {reason}{}",
        .path.display(),
        format_real_path(.real_path.as_deref())
    )]
    PathNotAllowed {
        /// The path as the caller supplied it.
        path: PathBuf,
        /// The real path that was rejected, when it differs from the input
        /// (symlink escapes).
        real_path: Option<PathBuf>,
        reason: DenyReason,
    },

    #[error("Invalid path argument: {reason}")]
    InvalidPathArgument { reason: String },

    /// Filesystem error after validation, passed through unchanged.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, GuardError>;

/// Coarse classification of a [`GuardError`] for transport-level mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardErrorKind {
    PathNotAllowed,
    InvalidPathArgument,
    Io(io::ErrorKind),
}

impl GuardError {
    pub(crate) fn not_allowed(
        path: &Path,
        real_path: Option<PathBuf>,
        reason: DenyReason,
    ) -> Self {
        GuardError::PathNotAllowed {
            path: path.to_path_buf(),
            real_path,
            reason,
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        GuardError::InvalidPathArgument {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> GuardErrorKind {
        match self {
            GuardError::PathNotAllowed { .. } => GuardErrorKind::PathNotAllowed,
            GuardError::InvalidPathArgument { .. } => GuardErrorKind::InvalidPathArgument,
            GuardError::Io(e) => GuardErrorKind::Io(e.kind()),
        }
    }

    /// True for containment failures.
    pub fn is_not_allowed(&self) -> bool {
        matches!(self, GuardError::PathNotAllowed { .. })
    }

    /// HTTP status a routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            GuardError::PathNotAllowed { .. } => 403,
            GuardError::InvalidPathArgument { .. } => 400,
            GuardError::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => 404,
                io::ErrorKind::PermissionDenied => 403,
                io::ErrorKind::AlreadyExists => 409,
                io::ErrorKind::InvalidInput => 400,
                _ => 500,
            },
        }
    }
}

fn format_real_path(real_path: Option<&Path>) -> String {
    match real_path {
        Some(real) => format!(" (resolves to '{}')", real.display()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_allowed_message_names_path_and_real_target() {
        let err = GuardError::not_allowed(
            Path::new("/allowed/link"),
            Some(PathBuf::from("/etc/shadow")),
            DenyReason::OutsideBoundaries,
        );
        let msg = err.to_string();
        assert!(msg.contains("/allowed/link"), "got: {msg}");
        assert!(msg.contains("/etc/shadow"), "got: {msg}");
        assert_eq!(err.status_code(), 403);
        assert!(err.is_not_allowed());
    }

    #[test]
    fn not_allowed_without_real_path_has_no_suffix() {
        let err = GuardError::not_allowed(
            Path::new("/etc/passwd"),
            None,
            DenyReason::NoBoundaryConfigured,
        );
        assert_eq!(
            err.to_string(),
            "Path '/etc/passwd' is not allowed: no allowed root directory is configured (strict mode)"
        );
    }

    #[test]
    fn kinds_map_to_distinct_status_codes() {
        let invalid = GuardError::invalid_argument("expected a string");
        assert_eq!(invalid.kind(), GuardErrorKind::InvalidPathArgument);
        assert_eq!(invalid.status_code(), 400);

        let missing = GuardError::from(io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(missing.kind(), GuardErrorKind::Io(io::ErrorKind::NotFound));
        assert_eq!(missing.status_code(), 404);

        let other = GuardError::from(io::Error::other("disk on fire"));
        assert_eq!(other.status_code(), 500);
        assert_eq!(other.to_string(), "disk on fire");
    }
}
