//! # Boundary Configuration
//!
//! [`GuardConfig`] is the immutable record a [`crate::PathPolicy`] is built from.
//! It is normally loaded once at startup from the environment:
//!
//! - `ALLOWED_ROOT_DIRECTORY`: the primary boundary (absolute or relative).
//! - `DATA_DIR`: a secondary boundary that is always allowed, meant for the
//!   application's own settings and credentials.
//! - `SECURITY_MODE`: `strict` (default) or `permissive`, case-insensitive.
//!
//! Loading never fails. Empty values mean "not configured" and an unknown
//! security mode falls back to [`SecurityMode::Strict`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable naming the primary boundary.
pub const ALLOWED_ROOT_DIRECTORY_ENV: &str = "ALLOWED_ROOT_DIRECTORY";
/// Environment variable naming the always-allowed data directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
/// Environment variable selecting the security mode.
pub const SECURITY_MODE_ENV: &str = "SECURITY_MODE";

/// How the policy behaves when no allowed root directory is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SecurityMode {
    /// Fail closed: without a root, only the data directory is reachable.
    #[default]
    Strict,
    /// Fail open: without a root, every path is allowed.
    Permissive,
}

impl SecurityMode {
    /// Parse a mode, degrading unknown values to `Strict`.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Unrecognized security mode {:?}, falling back to strict",
                value
            );
            SecurityMode::Strict
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityMode::Strict => "strict",
            SecurityMode::Permissive => "permissive",
        }
    }
}

impl FromStr for SecurityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SecurityMode::Strict),
            "permissive" => Ok(SecurityMode::Permissive),
            other => Err(format!(
                "invalid security mode '{other}' (expected 'strict' or 'permissive')"
            )),
        }
    }
}

impl From<String> for SecurityMode {
    fn from(value: String) -> Self {
        SecurityMode::parse_lenient(&value)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boundary configuration, read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub security_mode: SecurityMode,
    /// Primary sandbox boundary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_root_directory: Option<PathBuf>,
    /// Always-allowed boundary for the application's own data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Directory relative inputs resolve against. Defaults to the process
    /// working directory when the policy is built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

impl GuardConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (the environment, a map in tests, ...).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path_var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        Self {
            security_mode: lookup(SECURITY_MODE_ENV)
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecurityMode::parse_lenient(&v))
                .unwrap_or_default(),
            allowed_root_directory: path_var(ALLOWED_ROOT_DIRECTORY_ENV),
            data_dir: path_var(DATA_DIR_ENV),
            base_dir: None,
        }
    }

    pub fn with_security_mode(mut self, mode: SecurityMode) -> Self {
        self.security_mode = mode;
        self
    }

    pub fn with_allowed_root_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.allowed_root_directory = Some(dir.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}
