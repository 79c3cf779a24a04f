//! # pathfence
//!
//! Path confinement for servers that touch the filesystem on behalf of
//! untrusted requests.
//!
//! The crate has two layers:
//!
//! - **[`PathPolicy`]**: decides whether a path lies inside the configured
//!   boundaries (an allowed root directory plus an always-allowed data
//!   directory), with a strict (fail-closed) or permissive (fail-open) mode
//!   for the case where no root is configured.
//! - **[`GuardedFs`]**: the file I/O adapter every other component is meant to
//!   use. Each operation validates its path arguments through the policy first
//!   and then runs against the validated, symlink-resolved path.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pathfence::{GuardConfig, GuardedFs, PathPolicy, SecurityMode};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), pathfence::GuardError> {
//! let config = GuardConfig::default()
//!     .with_security_mode(SecurityMode::Strict)
//!     .with_allowed_root_directory("/srv/workspace")
//!     .with_data_dir("/var/lib/settings");
//! let fs = GuardedFs::new(Arc::new(PathPolicy::new(&config)));
//!
//! fs.write("/srv/workspace/notes.txt", b"hello").await?;
//! assert!(fs.read("/etc/passwd").await.is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Known limitations
//!
//! Validation and the filesystem call are two separate steps. A local process
//! that swaps a directory for a symlink between the two can still win the race
//! (TOCTOU). Running the operation on the resolved real path narrows the window
//! but does not close it; an OS-level sandbox remains the primary boundary.

pub mod config;
pub mod error;
pub mod guarded_fs;
pub mod normalize;
pub mod path_arg;
pub mod policy;
pub mod shell;
pub mod test_utils;
pub mod utils;

pub use config::{GuardConfig, SecurityMode};
pub use error::{DenyReason, GuardError, GuardErrorKind, Result};
pub use guarded_fs::{
    AccessMode, CopyOptions, CreateDirOptions, DirEntryInfo, EntryKind, GuardedFs, RemoveOptions,
};
pub use policy::{Denial, PathPolicy, SymlinkCheck, Verdict, is_path_within_directory};
