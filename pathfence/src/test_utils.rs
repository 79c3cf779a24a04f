//! Test fixtures shared by unit and integration tests.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::{GuardConfig, SecurityMode};
use crate::guarded_fs::GuardedFs;
use crate::policy::PathPolicy;

/// A temporary tree with `allowed/`, `data/` and `outside/` directories.
///
/// All paths are canonical so assertions can compare against real paths on
/// platforms where the temp dir sits behind a symlink.
#[derive(Debug)]
pub struct SandboxFixture {
    _temp: TempDir,
    pub root: PathBuf,
    pub allowed: PathBuf,
    pub data: PathBuf,
    pub outside: PathBuf,
}

impl SandboxFixture {
    pub fn new() -> io::Result<Self> {
        let temp = TempDir::new()?;
        let root = std::fs::canonicalize(temp.path())?;
        let allowed = root.join("allowed");
        let data = root.join("data");
        let outside = root.join("outside");
        for dir in [&allowed, &data, &outside] {
            std::fs::create_dir(dir)?;
        }
        Ok(Self {
            _temp: temp,
            root,
            allowed,
            data,
            outside,
        })
    }

    /// Root = `allowed/`, data = `data/`.
    pub fn config(&self, mode: SecurityMode) -> GuardConfig {
        GuardConfig::default()
            .with_security_mode(mode)
            .with_allowed_root_directory(&self.allowed)
            .with_data_dir(&self.data)
            .with_base_dir(&self.root)
    }

    pub fn policy(&self, mode: SecurityMode) -> Arc<PathPolicy> {
        Arc::new(PathPolicy::new(&self.config(mode)))
    }

    pub fn guarded_fs(&self, mode: SecurityMode) -> GuardedFs {
        GuardedFs::new(self.policy(mode))
    }

    /// Strict mode with the standard boundaries.
    pub fn strict_fs(&self) -> GuardedFs {
        self.guarded_fs(SecurityMode::Strict)
    }

    /// Write a file, creating parents, bypassing the policy.
    pub fn seed_file(&self, path: impl AsRef<Path>, contents: &str) -> io::Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(path.to_path_buf())
    }

    /// Create a symlink at `link` pointing to `target`.
    #[cfg(unix)]
    pub fn symlink(&self, target: impl AsRef<Path>, link: impl AsRef<Path>) -> io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }
}
