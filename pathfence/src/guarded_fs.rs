//! # Guarded Filesystem Adapter
//!
//! [`GuardedFs`] is the only sanctioned way for the rest of the server to touch
//! the filesystem. Every operation validates its path arguments through the
//! shared [`PathPolicy`] and then runs on the path the policy returned, never on
//! the caller's string.
//!
//! Validator per operation:
//!
//! - Reading, listing, stat and access checks need an existing entry and are
//!   checked on the real path ([`SymlinkCheck::EXISTING`]).
//! - Writing, appending and creating directories may create the entry and are
//!   checked through the nearest existing ancestor ([`SymlinkCheck::MAY_CREATE`]).
//! - Copy and rename check the source as existing and the destination as
//!   creatable.
//! - Operations on an entry itself (lstat, readlink, unlink, remove, the
//!   source of a rename) do not follow a final symlink: the link is the
//!   operand, located under its real parent. A link's target must still be
//!   inside a boundary.
//!
//! A validation failure returns before any filesystem call is made.

use serde::Serialize;
use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{GuardError, Result};
use crate::normalize::{normalize_path_lexically, resolve_against};
use crate::policy::{PathPolicy, SymlinkCheck};

/// Options for [`GuardedFs::create_dir`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateDirOptions {
    /// Create missing parents too (`mkdir -p`). Default: false.
    pub recursive: bool,
}

/// Options for [`GuardedFs::remove`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Remove directories and their contents. Default: false.
    pub recursive: bool,
    /// Treat a missing entry as success. Default: false.
    pub force: bool,
}

/// Options for [`GuardedFs::copy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace an existing destination. Default: true.
    pub overwrite: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

/// What [`GuardedFs::access`] checks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessMode {
    #[default]
    Exists,
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
            EntryKind::Symlink => "symlink",
            EntryKind::Other => "other",
        }
    }
}

/// One directory entry returned by [`GuardedFs::list_dir`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntryInfo {
    pub name: String,
    pub kind: EntryKind,
}

/// Filesystem adapter that authorizes every call through a [`PathPolicy`].
#[derive(Debug, Clone)]
pub struct GuardedFs {
    policy: Arc<PathPolicy>,
}

impl GuardedFs {
    pub fn new(policy: Arc<PathPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// Join path segments without validation. Absolute segments are treated
    /// as relative to what precedes them and `.`/`..` are collapsed.
    pub fn join<I, P>(base: impl AsRef<Path>, parts: I) -> PathBuf
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut joined = base.as_ref().to_path_buf();
        for part in parts {
            let relative: PathBuf = part
                .as_ref()
                .components()
                .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
                .collect();
            joined.push(relative);
        }
        normalize_path_lexically(&joined)
    }

    /// Resolve a path to absolute form without validation.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        resolve_against(self.policy.base_dir(), path.as_ref())
    }

    pub async fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let real = self.existing(path.as_ref()).await?;
        Ok(fs::read(real).await?)
    }

    pub async fn read_to_string(&self, path: impl AsRef<Path>) -> Result<String> {
        let real = self.existing(path.as_ref()).await?;
        Ok(fs::read_to_string(real).await?)
    }

    /// Create or truncate a file.
    pub async fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
        let real = self.creatable(path.as_ref()).await?;
        tracing::debug!("write {}", real.display());
        Ok(fs::write(real, contents).await?)
    }

    /// Append to a file, creating it when missing.
    pub async fn append(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
        let real = self.creatable(path.as_ref()).await?;
        tracing::debug!("append {}", real.display());
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(real)
            .await?;
        file.write_all(contents.as_ref()).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn create_dir(
        &self,
        path: impl AsRef<Path>,
        options: CreateDirOptions,
    ) -> Result<()> {
        let real = self.creatable(path.as_ref()).await?;
        if options.recursive {
            fs::create_dir_all(real).await?;
        } else {
            fs::create_dir(real).await?;
        }
        Ok(())
    }

    /// List a directory, sorted by name.
    pub async fn list_dir(&self, path: impl AsRef<Path>) -> Result<Vec<DirEntryInfo>> {
        let real = self.existing(path.as_ref()).await?;
        let mut reader = fs::read_dir(real).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let file_type = entry.file_type().await?;
            let kind = if file_type.is_symlink() {
                EntryKind::Symlink
            } else if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            entries.push(DirEntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Metadata of the entry, following symlinks.
    pub async fn metadata(&self, path: impl AsRef<Path>) -> Result<Metadata> {
        let real = self.existing(path.as_ref()).await?;
        Ok(fs::metadata(real).await?)
    }

    /// Metadata of the entry itself; a final symlink is reported, not followed.
    pub async fn symlink_metadata(&self, path: impl AsRef<Path>) -> Result<Metadata> {
        let location = self.policy.validate_entry(path).await?;
        Ok(fs::symlink_metadata(location).await?)
    }

    pub async fn read_link(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let location = self.policy.validate_entry(path).await?;
        Ok(fs::read_link(location).await?)
    }

    /// Check access for the current process by attempting it: files are
    /// opened (never truncated), directories get a throwaway temp file. The
    /// OS error is returned unchanged.
    pub async fn access(&self, path: impl AsRef<Path>, mode: AccessMode) -> Result<()> {
        let real = self.existing(path.as_ref()).await?;
        match mode {
            AccessMode::Exists => {}
            AccessMode::Read => {
                if fs::metadata(&real).await?.is_dir() {
                    fs::read_dir(&real).await?;
                } else {
                    fs::File::open(&real).await?;
                }
            }
            AccessMode::Write => {
                if fs::metadata(&real).await?.is_dir() {
                    probe_dir_writable(real).await?;
                } else {
                    fs::OpenOptions::new().write(true).open(&real).await?;
                }
            }
        }
        Ok(())
    }

    /// Remove a file or symlink (`unlink`).
    pub async fn remove_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let operand = self.entry_operand(path.as_ref()).await?;
        tracing::debug!("unlink {}", operand.display());
        Ok(fs::remove_file(operand).await?)
    }

    /// Remove an empty directory.
    pub async fn remove_dir(&self, path: impl AsRef<Path>) -> Result<()> {
        let operand = self.entry_operand(path.as_ref()).await?;
        tracing::debug!("rmdir {}", operand.display());
        Ok(fs::remove_dir(operand).await?)
    }

    /// Remove a file, symlink or directory (`rm`, optionally `-r`/`-f`).
    pub async fn remove(&self, path: impl AsRef<Path>, options: RemoveOptions) -> Result<()> {
        let operand = match self.entry_operand(path.as_ref()).await {
            Ok(operand) => operand,
            Err(GuardError::Io(e)) if options.force && e.kind() == io::ErrorKind::NotFound => {
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        tracing::debug!("rm {}", operand.display());

        let meta = fs::symlink_metadata(&operand).await?;
        let result = if meta.is_dir() {
            if options.recursive {
                fs::remove_dir_all(&operand).await
            } else {
                fs::remove_dir(&operand).await
            }
        } else {
            fs::remove_file(&operand).await
        };

        match result {
            Err(e) if options.force && e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => Ok(other?),
        }
    }

    pub async fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let source = self.entry_operand(from.as_ref()).await?;
        self.creatable(to.as_ref()).await?;
        let destination = self.policy.validate_entry(to).await?;
        tracing::debug!("rename {} -> {}", source.display(), destination.display());
        Ok(fs::rename(source, destination).await?)
    }

    /// Copy a file's contents. Returns the number of bytes copied.
    pub async fn copy(
        &self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
        options: CopyOptions,
    ) -> Result<u64> {
        let source = self.existing(from.as_ref()).await?;
        let destination = self.creatable(to.as_ref()).await?;
        if !options.overwrite && fs::try_exists(&destination).await? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", destination.display()),
            )
            .into());
        }
        tracing::debug!("copy {} -> {}", source.display(), destination.display());
        Ok(fs::copy(source, destination).await?)
    }

    async fn existing(&self, path: &Path) -> Result<PathBuf> {
        self.policy
            .validate_with_symlink_check(path, SymlinkCheck::EXISTING)
            .await
    }

    async fn creatable(&self, path: &Path) -> Result<PathBuf> {
        self.policy
            .validate_with_symlink_check(path, SymlinkCheck::MAY_CREATE)
            .await
    }

    /// The entry itself as operand. A final symlink stays unresolved, but its
    /// target must be inside a boundary too.
    async fn entry_operand(&self, path: &Path) -> Result<PathBuf> {
        let location = self.policy.validate_entry(path).await?;
        let meta = fs::symlink_metadata(&location).await?;
        if meta.file_type().is_symlink() {
            self.creatable(path).await?;
        }
        Ok(location)
    }
}

/// Create and drop an unnamed temporary file in `dir`; the OS decides.
async fn probe_dir_writable(dir: PathBuf) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(".pathfence_access")
            .tempfile_in(&dir)
            .map(drop)
    })
    .await
    .map_err(io::Error::other)?
}
