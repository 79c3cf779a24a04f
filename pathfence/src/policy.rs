//! Path policy: decides whether a path lies inside the configured boundaries.
//!
//! A path is allowed iff it is inside the data directory, or inside the
//! allowed root directory, or no root is configured and the mode is
//! permissive. Boundaries are inclusive and are resolved once when the policy
//! is built; only candidates are resolved per call.
//!
//! ## Security
//! [`PathPolicy::validate`] is lexical only. Anything that touches an existing
//! entry must go through [`PathPolicy::validate_with_symlink_check`], which
//! evaluates containment on the real path so a symlink inside the root cannot
//! point the caller outside it.

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::config::{GuardConfig, SecurityMode};
use crate::error::{DenyReason, GuardError, Result};
use crate::normalize::resolve_against;

/// Upper bound on dangling symlinks followed while resolving a path that does
/// not exist yet (matches the usual kernel `ELOOP` limit).
const MAX_SYMLINK_HOPS: usize = 40;

/// Options for [`PathPolicy::validate_with_symlink_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymlinkCheck {
    /// When false, a missing entry is validated through its nearest existing
    /// ancestor instead of failing with not-found.
    pub require_exists: bool,
}

impl SymlinkCheck {
    /// The entry must exist (read, list, stat, remove).
    pub const EXISTING: Self = Self {
        require_exists: true,
    };
    /// The entry may be created by the operation (write, append, mkdir).
    pub const MAY_CREATE: Self = Self {
        require_exists: false,
    };
}

impl Default for SymlinkCheck {
    fn default() -> Self {
        Self::EXISTING
    }
}

/// Outcome of a policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The resolved absolute path is inside a boundary.
    Allowed(PathBuf),
    Denied(Denial),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// Path as supplied by the caller.
    pub path: PathBuf,
    /// Absolute, dot-free form that was evaluated.
    pub resolved: PathBuf,
    pub reason: DenyReason,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed(_))
    }

    pub fn into_result(self) -> Result<PathBuf> {
        match self {
            Verdict::Allowed(path) => Ok(path),
            Verdict::Denied(denial) => Err(GuardError::not_allowed(
                &denial.path,
                None,
                denial.reason,
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Boundary {
    resolved: PathBuf,
    /// Real path of the boundary when it differs from `resolved` (the
    /// boundary sits below a symlinked directory).
    real: Option<PathBuf>,
}

impl Boundary {
    fn new(base: &Path, raw: &Path) -> Option<Self> {
        if raw.as_os_str().is_empty() || contains_nul(raw) {
            return None;
        }
        let resolved = resolve_against(base, raw);
        let real = std::fs::canonicalize(&resolved)
            .ok()
            .filter(|real| real != &resolved);
        Some(Self { resolved, real })
    }

    fn contains(&self, candidate: &Path) -> bool {
        is_path_within_directory(candidate, &self.resolved)
            || self
                .real
                .as_deref()
                .is_some_and(|real| is_path_within_directory(candidate, real))
    }
}

/// Immutable boundary policy. Build once with [`PathPolicy::new`] and share
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    mode: SecurityMode,
    allowed_root: Option<Boundary>,
    data_dir: Option<Boundary>,
    base_dir: PathBuf,
}

impl PathPolicy {
    /// Build the policy from configuration. Never fails: missing or unusable
    /// boundaries are treated as not configured.
    pub fn new(config: &GuardConfig) -> Self {
        let base_dir = resolve_base_dir(config.base_dir.as_deref());
        let allowed_root = config
            .allowed_root_directory
            .as_deref()
            .and_then(|raw| Boundary::new(&base_dir, raw));
        let data_dir = config
            .data_dir
            .as_deref()
            .and_then(|raw| Boundary::new(&base_dir, raw));

        let policy = Self {
            mode: config.security_mode,
            allowed_root,
            data_dir,
            base_dir,
        };
        policy.log_summary();
        policy
    }

    fn log_summary(&self) {
        tracing::info!(
            "Path policy initialized: mode={}, allowed_root={:?}, data_dir={:?}",
            self.mode,
            self.allowed_root(),
            self.data_dir()
        );

        match (self.mode, &self.allowed_root) {
            (SecurityMode::Strict, None) => tracing::warn!(
                "Strict security mode without ALLOWED_ROOT_DIRECTORY: \
                 file operations outside DATA_DIR will be denied"
            ),
            (SecurityMode::Permissive, None) => tracing::warn!(
                "Permissive security mode without ALLOWED_ROOT_DIRECTORY: \
                 all file paths are allowed (reduced security)"
            ),
            (SecurityMode::Permissive, Some(_)) => tracing::warn!(
                "Permissive security mode selected (reduced security); \
                 ALLOWED_ROOT_DIRECTORY still applies"
            ),
            (SecurityMode::Strict, Some(_)) => {}
        }
    }

    pub fn mode(&self) -> SecurityMode {
        self.mode
    }

    pub fn allowed_root(&self) -> Option<&Path> {
        self.allowed_root.as_ref().map(|b| b.resolved.as_path())
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_ref().map(|b| b.resolved.as_path())
    }

    /// Directory relative candidates resolve against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Lexically resolve a candidate to absolute form. Rejects empty input and
    /// embedded NUL bytes.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(GuardError::invalid_argument("path must not be empty"));
        }
        if contains_nul(path) {
            return Err(GuardError::invalid_argument(format!(
                "path {:?} contains a NUL byte",
                path
            )));
        }
        Ok(resolve_against(&self.base_dir, path))
    }

    /// Decide on a candidate. Only malformed input is an error.
    pub fn check(&self, path: impl AsRef<Path>) -> Result<Verdict> {
        let path = path.as_ref();
        let resolved = self.resolve(path)?;
        Ok(self.check_resolved(path, resolved))
    }

    /// Lexical containment check. Never fails; malformed input is denied.
    pub fn is_allowed(&self, path: impl AsRef<Path>) -> bool {
        self.check(path).is_ok_and(|verdict| verdict.is_allowed())
    }

    /// Fast validator for paths where symlinks are irrelevant (e.g. building
    /// a brand-new path). Returns the resolved absolute path.
    pub fn validate(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        self.check(path)?.into_result()
    }

    /// Validate against the real path, following every symlink.
    ///
    /// For a missing entry with `require_exists = false`, the nearest existing
    /// ancestor is resolved and the would-be path is rebuilt beneath it, so a
    /// new file cannot be created through a symlinked parent. Returns the path
    /// the operation should use.
    pub async fn validate_with_symlink_check(
        &self,
        path: impl AsRef<Path>,
        check: SymlinkCheck,
    ) -> Result<PathBuf> {
        let path = path.as_ref();
        let resolved = self.resolve(path)?;

        let is_symlink = match fs::symlink_metadata(&resolved).await {
            Ok(meta) => meta.file_type().is_symlink(),
            Err(e) if e.kind() == io::ErrorKind::NotFound && !check.require_exists => false,
            Err(e) => return Err(self.conceal_outside(path, &resolved, e).await),
        };

        let real = if check.require_exists {
            fs::canonicalize(&resolved).await
        } else {
            self.resolve_for_create(&resolved).await
        };
        let real = match real {
            Ok(real) => real,
            Err(e) => return Err(self.conceal_outside(path, &resolved, e).await),
        };

        if is_symlink {
            tracing::info!(
                "Symlink detected: {} -> {}",
                resolved.display(),
                real.display()
            );
        }

        self.ensure_allowed(path, &resolved, real)
    }

    /// Validate the location of an entry without following its final
    /// component: the parent is resolved to its real path, the name is kept.
    ///
    /// Used by operations that act on a symlink itself (lstat, readlink,
    /// unlinking or moving the link). Containment is decided on the real
    /// parent, which is never looser than the nominal path.
    pub async fn validate_entry(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let resolved = self.resolve(path)?;

        let (Some(parent), Some(name)) = (resolved.parent(), resolved.file_name()) else {
            return self.ensure_allowed(path, &resolved, resolved.clone());
        };
        let real_parent = match self.resolve_for_create(parent).await {
            Ok(real_parent) => real_parent,
            Err(e) => return Err(self.conceal_outside(path, &resolved, e).await),
        };

        self.ensure_allowed(path, &resolved, real_parent.join(name))
    }

    fn check_resolved(&self, path: &Path, resolved: PathBuf) -> Verdict {
        match self.decide(&resolved) {
            Ok(()) => Verdict::Allowed(resolved),
            Err(reason) => Verdict::Denied(Denial {
                path: path.to_path_buf(),
                resolved,
                reason,
            }),
        }
    }

    fn decide(&self, resolved: &Path) -> std::result::Result<(), DenyReason> {
        if self
            .data_dir
            .as_ref()
            .is_some_and(|data| data.contains(resolved))
        {
            return Ok(());
        }

        match (&self.allowed_root, self.mode) {
            (Some(root), _) if root.contains(resolved) => Ok(()),
            (Some(_), _) => Err(DenyReason::OutsideBoundaries),
            (None, SecurityMode::Permissive) => Ok(()),
            (None, SecurityMode::Strict) => Err(DenyReason::NoBoundaryConfigured),
        }
    }

    fn ensure_allowed(&self, path: &Path, resolved: &Path, real: PathBuf) -> Result<PathBuf> {
        match self.decide(&real) {
            Ok(()) => Ok(real),
            Err(reason) => {
                tracing::debug!(
                    "Path denied: {} (real path {}): {}",
                    path.display(),
                    real.display(),
                    reason
                );
                let real_path = (real != resolved).then_some(real);
                Err(GuardError::not_allowed(path, real_path, reason))
            }
        }
    }

    /// Turn a filesystem error into a denial when the path would have been
    /// rejected anyway, so errors do not disclose what exists outside the
    /// boundaries.
    async fn conceal_outside(&self, path: &Path, resolved: &Path, err: io::Error) -> GuardError {
        let would_be = match self.resolve_for_create(resolved).await {
            Ok(would_be) => would_be,
            Err(_) => resolved.to_path_buf(),
        };
        match self.ensure_allowed(path, resolved, would_be) {
            Ok(_) => GuardError::Io(err),
            Err(denied) => denied,
        }
    }

    /// Resolve a possibly missing path through its nearest existing ancestor.
    ///
    /// Walks the path one component at a time from the root, the way the
    /// kernel does: every symlink is followed from its real parent, `..` steps
    /// back from the real directory reached so far, and whatever remains
    /// after the first missing component is appended unchanged. The returned
    /// path is the location the kernel would actually create.
    async fn resolve_for_create(&self, resolved: &Path) -> io::Result<PathBuf> {
        match fs::canonicalize(resolved).await {
            Ok(real) => return Ok(real),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let mut pending = Vec::new();
        push_steps(&mut pending, resolved);
        let mut current = PathBuf::new();
        let mut missing = false;
        let mut hops = 0;

        while let Some(step) = pending.pop() {
            match step {
                Step::Root(root) => current = root,
                Step::Parent if missing => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("no existing ancestor for {}", resolved.display()),
                    ));
                }
                Step::Parent => {
                    current.pop();
                }
                Step::Name(name) => {
                    let candidate = current.join(&name);
                    if missing {
                        current = candidate;
                        continue;
                    }
                    match fs::symlink_metadata(&candidate).await {
                        Ok(meta) if meta.file_type().is_symlink() => {
                            hops += 1;
                            if hops > MAX_SYMLINK_HOPS {
                                return Err(io::Error::other(format!(
                                    "too many levels of symbolic links resolving {}",
                                    resolved.display()
                                )));
                            }
                            let target = fs::read_link(&candidate).await?;
                            tracing::debug!(
                                "Following symlink {} -> {} from {}",
                                candidate.display(),
                                target.display(),
                                current.display()
                            );
                            push_steps(&mut pending, &target);
                        }
                        Ok(_) => current = candidate,
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            missing = true;
                            current = candidate;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Ok(current)
    }
}

/// One unresolved component in [`PathPolicy::resolve_for_create`].
enum Step {
    /// Restart from a root (absolute input or absolute symlink target).
    Root(PathBuf),
    Parent,
    Name(OsString),
}

/// Queue the components of `path` so they pop in order. A relative symlink
/// target therefore continues from the directory holding the link.
fn push_steps(pending: &mut Vec<Step>, path: &Path) {
    let mut root = PathBuf::new();
    let mut steps = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => root.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => steps.push(Step::Parent),
            Component::Normal(name) => steps.push(Step::Name(name.to_os_string())),
        }
    }
    pending.extend(steps.into_iter().rev());
    if !root.as_os_str().is_empty() {
        pending.push(Step::Root(root));
    }
}

/// Containment primitive: true iff `candidate` is `boundary` or a descendant.
///
/// Both arguments are expected in resolved form. The comparison is
/// component-wise, so `/allowed2` is not inside `/allowed`, and any `..` left
/// in the relative remainder is rejected.
pub fn is_path_within_directory(candidate: &Path, boundary: &Path) -> bool {
    match candidate.strip_prefix(boundary) {
        Ok(relative) => {
            !relative.is_absolute()
                && relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        }
        Err(_) => false,
    }
}

fn contains_nul(path: &Path) -> bool {
    path.as_os_str().as_encoded_bytes().contains(&0)
}

fn resolve_base_dir(configured: Option<&Path>) -> PathBuf {
    let cwd = || match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            tracing::warn!(
                "Cannot read current directory ({e}); resolving relative paths against '/'"
            );
            PathBuf::from("/")
        }
    };

    match configured {
        Some(base) if base.is_absolute() => resolve_against(base, Path::new(".")),
        Some(base) => resolve_against(&cwd(), base),
        None => cwd(),
    }
}
