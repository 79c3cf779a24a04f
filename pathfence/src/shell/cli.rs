//! # pathfence CLI
//!
//! Command-line definition and dispatch for the `pathfence` binary: an
//! operator tool for checking what the configured policy allows, and for
//! reading or writing files through the guarded adapter.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::{
    ALLOWED_ROOT_DIRECTORY_ENV, DATA_DIR_ENV, GuardConfig, SECURITY_MODE_ENV, SecurityMode,
};
use crate::guarded_fs::GuardedFs;
use crate::policy::{PathPolicy, SymlinkCheck, Verdict};
use crate::utils::logging::init_logging;
use crate::{GuardError, GuardErrorKind};

/// Path confinement checks and guarded file access.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = "pathfence evaluates paths against the configured boundaries.

Boundaries come from flags or the environment:
  ALLOWED_ROOT_DIRECTORY  primary boundary
  DATA_DIR                always-allowed data directory
  SECURITY_MODE           strict (default) | permissive

Examples:
  pathfence --allowed-root /srv/work check /srv/work/a.txt /etc/passwd
  pathfence --allowed-root /srv/work check --real /srv/work/link
  echo hello | pathfence --allowed-root /srv/work write /srv/work/hello.txt"
)]
pub struct Cli {
    /// Primary boundary directory
    #[arg(long, env = ALLOWED_ROOT_DIRECTORY_ENV)]
    pub allowed_root: Option<PathBuf>,

    /// Always-allowed data directory
    #[arg(long, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Security mode: 'strict' or 'permissive' (unknown values mean strict)
    #[arg(long, env = SECURITY_MODE_ENV, default_value = "strict")]
    pub security_mode: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log to stderr instead of file
    #[arg(long)]
    pub log_to_stderr: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print ALLOW or DENY for each path; exits 1 if any path is not allowed
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Resolve symlinks and check the real path
        #[arg(long)]
        real: bool,

        /// With --real, validate missing paths through their nearest existing ancestor
        #[arg(long, requires = "real")]
        allow_missing: bool,
    },
    /// Print a file read through the guarded adapter
    Cat { path: PathBuf },
    /// Write stdin to a file through the guarded adapter
    Write {
        path: PathBuf,

        /// Append instead of truncating
        #[arg(long)]
        append: bool,
    },
    /// List a directory through the guarded adapter
    Ls { path: PathBuf },
}

impl Cli {
    pub fn guard_config(&self) -> GuardConfig {
        let non_empty = |p: &Option<PathBuf>| p.clone().filter(|p| !p.as_os_str().is_empty());
        GuardConfig {
            security_mode: SecurityMode::parse_lenient(&self.security_mode),
            allowed_root_directory: non_empty(&self.allowed_root),
            data_dir: non_empty(&self.data_dir),
            base_dir: None,
        }
    }
}

/// Main entry point for the binary. Returns true when every requested path was
/// allowed.
pub async fn run() -> Result<bool> {
    let cli = Cli::parse();
    let log_level = if cli.debug { "debug" } else { "info" };
    init_logging(log_level, !cli.log_to_stderr)?;

    execute(cli, tokio::io::stdin(), &mut std::io::stdout()).await
}

/// Run a parsed command with explicit input and output.
pub async fn execute<R, W>(cli: Cli, mut input: R, out: &mut W) -> Result<bool>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let policy = Arc::new(PathPolicy::new(&cli.guard_config()));
    let fs = GuardedFs::new(Arc::clone(&policy));

    match cli.command {
        Command::Check {
            paths,
            real,
            allow_missing,
        } => {
            let check = if allow_missing {
                SymlinkCheck::MAY_CREATE
            } else {
                SymlinkCheck::EXISTING
            };
            let mut all_allowed = true;
            for path in &paths {
                let outcome = if real {
                    policy.validate_with_symlink_check(path, check).await
                } else {
                    policy.check(path).and_then(Verdict::into_result)
                };
                all_allowed &= report(out, path, outcome)?;
            }
            Ok(all_allowed)
        }
        Command::Cat { path } => {
            let contents = fs
                .read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            out.write_all(&contents)?;
            Ok(true)
        }
        Command::Write { path, append } => {
            let mut contents = Vec::new();
            input
                .read_to_end(&mut contents)
                .await
                .context("Failed to read stdin")?;
            let result = if append {
                fs.append(&path, &contents).await
            } else {
                fs.write(&path, &contents).await
            };
            result.with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(true)
        }
        Command::Ls { path } => {
            let entries = fs
                .list_dir(&path)
                .await
                .with_context(|| format!("Failed to list {}", path.display()))?;
            for entry in entries {
                writeln!(out, "{}\t{}", entry.kind.as_str(), entry.name)?;
            }
            Ok(true)
        }
    }
}

fn report<W: Write>(
    out: &mut W,
    path: &std::path::Path,
    outcome: crate::Result<PathBuf>,
) -> Result<bool> {
    match outcome {
        Ok(resolved) => {
            writeln!(out, "ALLOW {}", resolved.display())?;
            Ok(true)
        }
        Err(err @ GuardError::PathNotAllowed { .. }) => {
            writeln!(out, "DENY {} ({err})", path.display())?;
            Ok(false)
        }
        Err(err) if err.kind() == GuardErrorKind::InvalidPathArgument => {
            writeln!(out, "INVALID {} ({err})", path.display())?;
            Ok(false)
        }
        Err(err) => {
            writeln!(out, "ERROR {} ({err})", path.display())?;
            Ok(false)
        }
    }
}
