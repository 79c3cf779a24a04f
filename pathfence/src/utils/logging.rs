//! # Logging Initialization
//!
//! Sets up the `tracing` subscriber used by the `pathfence` binary and by
//! tests. Call [`init_logging`] once at the start of `main`; later calls are
//! no-ops.
//!
//! - **Filter**: `RUST_LOG` when set, otherwise `<log_level>,pathfence=debug`.
//! - **File logging** (`log_to_file = true`): a daily rolling file in the user
//!   cache directory (via `directories`), written through a non-blocking
//!   `tracing_appender` writer without ANSI colors.
//! - **Stderr logging**: used when requested, or as a fallback when the cache
//!   directory cannot be determined or is not writable.
//!
//! The policy's audit lines (initialization summary, mode warnings, detected
//! symlinks) go through the same subscriber.

use anyhow::Result;
use directories::ProjectDirs;
use std::{io::stderr, path::Path, sync::Once};
use tracing_subscriber::{EnvFilter, fmt::layer, prelude::*};

static INIT: Once = Once::new();

/// Initialize verbose logging for tests (`trace`, stderr).
pub fn init_test_logging() {
    init_logging("trace", false).expect("Failed to initialize test logging");
}

/// Initializes the global tracing subscriber.
pub fn init_logging(log_level: &str, log_to_file: bool) -> Result<()> {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},pathfence=debug")));

        if log_to_file
            && let Some(proj_dirs) = ProjectDirs::from("com", "PathFence", "pathfence")
        {
            let log_dir = proj_dirs.cache_dir();

            // tracing_appender::rolling::daily panics on permission errors,
            // so probe the directory first.
            if test_write_permission(log_dir) {
                let file_appender = tracing_appender::rolling::daily(log_dir, "pathfence.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                let initialized = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer().with_writer(non_blocking).with_ansi(false))
                    .try_init()
                    .is_ok();
                if initialized {
                    // Leaked so buffered lines are flushed for the whole process lifetime.
                    Box::leak(Box::new(guard));
                }
                return;
            }
        }

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(layer().with_writer(stderr).with_ansi(true))
            .try_init();
    });

    Ok(())
}

/// Create `dir` if needed and check that a file can be written in it.
fn test_write_permission(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }

    let probe = dir.join(".pathfence_log_test");
    match std::fs::write(&probe, "test") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}
