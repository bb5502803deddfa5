//! Tracing configuration and log routing.
//!
//! Every stage binary logs to stdout with a compact formatter and keeps a durable per-stage log
//! file so that an operator can review a long unattended run afterwards. `LAWPIPE_LOG_DIR`
//! overrides the directory (default `logs/`); `LAWPIPE_LOG_FILE` pins a single file for all
//! stages. The file writer is non‑blocking so per-document events never stall a stage.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and the stage's log file.
///
/// `component` names the log file (`<dir>/<component>.log`). Respects `RUST_LOG` for
/// filtering and defaults to `info`.
pub fn init_tracing(component: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match configure_file_writer(component) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

fn configure_file_writer(component: &str) -> Option<NonBlocking> {
    let target = log_file_target(
        std::env::var("LAWPIPE_LOG_FILE").ok().as_deref(),
        std::env::var("LAWPIPE_LOG_DIR").ok().as_deref(),
        component,
    );

    if let Some(parent) = target.parent().filter(|dir| !dir.as_os_str().is_empty())
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create log directory {}: {err}", parent.display());
        return None;
    }

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&target)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", target.display());
            None
        }
    }
}

fn log_file_target(file: Option<&str>, dir: Option<&str>, component: &str) -> PathBuf {
    if let Some(file) = file.map(str::trim).filter(|value| !value.is_empty()) {
        return PathBuf::from(file);
    }
    let dir = dir
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("logs");
    Path::new(dir).join(format!("{component}.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_log_file_wins() {
        let target = log_file_target(Some("/tmp/all.log"), Some("other"), "lawpipe-clean");
        assert_eq!(target, PathBuf::from("/tmp/all.log"));
    }

    #[test]
    fn component_names_the_file_inside_the_log_dir() {
        assert_eq!(
            log_file_target(None, None, "lawpipe-embed"),
            PathBuf::from("logs/lawpipe-embed.log")
        );
        assert_eq!(
            log_file_target(Some("  "), Some("var/log"), "lawpipe-upload"),
            PathBuf::from("var/log/lawpipe-upload.log")
        );
    }
}
