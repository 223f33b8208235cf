//! Tracing setup for the gateway.
//!
//! Everything is logged to stdout in compact form. A second, ANSI-free copy goes to a file
//! chosen by `DOC_GATEWAY_LOG_FILE`: a path appends to that file, `off` disables file output,
//! and an unset variable means `logs/doc-gateway.log`.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "DOC_GATEWAY_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "doc-gateway.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, PartialEq, Eq)]
enum FileTarget {
    Disabled,
    Default,
    Path(PathBuf),
}

impl FileTarget {
    fn from_env_value(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            None | Some("") => Self::Default,
            Some(v) if v.eq_ignore_ascii_case("off") => Self::Disabled,
            Some(v) => Self::Path(PathBuf::from(v)),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` controls filtering and defaults to `info`, with `tower_http` request spans included.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let target = FileTarget::from_env_value(std::env::var(LOG_FILE_ENV).ok());
    match open_file_writer(target) {
        Some(writer) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .compact(),
            )
            .init(),
        None => registry.init(),
    }
}

fn open_file_writer(target: FileTarget) -> Option<NonBlocking> {
    let (writer, guard) = match target {
        FileTarget::Disabled => return None,
        FileTarget::Path(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| eprintln!("Failed to open log file {}: {err}", path.display()))
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        FileTarget::Default => {
            if let Err(err) = std::fs::create_dir_all(DEFAULT_LOG_DIR) {
                eprintln!("Failed to create logs directory: {err}");
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                DEFAULT_LOG_DIR,
                DEFAULT_LOG_FILE,
            ))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}
