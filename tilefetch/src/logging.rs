//! Logging infrastructure.
//!
//! Structured logging through `tracing`:
//! - Compact stdout output for the CLI
//! - Optional log file (cleared on start) through a non-blocking writer
//! - Filter from `RUST_LOG`, defaulting to `info`

use std::fs;
use std::io;
use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer, if any.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the global subscriber.
///
/// With `log_file` set, the file's directory is created if needed, the file
/// is truncated, and output is written to it as well as to stdout.
///
/// # Errors
///
/// Returns an error if the log directory or file cannot be prepared.
pub fn init_logging(log_file: Option<&Path>) -> Result<LoggingGuard, io::Error> {
    let (subscriber, guard) = build_subscriber(log_file)?;
    subscriber.init();
    Ok(guard)
}

/// Builds the layered subscriber without installing it.
fn build_subscriber(
    log_file: Option<&Path>,
) -> Result<(impl Subscriber + Send + Sync + 'static, LoggingGuard), io::Error> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, file_guard) = match log_file {
        Some(path) => {
            let (non_blocking_file, file_guard) = file_writer(path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false);
            (Some(layer), Some(file_guard))
        }
        None => (None, None),
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    Ok((
        subscriber,
        LoggingGuard {
            _file_guard: file_guard,
        },
    ))
}

/// Prepares `path` (directory created, contents cleared) and returns a
/// non-blocking writer for it.
fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), io::Error> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log path has no file name: {}", path.display()),
        )
    })?;

    fs::create_dir_all(dir)?;
    fs::write(path, "")?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    // init_logging installs a global subscriber; tests scope the built
    // subscriber with with_default instead.

    #[test]
    fn test_file_writer_creates_directory_and_clears_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("logs").join("tilefetch.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "old log data").unwrap();

        let (_writer, _guard) = file_writer(&path).unwrap();

        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_file_writer_rejects_path_without_file_name() {
        let result = file_writer(Path::new("/"));
        assert!(result.is_err());
    }

    #[test]
    fn test_subscriber_writes_to_log_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("logs").join("tilefetch.log");

        let (subscriber, guard) = build_subscriber(Some(&path)).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(tile = "3:1/2", "frame fetch failed");
        });
        // Flushes the non-blocking writer
        drop(guard);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("frame fetch failed"), "log was: {:?}", contents);
        assert!(contents.contains("3:1/2"));
    }

    #[test]
    fn test_subscriber_without_file_has_no_guard() {
        let (subscriber, guard) = build_subscriber(None).unwrap();
        assert!(guard._file_guard.is_none());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("stdout only");
        });
    }
}
