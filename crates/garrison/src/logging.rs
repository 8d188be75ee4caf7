//! Log subscriber setup for applications embedding the client.
//!
//! Library crates only emit `tracing` events; installing a subscriber
//! is the application's job. These helpers cover the common case so a
//! game frontend gets useful logs with one call in `main`.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::GarrisonError;

/// Where log output goes.
#[derive(Debug, Clone)]
pub enum LogDestination {
    /// Write to standard error.
    Stderr,
    /// Append to the file at this path, creating it if needed.
    File(PathBuf),
}

/// Installs a global subscriber writing to `destination`.
///
/// The filter comes from `RUST_LOG` when set, otherwise `default`
/// (e.g. `"garrison_client=debug,info"`). Returns quietly if a
/// subscriber is already installed, so tests and embedders that set up
/// their own logging are not disturbed.
///
/// # Errors
/// `GarrisonError::Logging` when the log file cannot be opened.
pub fn init_logging(
    default: &str,
    destination: LogDestination,
) -> Result<(), GarrisonError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    match destination {
        LogDestination::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(io::stderr)
                .try_init();
        }
        LogDestination::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(GarrisonError::Logging)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging("info", LogDestination::Stderr).unwrap();
        init_logging("debug", LogDestination::Stderr).unwrap();
    }

    #[test]
    fn test_file_destination_creates_the_file() {
        let path = std::env::temp_dir()
            .join(format!("garrison-log-test-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        init_logging("info", LogDestination::File(path.clone())).unwrap();
        assert!(path.exists());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_file_destination_unwritable_path_fails() {
        let path = std::env::temp_dir()
            .join("garrison-no-such-dir")
            .join("log.txt");
        let result = init_logging("info", LogDestination::File(path));
        assert!(matches!(result, Err(GarrisonError::Logging(_))));
    }
}
