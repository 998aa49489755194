//! tracing-subscriber setup for console and service mode

use crate::config::HostConfig;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging for CLI verbs and foreground runs
///
/// `RUST_LOG` overrides `level`. Output goes to stderr, or to `log_file`.
pub fn init_console_logging(level: tracing::Level, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if let Some(log_file) = log_file {
        let file = std::fs::File::create(log_file)?;
        subscriber.with_writer(file).with_ansi(false).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    Ok(())
}

/// Initialize logging for a run under the service control manager
pub fn init_service_logging(config: &HostConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if let Some(path) = config.log_path() {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path);

        match file {
            Ok(file) => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(file).with_ansi(false))
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("Warning: Failed to open log file: {}", e);
            }
        }
    }

    // Services have no console
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::sink))
        .init();
}
