use std::path::PathBuf;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::config::ConfigStore;
use crate::error::{FetchError, Result};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: PathBuf,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: true,
            console_enabled: true,
            log_directory: PathBuf::from("logs"),
            max_files: 3,
        }
    }
}

impl LoggingConfig {
    /// Build logging settings from the `logging` tree of the main document.
    pub fn from_config(config: &ConfigStore) -> Self {
        Self {
            level: config.get_str("logging.console_level", "info").to_lowercase(),
            file_enabled: config.get_bool("logging.file_enabled", true),
            console_enabled: config.get_bool("logging.console_enabled", true),
            log_directory: PathBuf::from(config.get_str("logging.log_dir", "logs")),
            max_files: config.get_u64("logging.max_files", 3) as usize,
        }
    }
}

/// Initialize the tracing subscriber with console and rolling-file layers.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers = Vec::new();

    if config.console_enabled {
        layers.push(fmt::layer().with_target(true).with_writer(std::io::stdout).boxed());
    }

    if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory).map_err(|e| {
            FetchError::config(format!(
                "cannot create log directory {}: {e}",
                config.log_directory.display()
            ))
        })?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("socialfetch")
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.log_directory)
            .map_err(|e| FetchError::config(format!("cannot create log appender: {e}")))?;

        layers.push(fmt::layer().with_target(true).with_ansi(false).with_writer(file_appender).boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .init();

    info!("Logging initialized, level: {}", config.level);
    Ok(())
}
