//! Application settings loading from config.toml
//!
//! Every field is optional; a missing file section falls back to the
//! defaults below.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default number of contracts imported concurrently.
pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 5;
/// Default pause between import batches, in milliseconds.
pub const DEFAULT_IMPORT_BATCH_DELAY_MS: u64 = 500;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Database URL; `DATABASE_URL` in the environment overrides it
    pub database_url: Option<String>,
    /// Year shown on the dashboard, defaults to the current year
    pub year: Option<i32>,
    /// Import engine settings
    #[serde(default)]
    pub import: ImportConfig,
}

/// Settings for copying contracts between years
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImportConfig {
    /// Contracts processed concurrently per batch
    pub batch_size: usize,
    /// Pause between batches, in milliseconds
    pub batch_delay_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_IMPORT_BATCH_DELAY_MS,
        }
    }
}

impl ImportConfig {
    /// Pause between batches as a `Duration`
    #[must_use]
    pub const fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Loads the application configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid
/// or the import batch size is zero.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads configuration from ./config.toml, or defaults when the file is absent.
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!("No config.toml found, using defaults");
        Ok(AppConfig::default())
    }
}

fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if config.import.batch_size == 0 {
        return Err(Error::Config {
            message: "import.batch_size must be at least 1".to_string(),
        });
    }

    Ok(config)
}
