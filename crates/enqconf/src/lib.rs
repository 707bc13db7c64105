//! Layered configuration loading for the enqueueing session tools.
//!
//! Imported by the core and the CLI; keeps its own dependencies minimal so
//! nothing here pulls in the storage or locking stacks.
//!
//! # Usage
//!
//! ```rust,no_run
//! use enqconf::EnqConfig;
//!
//! let config = EnqConfig::load().expect("Failed to load config");
//!
//! println!("state dir: {}", config.paths.state_dir.display());
//! println!("lock timeout: {}ms", config.lock.timeout_ms);
//!
//! for (name, entity) in &config.entities {
//!     println!("{name}: indexable={}", entity.indexable);
//! }
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/enqueuer/config.toml` (system)
//! 2. `~/.config/enqueuer/config.toml` (user)
//! 3. `./enqueuer.toml` (local override, replaced by an explicit path)
//! 4. Environment variables (`ENQUEUER_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! state_dir = "~/.local/share/enqueuer"
//!
//! [lock]
//! backend = "file"
//! timeout_ms = 10000
//! stale_after_secs = 300
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = "127.0.0.1:4317"
//!
//! [entities.Customer]
//! indexable = true
//! primary_key = "id"
//!
//! [entities.OrderLine]
//! indexable = true
//! primary_key = "id"
//! composite_key = true
//! uuid_property = "uuid"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use settings::{
    EntitiesConfig, EntityConfig, LockBackend, LockConfig, PathsConfig, TelemetryConfig,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnqConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Which entity types exist and how their ordering cursor is chosen.
    #[serde(default)]
    pub entities: EntitiesConfig,
}

impl EnqConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an explicit file replacing `./enqueuer.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::FileRead {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "config file does not exist",
                    ),
                });
            }
        }

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config = loader::from_table(merged, Path::new("<merged>"))?;
        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Parse a single TOML document on top of the compiled defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let path = Path::new("<inline>");
        let table = loader::parse_table(contents, path)?;
        let config = loader::from_table(table, path)?;
        config.validate()?;
        Ok(config)
    }

    /// Lock acquisition timeout as a `Duration`.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock.timeout_ms)
    }

    /// Age after which a lock file is reclaimed.
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.lock.stale_after_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lock.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "lock.timeout_ms must be greater than zero".to_string(),
            ));
        }
        for (name, entity) in &self.entities {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("empty entity name".to_string()));
            }
            let unkeyed = entity.primary_key.is_none() && entity.uuid_property.is_none();
            if entity.composite_key && unkeyed {
                return Err(ConfigError::Invalid(format!(
                    "entity '{name}' declares a composite key without primary_key or uuid_property"
                )));
            }
        }
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.to_toml_with_sources(&ConfigSources::default())
    }

    /// Serialize config to TOML, listing the files and env vars it came from
    /// as comments under the header.
    pub fn to_toml_with_sources(&self, sources: &ConfigSources) -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialize config: {e}")))?;

        let mut out = String::from("# Enqueuer Configuration\n");
        for file in &sources.files {
            out.push_str(&format!("# file: {}\n", file.display()));
        }
        for var in &sources.env_overrides {
            out.push_str(&format!("# env: {var}\n"));
        }
        out.push('\n');
        out.push_str(&body);
        Ok(out)
    }
}
