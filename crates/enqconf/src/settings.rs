//! Settings sections - paths, locking, telemetry and the entity schema table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Filesystem paths for session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for runtime state (session records, lock files).
    /// Default: ~/.local/share/enqueuer
    #[serde(default = "PathsConfig::default_state_dir")]
    pub state_dir: PathBuf,
}

impl PathsConfig {
    fn default_state_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/enqueuer"))
            .unwrap_or_else(|| PathBuf::from(".local/share/enqueuer"))
    }

    /// Directory holding one JSON document per session.
    pub fn store_dir(&self) -> PathBuf {
        self.state_dir.join("store")
    }

    /// Directory holding lock files for the file lock backend.
    pub fn lock_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: Self::default_state_dir(),
        }
    }
}

/// Which named lock implementation guards session mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// Lock files in `paths.lock_dir()`; excludes across processes.
    #[default]
    File,
    /// In-process only; fine for a single worker process.
    Memory,
}

impl LockBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockBackend::File => "file",
            LockBackend::Memory => "memory",
        }
    }
}

impl std::str::FromStr for LockBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(LockBackend::File),
            "memory" => Ok(LockBackend::Memory),
            other => Err(format!("unknown lock backend: {other}")),
        }
    }
}

/// Lock acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default)]
    pub backend: LockBackend,

    /// Bounded wait for acquiring an entity lock.
    /// Default: 10000
    #[serde(default = "LockConfig::default_timeout_ms")]
    pub timeout_ms: u64,

    /// Lock files older than this are considered abandoned.
    /// Default: 300
    #[serde(default = "LockConfig::default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl LockConfig {
    fn default_timeout_ms() -> u64 {
        10_000
    }

    fn default_stale_after_secs() -> u64 {
        300
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: LockBackend::default(),
            timeout_ms: Self::default_timeout_ms(),
            stale_after_secs: Self::default_stale_after_secs(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint. Logs go to stderr only when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// Log level or `EnvFilter` directive.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_level: Self::default_log_level(),
        }
    }
}

/// Schema facts for one entity type, as written under `[entities.<Name>]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    #[serde(default)]
    pub indexable: bool,

    /// Primary key property name.
    #[serde(default)]
    pub primary_key: Option<String>,

    /// Whether the primary key is an embedded composite id.
    #[serde(default)]
    pub composite_key: bool,

    /// Name of a UUID-typed property, if the entity has one.
    #[serde(default)]
    pub uuid_property: Option<String>,
}

/// Entity schema table keyed by entity name.
pub type EntitiesConfig = BTreeMap<String, EntityConfig>;
