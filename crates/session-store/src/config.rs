//! File store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the file-backed session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base path. Records live in `{base_path}/sessions/`.
    pub base_path: PathBuf,

    /// Read-only mode - rejects create/update/delete.
    /// Useful for dashboards that only observe drain progress.
    #[serde(default)]
    pub read_only: bool,
}

impl StoreConfig {
    /// Create a config with a specific base path.
    pub fn with_base_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            read_only: false,
        }
    }

    /// Create a read-only config with a specific base path.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            read_only: true,
        }
    }

    /// Get the sessions directory path.
    pub fn sessions_dir(&self) -> PathBuf {
        self.base_path.join("sessions")
    }
}
