//! FileStore: one JSON document per session on the local filesystem.
//!
//! Layout:
//! ```text
//! {base_path}/
//! └── sessions/
//!     ├── ab/
//!     │   └── cde123....json   # RecordKey of the entity name
//!     └── 12/
//!         └── 3456789....json
//! ```
//!
//! Every write goes to a uniquely named temp file in the same directory and
//! is then renamed over the record, so readers never observe a torn record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::key::RecordKey;
use crate::session::Session;
use crate::store::{SessionFilter, SessionStore};

const TEMP_SUFFIX: &str = "tmp";

/// Filesystem-based session store.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: StoreConfig,
}

impl FileStore {
    /// Create a new FileStore with the given configuration.
    ///
    /// Creates the sessions directory unless in read-only mode.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if !config.read_only {
            fs::create_dir_all(config.sessions_dir())
                .context("failed to create sessions directory")?;
        }

        Ok(Self { config })
    }

    /// Create a FileStore at a specific path.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(StoreConfig::with_base_path(path))
    }

    /// Create a read-only FileStore at a specific path.
    pub fn read_only_at(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(StoreConfig::read_only(path))
    }

    /// Path where an entity's record is (or would be) stored.
    pub fn record_path(&self, entity_name: &str) -> PathBuf {
        let key = RecordKey::for_entity(entity_name);
        self.config
            .sessions_dir()
            .join(key.prefix())
            .join(format!("{}.json", key.remainder()))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.read_only {
            bail!("session store is in read-only mode");
        }
        Ok(())
    }

    fn read_record(path: &Path) -> Result<Option<Session>> {
        let json = match fs::read(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let session = serde_json::from_slice(&json)
            .with_context(|| format!("failed to parse session record {}", path.display()))?;
        Ok(Some(session))
    }

    fn write_record(&self, session: &Session) -> Result<()> {
        let path = self.record_path(&session.entity_name);
        let parent = path
            .parent()
            .context("session record path has no parent directory")?;
        fs::create_dir_all(parent).context("failed to create record prefix directory")?;

        let json = serde_json::to_vec_pretty(session).context("failed to serialize session")?;

        let temp_path = parent.join(format!(
            ".{}.{}.{}",
            RecordKey::for_entity(&session.entity_name).remainder(),
            Uuid::new_v4().as_simple(),
            TEMP_SUFFIX
        ));
        fs::write(&temp_path, json).context("failed to write session temp file")?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e).context("failed to move session record into place");
        }

        debug!(entity = %session.entity_name, path = %path.display(), "session record written");
        Ok(())
    }

    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let sessions_dir = self.config.sessions_dir();
        let shards = match fs::read_dir(&sessions_dir) {
            Ok(shards) => shards,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e).context("failed to list sessions directory"),
        };

        for shard in shards {
            let shard = shard.context("failed to read sessions directory entry")?;
            if !shard.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            for entry in fs::read_dir(shard.path()).context("failed to list shard directory")? {
                let path = entry.context("failed to read shard entry")?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    files.push(path);
                }
            }
        }

        Ok(files)
    }
}

impl SessionStore for FileStore {
    fn get(&self, entity_name: &str) -> Result<Option<Session>> {
        let path = self.record_path(entity_name);
        match Self::read_record(&path)? {
            Some(session) if session.entity_name == entity_name => Ok(Some(session)),
            Some(session) => bail!(
                "record {} belongs to '{}', expected '{}'",
                path.display(),
                session.entity_name,
                entity_name
            ),
            None => Ok(None),
        }
    }

    fn create(&self, session: &Session) -> Result<()> {
        self.ensure_writable()?;
        if self.record_path(&session.entity_name).exists() {
            bail!("session already exists for entity '{}'", session.entity_name);
        }
        self.write_record(session)
    }

    fn update(&self, session: &Session) -> Result<()> {
        self.ensure_writable()?;
        if !self.record_path(&session.entity_name).exists() {
            bail!("no session for entity '{}'", session.entity_name);
        }
        self.write_record(session)
    }

    fn delete(&self, session: &Session) -> Result<bool> {
        self.ensure_writable()?;
        let path = self.record_path(&session.entity_name);
        match Self::read_record(&path)? {
            Some(existing) if existing.is_same_record(session) => {
                match fs::remove_file(&path) {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(e).context("failed to remove session record"),
                }
            }
            _ => Ok(false),
        }
    }

    fn scan(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for path in self.record_files()? {
            // A record can vanish between listing and reading; that is a delete, not an error.
            match Self::read_record(&path) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session record"),
            }
        }
        Ok(filter.apply(sessions))
    }
}
