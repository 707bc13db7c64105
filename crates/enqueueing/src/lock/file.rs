//! Locks shared between processes through lock files in a common directory.
//!
//! Each key maps to `{dir}/{digest}.lock`. The file is published with a hard
//! link from a fully written, synced temp file, so publishing never replaces
//! an existing lock. Removal is the only racy step: release and stale reclaim
//! both run under an exclusive `flock` on `{dir}/{digest}.guard`, so the token
//! a remover reads is still the token it deletes. The kernel drops that guard
//! when its process dies.
//!
//! A lock is reclaimed by the next acquirer when its holder process is gone
//! (same host), when its record is older than `stale_after`, or when the file
//! is unreadable and either empty or last modified more than `stale_after` ago.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::NamedLock;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Contents of a lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub hostname: String,
    pub key: String,
    pub acquired_at: DateTime<Utc>,
    pub token: Uuid,
}

impl LockHolder {
    fn current(key: &str) -> Self {
        Self {
            pid: std::process::id(),
            hostname: hostname().to_string(),
            key: key.to_string(),
            acquired_at: Utc::now(),
            token: Uuid::new_v4(),
        }
    }

    /// Only checkable for holders on this host; remote holders count as alive.
    fn is_alive(&self) -> bool {
        if self.hostname != hostname() {
            return true;
        }
        is_pid_alive(self.pid)
    }

    fn is_stale(&self, stale_after: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.acquired_at);
        age.to_std().map(|age| age > stale_after).unwrap_or(false)
    }
}

/// What is currently at a lock path.
enum LockFile {
    Absent,
    Held(LockHolder),
    /// Torn or foreign content, e.g. left by a crash before the data hit disk.
    Unreadable {
        empty: bool,
        age: Duration,
        error: anyhow::Error,
    },
}

#[derive(Debug)]
pub struct FileLocks {
    dir: PathBuf,
    stale_after: Duration,
    poll_interval: Duration,
    owned: Mutex<HashMap<String, Uuid>>,
}

impl FileLocks {
    pub fn new(dir: impl Into<PathBuf>, stale_after: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create lock directory {}", dir.display()))?;
        Ok(Self {
            dir,
            stale_after,
            poll_interval: DEFAULT_POLL_INTERVAL,
            owned: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", digest(key)))
    }

    fn guard_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.guard", digest(key)))
    }

    /// Current holder of `key`, if any. Fails on an unreadable lock file.
    pub fn holder(&self, key: &str) -> Result<Option<LockHolder>> {
        match inspect(&self.lock_path(key))? {
            LockFile::Absent => Ok(None),
            LockFile::Held(holder) => Ok(Some(holder)),
            LockFile::Unreadable { error, .. } => Err(error),
        }
    }

    fn owned(&self) -> Result<MutexGuard<'_, HashMap<String, Uuid>>> {
        self.owned
            .lock()
            .map_err(|e| anyhow!("owned lock table poisoned: {}", e))
    }

    /// Exclusive right to remove `key`'s lock file, held until the file is dropped.
    fn removal_guard(&self, key: &str) -> Result<File> {
        let path = self.guard_path(key);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(file)
    }

    /// One attempt to publish our holder record at `path`.
    fn try_publish(&self, path: &Path, holder: &LockHolder) -> Result<bool> {
        let temp_path = self
            .dir
            .join(format!(".{}.tmp", holder.token.as_simple()));
        let json = serde_json::to_vec_pretty(holder).context("failed to serialize lock holder")?;
        if let Err(e) = write_synced(&temp_path, &json) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        let linked = fs::hard_link(&temp_path, path);
        let _ = fs::remove_file(&temp_path);
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to create {}", path.display())),
        }
    }

    /// Remove the lock at `path` if it is abandoned. Returns whether the path
    /// is free to publish again.
    fn reclaim_if_stale(&self, key: &str, path: &Path) -> Result<bool> {
        let _guard = self.removal_guard(key)?;

        match inspect(path)? {
            LockFile::Absent => return Ok(true),
            LockFile::Held(existing) => {
                let reason = if !existing.is_alive() {
                    "holder process is gone"
                } else if existing.is_stale(self.stale_after) {
                    "holder exceeded stale_after"
                } else {
                    return Ok(false);
                };
                warn!(
                    lock.key = %key,
                    holder.pid = existing.pid,
                    holder.hostname = %existing.hostname,
                    holder.acquired_at = %existing.acquired_at,
                    reason,
                    "reclaiming stale lock"
                );
            }
            LockFile::Unreadable { empty, age, error } => {
                if !empty && age <= self.stale_after {
                    debug!(lock.key = %key, error = %error, "unreadable lock file is still fresh");
                    return Ok(false);
                }
                warn!(lock.key = %key, empty, error = %error, "reclaiming unreadable lock file");
            }
        }

        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e).context("failed to remove stale lock"),
        }
    }

    fn remove_if_owned(&self, key: &str, token: Uuid) -> Result<()> {
        let path = self.lock_path(key);
        let _guard = self.removal_guard(key)?;

        match inspect(&path)? {
            LockFile::Held(holder) if holder.token == token => match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
            },
            LockFile::Held(_) => {
                warn!(lock.key = %key, "lock was reclaimed by another holder before release");
                Ok(())
            }
            LockFile::Unreadable { error, .. } => {
                warn!(lock.key = %key, error = %error, "lock file unreadable at release, leaving it");
                Ok(())
            }
            LockFile::Absent => Ok(()),
        }
    }
}

impl NamedLock for FileLocks {
    fn try_acquire(&self, key: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let path = self.lock_path(key);

        loop {
            let holder = LockHolder::current(key);
            if self.try_publish(&path, &holder)? {
                self.owned()?.insert(key.to_string(), holder.token);
                debug!(lock.key = %key, path = %path.display(), "lock file created");
                return Ok(true);
            }

            if self.reclaim_if_stale(key, &path)? {
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn release(&self, key: &str) -> Result<()> {
        let Some(token) = self.owned()?.get(key).copied() else {
            return Ok(());
        };
        self.remove_if_owned(key, token)?;
        self.owned()?.remove(key);
        Ok(())
    }
}

fn digest(key: &str) -> String {
    let hash = blake3::hash(key.as_bytes());
    hex::encode(&hash.as_bytes()[..16])
}

fn write_synced(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(contents)
        .context("failed to write lock temp file")?;
    file.sync_all().context("failed to sync lock temp file")?;
    Ok(())
}

fn inspect(path: &Path) -> Result<LockFile> {
    let json = match fs::read(path) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LockFile::Absent),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };

    match serde_json::from_slice(&json) {
        Ok(holder) => Ok(LockFile::Held(holder)),
        Err(e) => {
            let age = fs::metadata(path)
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .unwrap_or_default();
            Ok(LockFile::Unreadable {
                empty: json.is_empty(),
                age,
                error: anyhow::Error::new(e)
                    .context(format!("failed to parse lock file {}", path.display())),
            })
        }
    }
}

fn hostname() -> &'static str {
    static HOSTNAME: OnceLock<String> = OnceLock::new();
    HOSTNAME.get_or_init(|| system_hostname().unwrap_or_else(|| "unknown".into()))
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..len]).into_owned();
    (!name.is_empty()).then_some(name)
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

#[cfg(unix)]
fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    // Signal 0 probes for existence without delivering anything.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn is_pid_alive(_pid: u32) -> bool {
    true
}
