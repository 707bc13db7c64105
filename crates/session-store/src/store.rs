//! SessionStore trait and the in-memory backend.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};

use crate::session::{Session, SessionAction};

/// Trait for session storage backends.
///
/// Single-record writes must be atomic. Callers serialize mutations per
/// entity (the session manager holds the entity lock around every write), so
/// backends need not guard against concurrent writers of the same record.
pub trait SessionStore: Send + Sync {
    /// Point lookup by entity name.
    fn get(&self, entity_name: &str) -> Result<Option<Session>>;

    /// Insert a new record. Fails if the entity already has one.
    fn create(&self, session: &Session) -> Result<()>;

    /// Overwrite an existing record. Fails if the entity has none.
    fn update(&self, session: &Session) -> Result<()>;

    /// Delete the record with this identity.
    ///
    /// Returns `Ok(false)` if no record with the same `id` exists.
    fn delete(&self, session: &Session) -> Result<bool>;

    /// Records matching `filter`, oldest `created_date` first.
    fn scan(&self, filter: &SessionFilter) -> Result<Vec<Session>>;

    /// Oldest record matching `filter`.
    fn first(&self, filter: &SessionFilter) -> Result<Option<Session>> {
        Ok(self.scan(&filter.clone().with_limit(1))?.into_iter().next())
    }
}

/// Ordered-scan filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    /// Drop records in this state.
    pub exclude_action: Option<SessionAction>,
    /// Keep at most this many records.
    pub limit: Option<usize>,
}

impl SessionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Builder: exclude one action.
    pub fn excluding(mut self, action: SessionAction) -> Self {
        self.exclude_action = Some(action);
        self
    }

    /// Builder: cap the result size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, session: &Session) -> bool {
        self.exclude_action != Some(session.action)
    }

    /// Filter, sort by `created_date` (entity name breaks ties) and truncate.
    pub fn apply(&self, sessions: impl IntoIterator<Item = Session>) -> Vec<Session> {
        let mut selected: Vec<Session> = sessions.into_iter().filter(|s| self.matches(s)).collect();
        selected.sort_by(|a, b| {
            a.created_date
                .cmp(&b.created_date)
                .then_with(|| a.entity_name.cmp(&b.entity_name))
        });
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// In-memory session store (HashMap-backed).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let map = sessions
            .into_iter()
            .map(|s| (s.entity_name.clone(), s))
            .collect();
        Self {
            sessions: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("session store lock poisoned")
}

impl SessionStore for InMemoryStore {
    fn get(&self, entity_name: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(entity_name).cloned())
    }

    fn create(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        if sessions.contains_key(&session.entity_name) {
            bail!("session already exists for entity '{}'", session.entity_name);
        }
        sessions.insert(session.entity_name.clone(), session.clone());
        Ok(())
    }

    fn update(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        match sessions.get_mut(&session.entity_name) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => bail!("no session for entity '{}'", session.entity_name),
        }
    }

    fn delete(&self, session: &Session) -> Result<bool> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        match sessions.get(&session.entity_name) {
            Some(existing) if existing.id == session.id => {
                sessions.remove(&session.entity_name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn scan(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(filter.apply(sessions.values().cloned()))
    }
}
