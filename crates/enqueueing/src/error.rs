//! Error taxonomy for session management.
//!
//! Contention and races are not errors: mutating operations report them as
//! `Ok(false)`. Everything here is either a configuration problem (never
//! retried) or a backend fault (the caller may retry on its own cadence).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("entity '{0}' is not indexed")]
    NotIndexed(String),

    #[error("entity '{0}' is not registered in the schema")]
    UnknownEntity(String),

    #[error("entity '{0}' doesn't have a primary key property")]
    MissingPrimaryKey(String),

    #[error("session store failure: {0:#}")]
    Store(#[source] anyhow::Error),

    #[error("lock service failure for '{key}': {source:#}")]
    Lock {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SessionError {
    /// Caller or schema misconfiguration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SessionError::NotIndexed(_)
                | SessionError::UnknownEntity(_)
                | SessionError::MissingPrimaryKey(_)
        )
    }

    /// Backend fault after which the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Store(_) | SessionError::Lock { .. })
    }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
