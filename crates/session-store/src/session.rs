//! Session record and lifecycle action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of an enqueueing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionAction {
    /// Eligible for draining.
    Execute,
    /// Suspended; skipped by the drainer until resumed.
    Skip,
    /// Terminated; only a restart or removal changes it.
    Stop,
}

impl SessionAction {
    pub const ALL: [SessionAction; 3] =
        [SessionAction::Execute, SessionAction::Skip, SessionAction::Stop];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAction::Execute => "EXECUTE",
            SessionAction::Skip => "SKIP",
            SessionAction::Stop => "STOP",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown session action: {0}")]
pub struct ParseActionError(String);

impl FromStr for SessionAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EXECUTE" => Ok(SessionAction::Execute),
            "SKIP" => Ok(SessionAction::Skip),
            "STOP" => Ok(SessionAction::Stop),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

/// Persisted progress record for one indexed entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Record identity; survives restarts, changes only on re-creation.
    pub id: Uuid,

    /// Indexed entity type. At most one session per entity.
    pub entity_name: String,

    pub action: SessionAction,

    /// Property used as the pagination cursor.
    pub ordering_property: String,

    /// Serialized watermark; `None` until the first batch is drained.
    pub last_processed_value: Option<String>,

    /// Orders sessions for the drainer.
    pub created_date: DateTime<Utc>,
}

impl Session {
    /// A fresh `EXECUTE` session with no watermark.
    pub fn new(entity_name: impl Into<String>, ordering_property: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_name: entity_name.into(),
            action: SessionAction::Execute,
            ordering_property: ordering_property.into(),
            last_processed_value: None,
            created_date: Utc::now(),
        }
    }

    /// Builder: set the lifecycle action.
    pub fn with_action(mut self, action: SessionAction) -> Self {
        self.action = action;
        self
    }

    /// Builder: set the creation timestamp.
    pub fn with_created_date(mut self, created_date: DateTime<Utc>) -> Self {
        self.created_date = created_date;
        self
    }

    /// Same stored record (not merely the same entity).
    pub fn is_same_record(&self, other: &Session) -> bool {
        self.id == other.id && self.entity_name == other.entity_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("sales_Order", "id");
        assert_eq!(session.entity_name, "sales_Order");
        assert_eq!(session.action, SessionAction::Execute);
        assert_eq!(session.ordering_property, "id");
        assert!(session.last_processed_value.is_none());
    }

    #[test]
    fn test_action_wire_format() {
        let session = Session::new("sales_Order", "id").with_action(SessionAction::Skip);
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["action"], "SKIP");
        assert_eq!(json["entity_name"], "sales_Order");
        assert!(json["last_processed_value"].is_null());
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("execute".parse::<SessionAction>().unwrap(), SessionAction::Execute);
        assert_eq!("STOP".parse::<SessionAction>().unwrap(), SessionAction::Stop);
        assert!("PAUSE".parse::<SessionAction>().is_err());
        for action in SessionAction::ALL {
            assert_eq!(action.to_string().parse::<SessionAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_is_same_record() {
        let a = Session::new("sales_Order", "id");
        let mut b = a.clone();
        b.last_processed_value = Some("7".to_string());
        assert!(a.is_same_record(&b));

        let c = Session::new("sales_Order", "id");
        assert!(!a.is_same_record(&c));
    }
}
