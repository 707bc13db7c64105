//! Watermark values for the drain cursor.
//!
//! Whatever the property type, the stored form is a string. The typed enum
//! exists so callers can't hand over a value they never meant to persist.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingValue {
    Uuid(Uuid),
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl OrderingValue {
    pub fn kind(&self) -> OrderingKind {
        match self {
            OrderingValue::Uuid(_) => OrderingKind::Uuid,
            OrderingValue::Integer(_) => OrderingKind::Int,
            OrderingValue::Text(_) => OrderingKind::Text,
            OrderingValue::Timestamp(_) => OrderingKind::Timestamp,
        }
    }
}

impl fmt::Display for OrderingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingValue::Uuid(id) => write!(f, "{}", id.hyphenated()),
            OrderingValue::Integer(n) => write!(f, "{n}"),
            OrderingValue::Text(s) => f.write_str(s),
            OrderingValue::Timestamp(ts) => {
                f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

impl From<Uuid> for OrderingValue {
    fn from(id: Uuid) -> Self {
        OrderingValue::Uuid(id)
    }
}

impl From<i64> for OrderingValue {
    fn from(n: i64) -> Self {
        OrderingValue::Integer(n)
    }
}

impl From<String> for OrderingValue {
    fn from(s: String) -> Self {
        OrderingValue::Text(s)
    }
}

impl From<&str> for OrderingValue {
    fn from(s: &str) -> Self {
        OrderingValue::Text(s.to_string())
    }
}

impl From<DateTime<Utc>> for OrderingValue {
    fn from(ts: DateTime<Utc>) -> Self {
        OrderingValue::Timestamp(ts)
    }
}

/// How to interpret a raw cursor value given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingKind {
    #[default]
    Text,
    Int,
    Uuid,
    Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderingParseError {
    #[error("unknown ordering kind '{0}' (expected text, int, uuid or timestamp)")]
    UnknownKind(String),
    #[error("'{value}' is not a valid {kind:?} value: {reason}")]
    InvalidValue {
        kind: OrderingKind,
        value: String,
        reason: String,
    },
}

impl OrderingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderingKind::Text => "text",
            OrderingKind::Int => "int",
            OrderingKind::Uuid => "uuid",
            OrderingKind::Timestamp => "timestamp",
        }
    }

    pub fn parse(&self, raw: &str) -> Result<OrderingValue, OrderingParseError> {
        let invalid = |reason: String| OrderingParseError::InvalidValue {
            kind: *self,
            value: raw.to_string(),
            reason,
        };
        match self {
            OrderingKind::Text => Ok(OrderingValue::Text(raw.to_string())),
            OrderingKind::Int => raw
                .parse::<i64>()
                .map(OrderingValue::Integer)
                .map_err(|e| invalid(e.to_string())),
            OrderingKind::Uuid => Uuid::parse_str(raw)
                .map(OrderingValue::Uuid)
                .map_err(|e| invalid(e.to_string())),
            OrderingKind::Timestamp => DateTime::parse_from_rfc3339(raw)
                .map(|ts| OrderingValue::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

impl FromStr for OrderingKind {
    type Err = OrderingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(OrderingKind::Text),
            "int" | "integer" => Ok(OrderingKind::Int),
            "uuid" => Ok(OrderingKind::Uuid),
            "timestamp" | "datetime" => Ok(OrderingKind::Timestamp),
            _ => Err(OrderingParseError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for OrderingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
