//! Enqueueing session bookkeeping.
//!
//! An enqueueing session tracks, per indexed entity type, whether its records
//! should be drained into the indexing queue (`EXECUTE`), held back (`SKIP`)
//! or left alone until re-initialized (`STOP`), together with the cursor
//! value of the last drained record.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use enqueueing::{EntitySchema, InProcessLocks, OrderingValue, SchemaRegistry, SessionManager};
//! use session_store::InMemoryStore;
//!
//! let schema = SchemaRegistry::new().with_entity("sales_Order", EntitySchema::indexed("id"));
//! let manager = SessionManager::new(
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(InProcessLocks::new()),
//!     schema,
//! );
//!
//! manager.initialize("sales_Order", false)?;
//! if let Some(session) = manager.get_next_session()? {
//!     // drain a batch past session.last_processed_value, then:
//!     manager.update_ordering_value(&session, Some(&OrderingValue::from(1042i64)))?;
//! }
//! # Ok::<(), enqueueing::SessionError>(())
//! ```

pub mod error;
pub mod lifecycle;
pub mod lock;
pub mod manager;
pub mod ordering;
pub mod schema;

pub use error::{Result, SessionError};
pub use lifecycle::{transition, Command, Transition};
pub use lock::{FileLocks, InProcessLocks, LockGuard, NamedLock};
pub use manager::{SessionManager, DEFAULT_LOCK_TIMEOUT};
pub use ordering::{OrderingKind, OrderingParseError, OrderingValue};
pub use schema::{EntitySchema, SchemaRegistry};

pub use session_store::{Session, SessionAction};
