//! Durable storage for enqueueing session records.
//!
//! One record per indexed entity type, holding its lifecycle action, the
//! property used as the drain cursor, and the last drained cursor value.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use session_store::{FileStore, Session, SessionAction, SessionFilter, SessionStore};
//!
//! let store = FileStore::at_path("/var/lib/enqueuer/store").unwrap();
//!
//! store.create(&Session::new("sales_Order", "id")).unwrap();
//!
//! // Oldest session the drainer should look at
//! let next = store
//!     .first(&SessionFilter::all().excluding(SessionAction::Skip))
//!     .unwrap();
//! println!("next: {:?}", next.map(|s| s.entity_name));
//! ```
//!
//! # Backends
//!
//! - [`InMemoryStore`]: single process, tests and embedding.
//! - [`FileStore`]: JSON documents with atomic rename, shareable between
//!   processes on the same filesystem.

pub mod config;
pub mod file;
pub mod key;
pub mod session;
pub mod store;

pub use config::StoreConfig;
pub use file::FileStore;
pub use key::{KeyError, RecordKey};
pub use session::{ParseActionError, Session, SessionAction};
pub use store::{InMemoryStore, SessionFilter, SessionStore};
