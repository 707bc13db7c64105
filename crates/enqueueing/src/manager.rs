//! Session manager - lifecycle operations on enqueueing sessions.
//!
//! Every mutation runs under the entity's named lock and re-reads the record
//! inside the critical section. Nothing is cached between calls; the store is
//! the only shared state.

use std::sync::Arc;
use std::time::Duration;

use enqconf::{EnqConfig, LockBackend};
use session_store::{FileStore, Session, SessionAction, SessionFilter, SessionStore};
use tracing::{debug, info};

use crate::error::{Result, SessionError};
use crate::lifecycle::{transition, Command, Transition};
use crate::lock::{FileLocks, InProcessLocks, LockGuard, NamedLock};
use crate::ordering::OrderingValue;
use crate::schema::SchemaRegistry;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    locks: Arc<dyn NamedLock>,
    schema: Arc<SchemaRegistry>,
    lock_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        locks: Arc<dyn NamedLock>,
        schema: SchemaRegistry,
    ) -> Self {
        Self {
            store,
            locks,
            schema: Arc::new(schema),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// File store under `paths.state_dir`, lock backend and entities from config.
    pub fn from_config(config: &EnqConfig) -> anyhow::Result<Self> {
        let store = FileStore::at_path(config.paths.store_dir())?;
        let locks: Arc<dyn NamedLock> = match config.lock.backend {
            LockBackend::File => Arc::new(FileLocks::new(
                config.paths.lock_dir(),
                config.stale_after(),
            )?),
            LockBackend::Memory => Arc::new(InProcessLocks::new()),
        };
        let schema = SchemaRegistry::from_config(&config.entities);

        debug!(
            store = %config.paths.store_dir().display(),
            lock.backend = config.lock.backend.as_str(),
            entities = schema.len(),
            "session manager configured"
        );

        Ok(Self::new(Arc::new(store), locks, schema).with_lock_timeout(config.lock_timeout()))
    }

    /// Open a session in `EXECUTE`, or reset a stopped one. With `restart`,
    /// also reset a live session and drop its watermark.
    pub fn initialize(&self, entity_name: &str, restart: bool) -> Result<bool> {
        self.apply(entity_name, Command::Initialize { restart })
    }

    pub fn suspend(&self, entity_name: &str) -> Result<bool> {
        self.apply(entity_name, Command::Suspend)
    }

    pub fn resume(&self, entity_name: &str) -> Result<bool> {
        self.apply(entity_name, Command::Resume)
    }

    pub fn stop(&self, entity_name: &str) -> Result<bool> {
        self.apply(entity_name, Command::Stop)
    }

    /// Delete the record if it is still the one `session` was read from.
    pub fn remove(&self, session: &Session) -> Result<bool> {
        let entity_name = session.entity_name.as_str();
        self.locked(entity_name, "remove", || {
            let removed = self.store.delete(session).map_err(SessionError::Store)?;
            if removed {
                info!(session.entity = %entity_name, session.id = %session.id, "session removed");
            } else {
                info!(
                    session.entity = %entity_name,
                    session.id = %session.id,
                    "no matching session record to remove"
                );
            }
            Ok(true)
        })
    }

    pub fn get_session(&self, entity_name: &str) -> Result<Option<Session>> {
        self.ensure_indexed(entity_name)?;
        self.store.get(entity_name).map_err(SessionError::Store)
    }

    /// Oldest session that is not suspended.
    pub fn get_next_session(&self) -> Result<Option<Session>> {
        self.store
            .first(&SessionFilter::all().excluding(SessionAction::Skip))
            .map_err(SessionError::Store)
    }

    /// All sessions, oldest first.
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        self.store
            .scan(&SessionFilter::all())
            .map_err(SessionError::Store)
    }

    /// Record the drain watermark. `None` clears it.
    ///
    /// Returns `false` when the record was removed, or removed and re-created,
    /// since `session` was read.
    pub fn update_ordering_value(
        &self,
        session: &Session,
        value: Option<&OrderingValue>,
    ) -> Result<bool> {
        let entity_name = session.entity_name.as_str();
        self.locked(entity_name, "update_ordering_value", || {
            let mut current = match self.load(entity_name)? {
                Some(current) if current.is_same_record(session) => current,
                Some(_) => {
                    info!(session.entity = %entity_name, "session was replaced; not advancing");
                    return Ok(false);
                }
                None => {
                    info!(session.entity = %entity_name, "session is gone; not advancing");
                    return Ok(false);
                }
            };

            current.last_processed_value = value.map(ToString::to_string);
            self.store.update(&current).map_err(SessionError::Store)?;
            debug!(
                session.entity = %entity_name,
                session.cursor = current.last_processed_value.as_deref().unwrap_or(""),
                "ordering value updated"
            );
            Ok(true)
        })
    }

    fn apply(&self, entity_name: &str, command: Command) -> Result<bool> {
        self.locked(entity_name, command_name(command), || {
            let current = self.load(entity_name)?;
            let step = transition(current.as_ref().map(|s| s.action), command);

            match (step, current) {
                (Transition::Create, _) => {
                    let property = self.schema.resolve_ordering_property(entity_name)?;
                    let session = Session::new(entity_name, property);
                    self.store.create(&session).map_err(SessionError::Store)?;
                    info!(
                        session.entity = %entity_name,
                        session.id = %session.id,
                        session.ordering_property = %session.ordering_property,
                        "session created"
                    );
                }
                (Transition::Reset, Some(mut session)) => {
                    session.ordering_property = self.schema.resolve_ordering_property(entity_name)?;
                    session.action = SessionAction::Execute;
                    session.last_processed_value = None;
                    self.store.update(&session).map_err(SessionError::Store)?;
                    info!(
                        session.entity = %entity_name,
                        session.ordering_property = %session.ordering_property,
                        "session reset"
                    );
                }
                (Transition::Set(action), Some(mut session)) => {
                    let from = session.action;
                    session.action = action;
                    self.store.update(&session).map_err(SessionError::Store)?;
                    info!(session.entity = %entity_name, %from, to = %action, "session action changed");
                }
                (Transition::Unchanged, _) => {
                    debug!(session.entity = %entity_name, ?command, "session already in requested state");
                }
                (Transition::Reject, current) | (_, current @ None) => {
                    info!(
                        session.entity = %entity_name,
                        ?command,
                        state = current.map(|s| s.action.as_str()).unwrap_or("absent"),
                        "transition rejected"
                    );
                    return Ok(false);
                }
            }

            Ok(step.succeeds())
        })
    }

    /// Run `critical` under the entity's lock. Lock timeout is `Ok(false)`.
    fn locked<F>(&self, entity_name: &str, op: &'static str, critical: F) -> Result<bool>
    where
        F: FnOnce() -> Result<bool>,
    {
        self.ensure_indexed(entity_name)?;

        let guard = LockGuard::acquire(self.locks.as_ref(), entity_name, self.lock_timeout)
            .map_err(|source| SessionError::Lock {
                key: entity_name.to_string(),
                source,
            })?;
        let Some(_guard) = guard else {
            info!(
                session.entity = %entity_name,
                op,
                timeout_ms = self.lock_timeout.as_millis() as u64,
                "lock not acquired within timeout"
            );
            return Ok(false);
        };

        critical()
    }

    fn load(&self, entity_name: &str) -> Result<Option<Session>> {
        self.store.get(entity_name).map_err(SessionError::Store)
    }

    fn ensure_indexed(&self, entity_name: &str) -> Result<()> {
        if self.schema.is_indexable(entity_name) {
            Ok(())
        } else {
            Err(SessionError::NotIndexed(entity_name.to_string()))
        }
    }
}

fn command_name(command: Command) -> &'static str {
    match command {
        Command::Initialize { .. } => "initialize",
        Command::Suspend => "suspend",
        Command::Resume => "resume",
        Command::Stop => "stop",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntitySchema;
    use chrono::{Duration as ChronoDuration, Utc};
    use session_store::InMemoryStore;
    use std::panic::{self, AssertUnwindSafe};
    use std::thread;

    const ORDER: &str = "sales_Order";

    fn schema() -> SchemaRegistry {
        SchemaRegistry::new()
            .with_entity(ORDER, EntitySchema::indexed("id"))
            .with_entity("sales_Customer", EntitySchema::indexed("id"))
            .with_entity(
                "sales_OrderLine",
                EntitySchema::indexed("pk").with_composite_key(Some("uuid".into())),
            )
            .with_entity("sales_Report", EntitySchema::indexed("id").without_primary_key())
            .with_entity("sales_Audit", EntitySchema::not_indexed())
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        locks: Arc<InProcessLocks>,
        manager: SessionManager,
    }

    fn fixture() -> Fixture {
        fixture_with(InMemoryStore::new())
    }

    fn fixture_with(store: InMemoryStore) -> Fixture {
        let store = Arc::new(store);
        let locks = Arc::new(InProcessLocks::new());
        let manager = SessionManager::new(store.clone(), locks.clone(), schema());
        Fixture { store, locks, manager }
    }

    fn action(f: &Fixture) -> Option<SessionAction> {
        f.manager.get_session(ORDER).unwrap().map(|s| s.action)
    }

    /// Puts ORDER into `state` (None = absent).
    fn prepare(f: &Fixture, state: Option<SessionAction>) {
        let Some(state) = state else { return };
        assert!(f.manager.initialize(ORDER, false).unwrap());
        match state {
            SessionAction::Execute => {}
            SessionAction::Skip => assert!(f.manager.suspend(ORDER).unwrap()),
            SessionAction::Stop => assert!(f.manager.stop(ORDER).unwrap()),
        }
    }

    #[test]
    fn test_state_operation_table() {
        use SessionAction::{Execute, Skip, Stop};

        type Op = fn(&SessionManager) -> Result<bool>;
        let ops: [(&str, Op); 5] = [
            ("suspend", |m: &SessionManager| m.suspend(ORDER)),
            ("resume", |m: &SessionManager| m.resume(ORDER)),
            ("stop", |m: &SessionManager| m.stop(ORDER)),
            ("init", |m: &SessionManager| m.initialize(ORDER, false)),
            ("restart", |m: &SessionManager| m.initialize(ORDER, true)),
        ];
        // (ok, resulting state) per op
        let table: [(Option<SessionAction>, [(bool, Option<SessionAction>); 5]); 4] = [
            (
                None,
                [(false, None), (false, None), (false, None), (true, Some(Execute)), (true, Some(Execute))],
            ),
            (
                Some(Execute),
                [
                    (true, Some(Skip)),
                    (true, Some(Execute)),
                    (true, Some(Stop)),
                    (true, Some(Execute)),
                    (true, Some(Execute)),
                ],
            ),
            (
                Some(Skip),
                [
                    (true, Some(Skip)),
                    (true, Some(Execute)),
                    (true, Some(Stop)),
                    (true, Some(Skip)),
                    (true, Some(Execute)),
                ],
            ),
            (
                Some(Stop),
                [
                    (false, Some(Stop)),
                    (false, Some(Stop)),
                    (true, Some(Stop)),
                    (true, Some(Execute)),
                    (true, Some(Execute)),
                ],
            ),
        ];

        for (state, expected) in table {
            for ((name, op), (ok, after)) in ops.iter().zip(expected) {
                let f = fixture();
                prepare(&f, state);
                assert_eq!(op(&f.manager).unwrap(), ok, "{name} from {state:?}");
                assert_eq!(action(&f), after, "{name} from {state:?}");
            }
        }
    }

    #[test]
    fn test_new_session_defaults() -> Result<()> {
        let f = fixture();
        assert!(f.manager.initialize(ORDER, false)?);

        let session = f.manager.get_session(ORDER)?.expect("session should exist");
        assert_eq!(session.action, SessionAction::Execute);
        assert_eq!(session.ordering_property, "id");
        assert_eq!(session.last_processed_value, None);
        Ok(())
    }

    #[test]
    fn test_composite_key_uses_uuid_property() -> Result<()> {
        let f = fixture();
        assert!(f.manager.initialize("sales_OrderLine", false)?);
        let session = f.manager.get_session("sales_OrderLine")?.unwrap();
        assert_eq!(session.ordering_property, "uuid");
        Ok(())
    }

    #[test]
    fn test_restart_clears_watermark() -> Result<()> {
        let f = fixture();
        f.manager.initialize(ORDER, false)?;
        let session = f.manager.get_session(ORDER)?.unwrap();
        assert!(f.manager.update_ordering_value(&session, Some(&OrderingValue::from(42i64)))?);
        assert_eq!(
            f.manager.get_session(ORDER)?.unwrap().last_processed_value.as_deref(),
            Some("42")
        );

        assert!(f.manager.initialize(ORDER, true)?);
        let restarted = f.manager.get_session(ORDER)?.unwrap();
        assert_eq!(restarted.action, SessionAction::Execute);
        assert_eq!(restarted.last_processed_value, None);
        assert_eq!(restarted.id, session.id);
        assert_eq!(restarted.created_date, session.created_date);
        Ok(())
    }

    #[test]
    fn test_plain_initialize_keeps_watermark() -> Result<()> {
        let f = fixture();
        f.manager.initialize(ORDER, false)?;
        let session = f.manager.get_session(ORDER)?.unwrap();
        f.manager.update_ordering_value(&session, Some(&OrderingValue::from("ORD-9")))?;

        assert!(f.manager.initialize(ORDER, false)?);
        let again = f.manager.get_session(ORDER)?.unwrap();
        assert_eq!(again.last_processed_value.as_deref(), Some("ORD-9"));
        Ok(())
    }

    #[test]
    fn test_initialize_after_stop_resolves_property_again() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        let locks = Arc::new(InProcessLocks::new());

        let before = SessionManager::new(
            store.clone(),
            locks.clone(),
            SchemaRegistry::new().with_entity(ORDER, EntitySchema::indexed("id")),
        );
        before.initialize(ORDER, false)?;
        before.stop(ORDER)?;

        let after = SessionManager::new(
            store.clone(),
            locks.clone(),
            SchemaRegistry::new().with_entity(
                ORDER,
                EntitySchema::indexed("pk").with_composite_key(Some("uuid".into())),
            ),
        );
        assert!(after.initialize(ORDER, false)?);

        let session = after.get_session(ORDER)?.unwrap();
        assert_eq!(session.action, SessionAction::Execute);
        assert_eq!(session.ordering_property, "uuid");
        Ok(())
    }

    #[test]
    fn test_idempotent_operations_do_not_write() -> Result<()> {
        let f = fixture();
        f.manager.initialize(ORDER, false)?;
        f.manager.suspend(ORDER)?;
        let before = f.manager.get_session(ORDER)?.unwrap();

        assert!(f.manager.suspend(ORDER)?);
        assert_eq!(f.manager.get_session(ORDER)?.unwrap(), before);
        Ok(())
    }

    #[test]
    fn test_get_session_on_unindexed_entity_is_fatal() {
        let f = fixture();
        for entity in ["sales_Audit", "no_such_Entity"] {
            let err = f.manager.get_session(entity).unwrap_err();
            assert!(matches!(err, SessionError::NotIndexed(ref name) if name == entity));
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_mutation_on_unindexed_entity_is_fatal() {
        let f = fixture();
        assert!(matches!(
            f.manager.initialize("sales_Audit", false),
            Err(SessionError::NotIndexed(_))
        ));
        assert!(matches!(f.manager.suspend("sales_Audit"), Err(SessionError::NotIndexed(_))));
        assert!(f.store.is_empty());
    }

    #[test]
    fn test_missing_primary_key_is_fatal_and_releases_lock() {
        let f = fixture();
        let err = f.manager.initialize("sales_Report", false).unwrap_err();
        assert!(matches!(err, SessionError::MissingPrimaryKey(_)));
        assert!(!err.is_retryable());
        assert!(f.store.is_empty());
        assert!(!f.locks.is_held("sales_Report"));
    }

    #[test]
    fn test_next_session_is_oldest_not_suspended() -> Result<()> {
        let now = Utc::now();
        let f = fixture_with(InMemoryStore::from_sessions([
            Session::new(ORDER, "id")
                .with_action(SessionAction::Skip)
                .with_created_date(now - ChronoDuration::minutes(3)),
            Session::new("sales_Customer", "id")
                .with_created_date(now - ChronoDuration::minutes(2)),
            Session::new("sales_OrderLine", "uuid")
                .with_created_date(now - ChronoDuration::minutes(1)),
        ]));

        let next = f.manager.get_next_session()?.expect("a session is eligible");
        assert_eq!(next.entity_name, "sales_Customer");
        Ok(())
    }

    #[test]
    fn test_next_session_includes_stopped() -> Result<()> {
        let f = fixture();
        f.manager.initialize(ORDER, false)?;
        f.manager.stop(ORDER)?;
        let next = f.manager.get_next_session()?.unwrap();
        assert_eq!(next.action, SessionAction::Stop);
        Ok(())
    }

    #[test]
    fn test_next_session_none_when_all_suspended() -> Result<()> {
        let f = fixture();
        assert!(f.manager.get_next_session()?.is_none());
        f.manager.initialize(ORDER, false)?;
        f.manager.suspend(ORDER)?;
        assert!(f.manager.get_next_session()?.is_none());
        Ok(())
    }

    #[test]
    fn test_update_ordering_value_keeps_action() -> Result<()> {
        let f = fixture();
        f.manager.initialize(ORDER, false)?;
        f.manager.stop(ORDER)?;
        let session = f.manager.get_session(ORDER)?.unwrap();

        assert!(f.manager.update_ordering_value(&session, Some(&OrderingValue::from(7i64)))?);
        let after = f.manager.get_session(ORDER)?.unwrap();
        assert_eq!(after.action, SessionAction::Stop);
        assert_eq!(after.last_processed_value.as_deref(), Some("7"));

        assert!(f.manager.update_ordering_value(&session, None)?);
        assert_eq!(f.manager.get_session(ORDER)?.unwrap().last_processed_value, None);
        Ok(())
    }

    #[test]
    fn test_update_ordering_value_does_not_trust_caller_copy() -> Result<()> {
        let f = fixture();
        f.manager.initialize(ORDER, false)?;
        let stale = f.manager.get_session(ORDER)?.unwrap();
        f.manager.suspend(ORDER)?;

        assert!(f.manager.update_ordering_value(&stale, Some(&OrderingValue::from(5i64)))?);
        let after = f.manager.get_session(ORDER)?.unwrap();
        assert_eq!(after.action, SessionAction::Skip);
        assert_eq!(after.last_processed_value.as_deref(), Some("5"));
        Ok(())
    }

    #[test]
    fn test_update_after_remove_returns_false() -> Result<()> {
        let f = fixture();
        f.manager.initialize(ORDER, false)?;
        let session = f.manager.get_session(ORDER)?.unwrap();

        assert!(f.manager.remove(&session)?);
        assert!(!f.manager.update_ordering_value(&session, Some(&OrderingValue::from(1i64)))?);
        assert!(f.manager.get_session(ORDER)?.is_none());
        Ok(())
    }

    #[test]
    fn test_update_after_recreate_returns_false() -> Result<()> {
        let f = fixture();
        f.manager.initialize(ORDER, false)?;
        let old = f.manager.get_session(ORDER)?.unwrap();
        f.manager.remove(&old)?;
        f.manager.initialize(ORDER, false)?;

        assert!(!f.manager.update_ordering_value(&old, Some(&OrderingValue::from(1i64)))?);
        assert_eq!(f.manager.get_session(ORDER)?.unwrap().last_processed_value, None);
        Ok(())
    }

    #[test]
    fn test_remove_leaves_recreated_record() -> Result<()> {
        let f = fixture();
        f.manager.initialize(ORDER, false)?;
        let old = f.manager.get_session(ORDER)?.unwrap();
        f.manager.remove(&old)?;
        f.manager.initialize(ORDER, false)?;

        assert!(f.manager.remove(&old)?);
        assert!(f.manager.get_session(ORDER)?.is_some());
        Ok(())
    }

    #[test]
    fn test_remove_from_any_state() -> Result<()> {
        for state in [SessionAction::Execute, SessionAction::Skip, SessionAction::Stop] {
            let f = fixture();
            prepare(&f, Some(state));
            let session = f.manager.get_session(ORDER)?.unwrap();
            assert!(f.manager.remove(&session)?);
            assert!(f.manager.get_session(ORDER)?.is_none());
        }
        Ok(())
    }

    #[test]
    fn test_lock_timeout_returns_false() -> Result<()> {
        let f = fixture();
        let manager = SessionManager::new(f.store.clone(), f.locks.clone(), schema())
            .with_lock_timeout(Duration::from_millis(20));
        manager.initialize(ORDER, false)?;
        let session = manager.get_session(ORDER)?.unwrap();

        assert!(f.locks.try_acquire(ORDER, Duration::ZERO).unwrap());
        assert!(!manager.suspend(ORDER)?);
        assert!(!manager.initialize(ORDER, true)?);
        assert!(!manager.update_ordering_value(&session, Some(&OrderingValue::from(3i64)))?);
        assert!(!manager.remove(&session)?);
        assert_eq!(manager.get_session(ORDER)?.unwrap(), session);

        // Other entities are independent.
        assert!(manager.initialize("sales_Customer", false)?);

        f.locks.release(ORDER).unwrap();
        assert!(manager.suspend(ORDER)?);
        Ok(())
    }

    #[test]
    fn test_empty_lock_file_does_not_wedge_entity() {
        let dir = tempfile::TempDir::new().unwrap();
        let locks = FileLocks::new(dir.path(), Duration::from_millis(1)).unwrap();
        std::fs::write(locks.lock_path(ORDER), b"").unwrap();

        let store = Arc::new(InMemoryStore::new());
        let manager = SessionManager::new(store, Arc::new(locks), schema())
            .with_lock_timeout(Duration::from_millis(50));
        assert!(manager.initialize(ORDER, false).unwrap());
        assert!(manager.suspend(ORDER).unwrap());
    }

    #[test]
    fn test_concurrent_initialize_creates_one_record() {
        let f = fixture();
        let manager = Arc::new(f.manager);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                thread::spawn(move || manager.initialize(ORDER, false).unwrap())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(f.store.len(), 1);
    }

    #[test]
    fn test_concurrent_update_and_remove_never_resurrects() {
        for _ in 0..20 {
            let f = fixture();
            f.manager.initialize(ORDER, false).unwrap();
            let session = f.manager.get_session(ORDER).unwrap().unwrap();
            let manager = Arc::new(f.manager);

            let updater = {
                let manager = manager.clone();
                let session = session.clone();
                thread::spawn(move || {
                    manager
                        .update_ordering_value(&session, Some(&OrderingValue::from(99i64)))
                        .unwrap()
                })
            };
            let remover = {
                let manager = manager.clone();
                let session = session.clone();
                thread::spawn(move || manager.remove(&session).unwrap())
            };

            updater.join().unwrap();
            assert!(remover.join().unwrap());
            assert!(manager.get_session(ORDER).unwrap().is_none());
        }
    }

    struct FailingStore {
        inner: InMemoryStore,
    }

    impl SessionStore for FailingStore {
        fn get(&self, entity_name: &str) -> anyhow::Result<Option<Session>> {
            self.inner.get(entity_name)
        }
        fn create(&self, session: &Session) -> anyhow::Result<()> {
            self.inner.create(session)
        }
        fn update(&self, _session: &Session) -> anyhow::Result<()> {
            anyhow::bail!("disk quota exceeded")
        }
        fn delete(&self, session: &Session) -> anyhow::Result<bool> {
            self.inner.delete(session)
        }
        fn scan(&self, filter: &SessionFilter) -> anyhow::Result<Vec<Session>> {
            self.inner.scan(filter)
        }
    }

    struct PanickingStore {
        inner: InMemoryStore,
    }

    impl SessionStore for PanickingStore {
        fn get(&self, entity_name: &str) -> anyhow::Result<Option<Session>> {
            self.inner.get(entity_name)
        }
        fn create(&self, session: &Session) -> anyhow::Result<()> {
            self.inner.create(session)
        }
        fn update(&self, _session: &Session) -> anyhow::Result<()> {
            panic!("store exploded mid-write")
        }
        fn delete(&self, session: &Session) -> anyhow::Result<bool> {
            self.inner.delete(session)
        }
        fn scan(&self, filter: &SessionFilter) -> anyhow::Result<Vec<Session>> {
            self.inner.scan(filter)
        }
    }

    #[test]
    fn test_store_fault_is_retryable_and_releases_lock() -> Result<()> {
        let locks = Arc::new(InProcessLocks::new());
        let manager = SessionManager::new(
            Arc::new(FailingStore { inner: InMemoryStore::new() }),
            locks.clone(),
            schema(),
        );
        assert!(manager.initialize(ORDER, false)?);

        let err = manager.suspend(ORDER).unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert!(err.is_retryable());
        assert!(!err.is_configuration());
        assert!(!locks.is_held(ORDER));
        assert_eq!(manager.get_session(ORDER)?.unwrap().action, SessionAction::Execute);
        Ok(())
    }

    #[test]
    fn test_panic_in_critical_section_releases_lock() -> Result<()> {
        let locks = Arc::new(InProcessLocks::new());
        let manager = SessionManager::new(
            Arc::new(PanickingStore { inner: InMemoryStore::new() }),
            locks.clone(),
            schema(),
        );
        assert!(manager.initialize(ORDER, false)?);

        let result = panic::catch_unwind(AssertUnwindSafe(|| manager.suspend(ORDER)));
        assert!(result.is_err());
        assert!(!locks.is_held(ORDER));
        assert!(locks.try_acquire(ORDER, Duration::ZERO).unwrap());
        Ok(())
    }
}
