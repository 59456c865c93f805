//! The session store and its background sweeper.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::session::{ChatMessage, Role, Session};

/// Fields merged into a session by [`SessionStore::update`].
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    /// Replace the stored clinical context.
    pub clinical_context: Option<Value>,

    /// Replace the stored last result.
    pub last_result: Option<Value>,
}

impl SessionPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the clinical context.
    pub fn with_clinical_context(mut self, context: Value) -> Self {
        self.clinical_context = Some(context);
        self
    }

    /// Set the last result.
    pub fn with_last_result(mut self, result: Value) -> Self {
        self.last_result = Some(result);
        self
    }
}

/// Keyed in-memory session store with TTL expiry.
///
/// Explicitly constructed and injectable; there is no process-wide
/// singleton. Cloning yields another handle to the same sessions. All
/// operations are synchronous and atomic; the lock is never held across a
/// suspension point, so any number of handlers and the sweeper can
/// interleave safely.
///
/// Operations on unknown or expired ids degrade to a no-op with a logged
/// warning; callers that need to distinguish check the return values of
/// [`get_or_create`](Self::get_or_create) and [`clear`](Self::clear).
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
    config: StoreConfig,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// The store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Look up a session, refreshing its activity, or create a fresh one.
    ///
    /// A known, non-expired id returns its session. A known but expired id
    /// discards the stale entry and returns a fresh session with a *new*
    /// id. An unknown or absent id always creates fresh.
    pub fn get_or_create(&self, id: Option<&str>) -> Session {
        let mut sessions = self.inner.write();

        if let Some(id) = id {
            if sessions
                .get(id)
                .is_some_and(|s| s.is_expired(self.config.ttl))
            {
                debug!(session_id = %id, "session expired on lookup, discarding");
                sessions.remove(id);
            } else if let Some(session) = sessions.get_mut(id) {
                session.touch();
                debug!(
                    session_id = %id,
                    messages = session.history.len(),
                    "session resumed"
                );
                return session.clone();
            }
        }

        let session = Session::new();
        info!(session_id = %session.id, "session created");
        sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Merge patch fields into a session and refresh its activity.
    pub fn update(&self, id: &str, patch: SessionPatch) {
        let mut sessions = self.inner.write();
        let Some(session) = sessions.get_mut(id) else {
            warn!(session_id = %id, "update on unknown session");
            return;
        };

        if let Some(context) = patch.clinical_context {
            session.clinical_context = Some(context);
        }
        if let Some(result) = patch.last_result {
            session.last_result = Some(result);
        }
        session.touch();
        debug!(session_id = %id, "session updated");
    }

    /// Append a message to a session's history and refresh its activity.
    pub fn add_message(&self, id: &str, role: Role, content: impl Into<String>) {
        let mut sessions = self.inner.write();
        let Some(session) = sessions.get_mut(id) else {
            warn!(session_id = %id, "message for unknown session");
            return;
        };

        session.push_message(ChatMessage {
            role,
            content: content.into(),
        });
        session.touch();
    }

    /// Remove a session. Returns whether it existed.
    pub fn clear(&self, id: &str) -> bool {
        let removed = self.inner.write().remove(id).is_some();
        if removed {
            info!(session_id = %id, "session removed");
        }
        removed
    }

    /// Read-only copy of a live session. Does not refresh activity.
    pub fn snapshot(&self, id: &str) -> Option<Session> {
        self.inner
            .read()
            .get(id)
            .filter(|s| !s.is_expired(self.config.ttl))
            .cloned()
    }

    /// Remove every session past its TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut sessions = self.inner.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.config.ttl));
        let removed = before - sessions.len();

        if removed > 0 {
            info!(removed, remaining = sessions.len(), "expired sessions swept");
        }
        removed
    }

    /// Number of stored sessions, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Start the periodic sweeper. Dropping the handle (or calling
    /// [`SweeperHandle::shutdown`]) cancels it.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        let store = self.clone();
        let interval = self.config.sweep_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.sweep();
            }
        });
        debug!(interval_secs = interval.as_secs(), "session sweeper started");
        SweeperHandle { task }
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, id: &str, age: std::time::Duration) {
        if let Some(session) = self.inner.write().get_mut(id) {
            session.last_activity = std::time::Instant::now() - age;
        }
    }
}

/// Handle to the background sweeper task.
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store_with_ttl(ttl: Duration) -> SessionStore {
        SessionStore::new(StoreConfig::new().with_ttl(ttl))
    }

    #[test]
    fn test_create_and_resume() {
        let store = SessionStore::new(StoreConfig::default());

        let created = store.get_or_create(None);
        assert!(created.history.is_empty());

        let resumed = store.get_or_create(Some(&created.id));
        assert_eq!(resumed.id, created.id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_id_creates_fresh() {
        let store = SessionStore::new(StoreConfig::default());
        let session = store.get_or_create(Some("sess_bogus"));
        assert_ne!(session.id, "sess_bogus");
    }

    #[test]
    fn test_expired_id_yields_new_session() {
        let store = store_with_ttl(Duration::from_secs(60));
        let old = store.get_or_create(None);
        store.backdate(&old.id, Duration::from_secs(120));

        let fresh = store.get_or_create(Some(&old.id));
        assert_ne!(fresh.id, old.id);
        // The stale entry is gone from subsequent lookups.
        assert!(store.snapshot(&old.id).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_history_truncated_to_last_twenty() {
        let store = SessionStore::new(StoreConfig::default());
        let session = store.get_or_create(None);

        for i in 0..25 {
            store.add_message(&session.id, Role::User, format!("message {i}"));
        }

        let snapshot = store.snapshot(&session.id).unwrap();
        assert_eq!(snapshot.history.len(), 20);
        assert_eq!(snapshot.history[0].content, "message 5");
        assert_eq!(snapshot.history[19].content, "message 24");
    }

    #[test]
    fn test_update_merges_fields() {
        let store = SessionStore::new(StoreConfig::default());
        let session = store.get_or_create(None);

        store.update(
            &session.id,
            SessionPatch::new().with_clinical_context(serde_json::json!({"sdma": 18.5})),
        );
        store.update(
            &session.id,
            SessionPatch::new().with_last_result(serde_json::json!({"estagio": 2})),
        );

        let snapshot = store.snapshot(&session.id).unwrap();
        // Earlier fields survive later partial patches.
        assert_eq!(snapshot.clinical_context.unwrap()["sdma"], 18.5);
        assert_eq!(snapshot.last_result.unwrap()["estagio"], 2);
    }

    #[test]
    fn test_operations_on_unknown_id_are_noops() {
        let store = SessionStore::new(StoreConfig::default());

        store.update("sess_missing", SessionPatch::new());
        store.add_message("sess_missing", Role::User, "hello");

        assert!(store.is_empty());
        assert!(!store.clear("sess_missing"));
    }

    #[test]
    fn test_clear_reports_existence() {
        let store = SessionStore::new(StoreConfig::default());
        let session = store.get_or_create(None);

        assert!(store.clear(&session.id));
        assert!(!store.clear(&session.id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = store_with_ttl(Duration::from_secs(60));
        let stale = store.get_or_create(None);
        let fresh = store.get_or_create(None);
        store.backdate(&stale.id, Duration::from_secs(120));

        assert_eq!(store.sweep(), 1);
        assert!(store.snapshot(&stale.id).is_none());
        assert!(store.snapshot(&fresh.id).is_some());
    }

    #[test]
    fn test_sweep_with_nothing_expired_is_noop() {
        let store = store_with_ttl(Duration::from_secs(60));
        store.get_or_create(None);
        store.get_or_create(None);

        assert_eq!(store.sweep(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_touch_on_lookup_defers_expiry() {
        let store = store_with_ttl(Duration::from_secs(60));
        let session = store.get_or_create(None);
        store.backdate(&session.id, Duration::from_secs(50));

        // Lookup refreshes activity, so the session outlives its original
        // expiry horizon.
        let resumed = store.get_or_create(Some(&session.id));
        assert_eq!(resumed.id, session.id);
        assert_eq!(store.sweep(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_task_removes_expired_sessions() {
        let store = SessionStore::new(
            StoreConfig::new()
                .with_ttl(Duration::from_millis(20))
                .with_sweep_interval(Duration::from_millis(20)),
        );
        let session = store.get_or_create(None);
        let sweeper = store.spawn_sweeper();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.snapshot(&session.id).is_none());
        assert!(store.is_empty());
        sweeper.shutdown();
    }

    #[tokio::test]
    async fn test_sweeper_shutdown_stops_sweeping() {
        let store = SessionStore::new(
            StoreConfig::new()
                .with_ttl(Duration::from_millis(10))
                .with_sweep_interval(Duration::from_millis(10)),
        );
        let sweeper = store.spawn_sweeper();
        sweeper.shutdown();

        let session = store.get_or_create(None);
        store.backdate(&session.id, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Expired but never swept; only an explicit sweep removes it.
        assert_eq!(store.len(), 1);
        assert_eq!(store.sweep(), 1);
    }
}
