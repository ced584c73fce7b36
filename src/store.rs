//! Session store - per-user state, in memory
//!
//! Each session gets its own lock; the map lock is only held to look up or
//! insert the entry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::logic::session::SessionState;

struct SessionEntry {
    state: Arc<Mutex<SessionState>>,
    last_seen: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a cookie value to a live session, creating one when the id is
    /// missing or unknown. Returns the id and whether it was created.
    pub fn resolve(&self, id: Option<Uuid>) -> (Uuid, bool) {
        let now = Utc::now();

        if let Some(id) = id {
            if let Some(entry) = self.sessions.write().get_mut(&id) {
                entry.last_seen = now;
                return (id, false);
            }
        }

        let id = Uuid::new_v4();
        self.sessions.write().insert(
            id,
            SessionEntry { state: Arc::new(Mutex::new(SessionState::Empty)), last_seen: now },
        );
        tracing::debug!("Session created: {}", id);
        (id, true)
    }

    /// State handle for a session; unknown ids get a fresh empty state
    pub fn state(&self, id: Uuid) -> Arc<Mutex<SessionState>> {
        if let Some(entry) = self.sessions.read().get(&id) {
            return entry.state.clone();
        }

        self.sessions
            .write()
            .entry(id)
            .or_insert_with(|| SessionEntry {
                state: Arc::new(Mutex::new(SessionState::Empty)),
                last_seen: Utc::now(),
            })
            .state
            .clone()
    }

    /// Drop sessions idle for longer than `max_idle`. A cutoff outside the
    /// representable date range purges nothing.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_idle) else {
            tracing::warn!("Idle timeout {} out of range, skipping purge", max_idle);
            return 0;
        };
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen >= cutoff);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
