//! Session manager backed by an expiring store.

use std::collections::HashSet;
use std::time::Duration;

use confidant_cache::ExpiringStore;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::session::{Session, generate_session_id};

/// Issues and tracks per-user sessions.
///
/// Each session expires once it has been inactive for its TTL. Reading a
/// session never counts as activity; callers decide when to
/// [`touch`](Self::touch). Expired sessions disappear lazily on access and
/// in bulk through [`cleanup_expired`](Self::cleanup_expired).
///
/// Lookups by user scan every session, which is fine for the number of
/// concurrent conversations a single process serves.
#[derive(Clone)]
pub struct SessionManager {
    store: ExpiringStore<String, Session>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create an empty session manager.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            store: ExpiringStore::new(config.default_ttl).with_inclusive_deadline(),
            config,
        }
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a new session for `user_id`.
    ///
    /// `ttl` defaults to the configured session TTL.
    pub fn create(&self, user_id: &str, ttl: Option<Duration>) -> Session {
        let ttl = ttl.unwrap_or(self.config.default_ttl);

        let mut id = generate_session_id();
        while self.store.contains(id.as_str()) {
            id = generate_session_id();
        }

        let now = Instant::now();
        let session = Session::new(id.clone(), user_id, ttl, now);
        self.store.set_from(id, session.clone(), now, ttl);

        debug!(session_id = %session.id, user_id = %user_id, ttl_secs = ttl.as_secs(), "Session created");
        session
    }

    /// Get a live session without extending it.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let session = self.store.get(session_id);
        if session.is_none() {
            trace!(session_id = %session_id, "Session not found or expired");
        }
        session
    }

    /// Record activity, restarting the session's inactivity window.
    pub fn touch(&self, session_id: &str) -> Result<Session> {
        let mut snapshot = None;
        let renewed = self.store.renew(session_id, |session, now| {
            session.touch(now);
            snapshot = Some(session.clone());
            session.ttl
        });

        match snapshot {
            Some(session) if renewed => Ok(session),
            _ => Err(SessionError::NotFound(session_id.to_string())),
        }
    }

    /// Attach a value to a live session. Does not count as activity.
    pub fn set_attribute(
        &self,
        session_id: &str,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<()> {
        let key = key.into();
        let value = value.into();
        self.store
            .update(session_id, |session| {
                session.attributes.insert(key, value);
            })
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Read a value attached to a live session.
    pub fn get_attribute(&self, session_id: &str, key: &str) -> Option<Value> {
        self.store
            .update(session_id, |session| session.attributes.get(key).cloned())
            .flatten()
    }

    /// End a session. Returns whether it existed.
    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self.store.delete(session_id);
        if removed {
            debug!(session_id = %session_id, "Session deleted");
        }
        removed
    }

    /// All live sessions belonging to `user_id`.
    pub fn list_by_user(&self, user_id: &str) -> Vec<Session> {
        self.store
            .filter_map_live(|_, session| (session.user_id == user_id).then(|| session.clone()))
    }

    /// Remove every expired session and return how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let count = self.store.retain(|_, session| !session.is_expired());
        if count > 0 {
            debug!(count = count, "Cleaned up expired sessions");
        }
        count
    }

    /// Get session statistics.
    pub fn stats(&self) -> SessionStats {
        let total_sessions = self.store.raw_len();
        let live: Vec<String> = self
            .store
            .filter_map_live(|_, session| Some(session.user_id.clone()));
        let active_users = live.iter().collect::<HashSet<_>>().len();

        SessionStats {
            total_sessions,
            active_users,
            expired_sessions: total_sessions.saturating_sub(live.len()),
        }
    }
}

/// Session statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Stored sessions, including expired ones not yet cleaned up.
    pub total_sessions: usize,

    /// Distinct users with at least one live session.
    pub active_users: usize,

    /// Stored sessions that have expired.
    pub expired_sessions: usize,
}
