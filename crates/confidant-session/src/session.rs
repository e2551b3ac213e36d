//! Session state.

use std::collections::HashMap;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

/// A user's conversational session.
///
/// Values handed out by [`SessionManager`](crate::SessionManager) are
/// snapshots; changes must go through the manager to be stored.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque, unguessable session token.
    pub id: String,

    /// User that owns the session.
    pub user_id: String,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When activity was last recorded.
    pub last_active_at: DateTime<Utc>,

    /// Inactivity period after which the session expires.
    pub ttl: Duration,

    /// Arbitrary state attached by callers.
    pub attributes: HashMap<String, Value>,

    /// Monotonic twin of `last_active_at`, used for expiry.
    pub(crate) last_active: Instant,
}

impl Session {
    /// Create a session whose activity clock starts at `now`.
    pub(crate) fn new(
        id: String,
        user_id: impl Into<String>,
        ttl: Duration,
        now: Instant,
    ) -> Self {
        let wall = Utc::now();
        Self {
            id,
            user_id: user_id.into(),
            created_at: wall,
            last_active_at: wall,
            ttl,
            attributes: HashMap::new(),
            last_active: now,
        }
    }

    /// Whether the session has been inactive for longer than its TTL.
    ///
    /// A session idle for exactly its TTL is still live.
    pub fn is_expired(&self) -> bool {
        self.last_active.elapsed() > self.ttl
    }

    /// Time since activity was last recorded.
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Record activity at `now`.
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_active = now;
        self.last_active_at = Utc::now();
    }

    /// Get an attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Set an attribute on this snapshot.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Serializable view of the session.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            last_active_at: self.last_active_at,
            ttl_secs: self.ttl.as_secs(),
            data: self.attributes.clone(),
        }
    }
}

/// Serializable session description for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub data: HashMap<String, Value>,
}

/// Generate a random 256-bit session token.
pub(crate) fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_follows_activity() {
        let mut session =
            Session::new("s".into(), "u", Duration::from_secs(60), Instant::now());

        advance(Duration::from_secs(50)).await;
        session.touch(Instant::now());
        advance(Duration::from_secs(50)).await;
        assert!(!session.is_expired());

        advance(Duration::from_secs(10)).await;
        assert!(!session.is_expired());

        advance(Duration::from_millis(1)).await;
        assert!(session.is_expired());
    }

    #[test]
    fn test_attributes_and_summary() {
        let mut session =
            Session::new("s".into(), "u", Duration::from_secs(60), Instant::now());
        session.set("name", "Ada");
        session.set("turns", 3);

        assert_eq!(session.get("name"), Some(&Value::from("Ada")));

        let json = serde_json::to_value(session.summary()).unwrap();
        assert_eq!(json["session_id"], "s");
        assert_eq!(json["ttl_secs"], 60);
        assert_eq!(json["data"]["turns"], 3);
    }
}
