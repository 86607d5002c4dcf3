// TTL-bound selection sessions
//
// The store is the only piece of shared mutable state in the pipeline.
// Lookups consume: the first press on a keyboard wins, a second press of
// the same button finds nothing. Expired entries are swept at the start
// of each new interactive request rather than on a timer.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use super::models::SelectionSession;

/// Id of the chat message carrying the selection keyboard.
pub type SessionKey = i64;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Injected store interface so the in-memory map can be swapped for a
/// shared cache if the bot ever runs more than one instance.
pub trait SessionStore: Send + Sync {
    /// Insert the session under its key, replacing any existing entry.
    fn put(&self, session: SelectionSession);

    /// Remove and return the session only if it has not expired at `now`.
    /// An expired entry found here is removed as a side effect.
    fn take_if_valid(&self, key: SessionKey, now: SystemTime) -> Option<SelectionSession>;

    /// Drop every entry that expired before `now`.
    fn sweep_expired(&self, now: SystemTime);
}

/// Lock-protected map. Downloads never hold this lock; every critical
/// section is a plain map operation.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<SessionKey, SelectionSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, session: SelectionSession) {
        self.entries.lock().insert(session.session_key, session);
    }

    fn take_if_valid(&self, key: SessionKey, now: SystemTime) -> Option<SelectionSession> {
        let mut entries = self.entries.lock();
        let session = entries.remove(&key)?;
        if session.is_valid_at(now) {
            Some(session)
        } else {
            None
        }
    }

    fn sweep_expired(&self, now: SystemTime) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, session| session.expires_at >= now);
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, "dropped expired selection sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::MediaReference;

    fn session(key: SessionKey, created_at: SystemTime, ttl: Duration) -> SelectionSession {
        SelectionSession::new(
            key,
            MediaReference {
                canonical_url: "https://example.com/watch?v=abc".to_string(),
                title: "clip".to_string(),
                thumbnail_url: None,
            },
            Vec::new(),
            created_at,
            ttl,
        )
    }

    #[test]
    fn test_take_consumes() {
        let store = MemorySessionStore::new();
        let now = SystemTime::now();
        store.put(session(1, now, DEFAULT_SESSION_TTL));

        assert!(store.take_if_valid(1, now).is_some());
        // second press on the same keyboard is a no-op
        assert!(store.take_if_valid(1, now).is_none());
    }

    #[test]
    fn test_valid_at_exact_expiry_boundary() {
        let store = MemorySessionStore::new();
        let created = SystemTime::now();
        let ttl = Duration::from_secs(60);
        store.put(session(1, created, ttl));

        // now == expires_at is still valid
        assert!(store.take_if_valid(1, created + ttl).is_some());
    }

    #[test]
    fn test_expired_entry_is_gone_after_lookup() {
        let store = MemorySessionStore::new();
        let created = SystemTime::now();
        let ttl = Duration::from_secs(60);
        store.put(session(1, created, ttl));

        let late = created + ttl + Duration::from_secs(1);
        assert!(store.take_if_valid(1, late).is_none());
        // the failed lookup removed it; an early retry finds nothing either
        assert!(store.take_if_valid(1, created).is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let store = MemorySessionStore::new();
        let now = SystemTime::now();
        store.put(session(7, now, Duration::from_secs(1)));
        store.put(session(7, now, DEFAULT_SESSION_TTL));

        let got = store
            .take_if_valid(7, now + Duration::from_secs(30))
            .expect("second session should still be live");
        assert_eq!(got.expires_at, now + DEFAULT_SESSION_TTL);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = MemorySessionStore::new();
        let now = SystemTime::now();
        store.put(session(1, now - Duration::from_secs(7200), DEFAULT_SESSION_TTL));
        store.put(session(2, now, DEFAULT_SESSION_TTL));

        store.sweep_expired(now);
        assert!(store.take_if_valid(1, now).is_none());
        assert!(store.take_if_valid(2, now).is_some());
    }
}
