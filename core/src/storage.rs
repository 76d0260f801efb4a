//! Hand-off point for finalized sessions.
//!
//! The detector only ever calls [`SessionStore::store_session`]. The query
//! side exists for analytics collaborators.

use std::collections::VecDeque;

use crate::detector::Session;

const STORE_DEFAULT_CAPACITY: usize = 32;

pub trait SessionStore {
    fn store_session(&mut self, session: Session);

    /// Up to `n` sessions, newest first.
    fn recent_sessions(&self, n: usize) -> Vec<&Session>;

    fn session(&self, id: &str) -> Option<&Session>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store keeping the most recent sessions. The oldest session is
/// evicted once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    sessions: VecDeque<Session>,
    capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(STORE_DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sessions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }
}

impl SessionStore for MemoryStore {
    fn store_session(&mut self, session: Session) {
        while self.sessions.len() >= self.capacity {
            if let Some(evicted) = self.sessions.pop_front() {
                tracing::debug!("[STORE] evicting session {}", evicted.hash);
            }
        }
        self.sessions.push_back(session);
    }

    fn recent_sessions(&self, n: usize) -> Vec<&Session> {
        self.sessions.iter().rev().take(n).collect()
    }

    fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id || s.hash == id)
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::GroupContext;

    fn session(start: f64) -> Session {
        Session::new(start, "Ayla".into(), "Zone".into(), GroupContext::solo(), Vec::new())
    }

    #[test]
    fn test_recent_sessions_newest_first() {
        let mut store = MemoryStore::new();
        for start in [1.0, 2.0, 3.0] {
            store.store_session(session(start));
        }

        let recent: Vec<f64> = store.recent_sessions(2).iter().map(|s| s.start_time).collect();
        assert_eq!(recent, vec![3.0, 2.0]);
        assert_eq!(store.recent_sessions(10).len(), 3);
    }

    #[test]
    fn test_lookup_by_id_or_hash() {
        let mut store = MemoryStore::new();
        let s = session(5.0);
        let (id, hash) = (s.id.clone(), s.hash.clone());
        store.store_session(s);

        assert_eq!(store.session(&id).map(|s| s.start_time), Some(5.0));
        assert_eq!(store.session(&hash).map(|s| s.start_time), Some(5.0));
        assert!(store.session("missing").is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut store = MemoryStore::with_capacity(2);
        for start in [1.0, 2.0, 3.0] {
            store.store_session(session(start));
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.iter().next().map(|s| s.start_time), Some(2.0));
    }
}
