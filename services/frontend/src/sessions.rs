//! Editing sessions
//!
//! Server-side state of an open editor, keyed by an opaque id. A session
//! expires after `SESSION_TTL` without requests; expired sessions are
//! dropped on access and by the periodic sweep.

use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

pub const SESSION_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("wrong session id - {0}")]
pub struct SessionError(pub Uuid);

struct Entry<S> {
    state: S,
    touched: Instant,
}

impl<S> Entry<S> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.touched.elapsed() > ttl
    }
}

pub struct SessionStore<S> {
    sessions: DashMap<Uuid, Entry<S>>,
    ttl: Duration,
}

impl<S> SessionStore<S> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn open(&self, state: S) -> Uuid {
        let id = Uuid::now_v7();
        self.sessions.insert(
            id,
            Entry {
                state,
                touched: Instant::now(),
            },
        );
        id
    }

    /// Run `f` on the session state and prolong the session.
    pub fn with<T>(&self, id: Uuid, f: impl FnOnce(&mut S) -> T) -> Result<T, SessionError> {
        let mut entry = self.sessions.get_mut(&id).ok_or(SessionError(id))?;
        if entry.is_expired(self.ttl) {
            drop(entry);
            self.sessions.remove(&id);
            return Err(SessionError(id));
        }

        entry.touched = Instant::now();
        Ok(f(&mut entry.state))
    }

    /// Close the session and hand out its state.
    pub fn take(&self, id: Uuid) -> Result<S, SessionError> {
        let (_, entry) = self.sessions.remove(&id).ok_or(SessionError(id))?;
        if entry.is_expired(self.ttl) {
            return Err(SessionError(id));
        }
        Ok(entry.state)
    }

    /// Drop expired sessions, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut dropped = 0;
        self.sessions.retain(|_, entry| {
            let keep = !entry.is_expired(self.ttl);
            if !keep {
                dropped += 1;
            }
            keep
        });
        dropped
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[tokio::test]
    async fn test_with_updates_state() {
        let store = SessionStore::new(SESSION_TTL);
        let id = store.open(vec![1]);

        store.with(id, |rows| rows.push(2)).unwrap();

        assert_eq!(store.take(id).unwrap(), vec![1, 2]);
        assert_eq!(store.take(id), Err(SessionError(id)));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let store: SessionStore<()> = SessionStore::new(SESSION_TTL);
        let id = Uuid::now_v7();

        let err = store.with(id, |_| ()).unwrap_err();
        assert_eq!(err.to_string(), format!("wrong session id - {id}"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires() {
        let store = SessionStore::new(SESSION_TTL);
        let id = store.open(());

        tokio::time::advance(SESSION_TTL + Duration::from_secs(1)).await;

        assert_eq!(store.with(id, |_| ()), Err(SessionError(id)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_prolongs_session() {
        let store = SessionStore::new(SESSION_TTL);
        let id = store.open(());

        tokio::time::advance(SESSION_TTL - Duration::from_secs(1)).await;
        store.with(id, |_| ()).unwrap();
        tokio::time::advance(SESSION_TTL - Duration::from_secs(1)).await;

        assert_eq!(store.take(id), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_only_expired() {
        let store = SessionStore::new(SESSION_TTL);
        store.open(1);
        tokio::time::advance(SESSION_TTL).await;
        let fresh = store.open(2);
        tokio::time::advance(Duration::from_secs(1)).await;

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.take(fresh), Ok(2));
    }

    #[test]
    fn test_sweep_while_sessions_open() {
        let store = Arc::new(SessionStore::new(Duration::ZERO));
        let opener = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..20_000 {
                    store.open(n);
                }
            })
        };

        let mut dropped = 0;
        while !opener.is_finished() {
            dropped += store.sweep();
        }
        opener.join().unwrap();
        thread::sleep(Duration::from_millis(1));
        dropped += store.sweep();

        assert_eq!(dropped, 20_000);
        assert_eq!(store.len(), 0);
    }
}
