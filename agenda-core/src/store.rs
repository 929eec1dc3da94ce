//! Session storage and per-identity turn serialization.
//!
//! The engine never touches shared state: callers load a session, run one
//! turn, and write the result back. To keep two near-simultaneous messages
//! from the same sender from both reading the same stale session, callers
//! hold the identity's [`TurnLocks`] guard across that read-modify-write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::models::Session;

/// Key-value store of conversation sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, or a fresh MENU session when none exists.
    async fn get(&self, identity: &str) -> Session;

    /// Unconditional overwrite.
    async fn put(&self, identity: &str, session: Session);

    /// Idempotent.
    async fn delete(&self, identity: &str);

    /// Number of stored (non-initial) sessions.
    async fn count(&self) -> usize;
}

/// Process-local session map.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, identity: &str) -> Session {
        self.sessions
            .read()
            .await
            .get(identity)
            .cloned()
            .unwrap_or_else(|| Session::new(identity))
    }

    async fn put(&self, identity: &str, session: Session) {
        self.sessions
            .write()
            .await
            .insert(identity.to_string(), session);
    }

    async fn delete(&self, identity: &str) {
        self.sessions.write().await.remove(identity);
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Write a turn's outcome back: MENU sessions are removed, anything else is stored.
pub async fn write_back(store: &dyn SessionStore, session: Session) {
    if session.is_initial() {
        store.delete(&session.identity).await;
    } else {
        let identity = session.identity.clone();
        store.put(&identity, session).await;
    }
}

/// One async mutex per identity.
#[derive(Debug, Default)]
pub struct TurnLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`'s session.
    pub async fn acquire(&self, identity: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop entries nobody is holding or waiting on.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
