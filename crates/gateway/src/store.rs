//! Session registry
//!
//! Maps connection handles to their sessions. The store lock is held only
//! for map operations; session state changes happen afterwards under the
//! session's own guard.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::GatewayError;
use crate::session::{HandleId, Session};

/// Registry of live sessions keyed by handle
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<HandleId, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh idle session for `handle_id`
    ///
    /// Fails with [`GatewayError::AlreadyExists`] when the handle already
    /// has one (stale reuse by the signaling host).
    pub async fn create(&self, handle_id: HandleId) -> Result<Arc<Session>, GatewayError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&handle_id) {
            return Err(GatewayError::AlreadyExists);
        }
        let session = Arc::new(Session::new(handle_id.clone()));
        sessions.insert(handle_id, Arc::clone(&session));
        Ok(session)
    }

    /// Look up the session for `handle_id`
    pub async fn lookup(&self, handle_id: &HandleId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(handle_id).cloned()
    }

    /// Remove and return the session for `handle_id`
    pub async fn remove(&self, handle_id: &HandleId) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(handle_id)
    }

    /// Empty the store, returning every session for teardown
    pub async fn drain(&self) -> Vec<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        sessions.drain().map(|(_, session)| session).collect()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
