//! Session lifecycle controller
//!
//! The `Gateway` is the single entry surface for the signaling host. It owns
//! the session store, port allocator, relay supervisor, request router, and
//! metrics, and gates session work behind an explicit process lifecycle:
//! nothing is accepted before `init` or after `shutdown` begins.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use streamcast_relay::gst::GstLaunchEngine;
use streamcast_relay::RelayEngine;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::ports::PortAllocator;
use crate::router::RequestRouter;
use crate::session::{HandleId, Session, SessionSummary};
use crate::store::SessionStore;
use crate::supervisor::RelaySupervisor;

const STATE_CREATED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_SHUTTING_DOWN: u8 = 2;

/// Session lifecycle controller
pub struct Gateway {
    store: SessionStore,
    router: RequestRouter,
    supervisor: Arc<RelaySupervisor>,
    metrics: Arc<Metrics>,
    state: AtomicU8,
}

impl Gateway {
    /// Create a gateway driving `gst-launch` subprocesses
    pub fn new(config: GatewayConfig) -> Self {
        let engine = Arc::new(GstLaunchEngine::new(config.engine.clone()));
        Self::with_engine(&config, engine)
    }

    /// Create a gateway on top of an arbitrary relay engine
    pub fn with_engine(config: &GatewayConfig, engine: Arc<dyn RelayEngine>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let allocator = Arc::new(PortAllocator::new(config.ports.base));
        let supervisor = Arc::new(RelaySupervisor::new(engine, Arc::clone(&metrics)));
        let router = RequestRouter::new(allocator, Arc::clone(&supervisor));

        Self {
            store: SessionStore::new(),
            router,
            supervisor,
            metrics,
            state: AtomicU8::new(STATE_CREATED),
        }
    }

    /// Bring the gateway up
    ///
    /// Idempotent while running; fails once shutdown has begun.
    pub fn init(&self) -> Result<(), GatewayError> {
        match self.state.compare_exchange(
            STATE_CREATED,
            STATE_RUNNING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                tracing::info!("Gateway initialized");
                Ok(())
            }
            Err(STATE_RUNNING) => Ok(()),
            Err(_) => Err(GatewayError::ShuttingDown),
        }
    }

    fn ensure_running(&self) -> Result<(), GatewayError> {
        match self.state.load(Ordering::SeqCst) {
            STATE_RUNNING => Ok(()),
            STATE_CREATED => Err(GatewayError::NotInitialized),
            _ => Err(GatewayError::ShuttingDown),
        }
    }

    /// Register a fresh session for `handle_id`
    pub async fn create_session(&self, handle_id: HandleId) -> Result<(), GatewayError> {
        self.ensure_running()?;
        self.store.create(handle_id.clone()).await?;
        self.metrics.session_created();
        tracing::info!(session_id = %handle_id, "Session created");
        Ok(())
    }

    /// Handle one streaming request for `handle_id`
    ///
    /// The success payload is ready for the signaling host to forward; a
    /// returned error renders to one with [`GatewayError::to_payload`].
    pub async fn handle_request(
        &self,
        handle_id: &HandleId,
        payload: &Value,
    ) -> Result<Value, GatewayError> {
        match self.try_handle_request(handle_id, payload).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.metrics.request_rejected();
                tracing::warn!(session_id = %handle_id, code = e.code(), error = %e, "Request rejected");
                Err(e)
            }
        }
    }

    async fn try_handle_request(
        &self,
        handle_id: &HandleId,
        payload: &Value,
    ) -> Result<Value, GatewayError> {
        self.ensure_running()?;
        let session = self
            .store
            .lookup(handle_id)
            .await
            .ok_or(GatewayError::NotFound)?;
        let reply = self.router.dispatch(&session, payload).await?;
        serde_json::to_value(reply).map_err(|e| anyhow::Error::new(e).into())
    }

    /// Note that WebRTC media started flowing for `handle_id`
    ///
    /// Informational only; forwarding state is driven by explicit requests.
    pub async fn media_ready(&self, handle_id: &HandleId) {
        match self.store.lookup(handle_id).await {
            Some(_) => tracing::info!(session_id = %handle_id, "Media flowing"),
            None => tracing::debug!(session_id = %handle_id, "Media ready for unknown handle"),
        }
    }

    /// Handle a hangup for `handle_id`
    ///
    /// Tears the relay down if one is running. Never surfaces errors:
    /// hangups race explicit stops, and the loser finds an empty slot.
    pub async fn media_stopped(&self, handle_id: &HandleId) {
        let session = match self.store.lookup(handle_id).await {
            Some(session) => session,
            None => return,
        };

        tracing::info!(session_id = %handle_id, "Hangup received");
        self.teardown(&session).await;
    }

    /// Destroy the session for `handle_id`, tearing its relay down first
    pub async fn destroy_session(&self, handle_id: &HandleId) -> Result<(), GatewayError> {
        self.ensure_running()?;

        let session = self
            .store
            .remove(handle_id)
            .await
            .ok_or(GatewayError::NotFound)?;

        self.retire_and_teardown(&session).await;
        self.metrics.session_destroyed();
        tracing::info!(session_id = %handle_id, "Session destroyed");
        Ok(())
    }

    /// Read-only snapshot of the session for `handle_id`
    pub async fn query_session(&self, handle_id: &HandleId) -> Option<SessionSummary> {
        Some(self.store.lookup(handle_id).await?.summary().await)
    }

    /// Stop accepting work and tear down every session
    ///
    /// Active relays are terminated concurrently, each exactly once via its
    /// session slot. Repeat calls drain an already-empty store.
    pub async fn shutdown(&self) {
        let previous = self.state.swap(STATE_SHUTTING_DOWN, Ordering::SeqCst);
        if previous != STATE_SHUTTING_DOWN {
            tracing::info!("Gateway shutting down");
        }

        let sessions = self.store.drain().await;
        let teardowns = sessions.iter().map(|session| async move {
            self.retire_and_teardown(session).await;
            self.metrics.session_destroyed();
        });
        join_all(teardowns).await;
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }

    /// Current metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn teardown(&self, session: &Session) {
        let mut slot = session.forwarding().await;
        if let Some(relay) = slot.take() {
            self.supervisor.stop(&session.handle_id, relay).await;
        }
    }

    /// Teardown for a session that has already left the store
    ///
    /// Retires the session under its guard, so an in-flight start holding a
    /// stale reference cannot commit a relay afterwards.
    async fn retire_and_teardown(&self, session: &Session) {
        let mut slot = session.forwarding().await;
        session.retire();
        if let Some(relay) = slot.take() {
            self.supervisor.stop(&session.handle_id, relay).await;
        }
    }
}
