//! Relay supervision
//!
//! The supervisor sits between session logic and the relay engine: it
//! validates destinations, launches relay tasks, watches their event
//! streams, and brings them down again. Event watching runs in its own task
//! per relay and only ever updates the relay's health; tearing the session
//! down stays the signaling host's call.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use regex::Regex;
use tokio::sync::broadcast;

use streamcast_relay::{LaunchSpec, RelayEngine, RelayError, RelayEvent};

use crate::error::GatewayError;
use crate::metrics::Metrics;
use crate::ports::PortPair;
use crate::session::{ActiveRelay, HandleId, RelayHealth};

static DESTINATION: OnceLock<Regex> = OnceLock::new();

fn destination_pattern() -> &'static Regex {
    DESTINATION.get_or_init(|| Regex::new(r"^rtmps?://.+").unwrap())
}

/// Launches, watches, and stops relay tasks
pub struct RelaySupervisor {
    engine: Arc<dyn RelayEngine>,
    metrics: Arc<Metrics>,
}

impl RelaySupervisor {
    pub fn new(engine: Arc<dyn RelayEngine>, metrics: Arc<Metrics>) -> Self {
        Self { engine, metrics }
    }

    /// Check that `url` is an RTMP(S) destination
    ///
    /// The scheme match is case-sensitive: `RTMP://` is rejected.
    pub fn validate_destination(url: &str) -> Result<(), GatewayError> {
        if destination_pattern().is_match(url) {
            Ok(())
        } else {
            Err(GatewayError::InvalidDestination)
        }
    }

    /// Validate, launch, and start watching a relay for one session
    ///
    /// The caller holds the session guard and commits the returned
    /// [`ActiveRelay`] into the forwarding slot.
    pub async fn start(
        &self,
        handle_id: &HandleId,
        destination: &str,
        ports: PortPair,
    ) -> Result<ActiveRelay, GatewayError> {
        Self::validate_destination(destination)?;

        let spec = LaunchSpec {
            audio_port: ports.audio,
            video_port: ports.video,
            destination: destination.to_string(),
        };

        let task = match self.engine.launch(&spec).await {
            Ok(task) => task,
            Err(e) => {
                self.metrics.launch_failed();
                tracing::error!(session_id = %handle_id, error = %e, "Relay launch failed");
                return Err(match e {
                    RelayError::Launch(message) => GatewayError::LaunchFailed(message),
                    other => GatewayError::LaunchFailed(other.to_string()),
                });
            }
        };

        self.metrics.relay_started();
        tracing::info!(
            session_id = %handle_id,
            task_id = %task.id(),
            audio_port = ports.audio,
            video_port = ports.video,
            destination = %destination,
            "Relay started"
        );

        let health = Arc::new(parking_lot::RwLock::new(RelayHealth::Running));
        let events = task.subscribe_events();
        let listener = tokio::spawn(watch_events(handle_id.clone(), events, Arc::clone(&health)));

        Ok(ActiveRelay {
            ports,
            destination: destination.to_string(),
            started_at: Utc::now(),
            task,
            health,
            listener,
        })
    }

    /// Bring a relay down
    ///
    /// Callers obtain `relay` by taking it out of the session slot, so a
    /// relay is only ever stopped once. Engine-side termination errors are
    /// logged, never propagated.
    pub async fn stop(&self, handle_id: &HandleId, relay: ActiveRelay) {
        if let Err(e) = relay.task.terminate().await {
            tracing::warn!(session_id = %handle_id, error = %e, "Relay termination reported an error");
        }
        relay.listener.abort();
        self.metrics.relay_stopped();
        tracing::info!(session_id = %handle_id, "Relay stopped");
    }
}

/// Consume one relay's event stream until it closes
///
/// `Error` events and unsolicited end-of-stream mark the relay degraded;
/// the first reason sticks. Nothing here tears the session down.
async fn watch_events(
    handle_id: HandleId,
    mut events: broadcast::Receiver<RelayEvent>,
    health: Arc<parking_lot::RwLock<RelayHealth>>,
) {
    loop {
        match events.recv().await {
            Ok(RelayEvent::Error { message }) => {
                tracing::error!(session_id = %handle_id, %message, "Relay reported an error");
                mark_degraded(&health, format!("relay error: {}", message));
            }
            Ok(RelayEvent::EndOfStream) => {
                tracing::info!(session_id = %handle_id, "Relay stream ended unexpectedly");
                mark_degraded(&health, "stream ended unexpectedly".to_string());
            }
            Ok(RelayEvent::StateChanged { old, new }) => {
                tracing::debug!(session_id = %handle_id, %old, %new, "Relay state changed");
            }
            Ok(RelayEvent::Other { kind }) => {
                tracing::debug!(session_id = %handle_id, %kind, "Relay event");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(session_id = %handle_id, skipped, "Relay event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn mark_degraded(health: &parking_lot::RwLock<RelayHealth>, reason: String) {
    let mut guard = health.write();
    if matches!(*guard, RelayHealth::Running) {
        *guard = RelayHealth::Degraded { reason };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use streamcast_relay::mock::MockRelayEngine;

    fn test_ports() -> PortPair {
        PortPair {
            audio: 11000,
            video: 11001,
        }
    }

    fn test_supervisor() -> (Arc<MockRelayEngine>, RelaySupervisor, Arc<Metrics>) {
        let engine = Arc::new(MockRelayEngine::new());
        let metrics = Arc::new(Metrics::new());
        let supervisor = RelaySupervisor::new(engine.clone(), Arc::clone(&metrics));
        (engine, supervisor, metrics)
    }

    async fn wait_for_degraded(relay: &ActiveRelay) -> String {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let RelayHealth::Degraded { reason } = &*relay.health.read() {
                    return reason.clone();
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("relay never became degraded")
    }

    #[test]
    fn test_destination_validation() {
        assert!(RelaySupervisor::validate_destination("rtmp://live.example.com/app/key").is_ok());
        assert!(RelaySupervisor::validate_destination("rtmps://live.example.com/x").is_ok());

        assert!(RelaySupervisor::validate_destination("http://example.com").is_err());
        assert!(RelaySupervisor::validate_destination("RTMP://live.example.com/x").is_err());
        assert!(RelaySupervisor::validate_destination("rtmp://").is_err());
        assert!(RelaySupervisor::validate_destination("").is_err());
    }

    #[tokio::test]
    async fn test_start_launches_and_watches() {
        let (engine, supervisor, metrics) = test_supervisor();
        let handle = HandleId::from("h1");

        let relay = supervisor
            .start(&handle, "rtmp://live.example.com/app/key", test_ports())
            .await
            .unwrap();

        assert_eq!(engine.launch_count(), 1);
        let spec = &engine.launched()[0];
        assert_eq!(spec.audio_port, 11000);
        assert_eq!(spec.video_port, 11001);
        assert_eq!(spec.destination, "rtmp://live.example.com/app/key");

        assert_eq!(relay.ports, test_ports());
        assert_eq!(*relay.health.read(), RelayHealth::Running);
        assert_eq!(metrics.snapshot().relays_started, 1);
    }

    #[tokio::test]
    async fn test_invalid_destination_never_reaches_the_engine() {
        let (engine, supervisor, metrics) = test_supervisor();

        let err = supervisor
            .start(&HandleId::from("h1"), "http://example.com", test_ports())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidDestination));
        assert_eq!(engine.launch_count(), 0);
        assert_eq!(metrics.snapshot().launch_failures, 0);
    }

    #[tokio::test]
    async fn test_launch_failure_is_counted() {
        let (engine, supervisor, metrics) = test_supervisor();
        engine.set_fail_launch(true);

        let err = supervisor
            .start(
                &HandleId::from("h1"),
                "rtmp://live.example.com/app/key",
                test_ports(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::LaunchFailed(_)));
        assert_eq!(metrics.snapshot().launch_failures, 1);
        assert_eq!(metrics.snapshot().relays_started, 0);
    }

    #[tokio::test]
    async fn test_stop_terminates_the_task() {
        let (engine, supervisor, metrics) = test_supervisor();
        let handle = HandleId::from("h1");

        let relay = supervisor
            .start(&handle, "rtmp://live.example.com/app/key", test_ports())
            .await
            .unwrap();
        let task = engine.last_task().unwrap();

        supervisor.stop(&handle, relay).await;

        assert!(task.is_terminated());
        assert_eq!(metrics.snapshot().relays_stopped, 1);
    }

    #[tokio::test]
    async fn test_error_event_degrades_with_first_reason() {
        let (engine, supervisor, _metrics) = test_supervisor();

        let relay = supervisor
            .start(
                &HandleId::from("h1"),
                "rtmp://live.example.com/app/key",
                test_ports(),
            )
            .await
            .unwrap();
        let task = engine.last_task().unwrap();

        assert!(task.emit(RelayEvent::Error {
            message: "sink failed".to_string()
        }));
        let reason = wait_for_degraded(&relay).await;
        assert_eq!(reason, "relay error: sink failed");

        // A later end-of-stream does not overwrite the first reason.
        assert!(task.emit(RelayEvent::EndOfStream));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            *relay.health.read(),
            RelayHealth::Degraded {
                reason: "relay error: sink failed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unsolicited_end_of_stream_degrades() {
        let (engine, supervisor, _metrics) = test_supervisor();

        let relay = supervisor
            .start(
                &HandleId::from("h1"),
                "rtmp://live.example.com/app/key",
                test_ports(),
            )
            .await
            .unwrap();

        assert!(engine.last_task().unwrap().emit(RelayEvent::EndOfStream));
        let reason = wait_for_degraded(&relay).await;
        assert_eq!(reason, "stream ended unexpectedly");
    }
}
