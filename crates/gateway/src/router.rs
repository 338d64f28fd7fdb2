//! Request parsing and dispatch
//!
//! Turns untyped JSON payloads from the signaling host into typed requests,
//! runs them against the session's forwarding slot, and renders the typed
//! replies. Parsing is side-effect-free: nothing is allocated or launched
//! until the request has fully validated.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::ports::PortAllocator;
use crate::session::Session;
use crate::supervisor::RelaySupervisor;

/// A validated streaming request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamingRequest {
    /// Begin forwarding to `destination`
    Start { destination: String },

    /// Stop forwarding
    Stop,
}

impl StreamingRequest {
    /// Validate an untyped payload into a request
    ///
    /// The `request` verb matches ASCII case-insensitively; `url` is
    /// mandatory on start and ignored on stop.
    pub fn parse(payload: &Value) -> Result<Self, GatewayError> {
        let root = payload
            .as_object()
            .ok_or_else(|| GatewayError::InvalidRequest("JSON error: not an object".to_string()))?;

        let request = match root.get("request") {
            None => return Err(GatewayError::MissingField("request")),
            Some(Value::String(request)) => request,
            Some(_) => {
                return Err(GatewayError::InvalidRequest(
                    "Invalid element type (request should be a string)".to_string(),
                ))
            }
        };

        if request.eq_ignore_ascii_case("start") {
            let destination = match root.get("url") {
                None => return Err(GatewayError::MissingField("url")),
                Some(Value::String(url)) => url.clone(),
                Some(_) => {
                    return Err(GatewayError::InvalidRequest(
                        "Invalid element type (url should be a string)".to_string(),
                    ))
                }
            };
            Ok(StreamingRequest::Start { destination })
        } else if request.eq_ignore_ascii_case("stop") {
            Ok(StreamingRequest::Stop)
        } else {
            Err(GatewayError::UnknownRequest(request.clone()))
        }
    }
}

/// A successful reply to a streaming request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "streaming", rename_all = "lowercase")]
pub enum StreamingReply {
    /// Forwarding began on the given ingest ports
    Started { audio_port: u16, video_port: u16 },

    /// Forwarding stopped
    Stopped,
}

/// Runs validated requests against a session
pub struct RequestRouter {
    allocator: Arc<PortAllocator>,
    supervisor: Arc<RelaySupervisor>,
}

impl RequestRouter {
    pub fn new(allocator: Arc<PortAllocator>, supervisor: Arc<RelaySupervisor>) -> Self {
        Self {
            allocator,
            supervisor,
        }
    }

    /// Parse and run one request for `session`
    pub async fn dispatch(
        &self,
        session: &Session,
        payload: &Value,
    ) -> Result<StreamingReply, GatewayError> {
        match StreamingRequest::parse(payload)? {
            StreamingRequest::Start { destination } => self.start(session, &destination).await,
            StreamingRequest::Stop => self.stop(session).await,
        }
    }

    /// Launch a relay for an idle session
    ///
    /// The guard is held from the state check to the slot commit, so two
    /// concurrent starts serialize and the loser sees `AlreadyActive`, and
    /// a start racing a destroy either commits before the destroy teardown
    /// takes the slot or finds the session retired. The port counter only
    /// advances once the destination has validated; a pair allocated before
    /// a failed launch is burned.
    async fn start(
        &self,
        session: &Session,
        destination: &str,
    ) -> Result<StreamingReply, GatewayError> {
        let mut slot = session.forwarding().await;
        if session.is_retired() {
            return Err(GatewayError::NotFound);
        }
        if slot.is_some() {
            return Err(GatewayError::AlreadyActive);
        }

        RelaySupervisor::validate_destination(destination)?;
        let ports = self.allocator.allocate_pair();
        let relay = self
            .supervisor
            .start(&session.handle_id, destination, ports)
            .await?;
        *slot = Some(relay);

        Ok(StreamingReply::Started {
            audio_port: ports.audio,
            video_port: ports.video,
        })
    }

    /// Stop an active session's relay
    ///
    /// Taking the relay out of the slot under the guard is the single
    /// handover point; a concurrent hangup teardown finds the slot empty.
    async fn stop(&self, session: &Session) -> Result<StreamingReply, GatewayError> {
        let mut slot = session.forwarding().await;
        let relay = slot.take().ok_or(GatewayError::NotActive)?;
        self.supervisor.stop(&session.handle_id, relay).await;
        Ok(StreamingReply::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::session::HandleId;
    use serde_json::json;
    use streamcast_relay::mock::MockRelayEngine;

    fn test_router() -> (Arc<MockRelayEngine>, Arc<PortAllocator>, RequestRouter) {
        let engine = Arc::new(MockRelayEngine::new());
        let allocator = Arc::new(PortAllocator::default());
        let supervisor = Arc::new(RelaySupervisor::new(
            engine.clone(),
            Arc::new(Metrics::new()),
        ));
        let router = RequestRouter::new(Arc::clone(&allocator), supervisor);
        (engine, allocator, router)
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        for payload in [json!("start"), json!([1, 2]), json!(null), json!(42)] {
            let err = StreamingRequest::parse(&payload).unwrap_err();
            assert_eq!(err.code(), 411);
            assert_eq!(err.to_string(), "JSON error: not an object");
        }
    }

    #[test]
    fn test_parse_requires_request_field() {
        let err = StreamingRequest::parse(&json!({})).unwrap_err();
        assert!(matches!(err, GatewayError::MissingField("request")));

        let err = StreamingRequest::parse(&json!({ "request": 42 })).unwrap_err();
        assert_eq!(err.code(), 411);
    }

    #[test]
    fn test_parse_start_requires_url() {
        let err = StreamingRequest::parse(&json!({ "request": "start" })).unwrap_err();
        assert!(matches!(err, GatewayError::MissingField("url")));

        let err =
            StreamingRequest::parse(&json!({ "request": "start", "url": true })).unwrap_err();
        assert_eq!(err.code(), 411);
    }

    #[test]
    fn test_parse_matches_verbs_case_insensitively() {
        let request =
            StreamingRequest::parse(&json!({ "request": "START", "url": "rtmp://x/y" })).unwrap();
        assert_eq!(
            request,
            StreamingRequest::Start {
                destination: "rtmp://x/y".to_string()
            }
        );

        let request = StreamingRequest::parse(&json!({ "request": "Stop" })).unwrap();
        assert_eq!(request, StreamingRequest::Stop);
    }

    #[test]
    fn test_parse_rejects_unknown_verbs() {
        let err = StreamingRequest::parse(&json!({ "request": "pause" })).unwrap_err();
        assert!(matches!(err, GatewayError::UnknownRequest(ref verb) if verb == "pause"));
        assert_eq!(err.to_string(), "Unknown request 'pause'");
    }

    #[test]
    fn test_reply_payload_shapes() {
        let started = serde_json::to_value(StreamingReply::Started {
            audio_port: 11000,
            video_port: 11001,
        })
        .unwrap();
        assert_eq!(
            started,
            json!({ "streaming": "started", "audio_port": 11000, "video_port": 11001 })
        );

        let stopped = serde_json::to_value(StreamingReply::Stopped).unwrap();
        assert_eq!(stopped, json!({ "streaming": "stopped" }));
    }

    #[tokio::test]
    async fn test_start_commits_the_slot() {
        let (engine, _allocator, router) = test_router();
        let session = Session::new(HandleId::from("h1"));

        let reply = router
            .dispatch(&session, &json!({ "request": "start", "url": "rtmp://x/y" }))
            .await
            .unwrap();

        assert_eq!(
            reply,
            StreamingReply::Started {
                audio_port: 11000,
                video_port: 11001,
            }
        );
        assert!(session.is_active().await);
        assert_eq!(engine.launch_count(), 1);
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let (engine, _allocator, router) = test_router();
        let session = Session::new(HandleId::from("h1"));
        let start = json!({ "request": "start", "url": "rtmp://x/y" });

        router.dispatch(&session, &start).await.unwrap();
        let err = router.dispatch(&session, &start).await.unwrap_err();

        assert!(matches!(err, GatewayError::AlreadyActive));
        assert_eq!(engine.launch_count(), 1);
        assert!(session.is_active().await);
    }

    #[tokio::test]
    async fn test_stop_on_idle_session_never_reaches_the_engine() {
        let (engine, _allocator, router) = test_router();
        let session = Session::new(HandleId::from("h1"));

        let err = router
            .dispatch(&session, &json!({ "request": "stop" }))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::NotActive));
        assert_eq!(engine.launch_count(), 0);
    }

    #[tokio::test]
    async fn test_start_then_stop_ends_idle() {
        let (engine, _allocator, router) = test_router();
        let session = Session::new(HandleId::from("h1"));

        router
            .dispatch(&session, &json!({ "request": "start", "url": "rtmp://x/y" }))
            .await
            .unwrap();
        let reply = router
            .dispatch(&session, &json!({ "request": "stop" }))
            .await
            .unwrap();

        assert_eq!(reply, StreamingReply::Stopped);
        assert!(!session.is_active().await);
        assert_eq!(engine.last_task().unwrap().termination_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_destination_leaves_the_counter_untouched() {
        let (engine, allocator, router) = test_router();
        let session = Session::new(HandleId::from("h1"));

        let err = router
            .dispatch(
                &session,
                &json!({ "request": "start", "url": "http://example.com" }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidDestination));
        assert_eq!(allocator.next_port(), 11000);
        assert_eq!(engine.launch_count(), 0);
        assert!(!session.is_active().await);
    }

    #[tokio::test]
    async fn test_failed_launch_burns_the_pair() {
        let (engine, allocator, router) = test_router();
        let session = Session::new(HandleId::from("h1"));
        engine.set_fail_launch(true);

        let err = router
            .dispatch(&session, &json!({ "request": "start", "url": "rtmp://x/y" }))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::LaunchFailed(_)));
        assert!(!session.is_active().await);
        assert_eq!(allocator.next_port(), 11002);

        engine.set_fail_launch(false);
        let reply = router
            .dispatch(&session, &json!({ "request": "start", "url": "rtmp://x/y" }))
            .await
            .unwrap();
        assert_eq!(
            reply,
            StreamingReply::Started {
                audio_port: 11002,
                video_port: 11003,
            }
        );
    }
}
