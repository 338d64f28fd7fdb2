//! Streamcast Gateway
//!
//! Session-lifecycle and control-plane core bridging signaling-managed
//! WebRTC connection handles to external media relays. A signaling host
//! drives it through a handful of entry points; each session owns at most
//! one relay task forwarding its media to an RTMP(S) destination.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        streamcast-gateway                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌───────────────┐  ← create / request / hangup / destroy        │
//! │  │  Gateway      │    (signaling host)                           │
//! │  │  (lifecycle)  │                                               │
//! │  └──────┬────────┘                                               │
//! │         │ looks up                                               │
//! │         ▼                                                        │
//! │  ┌───────────────┐   ┌─────────────────┐   ┌──────────────────┐  │
//! │  │ Session Store │──▶│ Request Router  │──▶│  Port Allocator  │  │
//! │  │ (handle map)  │   │ (start / stop)  │   │  (atomic pairs)  │  │
//! │  └───────────────┘   └────────┬────────┘   └──────────────────┘  │
//! │                               │ launches                         │
//! │                               ▼                                  │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │ Relay Supervisor ──▶ RelayEngine (gst-launch subprocess)   │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod ports;
pub mod router;
pub mod session;
pub mod store;
pub mod supervisor;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::Gateway;
pub use session::{HandleId, SessionSummary};
