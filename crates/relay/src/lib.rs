//! Relay engine for RTP-to-RTMP forwarding
//!
//! This crate owns the media side of the gateway. A [`RelayEngine`] turns a
//! [`LaunchSpec`] into a running [`RelayTask`] that ingests RTP media on two
//! local UDP ports and publishes the remuxed stream to an RTMP destination,
//! reporting what happens through a broadcast stream of [`RelayEvent`]s.
//!
//! The production engine ([`gst::GstLaunchEngine`]) drives one
//! `gst-launch-1.0` subprocess per task; [`mock::MockRelayEngine`] stands in
//! for it in tests.

pub mod engine;
pub mod error;
pub mod event;
pub mod gst;
pub mod mock;

pub use engine::{LaunchSpec, RelayEngine, RelayTask};
pub use error::RelayError;
pub use event::{RelayEvent, RelayState};
