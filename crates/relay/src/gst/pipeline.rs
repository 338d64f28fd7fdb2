//! Relay pipeline description
//!
//! Builds the `gst-launch` pipeline that ingests WebRTC media over RTP,
//! transcodes the Opus audio to AAC, and muxes both streams into a
//! streamable FLV pushed to the RTMP destination.

use crate::engine::LaunchSpec;

use super::GstEngineConfig;

/// Render the launch description for one relay task
///
/// Audio ingests into rtpbin pad 1 and video into pad 0. The video stream is
/// depayloaded and passed through untouched; the audio stream is decoded from
/// Opus and re-encoded as AAC before hitting the muxer.
pub fn launch_description(config: &GstEngineConfig, spec: &LaunchSpec) -> String {
    format!(
        "rtpbin name=rtpbin \
         udpsrc address={host} port={audio} caps=\"application/x-rtp, media=audio, encoding-name=OPUS, clock-rate=48000\" ! rtpbin.recv_rtp_sink_1 \
         udpsrc address={host} port={video} caps=\"application/x-rtp, media=video, encoding-name=H264, clock-rate=90000\" ! rtpbin.recv_rtp_sink_0 \
         rtpbin. ! rtph264depay ! flvmux streamable=true name=mux ! rtmpsink location=\"{url}\" \
         rtpbin. ! rtpopusdepay ! queue ! opusdec ! voaacenc bitrate={bitrate} ! mux.",
        host = config.ingest_host,
        audio = spec.audio_port,
        video = spec.video_port,
        url = spec.destination,
        bitrate = config.aac_bitrate,
    )
}
