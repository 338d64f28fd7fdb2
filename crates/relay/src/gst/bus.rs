//! gst-launch output parsing
//!
//! With `-m` the launcher prints every bus message to stdout and dedicated
//! `ERROR:`/`WARNING:` lines to stderr. This module turns those lines into
//! [`RelayEvent`]s; lines that carry no event (progress chatter, debug info)
//! parse to `None`.

use std::sync::OnceLock;

use regex::Regex;

use crate::event::{RelayEvent, RelayState};

static ERROR_LINE: OnceLock<Regex> = OnceLock::new();
static WARNING_LINE: OnceLock<Regex> = OnceLock::new();
static MESSAGE_LINE: OnceLock<Regex> = OnceLock::new();
static STATE_CHANGE: OnceLock<Regex> = OnceLock::new();

fn error_line() -> &'static Regex {
    ERROR_LINE.get_or_init(|| Regex::new(r"^ERROR: from element (\S+): (.+)$").unwrap())
}

fn warning_line() -> &'static Regex {
    WARNING_LINE.get_or_init(|| Regex::new(r"^WARNING: from element (\S+): (.+)$").unwrap())
}

fn message_line() -> &'static Regex {
    MESSAGE_LINE.get_or_init(|| {
        Regex::new(r#"^Got message #\d+ from \S+ "[^"]*" \(([a-z-]+)\)"#).unwrap()
    })
}

fn state_change() -> &'static Regex {
    STATE_CHANGE.get_or_init(|| {
        Regex::new(
            r"old-state=\(GstState\)(?:GST_STATE_)?([A-Za-z_]+), new-state=\(GstState\)(?:GST_STATE_)?([A-Za-z_]+)",
        )
        .unwrap()
    })
}

/// Parse one launcher output line into a relay event
///
/// `error`/`warning` message kinds on stdout parse to `None`: the dedicated
/// stderr lines already carry them with the full message text.
pub fn parse_line(line: &str) -> Option<RelayEvent> {
    if let Some(captures) = error_line().captures(line) {
        return Some(RelayEvent::Error {
            message: captures[2].to_string(),
        });
    }

    if warning_line().is_match(line) {
        return Some(RelayEvent::Other {
            kind: "warning".to_string(),
        });
    }

    if line.starts_with("Got EOS from element") {
        return Some(RelayEvent::EndOfStream);
    }

    let captures = message_line().captures(line)?;
    let kind = &captures[1];
    match kind {
        // Dedicated stderr lines carry these with the full message.
        "error" | "warning" => None,
        "eos" => Some(RelayEvent::EndOfStream),
        "state-changed" => match parse_state_change(line) {
            Some((old, new)) => Some(RelayEvent::StateChanged { old, new }),
            None => Some(RelayEvent::Other {
                kind: kind.to_string(),
            }),
        },
        _ => Some(RelayEvent::Other {
            kind: kind.to_string(),
        }),
    }
}

fn parse_state_change(line: &str) -> Option<(RelayState, RelayState)> {
    let captures = state_change().captures(line)?;
    let old = RelayState::parse(&captures[1])?;
    let new = RelayState::parse(&captures[2])?;
    Some((old, new))
}
