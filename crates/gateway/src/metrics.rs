//! Metrics collection for the gateway
//!
//! Basic counters for monitoring gateway health. The collector is owned by
//! the gateway instance and shared by `Arc`, never a process-wide global.

use std::sync::atomic::{AtomicU64, Ordering};

/// Gateway metrics collector
#[derive(Default)]
pub struct Metrics {
    /// Total sessions created since startup
    sessions_created: AtomicU64,

    /// Total sessions destroyed since startup
    sessions_destroyed: AtomicU64,

    /// Current live session count
    active_sessions: AtomicU64,

    /// Total relay tasks started since startup
    relays_started: AtomicU64,

    /// Total relay tasks stopped since startup
    relays_stopped: AtomicU64,

    /// Total relay launches that failed
    launch_failures: AtomicU64,

    /// Total requests answered with an error payload
    requests_rejected: AtomicU64,

    /// Startup timestamp (unix seconds)
    startup_time: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            startup_time: AtomicU64::new(now),
            ..Default::default()
        }
    }

    /// Record a session creation
    pub fn session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session being destroyed
    pub fn session_destroyed(&self) {
        self.sessions_destroyed.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a relay task starting
    pub fn relay_started(&self) {
        self.relays_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a relay task stopping
    pub fn relay_stopped(&self) {
        self.relays_stopped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed relay launch
    pub fn launch_failed(&self) {
        self.launch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request answered with an error payload
    pub fn request_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let uptime_secs = now.saturating_sub(self.startup_time.load(Ordering::Relaxed));

        MetricsSnapshot {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_destroyed: self.sessions_destroyed.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            relays_started: self.relays_started.load(Ordering::Relaxed),
            relays_stopped: self.relays_stopped.load(Ordering::Relaxed),
            launch_failures: self.launch_failures.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            uptime_secs,
        }
    }

    /// Get active session count
    pub fn active_session_count(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total sessions created
    pub sessions_created: u64,

    /// Total sessions destroyed
    pub sessions_destroyed: u64,

    /// Currently live sessions
    pub active_sessions: u64,

    /// Total relay tasks started
    pub relays_started: u64,

    /// Total relay tasks stopped
    pub relays_stopped: u64,

    /// Failed relay launches
    pub launch_failures: u64,

    /// Requests answered with an error payload
    pub requests_rejected: u64,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl MetricsSnapshot {
    /// Calculate relay launch success rate
    pub fn launch_success_rate(&self) -> f64 {
        let attempts = self.relays_started + self.launch_failures;
        if attempts == 0 {
            1.0
        } else {
            self.relays_started as f64 / attempts as f64
        }
    }
}
