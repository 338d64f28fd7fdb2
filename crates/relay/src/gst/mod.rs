//! GStreamer subprocess relay engine
//!
//! Runs one `gst-launch-1.0` process per relay task. The process is spawned
//! with `-e -m`: `-m` prints every bus message so the reader tasks can turn
//! them into [`RelayEvent`]s, and `-e` converts the shutdown SIGINT into an
//! in-pipeline EOS flush so the muxer finalizes the stream before exit.

pub mod bus;
pub mod pipeline;

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, Mutex};

use crate::engine::{LaunchSpec, RelayEngine, RelayTask};
use crate::error::RelayError;
use crate::event::RelayEvent;

/// Shared handle to the task's event sender
///
/// Dropping the sender closes the event stream for every subscriber; the
/// terminate path does this before signaling the process so a solicited
/// shutdown never delivers an EOS event.
type SharedSender = Arc<parking_lot::Mutex<Option<broadcast::Sender<RelayEvent>>>>;

/// Configuration for the GStreamer subprocess engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GstEngineConfig {
    /// Launcher binary to spawn
    #[serde(default = "default_launch_binary")]
    pub launch_binary: String,

    /// Address the ingest UDP sources bind to
    #[serde(default = "default_ingest_host")]
    pub ingest_host: String,

    /// AAC encoder bitrate in bits per second
    #[serde(default = "default_aac_bitrate")]
    pub aac_bitrate: u32,

    /// How long to wait for the EOS flush before force-killing the process
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Capacity of the per-task event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_launch_binary() -> String {
    "gst-launch-1.0".to_string()
}

fn default_ingest_host() -> String {
    "localhost".to_string()
}

fn default_aac_bitrate() -> u32 {
    128_000
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

fn default_event_capacity() -> usize {
    64
}

impl Default for GstEngineConfig {
    fn default() -> Self {
        Self {
            launch_binary: default_launch_binary(),
            ingest_host: default_ingest_host(),
            aac_bitrate: default_aac_bitrate(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Relay engine backed by `gst-launch-1.0` subprocesses
pub struct GstLaunchEngine {
    config: GstEngineConfig,
}

impl GstLaunchEngine {
    /// Create an engine with the given configuration
    pub fn new(config: GstEngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RelayEngine for GstLaunchEngine {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Arc<dyn RelayTask>, RelayError> {
        let description = pipeline::launch_description(&self.config, spec);
        let task_id = format!("relay_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        tracing::info!(task_id = %task_id, %description, "Launching relay pipeline");

        let mut command = Command::new(&self.config.launch_binary);
        command.arg("-e").arg("-m").arg(&description);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        // Own process group so a signal to the launcher can't hit the host.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| {
            RelayError::Launch(format!(
                "failed to spawn {}: {}",
                self.config.launch_binary, e
            ))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // This receiver exists before the reader tasks spawn, so events from
        // a fast-failing process buffer until the first subscriber arrives.
        let (event_tx, first_rx) = broadcast::channel(self.config.event_capacity);
        let sender: SharedSender = Arc::new(parking_lot::Mutex::new(Some(event_tx)));
        let inner = Arc::new(Mutex::new(Some(child)));

        if let Some(stdout) = stdout {
            let reader_sender = sender.clone();
            tokio::spawn(async move {
                let stdout = match tokio::process::ChildStdout::from_std(stdout) {
                    Ok(stdout) => stdout,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to attach relay stdout reader");
                        return;
                    }
                };
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    emit_parsed(&reader_sender, &line);
                }
            });
        }

        if let Some(stderr) = stderr {
            let reader_sender = sender.clone();
            tokio::spawn(async move {
                let stderr = match tokio::process::ChildStderr::from_std(stderr) {
                    Ok(stderr) => stderr,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to attach relay stderr reader");
                        return;
                    }
                };
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    emit_parsed(&reader_sender, &line);
                }
            });
        }

        spawn_exit_watcher(task_id.clone(), inner.clone(), sender.clone());

        Ok(Arc::new(GstRelayTask {
            id: task_id,
            inner,
            sender,
            initial: parking_lot::Mutex::new(Some(first_rx)),
            shutdown_grace: Duration::from_millis(self.config.shutdown_grace_ms),
        }))
    }
}

fn emit_parsed(sender: &SharedSender, line: &str) {
    if let Some(event) = bus::parse_line(line) {
        if let Some(tx) = sender.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

/// Reaps the process if it exits on its own and reports that as an error
/// event. A solicited terminate empties the child slot first, which ends
/// the watcher without a report.
fn spawn_exit_watcher(task_id: String, inner: Arc<Mutex<Option<Child>>>, sender: SharedSender) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;

            let mut guard = inner.lock().await;
            let child = match guard.as_mut() {
                Some(child) => child,
                None => break,
            };

            match child.try_wait() {
                Ok(None) => {}
                Ok(Some(status)) => {
                    *guard = None;
                    drop(guard);
                    tracing::error!(task_id = %task_id, %status, "Relay process exited unexpectedly");
                    if let Some(tx) = sender.lock().as_ref() {
                        let _ = tx.send(RelayEvent::Error {
                            message: format!("relay process exited unexpectedly ({})", status),
                        });
                    }
                    break;
                }
                Err(e) => {
                    tracing::warn!(task_id = %task_id, error = %e, "Failed to poll relay process");
                    break;
                }
            }
        }
    });
}

/// A running `gst-launch-1.0` process
pub struct GstRelayTask {
    id: String,
    inner: Arc<Mutex<Option<Child>>>,
    sender: SharedSender,
    initial: parking_lot::Mutex<Option<broadcast::Receiver<RelayEvent>>>,
    shutdown_grace: Duration,
}

#[async_trait]
impl RelayTask for GstRelayTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn subscribe_events(&self) -> broadcast::Receiver<RelayEvent> {
        // The first subscriber gets the receiver created at launch, with
        // everything emitted since then still buffered in it.
        if let Some(rx) = self.initial.lock().take() {
            return rx;
        }
        let guard = self.sender.lock();
        match guard.as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                // Terminated: hand back a receiver that reports Closed.
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            }
        }
    }

    async fn terminate(&self) -> Result<(), RelayError> {
        // Close the event stream before touching the process so subscribers
        // never observe the EOS this shutdown provokes.
        drop(self.sender.lock().take());
        drop(self.initial.lock().take());

        let mut guard = self.inner.lock().await;
        let mut child = match guard.take() {
            Some(child) => child,
            None => return Ok(()),
        };
        drop(guard);

        tracing::info!(task_id = %self.id, "Stopping relay process");

        // -e turns SIGINT into an in-pipeline EOS flush before exit.
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(child.id() as i32), Signal::SIGINT);
        }
        #[cfg(not(unix))]
        {
            let _ = child.kill();
        }

        let start = Instant::now();
        while start.elapsed() < self.shutdown_grace {
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!(task_id = %self.id, %status, "Relay process exited");
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => return Err(RelayError::Terminate(e.to_string())),
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        tracing::warn!(task_id = %self.id, "Relay process did not flush within grace period, killing");
        child
            .kill()
            .map_err(|e| RelayError::Terminate(e.to_string()))?;
        let _ = child.wait();
        Ok(())
    }
}
