//! Scripted relay engine for tests
//!
//! `MockRelayEngine` records every launch instead of spawning a process and
//! hands out tasks that tests can drive: inject events with
//! [`MockRelayTask::emit`] and observe teardown with
//! [`MockRelayTask::termination_count`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::engine::{LaunchSpec, RelayEngine, RelayTask};
use crate::error::RelayError;
use crate::event::RelayEvent;

/// Relay engine that records launches instead of spawning processes
#[derive(Default)]
pub struct MockRelayEngine {
    fail_launch: AtomicBool,
    launched: parking_lot::Mutex<Vec<LaunchSpec>>,
    tasks: parking_lot::Mutex<Vec<Arc<MockRelayTask>>>,
}

impl MockRelayEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent launch fail with [`RelayError::Launch`]
    pub fn set_fail_launch(&self, fail: bool) {
        self.fail_launch.store(fail, Ordering::SeqCst);
    }

    /// Specs passed to successful launches, in order
    pub fn launched(&self) -> Vec<LaunchSpec> {
        self.launched.lock().clone()
    }

    /// Number of successful launches
    pub fn launch_count(&self) -> usize {
        self.launched.lock().len()
    }

    /// Task handed out by the `index`-th successful launch
    pub fn task(&self, index: usize) -> Option<Arc<MockRelayTask>> {
        self.tasks.lock().get(index).cloned()
    }

    /// Task handed out by the most recent successful launch
    pub fn last_task(&self) -> Option<Arc<MockRelayTask>> {
        self.tasks.lock().last().cloned()
    }
}

#[async_trait]
impl RelayEngine for MockRelayEngine {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Arc<dyn RelayTask>, RelayError> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(RelayError::Launch("scripted launch failure".to_string()));
        }

        self.launched.lock().push(spec.clone());

        let mut tasks = self.tasks.lock();
        let task = Arc::new(MockRelayTask::new(tasks.len()));
        tasks.push(Arc::clone(&task));
        Ok(task)
    }
}

/// Task handed out by [`MockRelayEngine`]
pub struct MockRelayTask {
    id: String,
    sender: parking_lot::Mutex<Option<broadcast::Sender<RelayEvent>>>,
    terminations: AtomicUsize,
}

impl MockRelayTask {
    fn new(index: usize) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            id: format!("mock_{index}"),
            sender: parking_lot::Mutex::new(Some(sender)),
            terminations: AtomicUsize::new(0),
        }
    }

    /// Inject an event into the task's stream
    ///
    /// Returns false once the task is terminated or nobody is subscribed.
    pub fn emit(&self, event: RelayEvent) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// How many times `terminate` has been called
    pub fn termination_count(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.termination_count() > 0
    }
}

#[async_trait]
impl RelayTask for MockRelayTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn subscribe_events(&self) -> broadcast::Receiver<RelayEvent> {
        let guard = self.sender.lock();
        match guard.as_ref() {
            Some(sender) => sender.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            }
        }
    }

    async fn terminate(&self) -> Result<(), RelayError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        drop(self.sender.lock().take());
        Ok(())
    }
}
