use tokio::sync::broadcast;
use tracing::trace;

use crate::models::TargetId;
use crate::monitoring::types::{ProbeResult, ProbeTrigger};

const EVENT_CAPACITY: usize = 256;

/// Structured notifications emitted by the scheduler
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    ProbeDispatched { target_id: TargetId, name: String, trigger: ProbeTrigger },
    ProbeCompleted { target_id: TargetId, name: String, result: ProbeResult },
    TargetPaused { target_id: TargetId },
    TargetResumed { target_id: TargetId },
    /// All timers were rebuilt and the result store was cleared
    Restarted { targets: usize, armed: usize },
}

/// Fan-out channel for [`SchedulerEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SchedulerEvent) {
        // Ignore errors if there are no receivers
        if self.tx.send(event).is_err() {
            trace!("Scheduler event dropped, no subscribers");
        }
    }
}
