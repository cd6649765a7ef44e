use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::ScheduleStatus;
use super::task::{SchedulerRequest, SchedulerTask};
use crate::error::SchedulerError;
use crate::events::{EventBus, SchedulerEvent};
use crate::models::{TargetDefinition, TargetId};
use crate::monitoring::executor::Executor;
use crate::monitoring::store::ResultStore;
use crate::monitoring::types::{OverallHealth, ProbeResult};

const REQUEST_QUEUE: usize = 64;

/// Cloneable front end to a running scheduler.
///
/// Every mutation goes through the control loop, so calls from any task are
/// serialized. Results are read straight from the shared store.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerRequest>,
    store: Arc<ResultStore>,
    events: EventBus,
}

impl SchedulerHandle {
    /// Spawn the control loop for `targets`. Nothing is armed until
    /// [`SchedulerHandle::arm_all`] is called.
    pub fn spawn(targets: Vec<TargetDefinition>, executor: Arc<dyn Executor>) -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let store = Arc::new(ResultStore::new());
        let events = EventBus::new();

        let task = SchedulerTask::new(targets, executor, store.clone(), events.clone(), rx);
        tokio::spawn(task.run());

        Self { tx, store, events }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SchedulerRequest,
    ) -> Result<T, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(build(tx)).await.map_err(|_| SchedulerError::Stopped)?;
        rx.await.map_err(|_| SchedulerError::Stopped)
    }

    /// Probe every active target once and arm its timer. Returns the number
    /// of targets armed.
    pub async fn arm_all(&self) -> Result<usize, SchedulerError> {
        self.request(|tx| SchedulerRequest::ArmAll { tx }).await
    }

    /// Cancel every timer. Results and pause flags are kept.
    pub async fn disarm_all(&self) -> Result<usize, SchedulerError> {
        self.request(|tx| SchedulerRequest::DisarmAll { tx }).await
    }

    /// Cancel every timer, clear every result and arm again
    pub async fn restart(&self) -> Result<usize, SchedulerError> {
        self.request(|tx| SchedulerRequest::Restart { tx }).await
    }

    /// Replace the whole target set.
    ///
    /// Any change, even to a single target, restarts everything: all
    /// timers are rebuilt and all results are cleared.
    pub async fn set_targets(&self, targets: Vec<TargetDefinition>) -> Result<usize, SchedulerError> {
        self.request(|tx| SchedulerRequest::SetTargets { targets, tx }).await
    }

    pub async fn pause(&self, target_id: TargetId) -> Result<(), SchedulerError> {
        self.request(|tx| SchedulerRequest::Pause { target_id, tx }).await?
    }

    /// Re-arm a paused target. The next probe happens one interval from now.
    pub async fn resume(&self, target_id: TargetId) -> Result<(), SchedulerError> {
        self.request(|tx| SchedulerRequest::Resume { target_id, tx }).await?
    }

    /// Probe a target now, even if it is paused
    pub async fn trigger_manual(&self, target_id: TargetId) -> Result<(), SchedulerError> {
        self.request(|tx| SchedulerRequest::TriggerManual { target_id, tx }).await?
    }

    /// Probe every target now, paused ones included
    pub async fn trigger_manual_all(&self) -> Result<usize, SchedulerError> {
        self.request(|tx| SchedulerRequest::TriggerManualAll { tx }).await
    }

    pub async fn list_targets(&self) -> Result<Vec<TargetDefinition>, SchedulerError> {
        self.request(|tx| SchedulerRequest::ListTargets { tx }).await
    }

    /// `None` for an unknown target
    pub async fn is_paused(&self, target_id: TargetId) -> Result<Option<bool>, SchedulerError> {
        self.request(|tx| SchedulerRequest::IsPaused { target_id, tx }).await
    }

    pub async fn status(&self) -> Result<Vec<ScheduleStatus>, SchedulerError> {
        self.request(|tx| SchedulerRequest::Status { tx }).await
    }

    /// Cancel all timers and stop the control loop. Probes already in
    /// flight run to completion; their results are discarded.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.request(|tx| SchedulerRequest::Shutdown { tx }).await
    }

    pub fn get_result(&self, target_id: &TargetId) -> Option<ProbeResult> {
        self.store.get(target_id)
    }

    pub fn results(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub fn overall_health(&self) -> OverallHealth {
        self.store.overall_health()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }
}
