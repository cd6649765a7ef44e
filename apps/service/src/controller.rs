use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::TargetRepository;
use crate::error::ControllerError;
use crate::events::SchedulerEvent;
use crate::models::{NewTarget, TargetDefinition, TargetId};
use crate::monitoring::{Executor, OverallHealth, ProbeResult, ScheduleStatus, SchedulerHandle};
use crate::validation::validate_new_target;

/// Entry point for every user-facing operation.
///
/// Edits are validated, persisted, and only then pushed to the scheduler as
/// a whole new target set. A failed save leaves the running schedule as it
/// was.
pub struct ScheduleController {
    scheduler: SchedulerHandle,
    repository: Arc<dyn TargetRepository>,
    edit_lock: Mutex<()>,
}

impl ScheduleController {
    /// Load the stored targets, spawn the scheduler and arm every target
    pub async fn start(
        repository: Arc<dyn TargetRepository>,
        executor: Arc<dyn Executor>,
    ) -> Result<Self, ControllerError> {
        let targets = repository.load_targets().await?;
        if targets.is_empty() {
            warn!("No targets configured, nothing will be probed until one is added");
        }

        let count = targets.len();
        let scheduler = SchedulerHandle::spawn(targets, executor);
        let armed = scheduler.arm_all().await?;
        info!(targets = count, armed, "Schedule controller started");

        Ok(Self { scheduler, repository, edit_lock: Mutex::new(()) })
    }

    pub async fn add_target(&self, input: NewTarget) -> Result<TargetDefinition, ControllerError> {
        validate_new_target(&input)?;

        let _guard = self.edit_lock.lock().await;
        let mut targets = self.scheduler.list_targets().await?;
        let target = input.into_definition(Uuid::new_v4());
        targets.push(target.clone());
        self.commit(targets).await?;

        info!(target_id = %target.id, name = %target.name, "Target added");
        Ok(target)
    }

    /// Overwrite the fields of `target_id`, keeping its id and position
    pub async fn replace_target(
        &self,
        target_id: TargetId,
        input: NewTarget,
    ) -> Result<TargetDefinition, ControllerError> {
        validate_new_target(&input)?;

        let _guard = self.edit_lock.lock().await;
        let mut targets = self.scheduler.list_targets().await?;
        let slot = targets
            .iter_mut()
            .find(|target| target.id == target_id)
            .ok_or(ControllerError::NotFound(target_id))?;
        let target = input.into_definition(target_id);
        *slot = target.clone();
        self.commit(targets).await?;

        info!(target_id = %target.id, name = %target.name, "Target updated");
        Ok(target)
    }

    /// Delete a target together with its result and pause flag
    pub async fn remove_target(&self, target_id: TargetId) -> Result<TargetDefinition, ControllerError> {
        let _guard = self.edit_lock.lock().await;
        let mut targets = self.scheduler.list_targets().await?;
        let index = targets
            .iter()
            .position(|target| target.id == target_id)
            .ok_or(ControllerError::NotFound(target_id))?;
        let removed = targets.remove(index);
        self.commit(targets).await?;

        info!(target_id = %removed.id, name = %removed.name, "Target removed");
        Ok(removed)
    }

    async fn commit(&self, targets: Vec<TargetDefinition>) -> Result<(), ControllerError> {
        self.repository.save_targets(&targets).await?;
        self.scheduler.set_targets(targets).await?;
        Ok(())
    }

    pub async fn pause(&self, target_id: TargetId) -> Result<(), ControllerError> {
        Ok(self.scheduler.pause(target_id).await?)
    }

    pub async fn resume(&self, target_id: TargetId) -> Result<(), ControllerError> {
        Ok(self.scheduler.resume(target_id).await?)
    }

    pub async fn trigger_manual(&self, target_id: TargetId) -> Result<(), ControllerError> {
        Ok(self.scheduler.trigger_manual(target_id).await?)
    }

    /// "Call all": probe every target once right now
    pub async fn trigger_manual_all(&self) -> Result<usize, ControllerError> {
        Ok(self.scheduler.trigger_manual_all().await?)
    }

    pub async fn list_targets(&self) -> Result<Vec<TargetDefinition>, ControllerError> {
        Ok(self.scheduler.list_targets().await?)
    }

    pub async fn is_paused(&self, target_id: TargetId) -> Result<bool, ControllerError> {
        self.scheduler
            .is_paused(target_id)
            .await?
            .ok_or(ControllerError::NotFound(target_id))
    }

    pub async fn status(&self) -> Result<Vec<ScheduleStatus>, ControllerError> {
        Ok(self.scheduler.status().await?)
    }

    pub fn get_result(&self, target_id: &TargetId) -> Option<ProbeResult> {
        self.scheduler.get_result(target_id)
    }

    pub fn overall_health(&self) -> OverallHealth {
        self.scheduler.overall_health()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.scheduler.subscribe()
    }

    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        self.scheduler.shutdown().await?;
        info!("Schedule controller stopped");
        Ok(())
    }
}
