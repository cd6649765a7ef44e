use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use super::ScheduleStatus;
use super::timer::TimerHandle;
use crate::error::SchedulerError;
use crate::events::{EventBus, SchedulerEvent};
use crate::models::{TargetDefinition, TargetId};
use crate::monitoring::executor::Executor;
use crate::monitoring::store::ResultStore;
use crate::monitoring::types::{ProbeOutcome, ProbeTrigger};

/// A request sent to the `SchedulerTask` from a `SchedulerHandle`
pub(crate) enum SchedulerRequest {
    /// Dispatch once and arm a timer for every active target
    ArmAll { tx: oneshot::Sender<usize> },

    /// Cancel every timer, leaving results and pause flags alone
    DisarmAll { tx: oneshot::Sender<usize> },

    /// Cancel all timers, clear all results, arm all again
    Restart { tx: oneshot::Sender<usize> },

    /// Replace the target set, then restart
    SetTargets { targets: Vec<TargetDefinition>, tx: oneshot::Sender<usize> },

    Pause { target_id: TargetId, tx: oneshot::Sender<Result<(), SchedulerError>> },
    Resume { target_id: TargetId, tx: oneshot::Sender<Result<(), SchedulerError>> },
    TriggerManual { target_id: TargetId, tx: oneshot::Sender<Result<(), SchedulerError>> },
    TriggerManualAll { tx: oneshot::Sender<usize> },

    ListTargets { tx: oneshot::Sender<Vec<TargetDefinition>> },
    IsPaused { target_id: TargetId, tx: oneshot::Sender<Option<bool>> },
    Status { tx: oneshot::Sender<Vec<ScheduleStatus>> },

    /// Cancel every timer and stop the control loop
    Shutdown { tx: oneshot::Sender<()> },
}

/// Messages from timers and probe tasks back to the control loop
#[derive(Debug)]
pub(crate) enum Internal {
    Tick { target_id: TargetId, timer_id: u64 },
    ProbeFinished { target_id: TargetId, generation: u64, outcome: ProbeOutcome },
}

/// Runtime state of one target.
///
/// A paused entry never holds a timer; an active, armed entry holds exactly
/// one.
#[derive(Default)]
pub(crate) struct ScheduleEntry {
    pub(crate) paused: bool,
    pub(crate) timer: Option<TimerHandle>,
}

/// The control loop. Owns the target set, the schedule entries and every
/// timer; nothing else creates or destroys them. Never awaits a probe.
pub(crate) struct SchedulerTask {
    targets: Vec<TargetDefinition>,
    pub(crate) entries: HashMap<TargetId, ScheduleEntry>,
    store: Arc<ResultStore>,
    executor: Arc<dyn Executor>,
    events: EventBus,
    rx: mpsc::Receiver<SchedulerRequest>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    next_timer_id: u64,
    /// Bumped on every restart
    generation: u64,
    shutdown: bool,
}

impl SchedulerTask {
    pub(crate) fn new(
        targets: Vec<TargetDefinition>,
        executor: Arc<dyn Executor>,
        store: Arc<ResultStore>,
        events: EventBus,
        rx: mpsc::Receiver<SchedulerRequest>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let mut task = Self {
            targets: Vec::new(),
            entries: HashMap::new(),
            store,
            executor,
            events,
            rx,
            internal_tx,
            internal_rx,
            next_timer_id: 0,
            generation: 0,
            shutdown: false,
        };
        task.replace_targets(targets);
        task
    }

    /// Run the main loop of the scheduler
    ///
    /// This should be spawned into its own tokio task
    pub(crate) async fn run(mut self) {
        info!(targets = self.targets.len(), "Scheduler started");

        while !self.shutdown {
            tokio::select! {
                biased;

                Some(message) = self.internal_rx.recv() => self.on_internal(message),

                request = self.rx.recv() => match request {
                    Some(request) => self.on_request(request),
                    None => {
                        debug!("All scheduler handles dropped");
                        break;
                    }
                },
            }
        }

        self.disarm_all();
        info!("Scheduler stopped");
    }

    fn on_request(&mut self, request: SchedulerRequest) {
        // Replies are dropped when the caller has gone away
        match request {
            SchedulerRequest::ArmAll { tx } => {
                let _ = tx.send(self.arm_all());
            }
            SchedulerRequest::DisarmAll { tx } => {
                let _ = tx.send(self.disarm_all());
            }
            SchedulerRequest::Restart { tx } => {
                let _ = tx.send(self.restart());
            }
            SchedulerRequest::SetTargets { targets, tx } => {
                let _ = tx.send(self.set_targets(targets));
            }
            SchedulerRequest::Pause { target_id, tx } => {
                let _ = tx.send(self.pause(target_id));
            }
            SchedulerRequest::Resume { target_id, tx } => {
                let _ = tx.send(self.resume(target_id));
            }
            SchedulerRequest::TriggerManual { target_id, tx } => {
                let _ = tx.send(self.trigger_manual(target_id));
            }
            SchedulerRequest::TriggerManualAll { tx } => {
                let _ = tx.send(self.trigger_manual_all());
            }
            SchedulerRequest::ListTargets { tx } => {
                let _ = tx.send(self.targets.clone());
            }
            SchedulerRequest::IsPaused { target_id, tx } => {
                let _ = tx.send(self.is_paused(target_id));
            }
            SchedulerRequest::Status { tx } => {
                let _ = tx.send(self.status());
            }
            SchedulerRequest::Shutdown { tx } => {
                self.disarm_all();
                self.shutdown = true;
                let _ = tx.send(());
            }
        }
    }

    pub(crate) fn on_internal(&mut self, message: Internal) {
        match message {
            Internal::Tick { target_id, timer_id } => self.tick(target_id, timer_id),
            Internal::ProbeFinished { target_id, generation, outcome } => {
                self.on_probe_finished(target_id, generation, outcome)
            }
        }
    }

    /// Dispatch one probe and arm a timer for every active target. Paused
    /// targets get neither. Returns the number of targets armed.
    pub(crate) fn arm_all(&mut self) -> usize {
        let targets = self.targets.clone();
        let mut armed = 0;

        for target in &targets {
            if self.entries.entry(target.id).or_default().paused {
                debug!(target_id = %target.id, name = %target.name, "Target paused, not arming");
                continue;
            }
            self.dispatch(target, ProbeTrigger::Scheduled);
            self.arm(target);
            armed += 1;
        }

        info!(armed, paused = targets.len() - armed, "All timers armed");
        armed
    }

    /// Cancel every live timer. Returns how many were cancelled.
    pub(crate) fn disarm_all(&mut self) -> usize {
        let cancelled = self
            .entries
            .values_mut()
            .filter_map(|entry| entry.timer.take())
            .count();
        debug!(cancelled, "All timers disarmed");
        cancelled
    }

    /// Cancel all timers, clear all results, arm everything again
    pub(crate) fn restart(&mut self) -> usize {
        self.disarm_all();
        self.store.clear_all();
        self.generation += 1;

        let armed = self.arm_all();
        info!(generation = self.generation, targets = self.targets.len(), armed, "Schedule restarted");
        self.events.publish(SchedulerEvent::Restarted { targets: self.targets.len(), armed });
        armed
    }

    /// Swap in a new target set and restart. Pause flags survive for ids
    /// that are still present; everything for removed ids is dropped.
    pub(crate) fn set_targets(&mut self, targets: Vec<TargetDefinition>) -> usize {
        self.replace_targets(targets);
        self.restart()
    }

    fn replace_targets(&mut self, targets: Vec<TargetDefinition>) {
        let mut seen = HashSet::new();
        let targets: Vec<TargetDefinition> = targets
            .into_iter()
            .filter(|target| {
                let first = seen.insert(target.id);
                if !first {
                    warn!(target_id = %target.id, name = %target.name, "Duplicate target id ignored");
                }
                first
            })
            .collect();

        self.entries.retain(|id, _| seen.contains(id));
        for target in &targets {
            self.entries.entry(target.id).or_default();
        }
        self.targets = targets;
    }

    /// Stop scheduled probes for a target. Idempotent.
    pub(crate) fn pause(&mut self, target_id: TargetId) -> Result<(), SchedulerError> {
        let entry = self.entry_mut(target_id)?;
        let was_paused = entry.paused;
        entry.paused = true;
        let cancelled = entry.timer.take().is_some();

        if was_paused {
            debug!(target_id = %target_id, "Target already paused");
            return Ok(());
        }

        info!(target_id = %target_id, cancelled, "Target paused");
        self.events.publish(SchedulerEvent::TargetPaused { target_id });
        Ok(())
    }

    /// Re-arm a target's timer. The first probe happens one full interval
    /// later; nothing is dispatched now.
    pub(crate) fn resume(&mut self, target_id: TargetId) -> Result<(), SchedulerError> {
        let target = self.target(target_id)?.clone();
        self.entries.entry(target_id).or_default().paused = false;
        self.arm(&target);

        info!(target_id = %target_id, interval_secs = target.interval().as_secs_f64(), "Target resumed");
        self.events.publish(SchedulerEvent::TargetResumed { target_id });
        Ok(())
    }

    /// Timer callback. Ignored if the target was paused or the timer was
    /// replaced after this tick was queued.
    pub(crate) fn tick(&mut self, target_id: TargetId, timer_id: u64) {
        let Some(entry) = self.entries.get(&target_id) else {
            trace!(target_id = %target_id, "Tick for removed target ignored");
            return;
        };
        if entry.paused {
            debug!(target_id = %target_id, "Tick ignored, target paused");
            return;
        }
        if entry.timer.as_ref().map(TimerHandle::id) != Some(timer_id) {
            debug!(target_id = %target_id, timer_id, "Tick from cancelled timer ignored");
            return;
        }

        if let Some(target) = self.targets.iter().find(|t| t.id == target_id).cloned() {
            self.dispatch(&target, ProbeTrigger::Scheduled);
        }
    }

    /// Probe now, paused or not. Pause flag and timer are untouched.
    pub(crate) fn trigger_manual(&mut self, target_id: TargetId) -> Result<(), SchedulerError> {
        let target = self.target(target_id)?.clone();
        info!(target_id = %target_id, name = %target.name, "Manual probe requested");
        self.dispatch(&target, ProbeTrigger::Manual);
        Ok(())
    }

    pub(crate) fn trigger_manual_all(&mut self) -> usize {
        info!(targets = self.targets.len(), "Manual probe of all targets requested");
        for target in &self.targets {
            self.dispatch(target, ProbeTrigger::Manual);
        }
        self.targets.len()
    }

    pub(crate) fn is_paused(&self, target_id: TargetId) -> Option<bool> {
        self.target(target_id).ok()?;
        Some(self.entries.get(&target_id).is_some_and(|entry| entry.paused))
    }

    pub(crate) fn status(&self) -> Vec<ScheduleStatus> {
        self.targets
            .iter()
            .map(|target| {
                let entry = self.entries.get(&target.id);
                ScheduleStatus {
                    target_id: target.id,
                    name: target.name.clone(),
                    paused: entry.is_some_and(|e| e.paused),
                    armed: entry.is_some_and(|e| e.timer.is_some()),
                }
            })
            .collect()
    }

    fn target(&self, target_id: TargetId) -> Result<&TargetDefinition, SchedulerError> {
        self.targets
            .iter()
            .find(|t| t.id == target_id)
            .ok_or(SchedulerError::UnknownTarget(target_id))
    }

    fn entry_mut(&mut self, target_id: TargetId) -> Result<&mut ScheduleEntry, SchedulerError> {
        self.target(target_id)?;
        Ok(self.entries.entry(target_id).or_default())
    }

    /// Cancel any timer for the target, then start a new one
    fn arm(&mut self, target: &TargetDefinition) {
        let timer_id = self.next_timer_id;
        self.next_timer_id += 1;

        let entry = self.entries.entry(target.id).or_default();
        // The old timer must be gone before the new one exists.
        drop(entry.timer.take());
        entry.timer = Some(TimerHandle::spawn(
            target.id,
            timer_id,
            target.interval(),
            self.internal_tx.clone(),
        ));

        debug!(target_id = %target.id, name = %target.name, timer_id, interval_secs = target.interval().as_secs_f64(), "Timer armed");
    }

    /// Stamp the store and start a probe task. The outcome comes back as
    /// `Internal::ProbeFinished`.
    fn dispatch(&self, target: &TargetDefinition, trigger: ProbeTrigger) {
        self.store.mark_dispatched(target.id, Utc::now(), trigger);
        debug!(target_id = %target.id, name = %target.name, %trigger, "Probe dispatched");
        self.events.publish(SchedulerEvent::ProbeDispatched {
            target_id: target.id,
            name: target.name.clone(),
            trigger,
        });

        let executor = Arc::clone(&self.executor);
        let tx = self.internal_tx.clone();
        let generation = self.generation;
        let target = target.clone();

        tokio::spawn(async move {
            let target_id = target.id;
            let started = Instant::now();

            // Run the probe in its own task so a panicking executor still
            // yields a result instead of leaving the entry pending forever.
            let outcome = match tokio::spawn(async move { executor.probe(&target).await }).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(target_id = %target_id, error = %e, "Probe ended without a response");
                    ProbeOutcome::unknown_response(started.elapsed())
                }
            };

            // Fails only after shutdown, when results are no longer wanted
            let _ = tx.send(Internal::ProbeFinished { target_id, generation, outcome });
        });
    }

    pub(crate) fn on_probe_finished(
        &mut self,
        target_id: TargetId,
        generation: u64,
        outcome: ProbeOutcome,
    ) {
        let Some(target) = self.targets.iter().find(|t| t.id == target_id) else {
            debug!(target_id = %target_id, "Result for removed target dropped");
            return;
        };
        let name = target.name.clone();

        if generation != self.generation {
            // Accepted: the probe was started before the last restart
            debug!(target_id = %target_id, generation, current = self.generation, "Result from previous schedule generation");
        }

        let elapsed_ms = (outcome.response_time_seconds * 1000.0).round() as u64;
        if outcome.success {
            debug!(target_id = %target_id, name = %name, status_code = outcome.status_code, elapsed_ms, "Probe succeeded");
        } else {
            debug!(
                target_id = %target_id,
                name = %name,
                status_code = outcome.status_code,
                elapsed_ms,
                error = outcome.error_message.as_deref().unwrap_or_default(),
                "Probe failed"
            );
        }

        self.store.upsert(target_id, outcome);
        if let Some(result) = self.store.get(&target_id) {
            self.events.publish(SchedulerEvent::ProbeCompleted { target_id, name, result });
        }
    }

    #[cfg(test)]
    pub(crate) fn timer_id(&self, target_id: TargetId) -> Option<u64> {
        self.entries.get(&target_id)?.timer.as_ref().map(TimerHandle::id)
    }
}
