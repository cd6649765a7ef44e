//! Per-target recurring probe scheduling.
//!
//! A single control task owns every target, pause flag and timer. Timers
//! and probe tasks report back to it over a channel, so the result store
//! is only ever written from that task.

mod handle;
mod task;
mod timer;


pub use handle::SchedulerHandle;

use serde::Serialize;

use crate::models::TargetId;

/// Schedule state of one target, as seen by the control loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStatus {
    pub target_id: TargetId,
    pub name: String,
    pub paused: bool,
    /// A recurring timer is live
    pub armed: bool,
}
