use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::trace;

use super::task::Internal;
use crate::models::TargetId;

/// A live recurring timer for one target.
///
/// The timer runs as its own task and posts `Internal::Tick` to the
/// control loop once per period, first firing one full period after it is
/// armed. Dropping the handle cancels it. A tick already queued when the
/// timer is dropped is still delivered, so the control loop checks the
/// timer id and pause flag when handling it.
pub(crate) struct TimerHandle {
    id: u64,
    handle: JoinHandle<()>,
}

impl TimerHandle {
    pub(crate) fn spawn(
        target_id: TargetId,
        timer_id: u64,
        period: Duration,
        tx: mpsc::UnboundedSender<Internal>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                trace!(target_id = %target_id, timer_id, "Timer fired");
                if tx.send(Internal::Tick { target_id, timer_id }).is_err() {
                    break;
                }
            }
        });

        Self { id: timer_id, handle }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
