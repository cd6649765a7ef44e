/// Monitoring engine module - probes targets on their schedules
///
/// This module is responsible for:
/// - Executing HTTP/HTTPS probes
/// - Scheduling recurring probes per target
/// - Keeping the latest result of each target
pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod store;
pub mod types;

pub use executor::{Executor, MonitoringExecutor};
pub use scheduler::{ScheduleStatus, SchedulerHandle};
pub use store::ResultStore;
pub use types::{OverallHealth, ProbeOutcome, ProbeResult, ProbeTrigger};
