pub mod config;
pub mod controller;
pub mod database;
pub mod error;
pub mod events;
pub mod models;
pub mod monitoring;
pub mod validation;

pub use controller::ScheduleController;
pub use error::{ControllerError, RepositoryError, SchedulerError, ValidationError};
pub use events::{EventBus, SchedulerEvent};
pub use models::{HttpMethod, NewTarget, TargetDefinition, TargetId};
