pub mod target;

pub use target::{HttpMethod, MAX_INTERVAL_SECONDS, NewTarget, TargetDefinition, TargetId};
