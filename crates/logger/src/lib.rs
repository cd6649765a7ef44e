//! Shared tracing setup for the pieping binaries.

mod subscriber;

pub use subscriber::{init, init_with_level, try_init_with_level};
pub use tracing::level_filters::LevelFilter;
