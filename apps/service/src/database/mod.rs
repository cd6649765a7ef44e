/// Target persistence
///
/// The scheduler only works on an in-memory list; this module loads that
/// list at startup and saves it after every add, edit or delete.
pub mod repository;

pub use repository::{JsonFileRepository, MemoryRepository, TargetRepository};
