//! Refresh scheduling for the cached binary.
//!
//! - [`config`] - `[update]` section of the configuration
//! - [`deadline`] - the persisted next-check timestamp
//! - [`scheduler`] - blocking vs. background refresh decisions

pub mod config;
pub mod deadline;
pub mod scheduler;

pub use config::UpdateConfig;
pub use deadline::NextCheckDeadline;
pub use scheduler::{Ensured, UpdateScheduler};
