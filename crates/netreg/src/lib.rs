//! Service-state polling and registration transition events
//!
//! The poller asks the radio three questions per cycle (operator identity,
//! voice registration, data registration), merges the answers into a
//! pending snapshot regardless of arrival order, and on completion diffs it
//! against the published snapshot: attach/detach, roaming flips, technology
//! changes and location changes each fire their own event, and the merged
//! snapshot is swapped in atomically.
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod poller;
pub mod state;

pub use config::PollerConfig;
pub use poller::ServiceStatePoller;
pub use state::{RadioTech, RegState, ServiceState};
