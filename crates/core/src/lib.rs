//! Shared plumbing for the simtrack telephony control plane
//!
//! This crate carries the pieces every layer of the stack leans on:
//!
//! - [`ObserverList`]: multi-subscriber event fan-out backed by channels
//! - [`Countdown`]: a fan-in barrier with cycle identity, for batches of
//!   radio commands that complete out of order
//! - [`SettingsStore`] and [`BroadcastSink`]: the seams towards persistent
//!   key-value storage and the UI/broadcast layer, which live outside this
//!   stack entirely
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod barrier;
pub mod broadcast;
pub mod observer;
pub mod settings;

pub use barrier::Countdown;
pub use broadcast::BroadcastSink;
pub use observer::ObserverList;
pub use settings::{MemorySettings, SettingsStore};
