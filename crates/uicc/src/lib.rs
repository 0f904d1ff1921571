//! UICC card, application and subscriber-record model
//!
//! The heart of the subscriber-identity control plane: a per-slot card model
//! rebuilt wholesale from radio status snapshots, per-application state
//! machines with PIN/PUK/personalization lock handling, an asynchronous
//! record loader that chases extension-record chains, and a compat facade
//! presenting the single-application view older callers expect.
//!
//! Ownership follows the slot hierarchy: the process constructs one
//! [`CardController`], which owns one [`Card`] per slot, which owns its
//! [`CardApplication`]s, each of which owns a [`RecordStore`] and a
//! [`FileAccess`]. Everything below the controller is rebuilt or updated in
//! place from whole-card status snapshots, never mutated piecemeal.
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod app;
pub mod card;
pub mod controller;
pub mod facade;
pub mod files;
pub mod loader;
pub mod store;

pub use app::{AppState, CardApplication, OpCallback, OpOutcome};
pub use card::Card;
pub use controller::{CardController, ControllerError};
pub use facade::{CardFacade, ExternalState, SubscriptionMode};
pub use loader::{FileAccess, LoadError, RecordData, RecordSet};
pub use store::RecordStore;
