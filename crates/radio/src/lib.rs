//! Asynchronous radio command channel model
//!
//! This crate defines the seam between the subscriber-identity stack and the
//! radio: a closed set of requests, their typed answers, the failure
//! taxonomy, and unsolicited indications (card status changed, radio state,
//! card refresh). A command is issued with a continuation that the channel
//! completes exactly once, asynchronously, in any order relative to other
//! outstanding commands.
//!
//! The crate also ships [`MockChannel`], a loopback channel that records
//! issued requests and lets a driver complete them out of order — the same
//! role a mock transport plays for a card reader stack.
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod channel;
pub mod command;
pub mod error;
pub mod mock;
pub mod response;
pub mod status;

pub use channel::{
    CommandChannel, CommandResult, Continuation, Indication, IndicationHandler, RadioState,
    RefreshEvent, RefreshKind,
};
pub use command::{Facility, Request};
pub use error::{CommandFailure, FailureCode};
pub use mock::MockChannel;
pub use response::Payload;
pub use status::{
    AppFamily, AppStatusReport, AppType, CardPresence, CardStatusReport, PersoSubState, PinState,
    RawAppState,
};
