//! The radio command channel seam
//!
//! One [`CommandChannel`] exists per physical card slot. Commands are
//! issued with a continuation; the channel completes it exactly once,
//! asynchronously, in any order across concurrently outstanding commands.
//! Unsolicited events (status changed, radio state, card refresh) reach
//! subscribers through registered handlers.

use std::fmt;

use crate::command::Request;
use crate::error::CommandFailure;
use crate::response::Payload;

/// Outcome of one radio command
pub type CommandResult = Result<Payload, CommandFailure>;

/// Completion callback for one issued command, invoked exactly once
pub type Continuation = Box<dyn FnOnce(CommandResult) + Send>;

/// Handler for unsolicited radio indications
pub type IndicationHandler = Box<dyn FnMut(Indication) + Send>;

/// Power/availability state of the radio behind a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// Radio process is gone; nothing can be issued
    Unavailable,
    /// Radio is alive but powered off
    Off,
    /// Radio is powered on
    On,
}

impl RadioState {
    /// Whether the radio is powered on
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Whether the radio process is alive at all
    pub const fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => f.write_str("UNAVAILABLE"),
            Self::Off => f.write_str("OFF"),
            Self::On => f.write_str("ON"),
        }
    }
}

/// Kind of card refresh the card signalled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// A single file changed; reload it
    FileUpdate,
    /// Application re-initialised; cached state is stale
    Init,
    /// Card reset; everything is stale
    Reset,
}

/// Unsolicited card refresh event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEvent {
    /// What kind of refresh happened
    pub kind: RefreshKind,
    /// File that changed, 0 when not file-scoped
    pub file_id: u16,
    /// Application the refresh targets, None meaning all of them
    pub aid: Option<String>,
}

/// Unsolicited event from the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indication {
    /// Card status changed; re-query to learn what
    CardStatusChanged,
    /// Radio power/availability changed
    RadioStateChanged(RadioState),
    /// The card signalled a refresh
    CardRefresh(RefreshEvent),
}

/// Asynchronous command channel towards the radio of one slot
pub trait CommandChannel: Send + Sync {
    /// Issue a command; `done` is completed exactly once, possibly much
    /// later, possibly never if the radio dies first
    fn issue(&self, request: Request, done: Continuation);

    /// Current radio power/availability state
    fn radio_state(&self) -> RadioState;

    /// Register a handler for unsolicited indications
    fn subscribe_indications(&self, handler: IndicationHandler);
}
