//! Loopback command channel for tests and demos
//!
//! [`MockChannel`] records every issued request and parks its continuation
//! until the driver completes it — by sequence number or by match, in any
//! order. Indications can be injected at will. Continuations and handlers
//! are always invoked outside the channel's own locks, so they are free to
//! issue follow-up commands re-entrantly, exactly like completions arriving
//! from a real radio.

use parking_lot::Mutex;
use tracing::trace;

use crate::channel::{
    CommandChannel, CommandResult, Continuation, Indication, IndicationHandler, RadioState,
};
use crate::command::Request;

struct PendingCommand {
    seq: usize,
    request: Request,
    done: Option<Continuation>,
}

/// In-memory [`CommandChannel`] driven by the test or demo itself
#[allow(missing_debug_implementations)]
pub struct MockChannel {
    state: Mutex<RadioState>,
    pending: Mutex<Vec<PendingCommand>>,
    handlers: Mutex<Vec<IndicationHandler>>,
    next_seq: Mutex<usize>,
}

impl MockChannel {
    /// Create a channel with the radio powered on
    pub fn new() -> Self {
        Self::with_state(RadioState::On)
    }

    /// Create a channel in the given radio state
    pub const fn with_state(state: RadioState) -> Self {
        Self {
            state: Mutex::new(state),
            pending: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            next_seq: Mutex::new(0),
        }
    }

    /// Every request issued so far, in issue order
    pub fn issued(&self) -> Vec<Request> {
        self.pending
            .lock()
            .iter()
            .map(|p| p.request.clone())
            .collect()
    }

    /// Sequence numbers and requests of the not-yet-completed commands
    pub fn outstanding(&self) -> Vec<(usize, Request)> {
        self.pending
            .lock()
            .iter()
            .filter(|p| p.done.is_some())
            .map(|p| (p.seq, p.request.clone()))
            .collect()
    }

    /// Complete the command with the given sequence number
    ///
    /// Panics when the command does not exist or was already completed;
    /// this is a test double, a silent miss would only hide driver bugs.
    pub fn complete(&self, seq: usize, result: CommandResult) {
        let done = {
            let mut pending = self.pending.lock();
            let entry = pending
                .iter_mut()
                .find(|p| p.seq == seq)
                .unwrap_or_else(|| panic!("no command with sequence number {seq}"));
            entry
                .done
                .take()
                .unwrap_or_else(|| panic!("command {seq} completed twice"))
        };
        done(result);
    }

    /// Complete the first outstanding command the matcher accepts
    ///
    /// Returns false when nothing matched.
    pub fn complete_first<F>(&self, matcher: F, result: CommandResult) -> bool
    where
        F: Fn(&Request) -> bool,
    {
        let seq = self
            .pending
            .lock()
            .iter()
            .find(|p| p.done.is_some() && matcher(&p.request))
            .map(|p| p.seq);
        match seq {
            Some(seq) => {
                self.complete(seq, result);
                true
            }
            None => false,
        }
    }

    /// Change the radio state and indicate the change to subscribers
    pub fn set_radio_state(&self, state: RadioState) {
        *self.state.lock() = state;
        self.indicate(Indication::RadioStateChanged(state));
    }

    /// Deliver an indication to every subscribed handler
    pub fn indicate(&self, indication: Indication) {
        let mut taken = std::mem::take(&mut *self.handlers.lock());
        for handler in &mut taken {
            handler(indication.clone());
        }
        // Handlers subscribed during delivery stay behind the restored ones
        let mut handlers = self.handlers.lock();
        taken.extend(handlers.drain(..));
        *handlers = taken;
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel for MockChannel {
    fn issue(&self, request: Request, done: Continuation) {
        let mut seq_guard = self.next_seq.lock();
        let seq = *seq_guard;
        *seq_guard += 1;
        drop(seq_guard);

        trace!(seq, request = %request, "command issued");
        self.pending.lock().push(PendingCommand {
            seq,
            request,
            done: Some(done),
        });
    }

    fn radio_state(&self) -> RadioState {
        *self.state.lock()
    }

    fn subscribe_indications(&self, handler: IndicationHandler) {
        self.handlers.lock().push(handler);
    }
}
