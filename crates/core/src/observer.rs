//! Multi-subscriber event fan-out
//!
//! Every event source in the stack (card changed, records loaded, service
//! state transitions) keeps one [`ObserverList`] per event kind. A
//! subscription is a plain crossbeam channel: the list holds the sender,
//! the observer drains the receiver on its own schedule. Subscribers that
//! dropped their receiver are pruned on the next notify.

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

/// A list of event subscribers, each backed by an unbounded channel.
#[allow(missing_debug_implementations)]
pub struct ObserverList<T> {
    senders: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> ObserverList<T> {
    /// Create an empty observer list
    pub const fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to events, returning the receiving end of a fresh channel
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = unbounded();
        self.senders.lock().push(tx);
        rx
    }

    /// Subscribe with a caller-supplied sender
    ///
    /// Useful when several event kinds should funnel into one queue.
    pub fn subscribe_sender(&self, sender: Sender<T>) {
        self.senders.lock().push(sender);
    }

    /// Broadcast an event to every live subscriber
    ///
    /// Subscribers whose receiving end is gone are removed.
    pub fn notify(&self, event: T) {
        self.senders
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscriptions at the last notify
    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    /// Whether nobody is subscribed
    pub fn is_empty(&self) -> bool {
        self.senders.lock().is_empty()
    }
}

impl<T: Clone> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}
