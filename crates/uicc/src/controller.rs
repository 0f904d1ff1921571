//! Process-wide card controller
//!
//! One controller exists per process, constructed once by the bootstrap and
//! handed to every dependent. It owns one [`Card`] model per physical slot
//! and wires itself to each slot's radio channel: a status-changed
//! indication triggers a full card-status re-query, radio-unavailable tears
//! the slot's model down, and a card refresh is forwarded to the model and
//! always followed by a confirming full query. Every completed status
//! query republishes a card-changed event for the slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, unbounded};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use simtrack_core::{ObserverList, SettingsStore};
use simtrack_radio::{
    AppFamily, CardPresence, CommandChannel, CommandResult, Indication, Payload, RadioState,
    Request,
};

use crate::app::CardApplication;
use crate::card::Card;

static CONSTRUCTED: AtomicBool = AtomicBool::new(false);

/// Controller construction/usage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// A controller was already constructed in this process
    #[error("card controller already constructed for this process")]
    AlreadyInitialized,

    /// The slot index does not exist
    #[error("slot {0} out of range")]
    InvalidSlot(usize),
}

struct ControllerShared {
    channels: Vec<Arc<dyn CommandChannel>>,
    settings: Arc<dyn SettingsStore>,
    slots: Mutex<Vec<Option<Card>>>,
    changed: ObserverList<usize>,
}

impl ControllerShared {
    fn on_indication(shared: &Arc<Self>, slot: usize, indication: Indication) {
        match indication {
            Indication::CardStatusChanged => {
                debug!(slot, "card status changed, re-querying");
                Self::query_status(shared, slot);
            }
            Indication::RadioStateChanged(RadioState::Unavailable) => {
                shared.on_radio_unavailable(slot);
            }
            Indication::RadioStateChanged(state) => {
                trace!(slot, %state, "radio state changed");
            }
            Indication::CardRefresh(refresh) => {
                debug!(slot, kind = ?refresh.kind, "card refresh");
                {
                    let mut slots = shared.slots.lock();
                    if let Some(Some(card)) = slots.get_mut(slot) {
                        card.on_refresh(&refresh);
                    }
                }
                // A refresh always triggers a confirming full query
                Self::query_status(shared, slot);
            }
        }
    }

    fn query_status(shared: &Arc<Self>, slot: usize) {
        let weak = Arc::downgrade(shared);
        shared.channels[slot].issue(
            Request::CardStatus,
            Box::new(move |result| {
                if let Some(shared) = Weak::upgrade(&weak) {
                    shared.on_status(slot, result);
                }
            }),
        );
    }

    fn on_status(&self, slot: usize, result: CommandResult) {
        let report = match result {
            Ok(Payload::CardStatus(report)) => report,
            Ok(_) => {
                warn!(slot, "unexpected card status payload");
                return;
            }
            Err(failure) => {
                // A transient query failure keeps the previous model
                warn!(slot, %failure, "card status query failed");
                return;
            }
        };

        {
            let mut slots = self.slots.lock();
            match slots.get_mut(slot) {
                Some(Some(card)) => card.update(&report),
                Some(entry) => {
                    *entry = Some(Card::new(
                        slot,
                        Arc::clone(&self.channels[slot]),
                        Arc::clone(&self.settings),
                        &report,
                    ));
                }
                None => {
                    warn!(slot, "status answer for unknown slot");
                    return;
                }
            }
        }
        self.changed.notify(slot);
    }

    fn on_radio_unavailable(&self, slot: usize) {
        debug!(slot, "radio unavailable, disposing card model");
        {
            let mut slots = self.slots.lock();
            if let Some(entry) = slots.get_mut(slot) {
                if let Some(mut card) = entry.take() {
                    card.dispose();
                }
            }
        }
        self.changed.notify(slot);
    }
}

/// Handle to the process-wide card controller
///
/// Cheap to clone; clones share the one controller.
#[derive(Clone)]
#[allow(missing_debug_implementations)]
pub struct CardController {
    shared: Arc<ControllerShared>,
}

impl std::fmt::Debug for CardController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardController").finish_non_exhaustive()
    }
}

impl CardController {
    /// Construct the controller for this process
    ///
    /// One channel per physical slot. Fails with `AlreadyInitialized` on
    /// any construction after the first.
    pub fn new(
        channels: Vec<Arc<dyn CommandChannel>>,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self, ControllerError> {
        if CONSTRUCTED.swap(true, Ordering::SeqCst) {
            return Err(ControllerError::AlreadyInitialized);
        }
        Ok(Self::build(channels, settings))
    }

    /// Construct without the process-singleton guard, for tests that need
    /// several controllers side by side
    #[cfg(test)]
    pub(crate) fn new_unguarded(
        channels: Vec<Arc<dyn CommandChannel>>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self::build(channels, settings)
    }

    fn build(channels: Vec<Arc<dyn CommandChannel>>, settings: Arc<dyn SettingsStore>) -> Self {
        let slot_count = channels.len();
        let shared = Arc::new(ControllerShared {
            channels,
            settings,
            slots: Mutex::new((0..slot_count).map(|_| None).collect()),
            changed: ObserverList::new(),
        });
        for (slot, channel) in shared.channels.iter().enumerate() {
            let weak = Arc::downgrade(&shared);
            channel.subscribe_indications(Box::new(move |indication| {
                if let Some(shared) = Weak::upgrade(&weak) {
                    ControllerShared::on_indication(&shared, slot, indication);
                }
            }));
        }
        debug!(slots = slot_count, "card controller constructed");
        Self { shared }
    }

    /// Number of physical slots
    pub fn num_slots(&self) -> usize {
        self.shared.channels.len()
    }

    /// Kick off a full card-status query for a slot
    pub fn query_card_status(&self, slot: usize) -> Result<(), ControllerError> {
        if slot >= self.num_slots() {
            return Err(ControllerError::InvalidSlot(slot));
        }
        ControllerShared::query_status(&self.shared, slot);
        Ok(())
    }

    /// Card presence for a slot, None while no model exists
    pub fn card_state(&self, slot: usize) -> Option<CardPresence> {
        self.shared
            .slots
            .lock()
            .get(slot)
            .and_then(|entry| entry.as_ref())
            .map(Card::card_state)
    }

    /// The command channel backing a slot
    pub(crate) fn channel(&self, slot: usize) -> Option<Arc<dyn CommandChannel>> {
        self.shared.channels.get(slot).map(Arc::clone)
    }

    /// Radio state of the slot's channel
    pub fn radio_state(&self, slot: usize) -> Option<RadioState> {
        self.shared
            .channels
            .get(slot)
            .map(|channel| channel.radio_state())
    }

    /// Run `f` against the slot's card model, if one exists
    pub fn with_card<R>(&self, slot: usize, f: impl FnOnce(&Card) -> R) -> Option<R> {
        self.shared
            .slots
            .lock()
            .get(slot)
            .and_then(|entry| entry.as_ref())
            .map(f)
    }

    /// Run `f` against a slot's active application of the given family
    pub fn with_application<R>(
        &self,
        slot: usize,
        family: AppFamily,
        f: impl FnOnce(&CardApplication) -> R,
    ) -> Option<R> {
        self.shared
            .slots
            .lock()
            .get(slot)
            .and_then(|entry| entry.as_ref())
            .and_then(|card| card.application(family))
            .map(f)
    }

    /// Subscribe to per-slot card-changed events
    ///
    /// The subscription is primed with one event per slot so a late
    /// subscriber is never left stale.
    pub fn subscribe_card_changed(&self) -> Receiver<usize> {
        let (tx, rx) = unbounded();
        for slot in 0..self.num_slots() {
            let _ = tx.send(slot);
        }
        self.shared.changed.subscribe_sender(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simtrack_core::MemorySettings;
    use simtrack_radio::{
        AppStatusReport, AppType, CardStatusReport, MockChannel, PinState, RawAppState,
    };

    fn single_app_status(state: RawAppState) -> CardStatusReport {
        CardStatusReport {
            card_state: CardPresence::Present,
            universal_pin_state: PinState::Unknown,
            gsm_umts_index: 0,
            cdma_index: -1,
            ims_index: -1,
            applications: vec![AppStatusReport {
                aid: Some("A1".into()),
                pin1: PinState::EnabledNotVerified,
                ..AppStatusReport::new(AppType::Usim, state)
            }],
        }
    }

    struct Harness {
        channels: Vec<Arc<MockChannel>>,
        controller: CardController,
    }

    impl Harness {
        fn new(slots: usize) -> Self {
            let channels: Vec<Arc<MockChannel>> =
                (0..slots).map(|_| Arc::new(MockChannel::new())).collect();
            let dyn_channels = channels
                .iter()
                .map(|c| Arc::clone(c) as Arc<dyn CommandChannel>)
                .collect();
            let controller =
                CardController::new_unguarded(dyn_channels, Arc::new(MemorySettings::new()));
            Self {
                channels,
                controller,
            }
        }
    }

    #[test]
    fn construction_once_guard() {
        let channel: Arc<dyn CommandChannel> = Arc::new(MockChannel::new());
        let settings = Arc::new(MemorySettings::new());
        let first = CardController::new(vec![Arc::clone(&channel)], settings.clone());
        assert!(first.is_ok());

        let second = CardController::new(vec![channel], settings);
        assert_eq!(second.unwrap_err(), ControllerError::AlreadyInitialized);
    }

    #[test]
    fn subscriber_is_primed_immediately() {
        let h = Harness::new(2);
        let changed = h.controller.subscribe_card_changed();

        assert_eq!(changed.try_recv(), Ok(0));
        assert_eq!(changed.try_recv(), Ok(1));
        assert!(changed.try_recv().is_err());
    }

    #[test]
    fn status_indication_triggers_query_and_model_build() {
        let h = Harness::new(1);
        let changed = h.controller.subscribe_card_changed();
        let _ = changed.try_recv(); // drain priming event

        h.channels[0].indicate(Indication::CardStatusChanged);
        assert!(h.channels[0].complete_first(
            |r| matches!(r, Request::CardStatus),
            Ok(Payload::CardStatus(single_app_status(RawAppState::Pin))),
        ));

        assert_eq!(changed.try_recv(), Ok(0));
        assert_eq!(h.controller.card_state(0), Some(CardPresence::Present));
        assert_eq!(
            h.controller
                .with_application(0, AppFamily::ThreeGpp, |app| app.app_state()),
            Some(crate::app::AppState::Pin)
        );
    }

    #[test]
    fn failed_status_query_keeps_previous_model() {
        let h = Harness::new(1);
        h.controller.query_card_status(0).unwrap();
        h.channels[0].complete_first(
            |r| matches!(r, Request::CardStatus),
            Ok(Payload::CardStatus(single_app_status(RawAppState::Ready))),
        );
        let changed = h.controller.subscribe_card_changed();
        let _ = changed.try_recv();

        h.controller.query_card_status(0).unwrap();
        h.channels[0].complete_first(
            |r| matches!(r, Request::CardStatus),
            Err(simtrack_radio::CommandFailure::new(
                simtrack_radio::FailureCode::Generic,
            )),
        );

        // Model survives, no changed event fires
        assert_eq!(h.controller.card_state(0), Some(CardPresence::Present));
        assert!(changed.try_recv().is_err());
    }

    #[test]
    fn radio_unavailable_disposes_only_that_slot() {
        let h = Harness::new(2);
        for slot in 0..2 {
            h.controller.query_card_status(slot).unwrap();
            h.channels[slot].complete_first(
                |r| matches!(r, Request::CardStatus),
                Ok(Payload::CardStatus(single_app_status(RawAppState::Ready))),
            );
        }
        let changed = h.controller.subscribe_card_changed();
        let _ = (changed.try_recv(), changed.try_recv());

        h.channels[0].set_radio_state(RadioState::Unavailable);

        assert_eq!(h.controller.card_state(0), None);
        assert_eq!(h.controller.card_state(1), Some(CardPresence::Present));
        assert_eq!(changed.try_recv(), Ok(0));
        assert!(changed.try_recv().is_err());
    }

    #[test]
    fn refresh_invalidates_and_requeries() {
        let h = Harness::new(1);
        h.controller.query_card_status(0).unwrap();
        h.channels[0].complete_first(
            |r| matches!(r, Request::CardStatus),
            Ok(Payload::CardStatus(single_app_status(RawAppState::Ready))),
        );

        h.channels[0].indicate(Indication::CardRefresh(simtrack_radio::RefreshEvent {
            kind: simtrack_radio::RefreshKind::Init,
            file_id: 0,
            aid: Some("A1".into()),
        }));

        // Stale immediately, confirmed by the follow-up query
        assert_eq!(
            h.controller
                .with_application(0, AppFamily::ThreeGpp, |app| app.app_state()),
            Some(crate::app::AppState::Unknown)
        );
        assert!(h.channels[0]
            .outstanding()
            .iter()
            .any(|(_, r)| matches!(r, Request::CardStatus)));
    }
}
