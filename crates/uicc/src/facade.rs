//! Compat single-card facade
//!
//! Older callers see one card application at a time: a selected family
//! (3GPP or 3GPP2, switched with the active voice radio technology), one
//! externally visible state enum, and `(state, reason)` broadcasts towards
//! the platform. The facade derives that view from the controller on every
//! relevant change and never stores anything the controller already knows.
//!
//! Quiet mode covers NV-provisioned CDMA subscriptions without LTE
//! fallback: no card is involved, so outward broadcasts are suppressed.
//! Entering quiet mode emits one final Ready broadcast so listeners are
//! not left mid-transition; leaving it force-rebroadcasts the current
//! state.

use std::sync::Arc;

use crossbeam_channel::{Receiver, unbounded};
use parking_lot::Mutex;
use tracing::{debug, trace};

use simtrack_core::{BroadcastSink, ObserverList};
use simtrack_radio::{
    AppFamily, CardPresence, CommandFailure, FailureCode, Indication, PersoSubState,
};

use crate::app::{AppState, CardApplication, OpCallback, OpOutcome};
use crate::controller::CardController;

/// Externally visible card state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalState {
    /// State cannot be derived yet
    Unknown,
    /// Radio off or card model not built yet
    NotReady,
    /// No card in the slot
    Absent,
    /// PIN1 must be supplied
    PinRequired,
    /// PUK1 must be supplied
    PukRequired,
    /// Network personalization lock engaged
    NetworkLocked,
    /// Card application ready
    Ready,
    /// PIN1 permanently blocked, card unusable
    PermDisabled,
}

impl ExternalState {
    /// Broadcast state string
    pub const fn state_string(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::NotReady => "NOT_READY",
            Self::Absent => "ABSENT",
            Self::PinRequired | Self::PukRequired | Self::NetworkLocked | Self::PermDisabled => {
                "LOCKED"
            }
            Self::Ready => "READY",
        }
    }

    /// Broadcast reason string for locked states
    pub const fn reason_string(&self) -> Option<&'static str> {
        match self {
            Self::PinRequired => Some("PIN"),
            Self::PukRequired => Some("PUK"),
            Self::NetworkLocked => Some("NETWORK"),
            Self::PermDisabled => Some("PERM_DISABLED"),
            _ => None,
        }
    }
}

/// How the active subscription is provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Subscription lives on the card
    SimBased,
    /// NV-provisioned CDMA subscription
    NvCdma {
        /// Whether the device can fall back to LTE (which needs the card)
        lte_capable: bool,
    },
}

impl SubscriptionMode {
    /// Whether this mode suppresses outward broadcasts
    pub const fn is_quiet(&self) -> bool {
        matches!(
            self,
            Self::NvCdma {
                lte_capable: false
            }
        )
    }
}

struct FacadeInner {
    slot: usize,
    family: AppFamily,
    quiet: bool,
    external: ExternalState,
}

/// Single-card compat view over the controller
#[allow(missing_debug_implementations)]
pub struct CardFacade {
    controller: CardController,
    sink: Arc<dyn BroadcastSink>,
    inner: Mutex<FacadeInner>,
    external_changed: ObserverList<ExternalState>,
    card_events: Receiver<usize>,
    radio_events: Receiver<()>,
}

impl CardFacade {
    /// Create a facade over one slot, starting on the 3GPP family
    pub fn new(controller: CardController, slot: usize, sink: Arc<dyn BroadcastSink>) -> Self {
        let card_events = controller.subscribe_card_changed();
        let (radio_tx, radio_events) = unbounded();
        if let Some(channel) = controller.channel(slot) {
            channel.subscribe_indications(Box::new(move |indication| {
                if let Indication::RadioStateChanged(_) = indication {
                    let _ = radio_tx.send(());
                }
            }));
        }
        Self {
            controller,
            sink,
            inner: Mutex::new(FacadeInner {
                slot,
                family: AppFamily::ThreeGpp,
                quiet: false,
                external: ExternalState::Unknown,
            }),
            external_changed: ObserverList::new(),
            card_events,
            radio_events,
        }
    }

    /// Drain pending card/radio events and re-derive the external state
    pub fn pump(&self) {
        let mut relevant = false;
        while let Ok(slot) = self.card_events.try_recv() {
            if slot == self.inner.lock().slot {
                relevant = true;
            }
        }
        while self.radio_events.try_recv().is_ok() {
            relevant = true;
        }
        if relevant {
            self.recompute(false);
        }
    }

    /// Currently derived external state
    pub fn external_state(&self) -> ExternalState {
        self.inner.lock().external
    }

    /// Subscribe to external state transitions
    pub fn subscribe_external_state(&self) -> Receiver<ExternalState> {
        self.external_changed.subscribe()
    }

    /// Switch the selected application family
    ///
    /// Driven externally from the active voice radio technology.
    pub fn set_current_app_family(&self, family: AppFamily) {
        {
            let mut inner = self.inner.lock();
            if inner.family == family {
                return;
            }
            debug!(%family, "application family switched");
            inner.family = family;
        }
        self.recompute(false);
    }

    /// Apply the subscription provisioning mode, entering or leaving quiet
    /// mode as needed
    ///
    /// Entering quiet mode emits one final Ready broadcast before
    /// suppression begins; a card-changed event handled later in the same
    /// tick is already suppressed. Leaving quiet mode force-rebroadcasts
    /// the state derived from the current inputs.
    pub fn set_subscription_mode(&self, mode: SubscriptionMode) {
        let quiet = mode.is_quiet();
        let mut inner = self.inner.lock();
        if quiet && !inner.quiet {
            debug!("entering quiet mode");
            inner.quiet = true;
            let changed = inner.external != ExternalState::Ready;
            inner.external = ExternalState::Ready;
            drop(inner);
            if changed {
                self.external_changed.notify(ExternalState::Ready);
            }
            self.sink.broadcast(ExternalState::Ready.state_string(), None);
        } else if !quiet && inner.quiet {
            debug!("leaving quiet mode");
            inner.quiet = false;
            drop(inner);
            self.recompute(true);
        }
    }

    /// Re-derive the external state; `force` broadcasts even when nothing
    /// changed
    fn recompute(&self, force: bool) {
        let mut inner = self.inner.lock();
        let new = self.derive(&inner);
        let changed = new != inner.external;
        inner.external = new;
        let quiet = inner.quiet;
        drop(inner);

        trace!(state = ?new, changed, "external state derived");
        if changed {
            self.external_changed.notify(new);
        }
        if (changed || force) && !quiet {
            self.sink.broadcast(new.state_string(), new.reason_string());
        }
    }

    /// External state as a pure function of the current inputs
    fn derive(&self, inner: &FacadeInner) -> ExternalState {
        let presence = self.controller.card_state(inner.slot);
        if presence == Some(CardPresence::Absent) {
            return ExternalState::Absent;
        }
        let radio_on = self
            .controller
            .radio_state(inner.slot)
            .is_some_and(|state| state.is_on());
        if !radio_on || presence.is_none() {
            return ExternalState::NotReady;
        }
        if presence == Some(CardPresence::Error) {
            return ExternalState::Unknown;
        }

        self.controller
            .with_application(inner.slot, inner.family, |app| {
                let pin1 = app.pin1_state();
                match app.app_state() {
                    AppState::Unknown | AppState::Detected => ExternalState::Unknown,
                    AppState::Pin | AppState::Puk if pin1.is_perm_blocked() => {
                        ExternalState::PermDisabled
                    }
                    AppState::Pin => ExternalState::PinRequired,
                    AppState::Puk => ExternalState::PukRequired,
                    AppState::PersoLocked(PersoSubState::Network) => ExternalState::NetworkLocked,
                    AppState::PersoLocked(_) => ExternalState::Unknown,
                    AppState::Ready => ExternalState::Ready,
                }
            })
            .unwrap_or(ExternalState::Unknown)
    }

    /// Supply PIN1 for the selected application
    pub fn supply_pin(&self, pin: &str, done: OpCallback) {
        let pin = pin.to_owned();
        self.with_current_app(done, move |app, done| app.supply_pin(&pin, done));
    }

    /// Supply PUK1 with a replacement PIN1
    pub fn supply_puk(&self, puk: &str, new_pin: &str, done: OpCallback) {
        let (puk, new_pin) = (puk.to_owned(), new_pin.to_owned());
        self.with_current_app(done, move |app, done| app.supply_puk(&puk, &new_pin, done));
    }

    /// Supply PIN2
    pub fn supply_pin2(&self, pin2: &str, done: OpCallback) {
        let pin2 = pin2.to_owned();
        self.with_current_app(done, move |app, done| app.supply_pin2(&pin2, done));
    }

    /// Supply PUK2 with a replacement PIN2
    pub fn supply_puk2(&self, puk2: &str, new_pin2: &str, done: OpCallback) {
        let (puk2, new_pin2) = (puk2.to_owned(), new_pin2.to_owned());
        self.with_current_app(done, move |app, done| {
            app.supply_puk2(&puk2, &new_pin2, done)
        });
    }

    /// Enable or disable the card lock
    pub fn set_lock_enabled(&self, enabled: bool, password: &str, done: OpCallback) {
        let password = password.to_owned();
        self.with_current_app(done, move |app, done| {
            app.set_lock_enabled(enabled, &password, done)
        });
    }

    /// Enable or disable fixed dialing
    pub fn set_fdn_enabled(&self, enabled: bool, pin2: &str, done: OpCallback) {
        let pin2 = pin2.to_owned();
        self.with_current_app(done, move |app, done| {
            app.set_fdn_enabled(enabled, &pin2, done)
        });
    }

    /// Change the card lock password
    pub fn change_lock_password(&self, old: &str, new: &str, done: OpCallback) {
        let (old, new) = (old.to_owned(), new.to_owned());
        self.with_current_app(done, move |app, done| {
            app.change_lock_password(&old, &new, done)
        });
    }

    /// Change the fixed dialing password
    pub fn change_fdn_password(&self, old: &str, new: &str, done: OpCallback) {
        let (old, new) = (old.to_owned(), new.to_owned());
        self.with_current_app(done, move |app, done| {
            app.change_fdn_password(&old, &new, done)
        });
    }

    /// Run a lock operation against the selected application, completing
    /// synchronously with an error when none is present
    fn with_current_app(&self, done: OpCallback, op: impl FnOnce(&CardApplication, OpCallback)) {
        let (slot, family) = {
            let inner = self.inner.lock();
            (inner.slot, inner.family)
        };
        let mut args = Some((op, done));
        let ran = self.controller.with_application(slot, family, |app| {
            if let Some((op, done)) = args.take() {
                op(app, done);
            }
        });
        if ran.is_none() {
            if let Some((_, done)) = args.take() {
                done(OpOutcome {
                    result: Err(CommandFailure::new(FailureCode::NoSuchApplication)),
                    attempts_remaining: -1,
                });
            }
        }
    }
}
