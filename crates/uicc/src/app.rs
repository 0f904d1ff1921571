//! Per-application state machine
//!
//! One [`CardApplication`] exists per application the card exposes. Its
//! state is never advanced internally: every transition comes from a
//! whole-snapshot `update` driven by the owning card, except for the forced
//! fall-back to Unknown when a card refresh invalidates cached state
//! pending the next full status query.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, warn};

use simtrack_core::{ObserverList, SettingsStore};
use simtrack_radio::{
    AppStatusReport, AppType, CommandChannel, CommandResult, Facility, PersoSubState, PinState,
    Request,
};

use crate::loader::FileAccess;
use crate::store::RecordStore;

/// Derived application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Nothing known yet, or cached state invalidated by a refresh
    Unknown,
    /// Application detected, credentials not yet checked
    Detected,
    /// PIN1 required
    Pin,
    /// PUK1 required
    Puk,
    /// Personalization lock engaged
    PersoLocked(PersoSubState),
    /// Ready for use
    Ready,
}

impl AppState {
    fn from_report(report: &AppStatusReport) -> Self {
        match report.app_state {
            simtrack_radio::RawAppState::Unknown => Self::Unknown,
            simtrack_radio::RawAppState::Detected => Self::Detected,
            simtrack_radio::RawAppState::Pin => Self::Pin,
            simtrack_radio::RawAppState::Puk => Self::Puk,
            simtrack_radio::RawAppState::SubscriptionPerso => {
                Self::PersoLocked(report.perso_substate)
            }
            simtrack_radio::RawAppState::Ready => Self::Ready,
        }
    }

    /// Whether this state is a personalization lock that actually locks
    pub const fn is_perso_locked(&self) -> bool {
        matches!(self, Self::PersoLocked(sub) if sub.is_locked())
    }
}

/// Outcome of one asynchronous lock operation
#[derive(Debug, Clone)]
pub struct OpOutcome {
    /// Whether the radio accepted the operation
    pub result: Result<(), simtrack_radio::CommandFailure>,
    /// Password attempts left afterwards, −1 when unknown
    pub attempts_remaining: i32,
}

/// Completion callback for a lock operation
pub type OpCallback = Box<dyn FnOnce(OpOutcome) + Send>;

/// Facility-lock flags refreshed by explicit queries, not by status snapshots
#[derive(Debug, Clone, Copy)]
struct LockFlags {
    fdn_enabled: bool,
    fdn_available: bool,
    icc_lock_enabled: bool,
}

/// One application on a card
#[allow(missing_debug_implementations)]
pub struct CardApplication {
    channel: Arc<dyn CommandChannel>,
    settings: Arc<dyn SettingsStore>,
    app_type: AppType,
    state: AppState,
    aid: Option<String>,
    label: Option<String>,
    pin1_replaced: bool,
    pin1: PinState,
    pin2: PinState,
    universal_pin: PinState,
    lock_flags: Arc<Mutex<LockFlags>>,
    records: RecordStore,
    files: FileAccess,
    ready_observers: ObserverList<()>,
    pin_locked_observers: ObserverList<AppState>,
    perso_locked_observers: ObserverList<PersoSubState>,
}

impl CardApplication {
    /// Build a fresh application from its first status report
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        settings: Arc<dyn SettingsStore>,
        report: &AppStatusReport,
        universal_pin: PinState,
    ) -> Self {
        let files = FileAccess::new(Arc::clone(&channel));
        let records = RecordStore::new(
            Arc::clone(&channel),
            files.clone(),
            Arc::clone(&settings),
        );
        let mut app = Self {
            channel,
            settings,
            app_type: report.app_type,
            state: AppState::Unknown,
            aid: report.aid.clone(),
            label: report.label.clone(),
            pin1_replaced: report.pin1_replaced,
            pin1: report.pin1,
            pin2: report.pin2,
            universal_pin,
            lock_flags: Arc::new(Mutex::new(LockFlags {
                fdn_enabled: false,
                fdn_available: true,
                icc_lock_enabled: false,
            })),
            records,
            files,
            ready_observers: ObserverList::new(),
            pin_locked_observers: ObserverList::new(),
            perso_locked_observers: ObserverList::new(),
        };
        app.update(report, universal_pin);
        app
    }

    /// Overwrite cached status from a fresh whole-card snapshot
    pub fn update(&mut self, report: &AppStatusReport, universal_pin: PinState) {
        let old_state = self.state;
        let old_type = self.app_type;
        let was_perso_locked = self.state.is_perso_locked();

        self.app_type = report.app_type;
        self.aid = report.aid.clone();
        self.label = report.label.clone();
        self.pin1_replaced = report.pin1_replaced;
        self.pin1 = report.pin1;
        self.pin2 = report.pin2;
        self.universal_pin = universal_pin;
        self.state = AppState::from_report(report);

        let type_changed = old_type != self.app_type;
        if type_changed {
            debug!(?old_type, new_type = ?self.app_type, "application type changed, rebuilding record store");
            self.records.dispose();
            self.files = FileAccess::new(Arc::clone(&self.channel));
            self.records = RecordStore::new(
                Arc::clone(&self.channel),
                self.files.clone(),
                Arc::clone(&self.settings),
            );
        }

        self.sanity_check();

        if !was_perso_locked && self.state.is_perso_locked() {
            if let AppState::PersoLocked(sub) = self.state {
                debug!(substate = ?sub, "application perso-locked");
                self.perso_locked_observers.notify(sub);
            }
        }

        let state_changed = old_state != self.state;
        if self.state == AppState::Ready && (state_changed || type_changed) {
            self.query_fdn_enabled();
            self.query_icc_lock_enabled();
            if !self.records.records_loaded() {
                self.records.fetch(self.aid.clone());
            }
        }
        if state_changed {
            debug!(?old_state, new_state = ?self.state, "application state changed");
            match self.state {
                AppState::Pin | AppState::Puk => {
                    self.pin_locked_observers.notify(self.state);
                }
                AppState::Ready => {
                    self.ready_observers.notify(());
                }
                _ => {}
            }
        }
    }

    /// A misbehaving radio can report contradicting state and PIN1; surface
    /// it as a warning and carry on with the reported state
    fn sanity_check(&self) {
        let pin1 = self.pin1_state();
        match self.state {
            AppState::Ready if pin1.is_enabled() && !pin1.is_verified() => {
                warn!(?pin1, "Ready application with unverified or blocked PIN1");
            }
            AppState::Pin | AppState::Puk
                if pin1.is_verified() || pin1 == PinState::Disabled =>
            {
                warn!(state = ?self.state, ?pin1, "PIN-locked application with satisfied PIN1");
            }
            _ => {}
        }
    }

    /// Force the state back to Unknown pending the next full status query
    ///
    /// Used when a card refresh invalidates what we cached; the confirming
    /// status query is already on its way.
    pub fn invalidate(&mut self) {
        debug!(aid = ?self.aid, "application state invalidated by refresh");
        self.state = AppState::Unknown;
    }

    /// Tear the application down; its record store dies with it
    pub fn dispose(&mut self) {
        debug!(aid = ?self.aid, "application disposed");
        self.records.dispose();
    }

    /// Derived application state
    pub const fn app_state(&self) -> AppState {
        self.state
    }

    /// Application type
    pub const fn app_type(&self) -> AppType {
        self.app_type
    }

    /// Application identifier on the card
    pub fn aid(&self) -> Option<&str> {
        self.aid.as_deref()
    }

    /// Human-readable label, when the card carries one
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Effective PIN1 state: the universal PIN when replaced, else the
    /// application's own
    pub const fn pin1_state(&self) -> PinState {
        if self.pin1_replaced {
            self.universal_pin
        } else {
            self.pin1
        }
    }

    /// PIN2 state
    pub const fn pin2_state(&self) -> PinState {
        self.pin2
    }

    /// Record store of this application
    pub const fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Cached FDN-enabled flag
    pub fn fdn_enabled(&self) -> bool {
        self.lock_flags.lock().fdn_enabled
    }

    /// Whether the card supports fixed dialing at all
    pub fn fdn_available(&self) -> bool {
        self.lock_flags.lock().fdn_available
    }

    /// Cached card-lock (PIN1 facility) flag
    pub fn icc_lock_enabled(&self) -> bool {
        self.lock_flags.lock().icc_lock_enabled
    }

    /// Ready transitions
    pub fn subscribe_ready(&self) -> Receiver<()> {
        self.ready_observers.subscribe()
    }

    /// Pin/Puk transitions, with the locked state as payload
    pub fn subscribe_pin_locked(&self) -> Receiver<AppState> {
        self.pin_locked_observers.subscribe()
    }

    /// Perso-lock transitions, with the substate as payload
    pub fn subscribe_perso_locked(&self) -> Receiver<PersoSubState> {
        self.perso_locked_observers.subscribe()
    }

    /// Supply PIN1
    pub fn supply_pin(&self, pin: &str, done: OpCallback) {
        self.issue_lock_op(
            Request::SupplyPin {
                pin: pin.to_owned(),
                aid: self.aid.clone(),
            },
            done,
        );
    }

    /// Supply PUK1 with a replacement PIN1
    pub fn supply_puk(&self, puk: &str, new_pin: &str, done: OpCallback) {
        self.issue_lock_op(
            Request::SupplyPuk {
                puk: puk.to_owned(),
                new_pin: new_pin.to_owned(),
                aid: self.aid.clone(),
            },
            done,
        );
    }

    /// Supply PIN2
    pub fn supply_pin2(&self, pin2: &str, done: OpCallback) {
        self.issue_lock_op(
            Request::SupplyPin2 {
                pin2: pin2.to_owned(),
                aid: self.aid.clone(),
            },
            done,
        );
    }

    /// Supply PUK2 with a replacement PIN2
    pub fn supply_puk2(&self, puk2: &str, new_pin2: &str, done: OpCallback) {
        self.issue_lock_op(
            Request::SupplyPuk2 {
                puk2: puk2.to_owned(),
                new_pin2: new_pin2.to_owned(),
                aid: self.aid.clone(),
            },
            done,
        );
    }

    /// Enable or disable the card lock (PIN1 facility)
    pub fn set_lock_enabled(&self, enabled: bool, password: &str, done: OpCallback) {
        let flags = Arc::clone(&self.lock_flags);
        self.issue_lock_op_with(
            Request::SetFacilityLock {
                facility: Facility::SimLock,
                enable: enabled,
                password: password.to_owned(),
                aid: self.aid.clone(),
            },
            done,
            move |ok| {
                if ok {
                    flags.lock().icc_lock_enabled = enabled;
                }
            },
        );
    }

    /// Enable or disable fixed dialing (PIN2 facility)
    pub fn set_fdn_enabled(&self, enabled: bool, pin2: &str, done: OpCallback) {
        let flags = Arc::clone(&self.lock_flags);
        self.issue_lock_op_with(
            Request::SetFacilityLock {
                facility: Facility::FixedDialing,
                enable: enabled,
                password: pin2.to_owned(),
                aid: self.aid.clone(),
            },
            done,
            move |ok| {
                if ok {
                    flags.lock().fdn_enabled = enabled;
                }
            },
        );
    }

    /// Change the card lock password (PIN1)
    pub fn change_lock_password(&self, old: &str, new: &str, done: OpCallback) {
        self.issue_lock_op(
            Request::ChangeFacilityPassword {
                facility: Facility::SimLock,
                old_password: old.to_owned(),
                new_password: new.to_owned(),
                aid: self.aid.clone(),
            },
            done,
        );
    }

    /// Change the fixed dialing password (PIN2)
    pub fn change_fdn_password(&self, old: &str, new: &str, done: OpCallback) {
        self.issue_lock_op(
            Request::ChangeFacilityPassword {
                facility: Facility::FixedDialing,
                old_password: old.to_owned(),
                new_password: new.to_owned(),
                aid: self.aid.clone(),
            },
            done,
        );
    }

    fn issue_lock_op(&self, request: Request, done: OpCallback) {
        self.issue_lock_op_with(request, done, |_| {});
    }

    /// Issue one lock command; the continuation reports success plus the
    /// attempts-remaining count parsed from whichever side carried it
    fn issue_lock_op_with<F>(&self, request: Request, done: OpCallback, on_settled: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.channel.issue(
            request,
            Box::new(move |result: CommandResult| {
                let outcome = match result {
                    Ok(payload) => OpOutcome {
                        attempts_remaining: payload
                            .as_ints()
                            .and_then(|v| v.first().copied())
                            .unwrap_or(-1),
                        result: Ok(()),
                    },
                    Err(failure) => OpOutcome {
                        attempts_remaining: failure.attempts_remaining(),
                        result: Err(failure),
                    },
                };
                on_settled(outcome.result.is_ok());
                done(outcome);
            }),
        );
    }

    /// Fire-and-forget re-query of the FDN facility state
    fn query_fdn_enabled(&self) {
        let flags = Arc::clone(&self.lock_flags);
        self.channel.issue(
            Request::QueryFacilityLock {
                facility: Facility::FixedDialing,
                password: String::new(),
                aid: self.aid.clone(),
            },
            Box::new(move |result| {
                let mut flags = flags.lock();
                match result {
                    Ok(payload) => {
                        if let Some(&enabled) = payload.as_ints().and_then(|v| v.first()) {
                            flags.fdn_enabled = enabled != 0;
                            flags.fdn_available = true;
                        }
                    }
                    Err(failure)
                        if failure.code == simtrack_radio::FailureCode::RequestNotSupported =>
                    {
                        flags.fdn_available = false;
                    }
                    Err(failure) => warn!(%failure, "FDN query failed"),
                }
            }),
        );
    }

    /// Fire-and-forget re-query of the card lock facility state
    fn query_icc_lock_enabled(&self) {
        let flags = Arc::clone(&self.lock_flags);
        self.channel.issue(
            Request::QueryFacilityLock {
                facility: Facility::SimLock,
                password: String::new(),
                aid: self.aid.clone(),
            },
            Box::new(move |result| match result {
                Ok(payload) => {
                    if let Some(&enabled) = payload.as_ints().and_then(|v| v.first()) {
                        flags.lock().icc_lock_enabled = enabled != 0;
                    }
                }
                Err(failure) => warn!(%failure, "card lock query failed"),
            }),
        );
    }
}
