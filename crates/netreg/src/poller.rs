//! Service-state poller
//!
//! A poll cycle fans out exactly three radio commands over one countdown
//! barrier. Completions merge their partial answer into the pending
//! snapshot in whatever order they land; when the barrier reaches zero the
//! pending snapshot is diffed against the published one, the derived
//! transition events fire, and the buffers swap. A `poll` issued while a
//! cycle is still in flight allocates a fresh barrier; completions carrying
//! the superseded one are recognised by identity and dropped.

use std::sync::{Arc, Weak};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use simtrack_core::settings::keys;
use simtrack_core::{Countdown, ObserverList, SettingsStore};
use simtrack_radio::{CommandChannel, CommandResult, Payload, RadioState, Request};

use crate::config::PollerConfig;
use crate::state::{RadioTech, RegState, ServiceState, mcc_to_iso};

/// Which of the cycle's commands a completion answers
#[derive(Debug, Clone, Copy)]
enum PollPart {
    Operator,
    VoiceRegistration,
    DataRegistration,
}

struct PollerState {
    current: ServiceState,
    pending: ServiceState,
    cycle: Option<Countdown>,
}

#[derive(Default)]
struct PollerEvents {
    changed: ObserverList<()>,
    network_attached: ObserverList<()>,
    network_detached: ObserverList<()>,
    data_attached: ObserverList<()>,
    data_detached: ObserverList<()>,
    voice_tech_changed: ObserverList<RadioTech>,
    data_tech_changed: ObserverList<RadioTech>,
    roaming_on: ObserverList<()>,
    roaming_off: ObserverList<()>,
    location_changed: ObserverList<()>,
    tech_handoff: ObserverList<(RadioTech, RadioTech)>,
    multi_apn_gained: ObserverList<()>,
    multi_apn_lost: ObserverList<()>,
}

/// Transition flags derived from diffing pending against current
#[derive(Debug, Default)]
struct Derived {
    changed: bool,
    network_attached: bool,
    network_detached: bool,
    data_attached: bool,
    data_detached: bool,
    voice_tech_changed: Option<RadioTech>,
    data_tech_changed: Option<RadioTech>,
    roaming_on: bool,
    roaming_off: bool,
    location_changed: bool,
    tech_handoff: Option<(RadioTech, RadioTech)>,
    multi_apn_gained: bool,
    multi_apn_lost: bool,
}

struct PollerShared {
    channel: Arc<dyn CommandChannel>,
    settings: Arc<dyn SettingsStore>,
    config: PollerConfig,
    state: Mutex<PollerState>,
    events: PollerEvents,
}

/// Poller for one radio channel's service state
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
#[allow(missing_debug_implementations)]
pub struct ServiceStatePoller {
    shared: Arc<PollerShared>,
}

impl ServiceStatePoller {
    /// Create a poller with the default configuration
    pub fn new(channel: Arc<dyn CommandChannel>, settings: Arc<dyn SettingsStore>) -> Self {
        Self::with_config(channel, settings, PollerConfig::default())
    }

    /// Create a poller with an explicit configuration
    pub fn with_config(
        channel: Arc<dyn CommandChannel>,
        settings: Arc<dyn SettingsStore>,
        config: PollerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(PollerShared {
                channel,
                settings,
                config,
                state: Mutex::new(PollerState {
                    current: ServiceState::out_of_service(),
                    pending: ServiceState::out_of_service(),
                    cycle: None,
                }),
                events: PollerEvents::default(),
            }),
        }
    }

    /// Start one poll cycle
    ///
    /// With the radio unavailable or off no commands are issued: the
    /// matching template snapshot completes the cycle immediately. A poll
    /// issued while another cycle is in flight supersedes it.
    pub fn poll(&self) {
        let radio_state = self.shared.channel.radio_state();
        match radio_state {
            RadioState::Unavailable | RadioState::Off => {
                debug!(%radio_state, "radio down, synthesizing snapshot");
                let derived = {
                    let mut state = self.shared.state.lock();
                    state.cycle = None;
                    state.pending = if radio_state == RadioState::Off {
                        ServiceState::powered_off()
                    } else {
                        ServiceState::out_of_service()
                    };
                    Self::finish_cycle(&self.shared, &mut state)
                };
                self.shared.fire(derived);
            }
            RadioState::On => {
                let cycle = Countdown::new(3);
                self.shared.state.lock().cycle = Some(cycle.clone());
                debug!("poll cycle started");
                for part in [
                    PollPart::Operator,
                    PollPart::VoiceRegistration,
                    PollPart::DataRegistration,
                ] {
                    let request = match part {
                        PollPart::Operator => Request::Operator,
                        PollPart::VoiceRegistration => Request::VoiceRegistration,
                        PollPart::DataRegistration => Request::DataRegistration,
                    };
                    let weak = Arc::downgrade(&self.shared);
                    let cycle = cycle.clone();
                    self.shared.channel.issue(
                        request,
                        Box::new(move |result| {
                            if let Some(shared) = Weak::upgrade(&weak) {
                                shared.on_part(part, cycle, result);
                            }
                        }),
                    );
                }
            }
        }
    }

    /// The published snapshot
    pub fn service_state(&self) -> ServiceState {
        self.shared.state.lock().current.clone()
    }

    /// Generic snapshot-changed event
    pub fn subscribe_changed(&self) -> Receiver<()> {
        self.shared.events.changed.subscribe()
    }

    /// Voice registration gained
    pub fn subscribe_network_attached(&self) -> Receiver<()> {
        self.shared.events.network_attached.subscribe()
    }

    /// Voice registration lost
    pub fn subscribe_network_detached(&self) -> Receiver<()> {
        self.shared.events.network_detached.subscribe()
    }

    /// Data registration gained
    pub fn subscribe_data_attached(&self) -> Receiver<()> {
        self.shared.events.data_attached.subscribe()
    }

    /// Data registration lost
    pub fn subscribe_data_detached(&self) -> Receiver<()> {
        self.shared.events.data_detached.subscribe()
    }

    /// Voice radio technology changed, with the new technology
    pub fn subscribe_voice_tech_changed(&self) -> Receiver<RadioTech> {
        self.shared.events.voice_tech_changed.subscribe()
    }

    /// Data radio technology changed, with the new technology
    pub fn subscribe_data_tech_changed(&self) -> Receiver<RadioTech> {
        self.shared.events.data_tech_changed.subscribe()
    }

    /// Roaming turned on
    pub fn subscribe_roaming_on(&self) -> Receiver<()> {
        self.shared.events.roaming_on.subscribe()
    }

    /// Roaming turned off
    pub fn subscribe_roaming_off(&self) -> Receiver<()> {
        self.shared.events.roaming_off.subscribe()
    }

    /// Serving cell location changed
    pub fn subscribe_location_changed(&self) -> Receiver<()> {
        self.shared.events.location_changed.subscribe()
    }

    /// Handoff between the configured technology pair, with (from, to)
    pub fn subscribe_tech_handoff(&self) -> Receiver<(RadioTech, RadioTech)> {
        self.shared.events.tech_handoff.subscribe()
    }

    /// Network started allowing more than one data call
    pub fn subscribe_multi_apn_gained(&self) -> Receiver<()> {
        self.shared.events.multi_apn_gained.subscribe()
    }

    /// Network stopped allowing more than one data call
    pub fn subscribe_multi_apn_lost(&self) -> Receiver<()> {
        self.shared.events.multi_apn_lost.subscribe()
    }

    /// Diff pending against current, swap the buffers, and return what to
    /// fire; runs under the state lock, fires after it is released
    fn finish_cycle(shared: &PollerShared, state: &mut PollerState) -> Derived {
        let current = &state.current;
        let pending = &state.pending;
        let (a, b) = shared.config.handoff_pair;

        let derived = Derived {
            changed: pending != current,
            network_attached: !current.voice_reg.is_in_service()
                && pending.voice_reg.is_in_service(),
            network_detached: current.voice_reg.is_in_service()
                && !pending.voice_reg.is_in_service(),
            data_attached: !current.data_reg.is_in_service() && pending.data_reg.is_in_service(),
            data_detached: current.data_reg.is_in_service() && !pending.data_reg.is_in_service(),
            voice_tech_changed: (pending.voice_tech != current.voice_tech)
                .then_some(pending.voice_tech),
            data_tech_changed: (pending.data_tech != current.data_tech)
                .then_some(pending.data_tech),
            roaming_on: !current.roaming && pending.roaming,
            roaming_off: current.roaming && !pending.roaming,
            location_changed: pending.lac != current.lac || pending.cid != current.cid,
            tech_handoff: ((current.data_tech == a && pending.data_tech == b)
                || (current.data_tech == b && pending.data_tech == a))
                .then_some((current.data_tech, pending.data_tech)),
            multi_apn_gained: current.max_data_calls <= 1 && pending.max_data_calls > 1,
            multi_apn_lost: current.max_data_calls > 1 && pending.max_data_calls <= 1,
        };

        // Double-buffer swap; the retired buffer becomes the next pending
        // template
        std::mem::swap(&mut state.current, &mut state.pending);
        state.pending = ServiceState::out_of_service();

        if derived.changed {
            debug!(state = ?state.current, "service state changed");
            if shared.config.publish_properties {
                shared.publish_properties(&state.current);
            }
        }
        derived
    }
}

impl PollerShared {
    /// One of the cycle's three answers landed
    fn on_part(&self, part: PollPart, cycle: Countdown, result: CommandResult) {
        let derived = {
            let mut state = self.state.lock();
            let live = state
                .cycle
                .as_ref()
                .is_some_and(|current| current.same_cycle(&cycle));
            if !live {
                debug!(?part, "completion for superseded poll cycle dropped");
                return;
            }

            match result {
                Ok(Payload::Strings(fields)) => self.merge(&mut state.pending, part, &fields),
                Ok(_) => warn!(?part, "unexpected poll payload"),
                Err(failure) => warn!(?part, %failure, "poll command failed"),
            }

            if cycle.complete_one() {
                state.cycle = None;
                Some(ServiceStatePoller::finish_cycle(self, &mut state))
            } else {
                None
            }
        };
        if let Some(derived) = derived {
            self.fire(derived);
        }
    }

    /// Merge one answer into the pending snapshot
    fn merge(&self, pending: &mut ServiceState, part: PollPart, fields: &[String]) {
        trace!(?part, ?fields, "merging poll answer");
        match part {
            PollPart::Operator => {
                pending.operator_alpha = non_empty(fields.first());
                pending.operator_numeric = non_empty(fields.get(2));
            }
            PollPart::VoiceRegistration => {
                let code = self.reg_code(fields, 0);
                pending.voice_reg = RegState::from_code(code);
                pending.roaming = RegState::code_is_roaming(code);
                pending.lac = hex_field(fields, 1);
                pending.cid = hex_field(fields, 2);
                pending.voice_tech = RadioTech::from_code(int_field(fields, 3, 0));
            }
            PollPart::DataRegistration => {
                let code = self.reg_code(fields, 0);
                pending.data_reg = RegState::from_code(code);
                pending.data_tech = RadioTech::from_code(int_field(fields, 3, 0));
                pending.max_data_calls = int_field(fields, 5, 1).max(1) as u32;
            }
        }
    }

    /// Registration code with the configured fallback for malformed fields
    fn reg_code(&self, fields: &[String], index: usize) -> i32 {
        match fields.get(index).filter(|raw| !raw.is_empty()) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(raw = raw.as_str(), "malformed registration code, using fallback");
                self.config.fallback_reg_code
            }),
            None => self.config.fallback_reg_code,
        }
    }

    /// Publish operator/roaming properties derived from the new snapshot
    fn publish_properties(&self, current: &ServiceState) {
        self.settings
            .put(keys::OPERATOR_ALPHA, current.display_name().unwrap_or(""));
        self.settings.put(
            keys::OPERATOR_NUMERIC,
            current.operator_numeric.as_deref().unwrap_or(""),
        );
        self.settings.put(
            keys::OPERATOR_ISO_COUNTRY,
            current.mcc().map(mcc_to_iso).unwrap_or(""),
        );
        self.settings
            .put_bool(keys::OPERATOR_ROAMING, current.roaming);
        self.settings
            .put(keys::DATA_RADIO_TECH, &current.data_tech.to_string());
    }

    /// Fire every flagged event; called with no locks held
    fn fire(&self, derived: Derived) {
        if derived.network_attached {
            self.events.network_attached.notify(());
        }
        if derived.network_detached {
            self.events.network_detached.notify(());
        }
        if derived.data_attached {
            self.events.data_attached.notify(());
        }
        if derived.data_detached {
            self.events.data_detached.notify(());
        }
        if let Some(tech) = derived.voice_tech_changed {
            self.events.voice_tech_changed.notify(tech);
        }
        if let Some(tech) = derived.data_tech_changed {
            self.events.data_tech_changed.notify(tech);
        }
        if derived.roaming_on {
            self.events.roaming_on.notify(());
        }
        if derived.roaming_off {
            self.events.roaming_off.notify(());
        }
        if derived.location_changed {
            self.events.location_changed.notify(());
        }
        if let Some(handoff) = derived.tech_handoff {
            self.events.tech_handoff.notify(handoff);
        }
        if derived.multi_apn_gained {
            self.events.multi_apn_gained.notify(());
        }
        if derived.multi_apn_lost {
            self.events.multi_apn_lost.notify(());
        }
        if derived.changed {
            self.events.changed.notify(());
        }
    }
}

/// Non-empty string field, cloned
fn non_empty(field: Option<&String>) -> Option<String> {
    field.filter(|raw| !raw.is_empty()).cloned()
}

/// Decimal integer field with a default for missing/malformed values
fn int_field(fields: &[String], index: usize, default: i32) -> i32 {
    fields
        .get(index)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| {
            raw.parse().ok().or_else(|| {
                warn!(raw = raw.as_str(), index, "malformed integer field");
                None
            })
        })
        .unwrap_or(default)
}

/// Hexadecimal field (location area, cell id), −1 when absent or malformed
fn hex_field(fields: &[String], index: usize) -> i32 {
    fields
        .get(index)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| i32::from_str_radix(raw, 16).ok())
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simtrack_core::MemorySettings;
    use simtrack_radio::{CommandFailure, FailureCode, MockChannel};

    struct Harness {
        channel: Arc<MockChannel>,
        settings: Arc<MemorySettings>,
        poller: ServiceStatePoller,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_state(RadioState::On)
        }

        fn with_state(state: RadioState) -> Self {
            let channel = Arc::new(MockChannel::with_state(state));
            let settings = Arc::new(MemorySettings::new());
            let poller = ServiceStatePoller::new(
                channel.clone() as Arc<dyn CommandChannel>,
                settings.clone(),
            );
            Self {
                channel,
                settings,
                poller,
            }
        }

        fn complete(&self, request_matcher: fn(&Request) -> bool, fields: &[&str]) {
            assert!(self.channel.complete_first(
                request_matcher,
                Ok(Payload::Strings(
                    fields.iter().map(|s| s.to_string()).collect()
                )),
            ));
        }
    }

    fn operator(h: &Harness) {
        h.complete(
            |r| matches!(r, Request::Operator),
            &["SimNet", "SimNet", "310260"],
        );
    }

    fn voice_in_service(h: &Harness) {
        h.complete(
            |r| matches!(r, Request::VoiceRegistration),
            &["1", "00af", "1b3f", "3"],
        );
    }

    fn data_lte(h: &Harness) {
        h.complete(
            |r| matches!(r, Request::DataRegistration),
            &["1", "00af", "1b3f", "14", "0", "4"],
        );
    }

    #[test]
    fn completion_order_does_not_matter() {
        let completions: [fn(&Harness); 3] = [operator, voice_in_service, data_lte];
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        let mut snapshots = Vec::new();
        for order in orders {
            let h = Harness::new();
            let attached = h.poller.subscribe_network_attached();
            h.poller.poll();
            for index in order {
                completions[index](&h);
            }
            assert_eq!(attached.try_recv(), Ok(()));
            snapshots.push(h.poller.service_state());
        }

        for snapshot in &snapshots[1..] {
            assert_eq!(snapshot, &snapshots[0]);
        }
        assert_eq!(snapshots[0].voice_reg, RegState::InService);
        assert_eq!(snapshots[0].data_tech, RadioTech::Lte);
        assert_eq!(snapshots[0].max_data_calls, 4);
        assert_eq!(snapshots[0].operator_alpha.as_deref(), Some("SimNet"));
    }

    #[test]
    fn nothing_fires_before_the_last_completion() {
        let h = Harness::new();
        let changed = h.poller.subscribe_changed();
        h.poller.poll();

        operator(&h);
        voice_in_service(&h);
        assert!(changed.try_recv().is_err());
        assert_eq!(h.poller.service_state(), ServiceState::out_of_service());

        data_lte(&h);
        assert_eq!(changed.try_recv(), Ok(()));
    }

    #[test]
    fn attach_and_detach_flags() {
        let h = Harness::new();
        let attached = h.poller.subscribe_network_attached();
        let detached = h.poller.subscribe_network_detached();

        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        data_lte(&h);
        assert_eq!(attached.try_recv(), Ok(()));
        assert!(detached.try_recv().is_err());

        // Next cycle: out of service again
        h.poller.poll();
        h.complete(|r| matches!(r, Request::Operator), &[]);
        h.complete(
            |r| matches!(r, Request::VoiceRegistration),
            &["0", "", "", "0"],
        );
        h.complete(
            |r| matches!(r, Request::DataRegistration),
            &["0", "", "", "0"],
        );
        assert_eq!(detached.try_recv(), Ok(()));
        assert!(attached.try_recv().is_err());
    }

    #[test]
    fn lte_data_tech_change_fires_and_publishes() {
        let h = Harness::new();
        let tech_changed = h.poller.subscribe_data_tech_changed();
        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        h.complete(
            |r| matches!(r, Request::DataRegistration),
            &["1", "", "", "14"],
        );

        assert_eq!(tech_changed.try_recv(), Ok(RadioTech::Lte));
        assert_eq!(
            h.settings.get(keys::DATA_RADIO_TECH).as_deref(),
            Some("LTE")
        );
    }

    #[test]
    fn malformed_registration_field_defaults_without_aborting() {
        let h = Harness::new();
        let changed = h.poller.subscribe_changed();
        h.poller.poll();
        operator(&h);
        h.complete(
            |r| matches!(r, Request::VoiceRegistration),
            &["not-a-number", "zz", "", "3"],
        );
        data_lte(&h);

        // The cycle still completed; the malformed code became the fallback
        assert_eq!(changed.try_recv(), Ok(()));
        let state = h.poller.service_state();
        assert_eq!(state.voice_reg, RegState::OutOfService);
        assert_eq!(state.lac, -1);
        assert_eq!(state.voice_tech, RadioTech::Umts);
        assert_eq!(state.data_reg, RegState::InService);
    }

    #[test]
    fn failed_poll_command_is_isolated() {
        let h = Harness::new();
        let changed = h.poller.subscribe_changed();
        h.poller.poll();
        assert!(h.channel.complete_first(
            |r| matches!(r, Request::Operator),
            Err(CommandFailure::new(FailureCode::Generic)),
        ));
        voice_in_service(&h);
        data_lte(&h);

        assert_eq!(changed.try_recv(), Ok(()));
        let state = h.poller.service_state();
        assert_eq!(state.operator_alpha, None);
        assert_eq!(state.voice_reg, RegState::InService);
    }

    #[test]
    fn radio_off_synthesizes_without_commands() {
        let h = Harness::with_state(RadioState::Off);
        let changed = h.poller.subscribe_changed();

        h.poller.poll();

        assert!(h.channel.outstanding().is_empty());
        assert_eq!(changed.try_recv(), Ok(()));
        assert_eq!(h.poller.service_state(), ServiceState::powered_off());
    }

    #[test]
    fn radio_unavailable_synthesizes_out_of_service() {
        let h = Harness::with_state(RadioState::Unavailable);
        h.poller.poll();
        assert!(h.channel.outstanding().is_empty());
        assert_eq!(h.poller.service_state(), ServiceState::out_of_service());
    }

    #[test]
    fn superseding_poll_discards_stale_completions() {
        let h = Harness::new();
        let changed = h.poller.subscribe_changed();
        h.poller.poll();
        operator(&h);

        // Second poll supersedes the first before it finishes
        h.poller.poll();

        // The first cycle's remaining answers are stale now
        h.complete(
            |r| matches!(r, Request::VoiceRegistration),
            &["1", "", "", "3"],
        );
        h.complete(
            |r| matches!(r, Request::DataRegistration),
            &["1", "", "", "3"],
        );
        assert!(changed.try_recv().is_err(), "stale cycle must not publish");

        // The new cycle completes with different answers
        h.complete(|r| matches!(r, Request::Operator), &["Roamer", "", "23410"]);
        h.complete(
            |r| matches!(r, Request::VoiceRegistration),
            &["5", "0001", "0002", "2"],
        );
        h.complete(
            |r| matches!(r, Request::DataRegistration),
            &["5", "0001", "0002", "2"],
        );

        assert_eq!(changed.try_recv(), Ok(()));
        let state = h.poller.service_state();
        assert_eq!(state.operator_alpha.as_deref(), Some("Roamer"));
        assert!(state.roaming);
        assert_eq!(state.voice_tech, RadioTech::Edge);
    }

    #[test]
    fn roaming_flags_and_properties() {
        let h = Harness::new();
        let roaming_on = h.poller.subscribe_roaming_on();
        let roaming_off = h.poller.subscribe_roaming_off();

        h.poller.poll();
        h.complete(|r| matches!(r, Request::Operator), &["Roamer", "", "23410"]);
        h.complete(
            |r| matches!(r, Request::VoiceRegistration),
            &["5", "", "", "3"],
        );
        h.complete(
            |r| matches!(r, Request::DataRegistration),
            &["5", "", "", "3"],
        );
        assert_eq!(roaming_on.try_recv(), Ok(()));
        assert!(h.settings.get_bool(keys::OPERATOR_ROAMING, false));
        assert_eq!(
            h.settings.get(keys::OPERATOR_ISO_COUNTRY).as_deref(),
            Some("gb")
        );

        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        data_lte(&h);
        assert_eq!(roaming_off.try_recv(), Ok(()));
        assert!(!h.settings.get_bool(keys::OPERATOR_ROAMING, true));
    }

    #[test]
    fn location_change_fires() {
        let h = Harness::new();
        let location = h.poller.subscribe_location_changed();

        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        data_lte(&h);
        assert_eq!(location.try_recv(), Ok(()));

        // Same cell again: no location event
        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        data_lte(&h);
        assert!(location.try_recv().is_err());
    }

    #[test]
    fn lte_ehrpd_handoff_fires_in_both_directions() {
        let h = Harness::new();
        let handoff = h.poller.subscribe_tech_handoff();

        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        data_lte(&h);
        assert!(handoff.try_recv().is_err(), "Unknown -> LTE is no handoff");

        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        h.complete(
            |r| matches!(r, Request::DataRegistration),
            &["1", "00af", "1b3f", "13", "0", "4"],
        );
        assert_eq!(
            handoff.try_recv(),
            Ok((RadioTech::Lte, RadioTech::Ehrpd))
        );
    }

    #[test]
    fn multi_apn_capability_flags() {
        let h = Harness::new();
        let gained = h.poller.subscribe_multi_apn_gained();
        let lost = h.poller.subscribe_multi_apn_lost();

        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        data_lte(&h); // max_data_calls = 4
        assert_eq!(gained.try_recv(), Ok(()));

        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        h.complete(
            |r| matches!(r, Request::DataRegistration),
            &["1", "00af", "1b3f", "14", "0", "1"],
        );
        assert_eq!(lost.try_recv(), Ok(()));
    }

    #[test]
    fn unchanged_snapshot_fires_nothing() {
        let h = Harness::new();
        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        data_lte(&h);
        let changed = h.poller.subscribe_changed();

        h.poller.poll();
        operator(&h);
        voice_in_service(&h);
        data_lte(&h);

        assert!(changed.try_recv().is_err());
    }
}
