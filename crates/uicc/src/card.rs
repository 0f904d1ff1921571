//! Per-slot card model
//!
//! A [`Card`] is rebuilt wholesale from each whole-card status snapshot:
//! applications are matched 1:1 by position against the previous list,
//! updated in place where they persist, constructed where new, and
//! disposed where dropped. No partial mutation ever crosses two snapshots.

use std::sync::Arc;

use tracing::{debug, warn};

use simtrack_core::SettingsStore;
use simtrack_radio::{
    AppFamily, CardPresence, CardStatusReport, CommandChannel, PinState, RefreshEvent,
    RefreshKind,
};

use crate::app::CardApplication;

/// Model of the card in one physical slot
#[allow(missing_debug_implementations)]
pub struct Card {
    slot: usize,
    channel: Arc<dyn CommandChannel>,
    settings: Arc<dyn SettingsStore>,
    presence: CardPresence,
    universal_pin: PinState,
    gsm_umts_index: i32,
    cdma_index: i32,
    ims_index: i32,
    apps: Vec<CardApplication>,
}

impl Card {
    /// Build a card model from its first status snapshot
    pub fn new(
        slot: usize,
        channel: Arc<dyn CommandChannel>,
        settings: Arc<dyn SettingsStore>,
        report: &CardStatusReport,
    ) -> Self {
        let mut card = Self {
            slot,
            channel,
            settings,
            presence: CardPresence::Absent,
            universal_pin: PinState::Unknown,
            gsm_umts_index: -1,
            cdma_index: -1,
            ims_index: -1,
            apps: Vec::new(),
        };
        card.update(report);
        card
    }

    /// Rebuild the model from a fresh status snapshot
    pub fn update(&mut self, report: &CardStatusReport) {
        self.presence = report.card_state;
        self.universal_pin = report.universal_pin_state;
        self.gsm_umts_index = report.gsm_umts_index;
        self.cdma_index = report.cdma_index;
        self.ims_index = report.ims_index;

        let new_len = report.applications.len();
        debug!(
            slot = self.slot,
            presence = ?self.presence,
            applications = new_len,
            "card status updated"
        );

        // Positional 1:1 match against the previous list
        for (app, status) in self.apps.iter_mut().zip(&report.applications) {
            app.update(status, report.universal_pin_state);
        }
        for status in &report.applications[self.apps.len().min(new_len)..] {
            self.apps.push(CardApplication::new(
                Arc::clone(&self.channel),
                Arc::clone(&self.settings),
                status,
                report.universal_pin_state,
            ));
        }
        while self.apps.len() > new_len {
            if let Some(mut app) = self.apps.pop() {
                app.dispose();
            }
        }
    }

    /// Physical presence of the card
    pub const fn card_state(&self) -> CardPresence {
        self.presence
    }

    /// Slot this model belongs to
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Card-wide universal PIN state
    pub const fn universal_pin_state(&self) -> PinState {
        self.universal_pin
    }

    /// The active application of a family, if the snapshot named one
    pub fn application(&self, family: AppFamily) -> Option<&CardApplication> {
        let index = match family {
            AppFamily::ThreeGpp => self.gsm_umts_index,
            AppFamily::ThreeGpp2 => self.cdma_index,
            AppFamily::Ims => self.ims_index,
        };
        usize::try_from(index).ok().and_then(|i| self.apps.get(i))
    }

    /// Number of applications on the card
    pub const fn application_count(&self) -> usize {
        self.apps.len()
    }

    /// A card refresh arrived for this slot
    ///
    /// Init and Reset invalidate the targeted application (all of them when
    /// the refresh names no AID): its state falls back to Unknown until the
    /// confirming full status query lands. File updates need no state
    /// change here; the follow-up query covers them.
    pub fn on_refresh(&mut self, refresh: &RefreshEvent) {
        match refresh.kind {
            RefreshKind::Init | RefreshKind::Reset => {
                let mut hit = false;
                for app in &mut self.apps {
                    let targeted = match (&refresh.aid, app.aid()) {
                        (None, _) => true,
                        (Some(aid), Some(app_aid)) => aid == app_aid,
                        (Some(_), None) => false,
                    };
                    if targeted {
                        app.invalidate();
                        hit = true;
                    }
                }
                if !hit {
                    warn!(slot = self.slot, aid = ?refresh.aid, "refresh for unknown application");
                }
            }
            RefreshKind::FileUpdate => {
                debug!(slot = self.slot, file_id = refresh.file_id, "file refresh");
            }
        }
    }

    /// Tear the model down, disposing every application
    pub fn dispose(&mut self) {
        debug!(slot = self.slot, "card model disposed");
        for app in &mut self.apps {
            app.dispose();
        }
        self.apps.clear();
        self.presence = CardPresence::Absent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppState;
    use simtrack_core::MemorySettings;
    use simtrack_radio::{AppStatusReport, AppType, MockChannel, RawAppState};

    fn status(apps: Vec<AppStatusReport>) -> CardStatusReport {
        let gsm = apps
            .iter()
            .position(|a| matches!(a.app_type, AppType::Sim | AppType::Usim))
            .map_or(-1, |i| i as i32);
        let cdma = apps
            .iter()
            .position(|a| matches!(a.app_type, AppType::Ruim | AppType::Csim))
            .map_or(-1, |i| i as i32);
        CardStatusReport {
            card_state: CardPresence::Present,
            universal_pin_state: PinState::Unknown,
            gsm_umts_index: gsm,
            cdma_index: cdma,
            ims_index: -1,
            applications: apps,
        }
    }

    fn app(app_type: AppType, state: RawAppState, aid: &str) -> AppStatusReport {
        AppStatusReport {
            aid: Some(aid.into()),
            ..AppStatusReport::new(app_type, state)
        }
    }

    fn harness() -> (Arc<MockChannel>, Arc<MemorySettings>) {
        (Arc::new(MockChannel::new()), Arc::new(MemorySettings::new()))
    }

    #[test]
    fn applications_update_in_place_and_dropped_ones_dispose() {
        let (channel, settings) = harness();
        let mut card = Card::new(
            0,
            channel.clone(),
            settings,
            &status(vec![
                app(AppType::Usim, RawAppState::Pin, "A1"),
                app(AppType::Csim, RawAppState::Detected, "A2"),
            ]),
        );
        assert_eq!(card.application_count(), 2);
        let usim_ready = card
            .application(AppFamily::ThreeGpp)
            .unwrap()
            .subscribe_ready();

        // Second snapshot: USIM became Ready, CSIM disappeared
        card.update(&status(vec![app(AppType::Usim, RawAppState::Ready, "A1")]));

        assert_eq!(card.application_count(), 1);
        // Same object updated in place: the pre-existing subscription fires
        assert_eq!(usim_ready.try_recv(), Ok(()));
        assert!(card.application(AppFamily::ThreeGpp2).is_none());
    }

    #[test]
    fn family_lookup_follows_snapshot_indices() {
        let (channel, settings) = harness();
        let card = Card::new(
            0,
            channel,
            settings,
            &status(vec![
                app(AppType::Csim, RawAppState::Ready, "C1"),
                app(AppType::Usim, RawAppState::Ready, "U1"),
            ]),
        );

        assert_eq!(
            card.application(AppFamily::ThreeGpp).unwrap().aid(),
            Some("U1")
        );
        assert_eq!(
            card.application(AppFamily::ThreeGpp2).unwrap().aid(),
            Some("C1")
        );
        assert!(card.application(AppFamily::Ims).is_none());
    }

    #[test]
    fn refresh_with_matching_aid_invalidates_only_that_application() {
        let (channel, settings) = harness();
        let mut card = Card::new(
            0,
            channel,
            settings,
            &status(vec![
                app(AppType::Usim, RawAppState::Ready, "A1"),
                app(AppType::Csim, RawAppState::Ready, "A2"),
            ]),
        );

        card.on_refresh(&RefreshEvent {
            kind: RefreshKind::Init,
            file_id: 0,
            aid: Some("A1".into()),
        });

        assert_eq!(
            card.application(AppFamily::ThreeGpp).unwrap().app_state(),
            AppState::Unknown
        );
        assert_eq!(
            card.application(AppFamily::ThreeGpp2).unwrap().app_state(),
            AppState::Ready
        );
    }

    #[test]
    fn aidless_reset_invalidates_every_application() {
        let (channel, settings) = harness();
        let mut card = Card::new(
            0,
            channel,
            settings,
            &status(vec![
                app(AppType::Usim, RawAppState::Ready, "A1"),
                app(AppType::Csim, RawAppState::Ready, "A2"),
            ]),
        );

        card.on_refresh(&RefreshEvent {
            kind: RefreshKind::Reset,
            file_id: 0,
            aid: None,
        });

        assert_eq!(
            card.application(AppFamily::ThreeGpp).unwrap().app_state(),
            AppState::Unknown
        );
        assert_eq!(
            card.application(AppFamily::ThreeGpp2).unwrap().app_state(),
            AppState::Unknown
        );
    }

    #[test]
    fn file_update_refresh_changes_no_state() {
        let (channel, settings) = harness();
        let mut card = Card::new(
            0,
            channel,
            settings,
            &status(vec![app(AppType::Usim, RawAppState::Ready, "A1")]),
        );

        card.on_refresh(&RefreshEvent {
            kind: RefreshKind::FileUpdate,
            file_id: 0x6F40,
            aid: Some("A1".into()),
        });

        assert_eq!(
            card.application(AppFamily::ThreeGpp).unwrap().app_state(),
            AppState::Ready
        );
    }

    #[test]
    fn dispose_empties_the_model() {
        let (channel, settings) = harness();
        let mut card = Card::new(
            0,
            channel,
            settings,
            &status(vec![app(AppType::Usim, RawAppState::Ready, "A1")]),
        );

        card.dispose();

        assert_eq!(card.application_count(), 0);
        assert_eq!(card.card_state(), CardPresence::Absent);
        assert!(card.application(AppFamily::ThreeGpp).is_none());
    }
}
