//! Whole-card status snapshot wire types
//!
//! The answer to a card-status query describes the entire card in one shot:
//! presence, the shared universal PIN state, and every application the card
//! exposes. The stack above rebuilds its card model wholesale from each
//! snapshot; nothing in here is mutated incrementally.

use std::fmt;

/// Physical presence of the card in a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPresence {
    /// No card in the slot
    Absent,
    /// Card present and answering
    Present,
    /// Card present but unusable
    Error,
}

/// State of a PIN credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    /// Radio did not report a state
    Unknown,
    /// Lock disabled, no verification needed
    Disabled,
    /// Lock enabled, not yet verified this session
    EnabledNotVerified,
    /// Lock enabled and verified
    EnabledVerified,
    /// Lock enabled and blocked, PUK required
    EnabledBlocked,
    /// Lock enabled and permanently blocked
    EnabledPermBlocked,
}

impl PinState {
    /// Whether the lock is enabled in any form
    pub const fn is_enabled(&self) -> bool {
        matches!(
            self,
            Self::EnabledNotVerified
                | Self::EnabledVerified
                | Self::EnabledBlocked
                | Self::EnabledPermBlocked
        )
    }

    /// Whether the credential has been verified this session
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::EnabledVerified)
    }

    /// Whether the credential is blocked (PUK required or permanent)
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::EnabledBlocked | Self::EnabledPermBlocked)
    }

    /// Whether the credential is permanently blocked
    pub const fn is_perm_blocked(&self) -> bool {
        matches!(self, Self::EnabledPermBlocked)
    }
}

/// Type of one card application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppType {
    /// Unrecognised application
    Unknown,
    /// 3GPP SIM
    Sim,
    /// 3GPP USIM
    Usim,
    /// 3GPP2 RUIM
    Ruim,
    /// 3GPP2 CSIM
    Csim,
    /// IMS ISIM
    Isim,
}

impl AppType {
    /// Application family this type belongs to
    pub const fn family(&self) -> Option<AppFamily> {
        match self {
            Self::Sim | Self::Usim => Some(AppFamily::ThreeGpp),
            Self::Ruim | Self::Csim => Some(AppFamily::ThreeGpp2),
            Self::Isim => Some(AppFamily::Ims),
            Self::Unknown => None,
        }
    }
}

/// Application family selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppFamily {
    /// GSM/UMTS/LTE credentials (SIM, USIM)
    ThreeGpp,
    /// CDMA credentials (RUIM, CSIM)
    ThreeGpp2,
    /// IMS credentials (ISIM)
    Ims,
}

impl fmt::Display for AppFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreeGpp => f.write_str("3GPP"),
            Self::ThreeGpp2 => f.write_str("3GPP2"),
            Self::Ims => f.write_str("IMS"),
        }
    }
}

/// Application state as the radio reports it
///
/// The derived state machine above folds `SubscriptionPerso` together with
/// the perso substate; this is the raw wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAppState {
    /// Not yet determined
    Unknown,
    /// Application detected, credentials not checked yet
    Detected,
    /// PIN1 required
    Pin,
    /// PUK1 required
    Puk,
    /// Personalization lock engaged, see the perso substate
    SubscriptionPerso,
    /// Application ready for use
    Ready,
}

/// Personalization lock substate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersoSubState {
    /// Not yet determined
    Unknown,
    /// Personalization check still running
    InProgress,
    /// No personalization lock engaged
    Ready,
    /// Network personalization lock
    Network,
    /// Network-subset personalization lock
    NetworkSubset,
    /// Corporate personalization lock
    Corporate,
    /// Service-provider personalization lock
    ServiceProvider,
    /// SIM personalization lock
    Sim,
}

impl PersoSubState {
    /// Whether this substate means the application is perso-locked
    pub const fn is_locked(&self) -> bool {
        !matches!(self, Self::Unknown | Self::InProgress | Self::Ready)
    }
}

/// Status of one application within a card status snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStatusReport {
    /// Application type
    pub app_type: AppType,
    /// Raw application state
    pub app_state: RawAppState,
    /// Personalization substate, meaningful when `app_state` is
    /// `SubscriptionPerso`
    pub perso_substate: PersoSubState,
    /// Application identifier on the card
    pub aid: Option<String>,
    /// Human-readable application label
    pub label: Option<String>,
    /// Whether PIN1 is replaced by the card-wide universal PIN
    pub pin1_replaced: bool,
    /// PIN1 state
    pub pin1: PinState,
    /// PIN2 state
    pub pin2: PinState,
}

impl AppStatusReport {
    /// A minimal report for an application in the given state
    pub const fn new(app_type: AppType, app_state: RawAppState) -> Self {
        Self {
            app_type,
            app_state,
            perso_substate: PersoSubState::Unknown,
            aid: None,
            label: None,
            pin1_replaced: false,
            pin1: PinState::Unknown,
            pin2: PinState::Unknown,
        }
    }
}

/// Whole-card status snapshot for one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStatusReport {
    /// Physical card presence
    pub card_state: CardPresence,
    /// Card-wide universal PIN state, meaningful when an application sets
    /// `pin1_replaced`
    pub universal_pin_state: PinState,
    /// Index into `applications` of the active 3GPP application, −1 if none
    pub gsm_umts_index: i32,
    /// Index into `applications` of the active 3GPP2 application, −1 if none
    pub cdma_index: i32,
    /// Index into `applications` of the active IMS application, −1 if none
    pub ims_index: i32,
    /// Applications visible on the card, in slot order
    pub applications: Vec<AppStatusReport>,
}

impl CardStatusReport {
    /// Snapshot of an empty slot
    pub const fn absent() -> Self {
        Self {
            card_state: CardPresence::Absent,
            universal_pin_state: PinState::Unknown,
            gsm_umts_index: -1,
            cdma_index: -1,
            ims_index: -1,
            applications: Vec::new(),
        }
    }

    /// Index of the active application for a family, if the snapshot names one
    pub fn index_for(&self, family: AppFamily) -> Option<usize> {
        let index = match family {
            AppFamily::ThreeGpp => self.gsm_umts_index,
            AppFamily::ThreeGpp2 => self.cdma_index,
            AppFamily::Ims => self.ims_index,
        };
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.applications.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_state_predicates() {
        assert!(PinState::EnabledBlocked.is_blocked());
        assert!(PinState::EnabledPermBlocked.is_blocked());
        assert!(PinState::EnabledPermBlocked.is_perm_blocked());
        assert!(!PinState::Disabled.is_enabled());
        assert!(PinState::EnabledVerified.is_verified());
    }

    #[test]
    fn perso_locked_for_every_lock_substate() {
        assert!(PersoSubState::Network.is_locked());
        assert!(PersoSubState::ServiceProvider.is_locked());
        assert!(!PersoSubState::Unknown.is_locked());
        assert!(!PersoSubState::InProgress.is_locked());
        assert!(!PersoSubState::Ready.is_locked());
    }

    #[test]
    fn family_index_bounds_checked() {
        let mut report = CardStatusReport::absent();
        report.applications.push(AppStatusReport::new(
            AppType::Usim,
            RawAppState::Ready,
        ));
        report.gsm_umts_index = 0;
        report.cdma_index = 5; // out of range

        assert_eq!(report.index_for(AppFamily::ThreeGpp), Some(0));
        assert_eq!(report.index_for(AppFamily::ThreeGpp2), None);
        assert_eq!(report.index_for(AppFamily::Ims), None);
    }
}
