//! Service-state snapshot model

use derive_more::Display;

/// Voice or data registration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RegState {
    /// Registered on a network
    #[display("IN_SERVICE")]
    InService,
    /// Not registered (searching, denied, or truly out of coverage)
    #[display("OUT_OF_SERVICE")]
    OutOfService,
    /// Radio deliberately powered off
    #[display("POWER_OFF")]
    PowerOff,
}

impl RegState {
    /// Map a raw registration code; 1 (home) and 5 (roaming) are in
    /// service, everything else is not
    pub const fn from_code(code: i32) -> Self {
        match code {
            1 | 5 => Self::InService,
            _ => Self::OutOfService,
        }
    }

    /// Whether a raw registration code means roaming
    pub const fn code_is_roaming(code: i32) -> bool {
        code == 5
    }

    /// Whether this state counts as attached
    pub const fn is_in_service(&self) -> bool {
        matches!(self, Self::InService)
    }
}

/// Radio access technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[allow(missing_docs)]
pub enum RadioTech {
    #[display("UNKNOWN")]
    Unknown,
    #[display("GPRS")]
    Gprs,
    #[display("EDGE")]
    Edge,
    #[display("UMTS")]
    Umts,
    #[display("IS95A")]
    Is95A,
    #[display("IS95B")]
    Is95B,
    #[display("1xRTT")]
    OneXRtt,
    #[display("EvDo-rev.0")]
    Evdo0,
    #[display("EvDo-rev.A")]
    EvdoA,
    #[display("HSDPA")]
    Hsdpa,
    #[display("HSUPA")]
    Hsupa,
    #[display("HSPA")]
    Hspa,
    #[display("EvDo-rev.B")]
    EvdoB,
    #[display("eHRPD")]
    Ehrpd,
    #[display("LTE")]
    Lte,
    #[display("HSPA+")]
    Hspap,
    #[display("GSM")]
    Gsm,
}

impl RadioTech {
    /// Map a raw radio technology code; unrecognised codes fold to Unknown
    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Gprs,
            2 => Self::Edge,
            3 => Self::Umts,
            4 => Self::Is95A,
            5 => Self::Is95B,
            6 => Self::OneXRtt,
            7 => Self::Evdo0,
            8 => Self::EvdoA,
            9 => Self::Hsdpa,
            10 => Self::Hsupa,
            11 => Self::Hspa,
            12 => Self::EvdoB,
            13 => Self::Ehrpd,
            14 => Self::Lte,
            15 => Self::Hspap,
            16 => Self::Gsm,
            _ => Self::Unknown,
        }
    }

    /// Whether this technology belongs to the CDMA family
    pub const fn is_cdma(&self) -> bool {
        matches!(
            self,
            Self::Is95A
                | Self::Is95B
                | Self::OneXRtt
                | Self::Evdo0
                | Self::EvdoA
                | Self::EvdoB
                | Self::Ehrpd
        )
    }
}

/// One service-state snapshot
///
/// The poller keeps two of these: the published one and the pending one
/// being assembled; they are swapped, never copied, when a poll cycle
/// completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceState {
    /// Voice registration state
    pub voice_reg: RegState,
    /// Data registration state
    pub data_reg: RegState,
    /// Whether the device is roaming
    pub roaming: bool,
    /// Voice radio technology
    pub voice_tech: RadioTech,
    /// Data radio technology
    pub data_tech: RadioTech,
    /// Display name of the registered operator
    pub operator_alpha: Option<String>,
    /// Numeric (MCC+MNC) identity of the registered operator
    pub operator_numeric: Option<String>,
    /// Location area code, −1 when unknown
    pub lac: i32,
    /// Cell identity, −1 when unknown
    pub cid: i32,
    /// Simultaneous data calls the network allows
    pub max_data_calls: u32,
}

impl ServiceState {
    /// Clean out-of-service template
    pub const fn out_of_service() -> Self {
        Self {
            voice_reg: RegState::OutOfService,
            data_reg: RegState::OutOfService,
            roaming: false,
            voice_tech: RadioTech::Unknown,
            data_tech: RadioTech::Unknown,
            operator_alpha: None,
            operator_numeric: None,
            lac: -1,
            cid: -1,
            max_data_calls: 1,
        }
    }

    /// Template for a deliberately powered-off radio
    pub const fn powered_off() -> Self {
        let mut state = Self::out_of_service();
        state.voice_reg = RegState::PowerOff;
        state.data_reg = RegState::PowerOff;
        state
    }

    /// Mobile country code digits of the operator identity
    pub fn mcc(&self) -> Option<&str> {
        self.operator_numeric
            .as_deref()
            .filter(|numeric| numeric.len() >= 3)
            .map(|numeric| &numeric[..3])
    }

    /// Display name: operator alpha, numeric as fallback
    pub fn display_name(&self) -> Option<&str> {
        self.operator_alpha
            .as_deref()
            .or(self.operator_numeric.as_deref())
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::out_of_service()
    }
}

/// ISO country code for a mobile country code
///
/// Only the common entries; everything else resolves to an empty string,
/// matching how an unknown operator is published.
pub(crate) fn mcc_to_iso(mcc: &str) -> &'static str {
    match mcc {
        "202" => "gr",
        "204" => "nl",
        "208" => "fr",
        "214" => "es",
        "222" => "it",
        "234" | "235" => "gb",
        "240" => "se",
        "262" => "de",
        "302" => "ca",
        "310" | "311" | "312" | "316" => "us",
        "334" => "mx",
        "404" | "405" => "in",
        "440" | "441" => "jp",
        "450" => "kr",
        "460" => "cn",
        "505" => "au",
        "724" => "br",
        _ => "",
    }
}
