//! Radio requests
//!
//! The closed set of commands this stack issues towards the radio. Each
//! variant carries its fully-typed arguments; the radio answers through the
//! continuation passed alongside the request.

use std::fmt;

use bytes::Bytes;

/// Lock facility selector for query/set facility-lock requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    /// The card PIN1 lock ("SC")
    SimLock,
    /// Fixed dialing numbers ("FD")
    FixedDialing,
}

impl Facility {
    /// Wire code of the facility
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SimLock => "SC",
            Self::FixedDialing => "FD",
        }
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A command towards the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Query the full status snapshot of the card in this channel's slot
    CardStatus,

    /// Supply PIN1 for the application identified by `aid`
    SupplyPin {
        /// PIN1 value
        pin: String,
        /// Target application, None for the default application
        aid: Option<String>,
    },
    /// Supply PUK1 and a replacement PIN1
    SupplyPuk {
        /// PUK1 value
        puk: String,
        /// New PIN1 to set once unblocked
        new_pin: String,
        /// Target application
        aid: Option<String>,
    },
    /// Supply PIN2
    SupplyPin2 {
        /// PIN2 value
        pin2: String,
        /// Target application
        aid: Option<String>,
    },
    /// Supply PUK2 and a replacement PIN2
    SupplyPuk2 {
        /// PUK2 value
        puk2: String,
        /// New PIN2 to set once unblocked
        new_pin2: String,
        /// Target application
        aid: Option<String>,
    },
    /// Change PIN1
    ChangePin {
        /// Current PIN1
        old_pin: String,
        /// Replacement PIN1
        new_pin: String,
        /// Target application
        aid: Option<String>,
    },
    /// Change PIN2
    ChangePin2 {
        /// Current PIN2
        old_pin2: String,
        /// Replacement PIN2
        new_pin2: String,
        /// Target application
        aid: Option<String>,
    },

    /// Read the IMSI of the application identified by `aid`
    Imsi {
        /// Target application
        aid: Option<String>,
    },

    /// Query whether a lock facility is enabled
    QueryFacilityLock {
        /// Facility to query
        facility: Facility,
        /// Password, empty when not required for the query
        password: String,
        /// Target application
        aid: Option<String>,
    },
    /// Enable or disable a lock facility
    SetFacilityLock {
        /// Facility to change
        facility: Facility,
        /// Whether the lock should be enabled
        enable: bool,
        /// Facility password (PIN1 for SC, PIN2 for FD)
        password: String,
        /// Target application
        aid: Option<String>,
    },
    /// Change the password of a lock facility
    ChangeFacilityPassword {
        /// Facility to change
        facility: Facility,
        /// Current password
        old_password: String,
        /// Replacement password
        new_password: String,
        /// Target application
        aid: Option<String>,
    },

    /// Query record/file geometry of a record-structured card file
    RecordSize {
        /// Elementary file identifier
        file_id: u16,
        /// Selection path on the card
        path: String,
    },
    /// Read one record of a record-structured card file
    ReadRecord {
        /// Elementary file identifier
        file_id: u16,
        /// 1-based record number
        record_number: u32,
        /// Selection path on the card
        path: String,
    },
    /// Overwrite one record of a record-structured card file
    UpdateRecord {
        /// Elementary file identifier
        file_id: u16,
        /// 1-based record number
        record_number: u32,
        /// Selection path on the card
        path: String,
        /// Record payload, exactly one record long
        data: Bytes,
    },
    /// Read the whole body of a transparent card file
    ReadBinary {
        /// Elementary file identifier
        file_id: u16,
        /// Selection path on the card
        path: String,
    },

    /// Query the identity of the registered operator
    Operator,
    /// Query the voice registration state
    VoiceRegistration,
    /// Query the data registration state
    DataRegistration,
}

impl Request {
    /// Short name of the request, for logs
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CardStatus => "CARD_STATUS",
            Self::SupplyPin { .. } => "SUPPLY_PIN",
            Self::SupplyPuk { .. } => "SUPPLY_PUK",
            Self::SupplyPin2 { .. } => "SUPPLY_PIN2",
            Self::SupplyPuk2 { .. } => "SUPPLY_PUK2",
            Self::ChangePin { .. } => "CHANGE_PIN",
            Self::ChangePin2 { .. } => "CHANGE_PIN2",
            Self::Imsi { .. } => "IMSI",
            Self::QueryFacilityLock { .. } => "QUERY_FACILITY_LOCK",
            Self::SetFacilityLock { .. } => "SET_FACILITY_LOCK",
            Self::ChangeFacilityPassword { .. } => "CHANGE_FACILITY_PASSWORD",
            Self::RecordSize { .. } => "RECORD_SIZE",
            Self::ReadRecord { .. } => "READ_RECORD",
            Self::UpdateRecord { .. } => "UPDATE_RECORD",
            Self::ReadBinary { .. } => "READ_BINARY",
            Self::Operator => "OPERATOR",
            Self::VoiceRegistration => "VOICE_REGISTRATION",
            Self::DataRegistration => "DATA_REGISTRATION",
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
