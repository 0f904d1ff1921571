//! Well-known elementary files and selection paths

/// Master file selection path
pub const PATH_MF: &str = "3F00";
/// Telecom directory selection path
pub const PATH_TELECOM: &str = "3F007F10";
/// GSM directory selection path
pub const PATH_GSM: &str = "3F007F20";
/// Application dedicated file selection path
pub const PATH_ADF: &str = "3F007FFF";

/// Subscriber's own number
pub const EF_MSISDN: u16 = 0x6F40;
/// Extension records for MSISDN
pub const EF_EXT1: u16 = 0x6F4A;
/// Voicemail (mailbox) dialing number
pub const EF_MBDN: u16 = 0x6FC7;
/// Extension records for MBDN
pub const EF_EXT6: u16 = 0x6FC8;
/// Service provider name
pub const EF_SPN: u16 = 0x6F46;
