//! Persistent key-value settings collaborator
//!
//! Subscriber preferences (call forwarding flag, voicemail number, CLIR
//! mode, network selection) and the published operator properties survive
//! restarts in a store owned by the surrounding platform. This stack only
//! needs get/put against well-known string keys.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Well-known settings keys
pub mod keys {
    /// Cached call-forwarding-enabled flag ("0"/"1")
    pub const CALL_FORWARDING_ENABLED: &str = "subscriber.call_forwarding_enabled";
    /// Subscriber-set voicemail number
    pub const VOICEMAIL_NUMBER: &str = "subscriber.voicemail_number";
    /// Calling-line-identification-restriction preference
    pub const CLIR_MODE: &str = "subscriber.clir_mode";
    /// Manual/automatic network selection preference
    pub const NETWORK_SELECTION: &str = "subscriber.network_selection";

    /// Display name of the registered operator
    pub const OPERATOR_ALPHA: &str = "operator.alpha";
    /// Numeric (MCC+MNC) identity of the registered operator
    pub const OPERATOR_NUMERIC: &str = "operator.numeric";
    /// ISO country code derived from the operator MCC
    pub const OPERATOR_ISO_COUNTRY: &str = "operator.iso_country";
    /// Whether the device is currently roaming ("true"/"false")
    pub const OPERATOR_ROAMING: &str = "operator.roaming";
    /// Name of the current data radio technology
    pub const DATA_RADIO_TECH: &str = "radio.data_tech";
}

/// Read/write access to platform-persisted settings
pub trait SettingsStore: Send + Sync {
    /// Read a value, None when the key was never written
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, overwriting any previous one
    fn put(&self, key: &str, value: &str);

    /// Convenience boolean read; unset or unparseable keys yield `default`
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    /// Convenience boolean write
    fn put_bool(&self, key: &str, value: bool) {
        self.put(key, if value { "1" } else { "0" });
    }
}

/// In-memory settings store
///
/// Stands in for the platform store in tests and demos.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_owned(), value.to_owned());
    }
}
