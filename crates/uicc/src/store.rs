//! Subscriber record store
//!
//! Caches the subscriber fields read off one card application: IMSI,
//! MSISDN, voicemail number, service provider name, plus the persisted
//! call-forwarding flag. A fetch fans out one radio command or record load
//! per field and counts them back in; the loaded event fires when the last
//! one lands. A disposed store ignores every further completion.

use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, warn};

use simtrack_core::settings::keys;
use simtrack_core::{ObserverList, SettingsStore};
use simtrack_radio::{CommandChannel, Payload, Request};

use crate::files;
use crate::loader::{FileAccess, RecordData};

/// International number type/plan byte
const TON_INTERNATIONAL: u8 = 0x91;
/// Trailing bytes of a dialing-number record: length, TON, 10 digit bytes,
/// capability id, extension id
const DIALING_FOOTER_LEN: usize = 14;
/// Extension record type mask and the additional-data type
const EXT_TYPE_MASK: u8 = 0x03;
const EXT_TYPE_ADDITIONAL_DATA: u8 = 0x02;

/// Alpha tag and dialing number decoded from a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DialingNumber {
    alpha: Option<String>,
    number: Option<String>,
}

struct StoreState {
    aid: Option<String>,
    imsi: Option<String>,
    msisdn: Option<String>,
    msisdn_tag: Option<String>,
    voicemail_number: Option<String>,
    voicemail_tag: Option<String>,
    spn: Option<String>,
    call_forwarding_enabled: bool,
    records_to_load: u32,
    records_requested: bool,
    destroyed: bool,
}

struct StoreShared {
    channel: Arc<dyn CommandChannel>,
    files: FileAccess,
    settings: Arc<dyn SettingsStore>,
    state: Mutex<StoreState>,
    loaded: ObserverList<()>,
}

/// Record store of one card application
///
/// Cheap to clone; clones share state. The owning application disposes the
/// store when it is torn down or its type changes, after which incoming
/// load completions are dropped.
#[derive(Clone)]
#[allow(missing_debug_implementations)]
pub struct RecordStore {
    shared: Arc<StoreShared>,
}

impl RecordStore {
    /// Create an empty store backed by the given channel and loader
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        files: FileAccess,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            shared: Arc::new(StoreShared {
                channel,
                files,
                settings: Arc::clone(&settings),
                state: Mutex::new(StoreState {
                    aid: None,
                    imsi: None,
                    msisdn: None,
                    msisdn_tag: None,
                    voicemail_number: None,
                    voicemail_tag: None,
                    spn: None,
                    call_forwarding_enabled: settings
                        .get_bool(keys::CALL_FORWARDING_ENABLED, false),
                    records_to_load: 0,
                    records_requested: false,
                    destroyed: false,
                }),
                loaded: ObserverList::new(),
            }),
        }
    }

    /// Start loading every subscriber record for the application
    ///
    /// Idempotent per store instance: a second call while loads are still
    /// counted simply adds to the outstanding count.
    pub fn fetch(&self, aid: Option<String>) {
        {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                warn!("fetch on a disposed record store ignored");
                return;
            }
            state.aid = aid.clone();
            state.records_requested = true;
            // IMSI, MSISDN, voicemail, SPN
            state.records_to_load += 4;
        }
        debug!(?aid, "fetching subscriber records");

        let shared = Arc::clone(&self.shared);
        self.shared.channel.issue(
            Request::Imsi { aid },
            Box::new(move |result| {
                let mut state = shared.state.lock();
                if state.destroyed {
                    warn!("IMSI answer for a disposed record store dropped");
                    return;
                }
                match result {
                    Ok(Payload::Text(imsi)) => state.imsi = Some(imsi),
                    Ok(_) => warn!("unexpected IMSI payload"),
                    Err(failure) => warn!(%failure, "IMSI query failed"),
                }
                Self::record_done(&shared, state);
            }),
        );

        let shared = Arc::clone(&self.shared);
        self.shared.files.load_record(
            files::EF_MSISDN,
            files::EF_EXT1,
            files::PATH_TELECOM,
            1,
            Box::new(move |result| {
                let mut state = shared.state.lock();
                if state.destroyed {
                    warn!("MSISDN record for a disposed record store dropped");
                    return;
                }
                match result {
                    Ok(data) => {
                        let decoded = decode_dialing_record(&data);
                        state.msisdn = decoded.number;
                        state.msisdn_tag = decoded.alpha;
                    }
                    Err(error) => warn!(%error, "MSISDN load failed"),
                }
                Self::record_done(&shared, state);
            }),
        );

        let shared = Arc::clone(&self.shared);
        self.shared.files.load_record(
            files::EF_MBDN,
            files::EF_EXT6,
            files::PATH_ADF,
            1,
            Box::new(move |result| {
                let mut state = shared.state.lock();
                if state.destroyed {
                    warn!("voicemail record for a disposed record store dropped");
                    return;
                }
                match result {
                    Ok(data) => {
                        let decoded = decode_dialing_record(&data);
                        // A subscriber-set number takes precedence over the card
                        state.voicemail_number = shared
                            .settings
                            .get(keys::VOICEMAIL_NUMBER)
                            .or(decoded.number);
                        state.voicemail_tag = decoded.alpha;
                    }
                    Err(error) => {
                        warn!(%error, "voicemail record load failed");
                        state.voicemail_number = shared.settings.get(keys::VOICEMAIL_NUMBER);
                    }
                }
                Self::record_done(&shared, state);
            }),
        );

        let shared = Arc::clone(&self.shared);
        self.shared.channel.issue(
            Request::ReadBinary {
                file_id: files::EF_SPN,
                path: files::PATH_GSM.into(),
            },
            Box::new(move |result| {
                let mut state = shared.state.lock();
                if state.destroyed {
                    warn!("SPN answer for a disposed record store dropped");
                    return;
                }
                match result {
                    Ok(Payload::Record(data)) => state.spn = decode_spn(&data),
                    Ok(_) => warn!("unexpected SPN payload"),
                    Err(failure) => warn!(%failure, "SPN read failed"),
                }
                Self::record_done(&shared, state);
            }),
        );
    }

    /// One outstanding load finished (in success or failure)
    fn record_done(
        shared: &Arc<StoreShared>,
        mut state: parking_lot::MutexGuard<'_, StoreState>,
    ) {
        state.records_to_load = state.records_to_load.saturating_sub(1);
        let all_loaded = state.records_to_load == 0 && state.records_requested;
        drop(state);
        if all_loaded {
            debug!("all subscriber records loaded");
            shared.loaded.notify(());
        }
    }

    /// Whether a requested load batch has fully completed
    pub fn records_loaded(&self) -> bool {
        let state = self.shared.state.lock();
        state.records_to_load == 0 && state.records_requested
    }

    /// Subscribe to the records-loaded event
    pub fn subscribe_loaded(&self) -> Receiver<()> {
        self.shared.loaded.subscribe()
    }

    /// IMSI, once loaded
    pub fn imsi(&self) -> Option<String> {
        self.shared.state.lock().imsi.clone()
    }

    /// Subscriber's own number, once loaded
    pub fn msisdn(&self) -> Option<String> {
        self.shared.state.lock().msisdn.clone()
    }

    /// Alpha tag of the MSISDN record, once loaded
    pub fn msisdn_tag(&self) -> Option<String> {
        self.shared.state.lock().msisdn_tag.clone()
    }

    /// Voicemail number: the subscriber-set one, else the card's
    pub fn voicemail_number(&self) -> Option<String> {
        self.shared.state.lock().voicemail_number.clone()
    }

    /// Alpha tag of the voicemail record, once loaded
    pub fn voicemail_tag(&self) -> Option<String> {
        self.shared.state.lock().voicemail_tag.clone()
    }

    /// Service provider name, once loaded
    pub fn service_provider_name(&self) -> Option<String> {
        self.shared.state.lock().spn.clone()
    }

    /// Cached call-forwarding-enabled flag
    pub fn call_forwarding_enabled(&self) -> bool {
        self.shared.state.lock().call_forwarding_enabled
    }

    /// Persist and cache the call-forwarding flag
    pub fn set_call_forwarding(&self, enabled: bool) {
        self.shared
            .settings
            .put_bool(keys::CALL_FORWARDING_ENABLED, enabled);
        self.shared.state.lock().call_forwarding_enabled = enabled;
    }

    /// Persist a subscriber-set voicemail number and cache it
    pub fn set_voicemail_number(&self, number: &str) {
        self.shared.settings.put(keys::VOICEMAIL_NUMBER, number);
        self.shared.state.lock().voicemail_number = Some(number.to_owned());
    }

    /// Tear the store down; all further incoming events are dropped
    pub fn dispose(&self) {
        let mut state = self.shared.state.lock();
        if state.destroyed {
            warn!("record store disposed twice");
            return;
        }
        state.destroyed = true;
        debug!(aid = ?state.aid, "record store disposed");
    }
}

/// Decode the alpha tag and dialing number of an ADN-format record
fn decode_dialing_record(data: &RecordData) -> DialingNumber {
    let record = &data.record;
    if record.len() < DIALING_FOOTER_LEN {
        return DialingNumber::default();
    }
    let split = record.len() - DIALING_FOOTER_LEN;
    let alpha = decode_alpha(&record[..split]);
    let footer = &record[split..];

    let digit_bytes = footer[0] as usize;
    // digit_bytes counts the TON byte plus up to ten digit bytes
    if digit_bytes == 0 || digit_bytes == 0xFF || digit_bytes > 11 {
        return DialingNumber {
            alpha,
            number: None,
        };
    }
    let mut number = String::new();
    if footer[1] == TON_INTERNATIONAL {
        number.push('+');
    }
    push_bcd_digits(&mut number, &footer[2..1 + digit_bytes]);

    let mut decoded = DialingNumber {
        alpha,
        number: Some(number),
    };
    for extension in &data.extensions {
        append_extension_digits(&mut decoded, extension);
    }
    decoded
}

/// Append overflow digits from one extension record
fn append_extension_digits(decoded: &mut DialingNumber, extension: &Bytes) {
    if extension.len() < 2 || extension[0] & EXT_TYPE_MASK != EXT_TYPE_ADDITIONAL_DATA {
        return;
    }
    let len = (extension[1] as usize).min(extension.len().saturating_sub(2));
    if let Some(number) = decoded.number.as_mut() {
        push_bcd_digits(number, &extension[2..2 + len]);
    }
}

fn push_bcd_digits(out: &mut String, bytes: &[u8]) {
    for &byte in bytes {
        for nibble in [byte & 0x0F, byte >> 4] {
            match nibble {
                0x0..=0x9 => out.push(char::from(b'0' + nibble)),
                0xA => out.push('*'),
                0xB => out.push('#'),
                0xF => return,
                _ => {}
            }
        }
    }
}

fn decode_alpha(bytes: &[u8]) -> Option<String> {
    let trimmed: Vec<u8> = bytes
        .iter()
        .copied()
        .take_while(|&b| b != 0xFF)
        .collect();
    if trimmed.is_empty() || !trimmed.is_ascii() {
        return None;
    }
    String::from_utf8(trimmed).ok()
}

/// Decode the service provider name file: one display-condition byte, then
/// the name padded with 0xFF
fn decode_spn(data: &Bytes) -> Option<String> {
    if data.len() < 2 {
        return None;
    }
    decode_alpha(&data[1..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use simtrack_core::MemorySettings;
    use simtrack_radio::{CommandFailure, FailureCode, MockChannel};

    struct Harness {
        channel: Arc<MockChannel>,
        settings: Arc<MemorySettings>,
        store: RecordStore,
    }

    impl Harness {
        fn new() -> Self {
            let channel = Arc::new(MockChannel::new());
            let settings = Arc::new(MemorySettings::new());
            let store = RecordStore::new(
                channel.clone(),
                FileAccess::new(channel.clone()),
                settings.clone(),
            );
            Self {
                channel,
                settings,
                store,
            }
        }

        /// Answer the MSISDN or voicemail load with one record
        fn complete_dialing_load(&self, file_id: u16, record: &[u8]) {
            assert!(self.channel.complete_first(
                |r| matches!(r, Request::RecordSize { file_id: f, .. } if *f == file_id),
                Ok(Payload::Ints(vec![record.len() as i32, record.len() as i32, 1])),
            ));
            assert!(self.channel.complete_first(
                |r| matches!(r, Request::ReadRecord { file_id: f, .. } if *f == file_id),
                Ok(Payload::Record(Bytes::copy_from_slice(record))),
            ));
        }
    }

    /// "Voicemail", +15551234, no extension
    const MBDN_RECORD: &[u8] = &[
        b'V', b'o', b'i', b'c', b'e', b'm', b'a', b'i', b'l', // alpha
        0x05, 0x91, // length, TON international
        0x51, 0x55, 0x21, 0x43, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // digits
        0xFF, 0xFF, // capability, extension
    ];

    #[test]
    fn loaded_only_after_every_record_lands() {
        let h = Harness::new();
        let loaded = h.store.subscribe_loaded();

        assert!(!h.store.records_loaded());
        h.store.fetch(Some("A0000000871002".into()));
        assert!(!h.store.records_loaded());

        h.channel.complete_first(
            |r| matches!(r, Request::Imsi { .. }),
            Ok(Payload::Text("310260000000000".into())),
        );
        h.complete_dialing_load(files::EF_MSISDN, &[0x08, 0x81, 0x51, 0x55, 0x87, 0xF9, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        h.complete_dialing_load(files::EF_MBDN, MBDN_RECORD);
        assert!(!h.store.records_loaded());
        assert!(loaded.try_recv().is_err());

        h.channel.complete_first(
            |r| matches!(r, Request::ReadBinary { file_id, .. } if *file_id == files::EF_SPN),
            Ok(Payload::Record(Bytes::from_static(&[
                0x01, b'S', b'i', b'm', b'N', b'e', b't', 0xFF, 0xFF,
            ]))),
        );

        assert!(h.store.records_loaded());
        assert!(loaded.try_recv().is_ok());
        assert_eq!(h.store.imsi().as_deref(), Some("310260000000000"));
        assert_eq!(h.store.voicemail_number().as_deref(), Some("+15551234"));
        assert_eq!(h.store.voicemail_tag().as_deref(), Some("Voicemail"));
        assert_eq!(h.store.service_provider_name().as_deref(), Some("SimNet"));
    }

    #[test]
    fn failed_loads_still_count_down() {
        let h = Harness::new();
        h.store.fetch(None);

        h.channel.complete_first(
            |r| matches!(r, Request::Imsi { .. }),
            Err(CommandFailure::new(FailureCode::Generic)),
        );
        h.channel.complete_first(
            |r| matches!(r, Request::RecordSize { file_id, .. } if *file_id == files::EF_MSISDN),
            Err(CommandFailure::new(FailureCode::Generic)),
        );
        h.channel.complete_first(
            |r| matches!(r, Request::RecordSize { file_id, .. } if *file_id == files::EF_MBDN),
            Err(CommandFailure::new(FailureCode::Generic)),
        );
        h.channel.complete_first(
            |r| matches!(r, Request::ReadBinary { .. }),
            Err(CommandFailure::new(FailureCode::Generic)),
        );

        assert!(h.store.records_loaded());
        assert_eq!(h.store.imsi(), None);
    }

    #[test]
    fn subscriber_set_voicemail_number_wins() {
        let h = Harness::new();
        h.settings.put(keys::VOICEMAIL_NUMBER, "+18005550199");
        h.store.fetch(None);

        h.complete_dialing_load(files::EF_MBDN, MBDN_RECORD);

        assert_eq!(
            h.store.voicemail_number().as_deref(),
            Some("+18005550199")
        );
    }

    #[test]
    fn disposed_store_drops_completions() {
        let h = Harness::new();
        h.store.fetch(None);
        h.store.dispose();

        h.channel.complete_first(
            |r| matches!(r, Request::Imsi { .. }),
            Ok(Payload::Text("001010123456789".into())),
        );

        assert_eq!(h.store.imsi(), None);
        assert!(!h.store.records_loaded());
    }

    #[test]
    fn call_forwarding_flag_persists() {
        let h = Harness::new();
        assert!(!h.store.call_forwarding_enabled());

        h.store.set_call_forwarding(true);
        assert!(h.store.call_forwarding_enabled());
        assert!(h.settings.get_bool(keys::CALL_FORWARDING_ENABLED, false));

        // A fresh store over the same settings sees the persisted flag
        let channel = Arc::new(MockChannel::new());
        let fresh = RecordStore::new(
            channel.clone(),
            FileAccess::new(channel),
            h.settings.clone(),
        );
        assert!(fresh.call_forwarding_enabled());
    }

    #[test]
    fn dialing_number_decode_handles_extension_overflow() {
        let decoded = decode_dialing_record(&RecordData {
            record: Bytes::from_static(&[
                0xFF, 0xFF, // no alpha
                0x06, 0x81, // length, TON national
                0x21, 0x43, 0x65, 0x87, 0x09, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // 1234567890
                0xFF, 0x01, // capability, links to extension 1
            ]),
            extensions: vec![Bytes::from_static(&[
                0x02, 0x02, 0x21, 0x43, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
            ])],
        });
        assert_eq!(decoded.number.as_deref(), Some("12345678901234"));
        assert_eq!(decoded.alpha, None);
    }
}
