//! Asynchronous record loading with extension-record chaining
//!
//! Loading a record-structured card file is a multi-step affair: a geometry
//! query first, then the read or write itself, then — whenever a returned
//! record links to an extension record — one more load per link, possibly
//! nested. [`FileAccess`] tracks each batch with a pending-load counter and
//! completes the caller exactly once: with the aggregated result when the
//! counter reaches zero, or with the first failure, after which every late
//! completion of that batch is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use simtrack_radio::{CommandChannel, CommandFailure, CommandResult, Payload, Request};

/// No extension record linked
const NO_EXTENSION: u8 = 0xFF;

/// One loaded record together with its extension chain, in chain order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordData {
    /// The record itself
    pub record: Bytes,
    /// Extension records the record linked to, outermost first
    pub extensions: Vec<Bytes>,
}

/// Result of loading every record of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// All records in file order
    pub records: Vec<RecordData>,
    /// Per record: whether it linked into the extension file
    pub extension_used: Vec<bool>,
}

/// Why a load batch failed
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The radio failed one of the batch's commands
    #[error(transparent)]
    Command(#[from] CommandFailure),

    /// Geometry answer did not have exactly record length, file length and
    /// record count
    #[error("malformed geometry answer with {elements} elements")]
    MalformedGeometry {
        /// Number of elements the answer carried
        elements: usize,
    },

    /// Requested record lies outside the file
    #[error("record {requested} out of range, file has {count} records")]
    RecordOutOfRange {
        /// 1-based record number that was asked for
        requested: u32,
        /// Record count the card reported
        count: u32,
    },

    /// Update payload is larger than the file's record length
    #[error("record payload of {len} bytes does not fit record length {record_len}")]
    RecordLengthMismatch {
        /// Payload length supplied by the caller
        len: usize,
        /// Record length the card reported
        record_len: usize,
    },

    /// The radio answered with a payload of the wrong shape
    #[error("unexpected payload for {request}")]
    UnexpectedPayload {
        /// Name of the request that was answered
        request: &'static str,
    },
}

/// Completion callback for a single-record load
pub type LoadCallback = Box<dyn FnOnce(Result<RecordData, LoadError>) + Send>;
/// Completion callback for a whole-file load
pub type LoadAllCallback = Box<dyn FnOnce(Result<RecordSet, LoadError>) + Send>;
/// Completion callback for a record update
pub type UpdateCallback = Box<dyn FnOnce(Result<(), LoadError>) + Send>;

enum BatchKind {
    One {
        record_number: u32,
        done: Option<LoadCallback>,
        data: Option<RecordData>,
    },
    All {
        done: Option<LoadAllCallback>,
        records: Vec<Option<RecordData>>,
        extension_used: Vec<bool>,
    },
    Update {
        record_number: u32,
        payload: Bytes,
        done: Option<UpdateCallback>,
    },
}

struct Batch {
    file_id: u16,
    ext_file_id: u16,
    path: String,
    pending: u32,
    kind: BatchKind,
}

#[derive(Default)]
struct BatchTable {
    next_id: u64,
    entries: HashMap<u64, Batch>,
}

/// Which load within a batch a record completion belongs to
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Primary record at the given index
    Primary(usize),
    /// Extension record chained from the record at the given index
    Extension(usize),
}

/// Record loader for one application's file view
///
/// Cheap to clone; clones share the batch table. An application gets a
/// fresh `FileAccess` whenever its type changes, so stale batches die with
/// the old instance.
#[derive(Clone)]
#[allow(missing_debug_implementations)]
pub struct FileAccess {
    channel: Arc<dyn CommandChannel>,
    batches: Arc<Mutex<BatchTable>>,
}

impl FileAccess {
    /// Create a loader issuing through the given channel
    pub fn new(channel: Arc<dyn CommandChannel>) -> Self {
        Self {
            channel,
            batches: Arc::new(Mutex::new(BatchTable::default())),
        }
    }

    /// Load one record, chasing its extension chain
    pub fn load_record(
        &self,
        file_id: u16,
        ext_file_id: u16,
        path: &str,
        record_number: u32,
        done: LoadCallback,
    ) {
        let id = self.insert_batch(Batch {
            file_id,
            ext_file_id,
            path: path.to_owned(),
            pending: 1,
            kind: BatchKind::One {
                record_number,
                done: Some(done),
                data: None,
            },
        });
        self.issue_geometry(id, file_id, path);
    }

    /// Load every record of a file, chasing extension chains per record
    pub fn load_all_records(
        &self,
        file_id: u16,
        ext_file_id: u16,
        path: &str,
        done: LoadAllCallback,
    ) {
        let id = self.insert_batch(Batch {
            file_id,
            ext_file_id,
            path: path.to_owned(),
            pending: 0,
            kind: BatchKind::All {
                done: Some(done),
                records: Vec::new(),
                extension_used: Vec::new(),
            },
        });
        self.issue_geometry(id, file_id, path);
    }

    /// Overwrite one record; a short payload is padded to the record length
    pub fn update_record(
        &self,
        file_id: u16,
        path: &str,
        record_number: u32,
        payload: Bytes,
        done: UpdateCallback,
    ) {
        let id = self.insert_batch(Batch {
            file_id,
            ext_file_id: 0,
            path: path.to_owned(),
            pending: 1,
            kind: BatchKind::Update {
                record_number,
                payload,
                done: Some(done),
            },
        });
        self.issue_geometry(id, file_id, path);
    }

    fn insert_batch(&self, batch: Batch) -> u64 {
        let mut table = self.batches.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.entries.insert(id, batch);
        id
    }

    fn issue_geometry(&self, id: u64, file_id: u16, path: &str) {
        let this = self.clone();
        self.channel.issue(
            Request::RecordSize {
                file_id,
                path: path.to_owned(),
            },
            Box::new(move |result| this.on_geometry(id, result)),
        );
    }

    /// Geometry answered: validate shape and fan out the actual loads
    fn on_geometry(&self, id: u64, result: CommandResult) {
        let geometry = match result {
            Ok(Payload::Ints(values)) if values.len() == 3 => values,
            Ok(Payload::Ints(values)) => {
                self.fail_batch(
                    id,
                    LoadError::MalformedGeometry {
                        elements: values.len(),
                    },
                );
                return;
            }
            Ok(_) => {
                self.fail_batch(
                    id,
                    LoadError::UnexpectedPayload {
                        request: "RECORD_SIZE",
                    },
                );
                return;
            }
            Err(failure) => {
                self.fail_batch(id, failure.into());
                return;
            }
        };
        let record_len = geometry[0].max(0) as usize;
        let count = geometry[2].max(0) as u32;

        // Decide follow-up commands under the lock, issue them after
        let mut reads = Vec::new();
        let mut write = None;
        let mut finish = None;
        let mut failure = None;
        {
            let mut table = self.batches.lock();
            let Some(batch) = table.entries.get_mut(&id) else {
                debug!(batch = id, "geometry answer for finished batch dropped");
                return;
            };
            let file_id = batch.file_id;
            let path = batch.path.clone();
            match &mut batch.kind {
                BatchKind::One { record_number, .. } => {
                    let requested = *record_number;
                    if requested == 0 || requested > count {
                        failure = Some(LoadError::RecordOutOfRange { requested, count });
                    } else {
                        reads.push((file_id, requested, path, Slot::Primary(0)));
                    }
                }
                BatchKind::All {
                    records,
                    extension_used,
                    ..
                } => {
                    if count == 0 {
                        finish = Some(id);
                    } else {
                        records.resize(count as usize, None);
                        extension_used.resize(count as usize, false);
                        batch.pending = count;
                        for i in 0..count {
                            reads.push((file_id, i + 1, path.clone(), Slot::Primary(i as usize)));
                        }
                    }
                }
                BatchKind::Update {
                    record_number,
                    payload,
                    ..
                } => {
                    let requested = *record_number;
                    if requested == 0 || requested > count {
                        failure = Some(LoadError::RecordOutOfRange { requested, count });
                    } else if payload.len() > record_len {
                        failure = Some(LoadError::RecordLengthMismatch {
                            len: payload.len(),
                            record_len,
                        });
                    } else {
                        // The wire payload is always exactly one record long
                        let mut data = BytesMut::from(payload.as_ref());
                        data.resize(record_len, 0xFF);
                        write = Some((file_id, requested, path, data.freeze()));
                    }
                }
            }
        }

        if let Some(err) = failure {
            self.fail_batch(id, err);
            return;
        }
        if let Some(finished) = finish {
            self.finish_batch(finished);
            return;
        }
        for (file_id, record_number, path, slot) in reads {
            let this = self.clone();
            self.channel.issue(
                Request::ReadRecord {
                    file_id,
                    record_number,
                    path,
                },
                Box::new(move |result| this.on_record(id, slot, result)),
            );
        }
        if let Some((file_id, record_number, path, data)) = write {
            let this = self.clone();
            self.channel.issue(
                Request::UpdateRecord {
                    file_id,
                    record_number,
                    path,
                    data,
                },
                Box::new(move |result| this.on_write(id, result)),
            );
        }
    }

    /// One record (primary or extension) arrived for a batch
    fn on_record(&self, id: u64, slot: Slot, result: CommandResult) {
        let data = match result {
            Ok(Payload::Record(data)) => data,
            Ok(_) => {
                self.fail_batch(
                    id,
                    LoadError::UnexpectedPayload {
                        request: "READ_RECORD",
                    },
                );
                return;
            }
            Err(failure) => {
                self.fail_batch(id, failure.into());
                return;
            }
        };
        trace!(batch = id, ?slot, data = %hex::encode(&data), "record loaded");

        let mut chase = None;
        let finished = {
            let mut table = self.batches.lock();
            let Some(batch) = table.entries.get_mut(&id) else {
                debug!(batch = id, "record for aborted batch dropped");
                return;
            };

            let index = match slot {
                Slot::Primary(i) | Slot::Extension(i) => i,
            };
            if let Some(link) = extension_link(&data) {
                batch.pending += 1;
                chase = Some((batch.ext_file_id, link, batch.path.clone(), index));
            }
            match (&mut batch.kind, slot) {
                (BatchKind::One { data: stored, .. }, Slot::Primary(_)) => {
                    *stored = Some(RecordData {
                        record: data,
                        extensions: Vec::new(),
                    });
                }
                (BatchKind::One { data: stored, .. }, Slot::Extension(_)) => {
                    if let Some(record) = stored.as_mut() {
                        record.extensions.push(data);
                    }
                }
                (BatchKind::All { records, extension_used, .. }, Slot::Primary(i)) => {
                    if chase.is_some() {
                        extension_used[i] = true;
                    }
                    records[i] = Some(RecordData {
                        record: data,
                        extensions: Vec::new(),
                    });
                }
                (BatchKind::All { records, .. }, Slot::Extension(i)) => {
                    if let Some(Some(record)) = records.get_mut(i) {
                        record.extensions.push(data);
                    }
                }
                (BatchKind::Update { .. }, _) => {
                    warn!(batch = id, "record answer for an update batch dropped");
                    return;
                }
            }

            batch.pending -= 1;
            batch.pending == 0
        };

        if let Some((ext_file_id, record_number, path, index)) = chase {
            let this = self.clone();
            self.channel.issue(
                Request::ReadRecord {
                    file_id: ext_file_id,
                    record_number,
                    path,
                },
                Box::new(move |result| this.on_record(id, Slot::Extension(index), result)),
            );
        } else if finished {
            self.finish_batch(id);
        }
    }

    fn on_write(&self, id: u64, result: CommandResult) {
        match result {
            Ok(_) => self.finish_batch(id),
            Err(failure) => self.fail_batch(id, failure.into()),
        }
    }

    /// Complete a batch successfully; the user callback runs outside the lock
    fn finish_batch(&self, id: u64) {
        let Some(batch) = self.batches.lock().entries.remove(&id) else {
            return;
        };
        debug!(batch = id, file_id = batch.file_id, "batch complete");
        match batch.kind {
            BatchKind::One { done, data, .. } => {
                if let (Some(done), Some(data)) = (done, data) {
                    done(Ok(data));
                }
            }
            BatchKind::All {
                done,
                records,
                extension_used,
            } => {
                if let Some(done) = done {
                    done(Ok(RecordSet {
                        records: records.into_iter().flatten().collect(),
                        extension_used,
                    }));
                }
            }
            BatchKind::Update { done, .. } => {
                if let Some(done) = done {
                    done(Ok(()));
                }
            }
        }
    }

    /// Abort a batch: the user callback gets the failure, later completions
    /// for the batch find nothing and are dropped
    fn fail_batch(&self, id: u64, error: LoadError) {
        let Some(batch) = self.batches.lock().entries.remove(&id) else {
            debug!(batch = id, %error, "failure for already-finished batch dropped");
            return;
        };
        warn!(batch = id, file_id = batch.file_id, %error, "batch failed");
        match batch.kind {
            BatchKind::One { done, .. } => {
                if let Some(done) = done {
                    done(Err(error));
                }
            }
            BatchKind::All { done, .. } => {
                if let Some(done) = done {
                    done(Err(error));
                }
            }
            BatchKind::Update { done, .. } => {
                if let Some(done) = done {
                    done(Err(error));
                }
            }
        }
    }
}

/// Extension record a loaded record links to, if any
///
/// The trailing byte of a dialing-number record names the extension record,
/// `0xFF` meaning none; extension records chain onward the same way.
fn extension_link(data: &Bytes) -> Option<u32> {
    match data.last() {
        Some(&link) if link != NO_EXTENSION && link != 0 => Some(u32::from(link)),
        _ => None,
    }
}
