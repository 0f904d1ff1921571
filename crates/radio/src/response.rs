//! Radio answers
//!
//! Successful completions carry one [`Payload`]. Requests whose original
//! wire format is a bare string array (operator identity, registration
//! states) keep that shape here: decoding individual fields, including
//! tolerating malformed ones, is the caller's concern.

use bytes::Bytes;

use crate::status::CardStatusReport;

/// Successful answer to a radio request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Whole-card status snapshot
    CardStatus(CardStatusReport),
    /// Integer array answer (facility queries, record geometry, attempt counts)
    Ints(Vec<i32>),
    /// Single string answer (IMSI)
    Text(String),
    /// Raw string-array answer (operator identity, registration states);
    /// empty strings mean "field not populated"
    Strings(Vec<String>),
    /// Raw card file payload
    Record(Bytes),
    /// Answer with no payload
    Empty,
}

impl Payload {
    /// The integer array, if this payload is one
    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            Self::Ints(values) => Some(values),
            _ => None,
        }
    }

    /// The string array, if this payload is one
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Self::Strings(values) => Some(values),
            _ => None,
        }
    }

    /// The raw record bytes, if this payload is one
    pub const fn as_record(&self) -> Option<&Bytes> {
        match self {
            Self::Record(data) => Some(data),
            _ => None,
        }
    }
}
