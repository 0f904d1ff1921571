//! Fan-in countdown barrier for batched async completions
//!
//! A poll cycle issues N radio commands and must act exactly once, after the
//! last of them lands, in whatever order they land. Each cycle allocates one
//! [`Countdown`]; every completion carries a clone and decrements it. A new
//! cycle allocates a new barrier, so completions that belong to a superseded
//! cycle are recognised by identity and dropped by the owner.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Countdown barrier shared by the completions of one command batch.
///
/// Clones refer to the same cycle; [`Countdown::same_cycle`] compares by
/// identity, never by value.
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: Arc<AtomicU32>,
}

impl Countdown {
    /// Create a barrier expecting `n` completions
    pub fn new(n: u32) -> Self {
        Self {
            remaining: Arc::new(AtomicU32::new(n)),
        }
    }

    /// Record one completion; true exactly when this was the last one
    ///
    /// Completions beyond the expected count are ignored and return false.
    pub fn complete_one(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok_and(|prev| prev == 1)
    }

    /// Completions still outstanding
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Whether every expected completion has been recorded
    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Whether `other` belongs to the same cycle as `self`
    pub fn same_cycle(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.remaining, &other.remaining)
    }
}
