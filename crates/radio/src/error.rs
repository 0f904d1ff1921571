//! Radio command failure taxonomy

use thiserror::Error;

/// Failure class reported by the radio for one command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureCode {
    /// The radio is not available (powered down or dead)
    #[error("Radio not available")]
    RadioNotAvailable,

    /// Unspecified failure
    #[error("Generic failure")]
    Generic,

    /// Supplied password was wrong
    #[error("Password incorrect")]
    PasswordIncorrect,

    /// Operation needs PIN2 verification first
    #[error("PIN2 verification required")]
    Pin2Required,

    /// Radio does not implement this request
    #[error("Request not supported")]
    RequestNotSupported,

    /// Radio is busy, retry later
    #[error("Radio busy")]
    Busy,

    /// Operation targeted a card application that is not present
    ///
    /// Raised locally, before any command reaches the radio.
    #[error("No such card application")]
    NoSuchApplication,
}

/// One failed radio command
///
/// `details` is the raw integer payload some failures carry; for password
/// operations its first element is the number of attempts left.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}")]
pub struct CommandFailure {
    /// Failure class
    pub code: FailureCode,
    /// Raw failure payload, possibly empty
    pub details: Vec<i32>,
}

impl CommandFailure {
    /// Failure with no payload
    pub const fn new(code: FailureCode) -> Self {
        Self {
            code,
            details: Vec::new(),
        }
    }

    /// Failure carrying a raw integer payload
    pub const fn with_details(code: FailureCode, details: Vec<i32>) -> Self {
        Self { code, details }
    }

    /// Password attempts left, −1 when the radio did not say
    pub fn attempts_remaining(&self) -> i32 {
        self.details.first().copied().unwrap_or(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_come_from_first_detail_element() {
        let failure = CommandFailure::with_details(FailureCode::PasswordIncorrect, vec![2, 9]);
        assert_eq!(failure.attempts_remaining(), 2);
    }

    #[test]
    fn missing_details_mean_unknown_attempts() {
        let failure = CommandFailure::new(FailureCode::PasswordIncorrect);
        assert_eq!(failure.attempts_remaining(), -1);
    }
}
