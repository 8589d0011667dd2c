//! Error types for booking-engine operations.

use thiserror::Error;

use crate::model::BookingStatus;

/// Errors returned by availability, slot and booking operations.
///
/// Every variant corresponds to a decision the caller has to make again
/// (pick another time, take another action, or give up); none of them are
/// handled internally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// Malformed input: inverted interval, granularity that does not divide
    /// the range, overlapping input blocks, out-of-range weekday.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested interval lies outside the agent's weekly availability or
    /// inside one of their exceptions.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The requested interval is no longer free at commit time.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The actor is not a party to the booking, or not allowed the action.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The transition is not in the booking state table.
    #[error("Cannot {action} a booking in state {from}")]
    State {
        from: BookingStatus,
        action: &'static str,
    },

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The persistence collaborator failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl ScheduleError {
    /// Whether re-fetching slots and retrying with a fresh selection can
    /// succeed. Only commit-time conflicts qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScheduleError::Conflict(_))
    }
}

/// Convenience alias used throughout booking-engine.
pub type Result<T> = std::result::Result<T, ScheduleError>;
