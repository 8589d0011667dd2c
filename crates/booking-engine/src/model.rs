//! Data model: weekly blocks, exceptions, derived time slots, and bookings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::ClockTime;
use crate::error::{Result, ScheduleError};
use crate::interval::{self, Span};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }
    };
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = ScheduleError;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map($name)
                    .map_err(|e| ScheduleError::Validation(format!("invalid id '{}': {}", s, e)))
            }
        }
    };
}

string_id!(
    /// Service provider whose availability and bookings are scheduled.
    AgentId
);
string_id!(ClientId);
string_id!(ServiceId);

uuid_id!(BookingId);
uuid_id!(ExceptionId);

/// One recurring weekly availability block for an agent.
///
/// `day_of_week` runs 0 (Sunday) through 6 (Saturday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAvailabilityBlock {
    pub agent_id: AgentId,
    pub day_of_week: u8,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub is_available: bool,
}

impl WeeklyAvailabilityBlock {
    pub fn new(
        agent_id: AgentId,
        day_of_week: u8,
        start_time: ClockTime,
        end_time: ClockTime,
        is_available: bool,
    ) -> Self {
        WeeklyAvailabilityBlock {
            agent_id,
            day_of_week,
            start_time,
            end_time,
            is_available,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start_time, self.end_time, self.is_available)
    }
}

/// A date-specific override that removes time from the weekly pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailabilityException {
    pub id: ExceptionId,
    pub agent_id: AgentId,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<ClockTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<ClockTime>,
    pub is_all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UnavailabilityException {
    pub fn all_day(agent_id: AgentId, date: NaiveDate, reason: Option<String>) -> Self {
        UnavailabilityException {
            id: ExceptionId::new(),
            agent_id,
            date,
            start_time: None,
            end_time: None,
            is_all_day: true,
            reason,
        }
    }

    pub fn partial(
        agent_id: AgentId,
        date: NaiveDate,
        start_time: ClockTime,
        end_time: ClockTime,
        reason: Option<String>,
    ) -> Self {
        UnavailabilityException {
            id: ExceptionId::new(),
            agent_id,
            date,
            start_time: Some(start_time),
            end_time: Some(end_time),
            is_all_day: false,
            reason,
        }
    }

    /// Check the all-day / partial shape: all-day carries no times, partial
    /// carries both with `start < end`.
    pub fn validate(&self) -> Result<()> {
        match (self.is_all_day, self.start_time, self.end_time) {
            (true, None, None) => Ok(()),
            (true, _, _) => Err(ScheduleError::Validation(
                "all-day exception must not carry start/end times".to_string(),
            )),
            (false, Some(start), Some(end)) if start < end => Ok(()),
            (false, Some(start), Some(end)) => Err(ScheduleError::Validation(format!(
                "exception ends ({}) at or before it starts ({})",
                end, start
            ))),
            (false, _, _) => Err(ScheduleError::Validation(
                "partial-day exception needs both start and end times".to_string(),
            )),
        }
    }

    /// The half-open window this exception removes from its date.
    pub fn excluded_window(&self) -> (ClockTime, ClockTime) {
        if self.is_all_day {
            return (ClockTime::MIDNIGHT, ClockTime::END_OF_DAY);
        }
        (
            self.start_time.unwrap_or(ClockTime::MIDNIGHT),
            self.end_time.unwrap_or(ClockTime::END_OF_DAY),
        )
    }
}

/// A derived atomic slot. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub available: bool,
    pub agent_id: AgentId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Rescheduled,
}

impl BookingStatus {
    /// COMPLETED and CANCELLED bookings never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Active bookings block availability; only cancellation releases time.
    pub fn is_active(self) -> bool {
        self != BookingStatus::Cancelled
    }

    /// The booking state table. `RESCHEDULED` is transient: a reschedule
    /// passes through it and lands back on PENDING or CONFIRMED.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, InProgress)
                | (InProgress, Completed)
                | (Pending, Rescheduled)
                | (Confirmed, Rescheduled)
                | (Rescheduled, Pending)
                | (Rescheduled, Confirmed)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Rescheduled => "RESCHEDULED",
        };
        f.write_str(name)
    }
}

/// One entry of a booking's status audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: Option<BookingStatus>,
    pub to: BookingStatus,
    pub at: DateTime<Utc>,
}

/// Previous and new placement of a rescheduled booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRecord {
    pub previous_date: NaiveDate,
    pub previous_start_time: ClockTime,
    pub previous_end_time: ClockTime,
    pub new_date: NaiveDate,
    pub new_start_time: ClockTime,
    pub new_end_time: ClockTime,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Membership of a booking in a recurring series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesLink {
    pub series_id: Uuid,
    /// 1-based position within the series.
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub service_id: ServiceId,
    pub client_id: ClientId,
    pub agent_id: AgentId,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub status: BookingStatus,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<SeriesLink>,
    #[serde(default)]
    pub reschedules: Vec<RescheduleRecord>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    /// Bumped on every stored write; conditional writes compare it.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A fresh PENDING booking for `request`.
    pub fn from_request(request: BookingRequest, now: DateTime<Utc>) -> Self {
        Booking {
            id: BookingId::new(),
            service_id: request.service_id,
            client_id: request.client_id,
            agent_id: request.agent_id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            status: BookingStatus::Pending,
            location: request.location,
            price: request.price,
            final_price: None,
            notes: request.notes,
            cancellation_reason: None,
            series: None,
            reschedules: Vec::new(),
            status_history: vec![StatusChange {
                from: None,
                to: BookingStatus::Pending,
                at: now,
            }],
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Half-open overlap with `[start, end)` on the same date.
    pub fn overlaps(&self, start: ClockTime, end: ClockTime) -> bool {
        interval::overlaps(self.start_time, self.end_time, start, end)
    }

    /// Move to `to`, appending to the audit trail.
    pub(crate) fn record_transition(&mut self, to: BookingStatus, at: DateTime<Utc>) {
        self.status_history.push(StatusChange {
            from: Some(self.status),
            to,
            at,
        });
        self.status = to;
        self.updated_at = at;
    }
}

/// A client's request for a new booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub service_id: ServiceId,
    pub client_id: ClientId,
    pub agent_id: AgentId,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub location: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookingRequest {
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.start_time, self.end_time)?;
        if self.location.trim().is_empty() {
            return Err(ScheduleError::Validation(
                "booking location must not be empty".to_string(),
            ));
        }
        if let Some(price) = self.price {
            if price.is_sign_negative() {
                return Err(ScheduleError::Validation(format!(
                    "price must not be negative: {}",
                    price
                )));
            }
        }
        Ok(())
    }
}

/// A requested move of an existing booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reschedule {
    pub new_date: NaiveDate,
    pub new_start_time: ClockTime,
    pub new_end_time: ClockTime,
    pub reason: String,
}

/// Who is performing a booking mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Client(ClientId),
    Agent(AgentId),
    /// Back-office or scheduled job acting on behalf of both parties.
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Client(id) => write!(f, "client {}", id),
            Actor::Agent(id) => write!(f, "agent {}", id),
            Actor::System => f.write_str("system"),
        }
    }
}

/// Reject empty or inverted intervals.
pub fn validate_interval(start: ClockTime, end: ClockTime) -> Result<()> {
    if start >= end {
        return Err(ScheduleError::Validation(format!(
            "interval ends ({}) at or before it starts ({})",
            end, start
        )));
    }
    Ok(())
}
