//! # booking-engine
//!
//! Availability and booking scheduling for a home-services marketplace.
//!
//! Agents publish a weekly availability pattern and date-specific exceptions.
//! The engine turns those into bookable atomic slots, commits bookings without
//! ever double-booking an agent, and drives each booking through its lifecycle.
//!
//! ## Modules
//!
//! - [`clock`]: Minute-of-day times (`00:00`..=`24:00`), weekdays, date ranges
//! - [`interval`]: Expand blocks into atomic slots and compress them back
//! - [`availability`]: Weekly patterns and unavailability exceptions
//! - [`slots`]: Slot generation and availability checks
//! - [`lifecycle`]: Booking creation and state transitions
//! - [`recurrence`]: Weekly, biweekly and monthly booking series
//! - [`conflict`]: Detect overlapping bookings
//! - [`calendar`]: Day and week views
//! - [`store`]: Persistence port and in-memory store
//! - [`notify`]: Notification and payment collaborators
//! - [`config`]: Engine configuration
//! - [`error`]: Error types

pub mod availability;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod error;
pub mod interval;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod recurrence;
pub mod slots;
pub mod store;

pub use availability::AvailabilityService;
pub use clock::{ClockTime, DateRange};
pub use config::{EngineConfig, ReschedulePolicy};
pub use conflict::find_conflicts;
pub use error::{Result, ScheduleError};
pub use lifecycle::BookingManager;
pub use model::{
    Actor, AgentId, Booking, BookingId, BookingRequest, BookingStatus, ClientId, ExceptionId,
    Reschedule, ServiceId, TimeSlot, UnavailabilityException, WeeklyAvailabilityBlock,
};
pub use recurrence::{Recurrence, SeriesOutcome};
pub use slots::SlotGenerator;
pub use store::{InMemoryStore, ScheduleData, ScheduleStore};
