//! Bookable slot generation.
//!
//! For one agent and date: expand the day's weekly blocks into atomic slots,
//! knock out slots touched by exceptions, then knock out slots touched by
//! active bookings. All three passes work on one [`DaySnapshot`], so a
//! concurrent write can never show up in one pass and not another. Only
//! exceptions and bookings remove time; nothing else does.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::clock::{ClockTime, DateRange};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::interval::{self, Span};
use crate::model::{validate_interval, AgentId, TimeSlot};
use crate::store::{DaySnapshot, ScheduleStore};

/// Weekly pattern plus exceptions, without bookings.
///
/// This is the agent's offered time for the date; booking conflicts are
/// checked separately at commit time.
pub fn base_spans(snapshot: &DaySnapshot, granularity: Duration) -> Result<Vec<Span>> {
    let blocks: Vec<Span> = snapshot.blocks.iter().map(|b| b.span()).collect();
    let mut spans = interval::expand(&blocks, granularity, ClockTime::MIDNIGHT, ClockTime::END_OF_DAY)?;

    for exception in &snapshot.exceptions {
        let (start, end) = exception.excluded_window();
        mark_unavailable(&mut spans, start, end);
    }

    Ok(spans)
}

/// [`base_spans`] with every active booking knocked out as well.
pub fn day_spans(snapshot: &DaySnapshot, granularity: Duration) -> Result<Vec<Span>> {
    let mut spans = base_spans(snapshot, granularity)?;
    for booking in snapshot.bookings.iter().filter(|b| b.is_active()) {
        mark_unavailable(&mut spans, booking.start_time, booking.end_time);
    }
    Ok(spans)
}

/// Whether every span overlapping `[start, end)` is available.
///
/// An interval that no span overlaps is not open.
pub fn interval_is_open(spans: &[Span], start: ClockTime, end: ClockTime) -> bool {
    let mut touched = spans.iter().filter(|s| s.overlaps(start, end)).peekable();
    touched.peek().is_some() && touched.all(|s| s.flag)
}

fn mark_unavailable(spans: &mut [Span], start: ClockTime, end: ClockTime) {
    for span in spans.iter_mut().filter(|s| s.overlaps(start, end)) {
        span.flag = false;
    }
}

fn to_time_slots(snapshot: &DaySnapshot, spans: Vec<Span>) -> Vec<TimeSlot> {
    spans
        .into_iter()
        .map(|s| TimeSlot {
            date: snapshot.date,
            start_time: s.start,
            end_time: s.end,
            available: s.flag,
            agent_id: snapshot.agent_id.clone(),
        })
        .collect()
}

/// Computes candidate slots from the store.
#[derive(Clone)]
pub struct SlotGenerator {
    store: Arc<dyn ScheduleStore>,
    granularity: Duration,
}

impl SlotGenerator {
    /// A generator with one-hour slots.
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        SlotGenerator {
            store,
            granularity: Duration::hours(1),
        }
    }

    /// A generator at the configured granularity, matching what
    /// [`BookingManager`](crate::BookingManager) checks on create and
    /// reschedule.
    pub fn from_config(store: Arc<dyn ScheduleStore>, config: &EngineConfig) -> Self {
        SlotGenerator::new(store).with_granularity(config.granularity())
    }

    /// Override the slot width.
    ///
    /// Bookings are validated against the [`EngineConfig`] granularity. At any
    /// other width an interval can show open here and still be rejected as
    /// `Unavailable` (or the reverse) when the agent's blocks are not aligned
    /// to both widths; use [`from_config`](Self::from_config) for the
    /// bookable view.
    pub fn with_granularity(mut self, granularity: Duration) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Every atomic slot of `date` with its availability, in order.
    pub fn get_available_slots(&self, agent_id: &AgentId, date: NaiveDate) -> Result<Vec<TimeSlot>> {
        self.get_available_slots_with(agent_id, date, self.granularity)
    }

    /// As [`get_available_slots`](Self::get_available_slots) with an explicit
    /// granularity.
    pub fn get_available_slots_with(
        &self,
        agent_id: &AgentId,
        date: NaiveDate,
        granularity: Duration,
    ) -> Result<Vec<TimeSlot>> {
        let snapshot = self.store.day_snapshot(agent_id, date)?;
        let spans = day_spans(&snapshot, granularity)?;
        debug!(
            agent_id = %agent_id,
            %date,
            slots = spans.len(),
            open = spans.iter().filter(|s| s.flag).count(),
            "generated slots"
        );
        Ok(to_time_slots(&snapshot, spans))
    }

    /// Slots for every date in `range` at `granularity`, each date read from
    /// its own snapshot.
    pub fn get_available_slots_in_range(
        &self,
        agent_id: &AgentId,
        range: DateRange,
        granularity: Duration,
    ) -> Result<Vec<TimeSlot>> {
        let mut slots = Vec::new();
        for date in range.days() {
            slots.extend(self.get_available_slots_with(agent_id, date, granularity)?);
        }
        Ok(slots)
    }

    /// Whether `[start, end)` on `date` is free right now.
    ///
    /// Advisory only: the authoritative check happens when a booking is
    /// committed.
    pub fn check_availability(
        &self,
        agent_id: &AgentId,
        date: NaiveDate,
        start: ClockTime,
        end: ClockTime,
    ) -> Result<bool> {
        validate_interval(start, end)?;
        let snapshot = self.store.day_snapshot(agent_id, date)?;
        let spans = day_spans(&snapshot, self.granularity)?;
        Ok(interval_is_open(&spans, start, end))
    }
}
