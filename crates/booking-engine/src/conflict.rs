//! Detect overlapping bookings.
//!
//! Only active bookings (anything but CANCELLED) for the same agent on the same
//! date can conflict. Adjacent bookings (one ends exactly when another starts)
//! are NOT conflicts.

use chrono::NaiveDate;

use crate::clock::ClockTime;
use crate::model::{AgentId, Booking, BookingId};

/// A detected overlap between two active bookings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub agent_id: AgentId,
    pub date: NaiveDate,
    pub booking_a: BookingId,
    pub booking_b: BookingId,
    pub overlap_minutes: u32,
}

/// Find the first active booking in `others` that overlaps `[start, end)`.
///
/// Callers pass bookings already narrowed to one agent and date.
pub fn first_overlap<'a, I>(start: ClockTime, end: ClockTime, others: I) -> Option<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    others
        .into_iter()
        .find(|b| b.is_active() && b.overlaps(start, end))
}

/// Find all pairwise conflicts among `bookings`.
///
/// Two bookings conflict when they share agent and date, both are active, and
/// `a.start < b.end && b.start < a.end`. The overlap is
/// `min(a.end, b.end) - max(a.start, b.start)`.
pub fn find_conflicts(bookings: &[Booking]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for (i, a) in bookings.iter().enumerate() {
        if !a.is_active() {
            continue;
        }
        for b in &bookings[i + 1..] {
            if !b.is_active() || a.agent_id != b.agent_id || a.date != b.date {
                continue;
            }
            if a.overlaps(b.start_time, b.end_time) {
                let overlap_start = a.start_time.max(b.start_time);
                let overlap_end = a.end_time.min(b.end_time);

                conflicts.push(Conflict {
                    agent_id: a.agent_id.clone(),
                    date: a.date,
                    booking_a: a.id,
                    booking_b: b.id,
                    overlap_minutes: overlap_end.minutes() - overlap_start.minutes(),
                });
            }
        }
    }

    conflicts
}
