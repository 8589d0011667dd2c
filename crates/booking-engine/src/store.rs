//! Persistence port and an in-memory implementation.
//!
//! The engine never holds state of its own; every component receives an
//! `Arc<dyn ScheduleStore>`. Besides ordinary reads and writes the store offers
//! exactly one conditional-write primitive, [`ScheduleStore::put_booking_if`],
//! which evaluates a caller-supplied predicate and performs the write under the
//! same exclusive access. That is what makes check-and-insert atomic.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::clock::{day_of_week, DateRange};
use crate::error::Result;
use crate::model::{
    AgentId, Booking, BookingId, ClientId, ExceptionId, UnavailabilityException,
    WeeklyAvailabilityBlock,
};

/// Everything the slot generator needs for one agent on one date, read at a
/// single point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySnapshot {
    pub agent_id: AgentId,
    pub date: NaiveDate,
    /// Weekly blocks for the date's day of week.
    pub blocks: Vec<WeeklyAvailabilityBlock>,
    pub exceptions: Vec<UnavailabilityException>,
    /// All bookings on the date, cancelled ones included.
    pub bookings: Vec<Booking>,
}

/// State visible to a conditional-write predicate.
#[derive(Debug)]
pub struct WriteContext<'a> {
    /// Stored copy of the booking being written, if it already exists.
    pub existing: Option<&'a Booking>,
    /// Every other booking of the same agent on the target date.
    pub same_day: &'a [&'a Booking],
}

/// Predicate for [`ScheduleStore::put_booking_if`]. Returning an error aborts
/// the write and hands that error back to the caller unchanged.
pub type Precondition<'p> = dyn Fn(&WriteContext<'_>) -> Result<()> + 'p;

/// Persistence collaborator for availability, exceptions and bookings.
pub trait ScheduleStore: Send + Sync {
    /// Every weekly block of an agent, ordered by day then start time.
    fn weekly_pattern(&self, agent_id: &AgentId) -> Result<Vec<WeeklyAvailabilityBlock>>;

    /// Replace an agent's entire weekly pattern.
    fn replace_weekly_pattern(
        &self,
        agent_id: &AgentId,
        blocks: Vec<WeeklyAvailabilityBlock>,
    ) -> Result<()>;

    /// Replace the blocks of one day of week, leaving other days untouched.
    fn replace_day_pattern(
        &self,
        agent_id: &AgentId,
        day_of_week: u8,
        blocks: Vec<WeeklyAvailabilityBlock>,
    ) -> Result<()>;

    fn insert_exception(&self, exception: UnavailabilityException) -> Result<()>;

    /// Delete an agent's exception by id, only if it falls on `on_date` when
    /// one is given. Returns whether anything was deleted.
    fn delete_exception(
        &self,
        agent_id: &AgentId,
        exception_id: ExceptionId,
        on_date: Option<NaiveDate>,
    ) -> Result<bool>;

    /// Exceptions of an agent within `range`, ordered by date.
    fn exceptions(&self, agent_id: &AgentId, range: DateRange) -> Result<Vec<UnavailabilityException>>;

    fn booking(&self, id: BookingId) -> Result<Option<Booking>>;

    /// Bookings of an agent within `range`, ordered by date then start time.
    fn bookings_for_agent(&self, agent_id: &AgentId, range: DateRange) -> Result<Vec<Booking>>;

    /// Bookings of a client within `range`, ordered by date then start time.
    fn bookings_for_client(&self, client_id: &ClientId, range: DateRange) -> Result<Vec<Booking>>;

    /// Consistent read of pattern, exceptions and bookings for one date.
    fn day_snapshot(&self, agent_id: &AgentId, date: NaiveDate) -> Result<DaySnapshot>;

    /// Insert or replace `booking` iff `precondition` accepts the current state.
    ///
    /// The predicate runs while the store holds exclusive access, so no other
    /// write can interleave between the check and the write.
    fn put_booking_if(&self, booking: Booking, precondition: &Precondition<'_>) -> Result<()>;
}

/// Serializable dump of a whole store, used for fixtures and the CLI's schedule
/// files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleData {
    pub weekly: Vec<WeeklyAvailabilityBlock>,
    pub exceptions: Vec<UnavailabilityException>,
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Default)]
struct Tables {
    weekly: HashMap<AgentId, Vec<WeeklyAvailabilityBlock>>,
    exceptions: HashMap<AgentId, Vec<UnavailabilityException>>,
    bookings: HashMap<BookingId, Booking>,
}

/// In-memory store. All tables sit behind one lock so snapshots are consistent
/// and conditional writes are serialized.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dump as-is. No validation is applied.
    pub fn from_data(data: ScheduleData) -> Self {
        let mut tables = Tables::default();
        for block in data.weekly {
            tables
                .weekly
                .entry(block.agent_id.clone())
                .or_default()
                .push(block);
        }
        for blocks in tables.weekly.values_mut() {
            sort_blocks(blocks);
        }
        for exception in data.exceptions {
            tables
                .exceptions
                .entry(exception.agent_id.clone())
                .or_default()
                .push(exception);
        }
        for booking in data.bookings {
            tables.bookings.insert(booking.id, booking);
        }
        InMemoryStore {
            tables: RwLock::new(tables),
        }
    }

    /// Dump the store in a deterministic order.
    pub fn to_data(&self) -> ScheduleData {
        let tables = self.tables.read();

        let mut weekly: Vec<WeeklyAvailabilityBlock> =
            tables.weekly.values().flatten().cloned().collect();
        weekly.sort_by(|a, b| {
            (&a.agent_id, a.day_of_week, a.start_time).cmp(&(&b.agent_id, b.day_of_week, b.start_time))
        });

        let mut exceptions: Vec<UnavailabilityException> =
            tables.exceptions.values().flatten().cloned().collect();
        exceptions.sort_by(|a, b| (&a.agent_id, a.date, a.id).cmp(&(&b.agent_id, b.date, b.id)));

        let mut bookings: Vec<Booking> = tables.bookings.values().cloned().collect();
        sort_bookings(&mut bookings);

        ScheduleData {
            weekly,
            exceptions,
            bookings,
        }
    }
}

fn sort_blocks(blocks: &mut [WeeklyAvailabilityBlock]) {
    blocks.sort_by_key(|b| (b.day_of_week, b.start_time, b.end_time));
}

fn sort_bookings(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| (a.date, a.start_time, a.id).cmp(&(b.date, b.start_time, b.id)));
}

impl ScheduleStore for InMemoryStore {
    fn weekly_pattern(&self, agent_id: &AgentId) -> Result<Vec<WeeklyAvailabilityBlock>> {
        let tables = self.tables.read();
        Ok(tables.weekly.get(agent_id).cloned().unwrap_or_default())
    }

    fn replace_weekly_pattern(
        &self,
        agent_id: &AgentId,
        mut blocks: Vec<WeeklyAvailabilityBlock>,
    ) -> Result<()> {
        sort_blocks(&mut blocks);
        let mut tables = self.tables.write();
        tables.weekly.insert(agent_id.clone(), blocks);
        Ok(())
    }

    fn replace_day_pattern(
        &self,
        agent_id: &AgentId,
        day_of_week: u8,
        blocks: Vec<WeeklyAvailabilityBlock>,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let pattern = tables.weekly.entry(agent_id.clone()).or_default();
        pattern.retain(|b| b.day_of_week != day_of_week);
        pattern.extend(blocks);
        sort_blocks(pattern);
        Ok(())
    }

    fn insert_exception(&self, exception: UnavailabilityException) -> Result<()> {
        let mut tables = self.tables.write();
        let list = tables
            .exceptions
            .entry(exception.agent_id.clone())
            .or_default();
        list.retain(|e| e.id != exception.id);
        list.push(exception);
        Ok(())
    }

    fn delete_exception(
        &self,
        agent_id: &AgentId,
        exception_id: ExceptionId,
        on_date: Option<NaiveDate>,
    ) -> Result<bool> {
        let mut tables = self.tables.write();
        let Some(list) = tables.exceptions.get_mut(agent_id) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|e| !(e.id == exception_id && on_date.is_none_or(|d| d == e.date)));
        Ok(list.len() != before)
    }

    fn exceptions(&self, agent_id: &AgentId, range: DateRange) -> Result<Vec<UnavailabilityException>> {
        let tables = self.tables.read();
        let mut found: Vec<UnavailabilityException> = tables
            .exceptions
            .get(agent_id)
            .map(|list| {
                list.iter()
                    .filter(|e| range.contains(e.date))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|e| (e.date, e.start_time));
        Ok(found)
    }

    fn booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let tables = self.tables.read();
        Ok(tables.bookings.get(&id).cloned())
    }

    fn bookings_for_agent(&self, agent_id: &AgentId, range: DateRange) -> Result<Vec<Booking>> {
        let tables = self.tables.read();
        let mut found: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| &b.agent_id == agent_id && range.contains(b.date))
            .cloned()
            .collect();
        sort_bookings(&mut found);
        Ok(found)
    }

    fn bookings_for_client(&self, client_id: &ClientId, range: DateRange) -> Result<Vec<Booking>> {
        let tables = self.tables.read();
        let mut found: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| &b.client_id == client_id && range.contains(b.date))
            .cloned()
            .collect();
        sort_bookings(&mut found);
        Ok(found)
    }

    fn day_snapshot(&self, agent_id: &AgentId, date: NaiveDate) -> Result<DaySnapshot> {
        let tables = self.tables.read();
        let weekday = day_of_week(date);

        let blocks = tables
            .weekly
            .get(agent_id)
            .map(|pattern| {
                pattern
                    .iter()
                    .filter(|b| b.day_of_week == weekday)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let exceptions = tables
            .exceptions
            .get(agent_id)
            .map(|list| list.iter().filter(|e| e.date == date).cloned().collect())
            .unwrap_or_default();

        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| &b.agent_id == agent_id && b.date == date)
            .cloned()
            .collect();
        sort_bookings(&mut bookings);

        Ok(DaySnapshot {
            agent_id: agent_id.clone(),
            date,
            blocks,
            exceptions,
            bookings,
        })
    }

    fn put_booking_if(&self, booking: Booking, precondition: &Precondition<'_>) -> Result<()> {
        let mut tables = self.tables.write();

        {
            let existing = tables.bookings.get(&booking.id);
            let same_day: Vec<&Booking> = tables
                .bookings
                .values()
                .filter(|b| {
                    b.id != booking.id && b.agent_id == booking.agent_id && b.date == booking.date
                })
                .collect();

            precondition(&WriteContext {
                existing,
                same_day: &same_day,
            })?;
        }

        tables.bookings.insert(booking.id, booking);
        Ok(())
    }
}
