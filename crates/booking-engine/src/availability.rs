//! Weekly availability patterns and date-specific exceptions.
//!
//! A weekly pattern is written with replace-all semantics: the input is
//! validated (no overlapping blocks within one day), compressed per day into
//! maximal blocks, and swapped in as a whole. Exceptions are sparse, additive
//! and addressed individually by id; they are never merged.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::clock::DateRange;
use crate::error::{Result, ScheduleError};
use crate::interval::{self, Span};
use crate::model::{AgentId, ExceptionId, UnavailabilityException, WeeklyAvailabilityBlock};
use crate::store::ScheduleStore;

/// Read/write access to an agent's weekly pattern and exceptions.
#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn ScheduleStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        AvailabilityService { store }
    }

    /// Replace the agent's whole weekly pattern.
    ///
    /// Returns the pattern as stored: per day, sorted and maximally merged.
    ///
    /// # Errors
    /// `Validation` if a block belongs to another agent, has a day outside
    /// 0-6, is empty or inverted, or overlaps another block on the same day.
    pub fn set_weekly_availability(
        &self,
        agent_id: &AgentId,
        blocks: Vec<WeeklyAvailabilityBlock>,
    ) -> Result<Vec<WeeklyAvailabilityBlock>> {
        let mut by_day: BTreeMap<u8, Vec<WeeklyAvailabilityBlock>> = BTreeMap::new();
        for block in blocks {
            validate_block(agent_id, &block)?;
            by_day.entry(block.day_of_week).or_default().push(block);
        }

        let mut normalized = Vec::new();
        for (day, day_blocks) in by_day {
            normalized.extend(normalize_day(agent_id, day, day_blocks)?);
        }

        self.store
            .replace_weekly_pattern(agent_id, normalized.clone())?;
        info!(agent_id = %agent_id, blocks = normalized.len(), "weekly availability replaced");
        Ok(normalized)
    }

    /// Replace the blocks of a single day of week.
    pub fn set_day_availability(
        &self,
        agent_id: &AgentId,
        day_of_week: u8,
        blocks: Vec<WeeklyAvailabilityBlock>,
    ) -> Result<Vec<WeeklyAvailabilityBlock>> {
        if day_of_week > 6 {
            return Err(ScheduleError::Validation(format!(
                "day_of_week must be 0-6, got {}",
                day_of_week
            )));
        }
        for block in &blocks {
            validate_block(agent_id, block)?;
            if block.day_of_week != day_of_week {
                return Err(ScheduleError::Validation(format!(
                    "block for day {} submitted as part of day {}",
                    block.day_of_week, day_of_week
                )));
            }
        }

        let normalized = normalize_day(agent_id, day_of_week, blocks)?;
        self.store
            .replace_day_pattern(agent_id, day_of_week, normalized.clone())?;
        info!(agent_id = %agent_id, day_of_week, blocks = normalized.len(), "day availability replaced");
        Ok(normalized)
    }

    pub fn get_weekly_availability(&self, agent_id: &AgentId) -> Result<Vec<WeeklyAvailabilityBlock>> {
        self.store.weekly_pattern(agent_id)
    }

    /// Record an exception for the agent.
    pub fn add_exception(
        &self,
        agent_id: &AgentId,
        exception: UnavailabilityException,
    ) -> Result<UnavailabilityException> {
        if &exception.agent_id != agent_id {
            return Err(ScheduleError::Validation(format!(
                "exception belongs to agent {}, not {}",
                exception.agent_id, agent_id
            )));
        }
        exception.validate()?;

        self.store.insert_exception(exception.clone())?;
        info!(
            agent_id = %agent_id,
            exception_id = %exception.id,
            date = %exception.date,
            all_day = exception.is_all_day,
            "exception added"
        );
        Ok(exception)
    }

    /// Remove one exception on `date`.
    ///
    /// # Errors
    /// `NotFound` when the agent has no exception with that id on that date.
    pub fn remove_exception(
        &self,
        agent_id: &AgentId,
        date: NaiveDate,
        exception_id: ExceptionId,
    ) -> Result<()> {
        if !self
            .store
            .delete_exception(agent_id, exception_id, Some(date))?
        {
            return Err(ScheduleError::NotFound(format!(
                "exception {} on {} for agent {}",
                exception_id, date, agent_id
            )));
        }
        info!(agent_id = %agent_id, exception_id = %exception_id, "exception removed");
        Ok(())
    }

    /// Remove one exception by id alone, whatever its date.
    pub fn remove_exception_by_id(&self, agent_id: &AgentId, exception_id: ExceptionId) -> Result<()> {
        if !self.store.delete_exception(agent_id, exception_id, None)? {
            return Err(ScheduleError::NotFound(format!(
                "exception {} for agent {}",
                exception_id, agent_id
            )));
        }
        info!(agent_id = %agent_id, exception_id = %exception_id, "exception removed");
        Ok(())
    }

    pub fn get_exceptions(
        &self,
        agent_id: &AgentId,
        range: DateRange,
    ) -> Result<Vec<UnavailabilityException>> {
        self.store.exceptions(agent_id, range)
    }
}

fn validate_block(agent_id: &AgentId, block: &WeeklyAvailabilityBlock) -> Result<()> {
    if &block.agent_id != agent_id {
        return Err(ScheduleError::Validation(format!(
            "block belongs to agent {}, not {}",
            block.agent_id, agent_id
        )));
    }
    if block.day_of_week > 6 {
        return Err(ScheduleError::Validation(format!(
            "day_of_week must be 0-6, got {}",
            block.day_of_week
        )));
    }
    if block.start_time >= block.end_time {
        return Err(ScheduleError::Validation(format!(
            "block on day {} ends ({}) at or before it starts ({})",
            block.day_of_week, block.end_time, block.start_time
        )));
    }
    Ok(())
}

/// Sort one day's blocks, reject overlaps, and compress adjacent blocks with
/// equal availability.
fn normalize_day(
    agent_id: &AgentId,
    day_of_week: u8,
    blocks: Vec<WeeklyAvailabilityBlock>,
) -> Result<Vec<WeeklyAvailabilityBlock>> {
    let mut spans: Vec<Span> = blocks.iter().map(WeeklyAvailabilityBlock::span).collect();
    spans.sort_by_key(|s| (s.start, s.end));

    for pair in spans.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(ScheduleError::Validation(format!(
                "blocks {}-{} and {}-{} overlap on day {}",
                pair[0].start, pair[0].end, pair[1].start, pair[1].end, day_of_week
            )));
        }
    }

    Ok(interval::compress(&spans)
        .into_iter()
        .map(|s| WeeklyAvailabilityBlock::new(agent_id.clone(), day_of_week, s.start, s.end, s.flag))
        .collect())
}
