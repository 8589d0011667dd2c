//! Conversion between atomic per-unit time flags and minimal contiguous ranges.
//!
//! [`expand`] cuts a window into fixed-size units and flags each unit that is
//! fully covered by available blocks. [`compress`] folds an ordered sequence of
//! flagged spans back into the fewest ranges. Together they satisfy a round-trip
//! law: `compress(expand(blocks))` is the same minimal, non-overlapping set
//! however `blocks` was ordered or fragmented, and `compress` is idempotent.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::clock::{ClockTime, MINUTES_PER_DAY};
use crate::error::{Result, ScheduleError};

/// A flagged half-open interval `[start, end)` within one day.
///
/// Used both for atomic slots (one granularity unit wide) and for the merged
/// ranges `compress` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: ClockTime,
    pub end: ClockTime,
    pub flag: bool,
}

impl Span {
    pub fn new(start: ClockTime, end: ClockTime, flag: bool) -> Self {
        Span { start, end, flag }
    }

    pub fn duration_minutes(&self) -> u32 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }

    pub fn overlaps(&self, start: ClockTime, end: ClockTime) -> bool {
        overlaps(self.start, self.end, start, end)
    }
}

/// Two half-open intervals overlap iff `a.start < b.end && b.start < a.end`.
///
/// Touching intervals (`a.end == b.start`) do not overlap.
pub fn overlaps(a_start: ClockTime, a_end: ClockTime, b_start: ClockTime, b_end: ClockTime) -> bool {
    a_start < b_end && b_start < a_end
}

/// Validate a granularity and return it in whole minutes.
pub fn granularity_minutes(granularity: Duration) -> Result<u32> {
    let minutes = granularity.num_minutes();
    if minutes <= 0 || granularity != Duration::minutes(minutes) {
        return Err(ScheduleError::Validation(format!(
            "granularity must be a positive whole number of minutes, got {}s",
            granularity.num_seconds()
        )));
    }
    if minutes > MINUTES_PER_DAY as i64 {
        return Err(ScheduleError::Validation(format!(
            "granularity of {} minutes exceeds one day",
            minutes
        )));
    }
    Ok(minutes as u32)
}

/// Sorted union of every span whose flag is set.
///
/// Overlapping or touching spans are merged. Empty spans are dropped.
pub fn merge_covered(spans: &[Span]) -> Vec<(ClockTime, ClockTime)> {
    let mut intervals: Vec<(ClockTime, ClockTime)> = spans
        .iter()
        .filter(|s| s.flag && s.start < s.end)
        .map(|s| (s.start, s.end))
        .collect();

    intervals.sort_by_key(|&(start, end)| (start, end));

    let mut merged: Vec<(ClockTime, ClockTime)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
}

/// Cut `[range_start, range_end)` into units of `granularity` and flag each unit
/// that lies entirely inside the union of flagged `blocks`.
///
/// # Errors
/// `Validation` when the range is inverted, the granularity is not a positive
/// whole number of minutes, or it does not evenly divide the range.
pub fn expand(
    blocks: &[Span],
    granularity: Duration,
    range_start: ClockTime,
    range_end: ClockTime,
) -> Result<Vec<Span>> {
    let step = granularity_minutes(granularity)?;

    if range_end < range_start {
        return Err(ScheduleError::Validation(format!(
            "expansion range ends ({}) before it starts ({})",
            range_end, range_start
        )));
    }

    let length = range_end.minutes() - range_start.minutes();
    if length % step != 0 {
        return Err(ScheduleError::Validation(format!(
            "granularity of {} minutes does not divide {}-{}",
            step, range_start, range_end
        )));
    }

    let covered = merge_covered(blocks);
    let mut units = Vec::with_capacity((length / step) as usize);
    let mut next_covered = 0;
    let mut cursor = range_start;

    while cursor < range_end {
        let Some(unit_end) = cursor.checked_add_minutes(step) else {
            break;
        };

        // `covered` is sorted; skip intervals that end before this unit.
        while next_covered < covered.len() && covered[next_covered].1 <= cursor {
            next_covered += 1;
        }
        let flag = covered
            .get(next_covered)
            .is_some_and(|&(start, end)| start <= cursor && unit_end <= end);

        units.push(Span::new(cursor, unit_end, flag));
        cursor = unit_end;
    }

    Ok(units)
}

/// Fold an ordered sequence of spans into maximal ranges.
///
/// A new range starts whenever the flag changes or a gap appears; a span is
/// merged into the open range only if it has the same flag and starts exactly
/// where the range ends. Gaps are never bridged.
pub fn compress(spans: &[Span]) -> Vec<Span> {
    let mut ranges: Vec<Span> = Vec::new();

    for span in spans {
        if let Some(open) = ranges.last_mut() {
            if open.flag == span.flag && open.end == span.start {
                open.end = span.end;
                continue;
            }
        }
        ranges.push(*span);
    }

    ranges
}
