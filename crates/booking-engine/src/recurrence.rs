//! Recurring booking series: date expansion via RFC 5545 rules.
//!
//! A series repeats one booking's time of day on a weekly, biweekly or monthly
//! cadence. Weekly dates come from the `rrule` crate. Monthly dates clamp to
//! the last day of shorter months (Jan 31 is followed by Feb 28, then Mar 31),
//! which RFC 5545 `FREQ=MONTHLY` cannot express: it skips those months.

use chrono::{Datelike, Months, NaiveDate};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScheduleError};
use crate::model::Booking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Weekly,
    Biweekly,
    Monthly,
}

impl Recurrence {
    /// The RRULE body (without COUNT) for weekly cadences. `None` for
    /// monthly, which is computed by calendar month arithmetic instead.
    pub fn rule(self) -> Option<&'static str> {
        match self {
            Recurrence::Weekly => Some("FREQ=WEEKLY"),
            Recurrence::Biweekly => Some("FREQ=WEEKLY;INTERVAL=2"),
            Recurrence::Monthly => None,
        }
    }
}

/// Dates of the first `occurrences` instances of a series starting on `start`.
///
/// `timezone` is an IANA name; the anchor is placed at local noon so a DST
/// transition at midnight cannot move it to another date. Monthly
/// occurrences keep the anchor's day of month, clamped to the month's length.
///
/// # Errors
/// `Validation` for zero occurrences or more than `u16::MAX`,
/// `InvalidTimezone` for an unknown zone, `InvalidRule` if the rule engine
/// rejects the generated rule.
pub fn series_dates(
    recurrence: Recurrence,
    start: NaiveDate,
    occurrences: u32,
    timezone: &str,
) -> Result<Vec<NaiveDate>> {
    if occurrences == 0 {
        return Err(ScheduleError::Validation(
            "a series needs at least one occurrence".to_string(),
        ));
    }
    let limit = u16::try_from(occurrences).map_err(|_| {
        ScheduleError::Validation(format!("too many occurrences: {}", occurrences))
    })?;

    let _tz: chrono_tz::Tz = timezone
        .parse()
        .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_string()))?;

    let Some(rule) = recurrence.rule() else {
        return monthly_dates(start, occurrences);
    };

    let rule_text = format!(
        "DTSTART;TZID={}:{:04}{:02}{:02}T120000\nRRULE:{};COUNT={}",
        timezone,
        start.year(),
        start.month(),
        start.day(),
        rule,
        occurrences
    );

    let rule_set: RRuleSet = rule_text
        .parse()
        .map_err(|e| ScheduleError::InvalidRule(format!("{}", e)))?;

    let dates = rule_set
        .all(limit)
        .dates
        .into_iter()
        .map(|dt| dt.date_naive())
        .collect();

    Ok(dates)
}

/// `start` plus 0, 1, 2, ... calendar months, each offset from the anchor so
/// a clamped February does not drag later months back to the 28th.
fn monthly_dates(start: NaiveDate, occurrences: u32) -> Result<Vec<NaiveDate>> {
    (0..occurrences)
        .map(|offset| {
            start.checked_add_months(Months::new(offset)).ok_or_else(|| {
                ScheduleError::Validation(format!(
                    "series runs past the supported calendar: {} + {} months",
                    start, offset
                ))
            })
        })
        .collect()
}

/// One occurrence of a series that could not be booked.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFailure {
    pub date: NaiveDate,
    pub sequence: u32,
    pub error: ScheduleError,
}

/// Result of creating a recurring series.
///
/// Occurrences are committed independently; a conflict on one date does not
/// undo the others.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesOutcome {
    pub series_id: Uuid,
    pub created: Vec<Booking>,
    pub failed: Vec<SeriesFailure>,
}

impl SeriesOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
