//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::clock::MINUTES_PER_DAY;
use crate::error::{Result, ScheduleError};

/// Status a booking lands on after a successful reschedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReschedulePolicy {
    /// Back to PENDING; the agent has to confirm the new time.
    #[default]
    RequireReconfirmation,
    /// Stay PENDING or CONFIRMED, whichever the booking was.
    KeepStatus,
}

/// Hours of the day shown by the calendar, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub fn range(&self) -> std::ops::Range<u32> {
        self.start..self.end
    }
}

impl Default for HourWindow {
    fn default() -> Self {
        HourWindow { start: 8, end: 18 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of an atomic slot.
    pub granularity_minutes: u32,
    pub reschedule_policy: ReschedulePolicy,
    /// Let agents complete a CONFIRMED booking without starting it first.
    pub allow_complete_from_confirmed: bool,
    pub calendar_hours: HourWindow,
    /// IANA timezone that recurring series are expanded in.
    pub timezone: String,
    pub max_series_occurrences: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            granularity_minutes: 60,
            reschedule_policy: ReschedulePolicy::default(),
            allow_complete_from_confirmed: false,
            calendar_hours: HourWindow::default(),
            timezone: "UTC".to_string(),
            max_series_occurrences: 52,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| ScheduleError::Validation(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.granularity_minutes == 0 || MINUTES_PER_DAY % self.granularity_minutes != 0 {
            return Err(ScheduleError::Validation(format!(
                "granularity_minutes must divide a day evenly, got {}",
                self.granularity_minutes
            )));
        }
        if self.calendar_hours.start >= self.calendar_hours.end || self.calendar_hours.end > 24 {
            return Err(ScheduleError::Validation(format!(
                "calendar_hours must be a non-empty window within 0-24, got {}-{}",
                self.calendar_hours.start, self.calendar_hours.end
            )));
        }
        if self.max_series_occurrences == 0 {
            return Err(ScheduleError::Validation(
                "max_series_occurrences must be at least 1".to_string(),
            ));
        }
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ScheduleError::InvalidTimezone(self.timezone.clone()))?;
        Ok(())
    }

    pub fn granularity(&self) -> Duration {
        Duration::minutes(self.granularity_minutes as i64)
    }
}
