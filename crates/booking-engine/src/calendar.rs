//! Calendar views: date windows and bucketing of bookings into day/hour cells.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::clock::{day_of_week, DateRange};
use crate::model::Booking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarView {
    Day,
    /// Sunday through Saturday.
    Week,
}

/// The dates a view anchored on `anchor` displays.
pub fn view_range(view: CalendarView, anchor: NaiveDate) -> DateRange {
    match view {
        CalendarView::Day => DateRange::single(anchor),
        CalendarView::Week => {
            let back = Days::new(u64::from(day_of_week(anchor)));
            let start = anchor.checked_sub_days(back).unwrap_or(anchor);
            let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
            DateRange { start, end }
        }
    }
}

/// A (date, hour) cell of a calendar grid.
pub type Cell = (NaiveDate, u32);

/// Group bookings into cells by date and start hour.
///
/// A booking lands in exactly one cell, the hour it starts in, however long it
/// runs. Bookings outside `dates` or starting outside `hours` are left out.
/// Within a cell bookings are ordered by start time.
pub fn bucket_by_hour(
    bookings: &[Booking],
    dates: DateRange,
    hours: Range<u32>,
) -> BTreeMap<Cell, Vec<Booking>> {
    let mut cells: BTreeMap<Cell, Vec<Booking>> = BTreeMap::new();

    for booking in bookings {
        let hour = booking.start_time.hour();
        if !dates.contains(booking.date) || !hours.contains(&hour) {
            continue;
        }
        cells
            .entry((booking.date, hour))
            .or_default()
            .push(booking.clone());
    }

    for cell in cells.values_mut() {
        cell.sort_by_key(|b| (b.start_time, b.end_time));
    }
    cells
}

/// Group bookings by date, each day ordered by start time.
pub fn bucket_by_day(bookings: &[Booking], dates: DateRange) -> BTreeMap<NaiveDate, Vec<Booking>> {
    let mut days: BTreeMap<NaiveDate, Vec<Booking>> = BTreeMap::new();
    for booking in bookings.iter().filter(|b| dates.contains(b.date)) {
        days.entry(booking.date).or_default().push(booking.clone());
    }
    for day in days.values_mut() {
        day.sort_by_key(|b| (b.start_time, b.end_time));
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_runs_sunday_to_saturday() {
        // Wednesday
        let range = view_range(CalendarView::Week, date(2026, 3, 18));
        assert_eq!(range.start, date(2026, 3, 15));
        assert_eq!(range.end, date(2026, 3, 21));
    }

    #[test]
    fn week_anchored_on_sunday_starts_there() {
        let range = view_range(CalendarView::Week, date(2026, 3, 15));
        assert_eq!(range.start, date(2026, 3, 15));
    }

    #[test]
    fn day_view_is_single_date() {
        let range = view_range(CalendarView::Day, date(2026, 3, 18));
        assert_eq!(range, DateRange::single(date(2026, 3, 18)));
    }
}
