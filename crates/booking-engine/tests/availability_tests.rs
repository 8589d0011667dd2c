//! Tests for weekly availability patterns and exceptions.

use std::sync::Arc;

use booking_engine::{
    AgentId, AvailabilityService, ClockTime, DateRange, ExceptionId, InMemoryStore,
    ScheduleError, UnavailabilityException, WeeklyAvailabilityBlock,
};
use chrono::NaiveDate;

// ── Helpers ──────────────────────────────────────────────────────────────

fn t(s: &str) -> ClockTime {
    s.parse().unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn agent() -> AgentId {
    AgentId::new("agent-x")
}

fn block(day: u8, start: &str, end: &str) -> WeeklyAvailabilityBlock {
    WeeklyAvailabilityBlock::new(agent(), day, t(start), t(end), true)
}

fn service() -> AvailabilityService {
    AvailabilityService::new(Arc::new(InMemoryStore::new()))
}

fn shape(blocks: &[WeeklyAvailabilityBlock]) -> Vec<(u8, String, String)> {
    blocks
        .iter()
        .map(|b| (b.day_of_week, b.start_time.to_string(), b.end_time.to_string()))
        .collect()
}

// ── Weekly pattern ───────────────────────────────────────────────────────

#[test]
fn hourly_blocks_are_compressed_into_ranges() {
    let availability = service();
    let hourly = ["09:00", "10:00", "11:00", "14:00", "15:00"]
        .iter()
        .map(|s| {
            let start = t(s);
            block(1, s, &start.checked_add_minutes(60).unwrap().to_string())
        })
        .collect();

    let stored = availability
        .set_weekly_availability(&agent(), hourly)
        .unwrap();

    assert_eq!(
        shape(&stored),
        vec![
            (1, "09:00".into(), "12:00".into()),
            (1, "14:00".into(), "16:00".into()),
        ]
    );
    assert_eq!(availability.get_weekly_availability(&agent()).unwrap(), stored);
}

#[test]
fn input_order_does_not_matter() {
    let availability = service();
    let stored = availability
        .set_weekly_availability(
            &agent(),
            vec![block(3, "13:00", "17:00"), block(1, "09:00", "12:00"), block(3, "08:00", "13:00")],
        )
        .unwrap();

    assert_eq!(
        shape(&stored),
        vec![
            (1, "09:00".into(), "12:00".into()),
            (3, "08:00".into(), "17:00".into()),
        ]
    );
}

#[test]
fn set_weekly_replaces_everything() {
    let availability = service();
    availability
        .set_weekly_availability(&agent(), vec![block(1, "09:00", "17:00"), block(2, "09:00", "17:00")])
        .unwrap();
    availability
        .set_weekly_availability(&agent(), vec![block(5, "10:00", "12:00")])
        .unwrap();

    assert_eq!(
        shape(&availability.get_weekly_availability(&agent()).unwrap()),
        vec![(5, "10:00".into(), "12:00".into())]
    );
}

#[test]
fn empty_pattern_clears_availability() {
    let availability = service();
    availability
        .set_weekly_availability(&agent(), vec![block(1, "09:00", "17:00")])
        .unwrap();
    availability.set_weekly_availability(&agent(), vec![]).unwrap();
    assert!(availability.get_weekly_availability(&agent()).unwrap().is_empty());
}

#[test]
fn set_day_leaves_other_days_alone() {
    let availability = service();
    availability
        .set_weekly_availability(&agent(), vec![block(1, "09:00", "17:00"), block(2, "09:00", "17:00")])
        .unwrap();
    availability
        .set_day_availability(&agent(), 2, vec![block(2, "12:00", "13:00"), block(2, "13:00", "14:00")])
        .unwrap();

    assert_eq!(
        shape(&availability.get_weekly_availability(&agent()).unwrap()),
        vec![
            (1, "09:00".into(), "17:00".into()),
            (2, "12:00".into(), "14:00".into()),
        ]
    );
}

#[test]
fn set_day_rejects_block_for_another_day() {
    let err = service()
        .set_day_availability(&agent(), 2, vec![block(3, "09:00", "10:00")])
        .unwrap_err();
    assert!(matches!(err, ScheduleError::Validation(_)));
}

#[test]
fn overlapping_blocks_are_rejected_and_nothing_is_stored() {
    let availability = service();
    availability
        .set_weekly_availability(&agent(), vec![block(1, "09:00", "17:00")])
        .unwrap();

    let err = availability
        .set_weekly_availability(&agent(), vec![block(2, "09:00", "12:00"), block(2, "11:00", "13:00")])
        .unwrap_err();

    assert!(matches!(err, ScheduleError::Validation(_)));
    assert_eq!(
        shape(&availability.get_weekly_availability(&agent()).unwrap()),
        vec![(1, "09:00".into(), "17:00".into())]
    );
}

#[test]
fn malformed_blocks_are_rejected() {
    let availability = service();
    for bad in [
        block(7, "09:00", "10:00"),
        block(1, "10:00", "10:00"),
        block(1, "11:00", "10:00"),
        WeeklyAvailabilityBlock::new(AgentId::new("someone-else"), 1, t("09:00"), t("10:00"), true),
    ] {
        let err = availability
            .set_weekly_availability(&agent(), vec![bad.clone()])
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)), "accepted {bad:?}");
    }
}

#[test]
fn unavailable_blocks_stay_distinct_from_available_ones() {
    let availability = service();
    let stored = availability
        .set_weekly_availability(
            &agent(),
            vec![
                block(1, "09:00", "12:00"),
                WeeklyAvailabilityBlock::new(agent(), 1, t("12:00"), t("13:00"), false),
                block(1, "13:00", "17:00"),
            ],
        )
        .unwrap();
    assert_eq!(stored.len(), 3);
    assert!(!stored[1].is_available);
}

// ── Exceptions ───────────────────────────────────────────────────────────

#[test]
fn exceptions_are_listed_by_range() {
    let availability = service();
    availability
        .add_exception(&agent(), UnavailabilityException::all_day(agent(), date(2026, 3, 20), None))
        .unwrap();
    availability
        .add_exception(
            &agent(),
            UnavailabilityException::partial(agent(), date(2026, 3, 16), t("09:00"), t("11:00"), Some("dentist".into())),
        )
        .unwrap();
    availability
        .add_exception(&agent(), UnavailabilityException::all_day(agent(), date(2026, 4, 1), None))
        .unwrap();

    let march = DateRange::new(date(2026, 3, 1), date(2026, 3, 31)).unwrap();
    let found = availability.get_exceptions(&agent(), march).unwrap();

    let dates: Vec<NaiveDate> = found.iter().map(|e| e.date).collect();
    assert_eq!(dates, vec![date(2026, 3, 16), date(2026, 3, 20)]);
    assert_eq!(found[0].reason.as_deref(), Some("dentist"));
}

#[test]
fn overlapping_exceptions_are_kept_separately() {
    let availability = service();
    let day = date(2026, 3, 16);
    availability
        .add_exception(&agent(), UnavailabilityException::partial(agent(), day, t("09:00"), t("12:00"), None))
        .unwrap();
    availability
        .add_exception(&agent(), UnavailabilityException::partial(agent(), day, t("11:00"), t("13:00"), None))
        .unwrap();

    assert_eq!(
        availability
            .get_exceptions(&agent(), DateRange::single(day))
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn malformed_exceptions_are_rejected() {
    let availability = service();
    let day = date(2026, 3, 16);

    let mut all_day_with_times = UnavailabilityException::all_day(agent(), day, None);
    all_day_with_times.start_time = Some(t("09:00"));

    let mut partial_without_end =
        UnavailabilityException::partial(agent(), day, t("09:00"), t("10:00"), None);
    partial_without_end.end_time = None;

    for bad in [
        all_day_with_times,
        partial_without_end,
        UnavailabilityException::partial(agent(), day, t("10:00"), t("09:00"), None),
        UnavailabilityException::all_day(AgentId::new("someone-else"), day, None),
    ] {
        assert!(matches!(
            availability.add_exception(&agent(), bad),
            Err(ScheduleError::Validation(_))
        ));
    }
}

#[test]
fn remove_exception_by_date_and_id() {
    let availability = service();
    let day = date(2026, 3, 16);
    let exception = availability
        .add_exception(&agent(), UnavailabilityException::all_day(agent(), day, None))
        .unwrap();

    // Wrong date: not found, still stored.
    let err = availability
        .remove_exception(&agent(), date(2026, 3, 17), exception.id)
        .unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound(_)));

    availability
        .remove_exception(&agent(), day, exception.id)
        .unwrap();
    assert!(availability
        .get_exceptions(&agent(), DateRange::single(day))
        .unwrap()
        .is_empty());
}

#[test]
fn remove_unknown_exception_is_not_found() {
    let err = service()
        .remove_exception_by_id(&agent(), ExceptionId::new())
        .unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound(_)));
}

#[test]
fn remove_exception_by_id_ignores_date() {
    let availability = service();
    let exception = availability
        .add_exception(&agent(), UnavailabilityException::all_day(agent(), date(2026, 5, 1), None))
        .unwrap();
    availability
        .remove_exception_by_id(&agent(), exception.id)
        .unwrap();
    assert!(matches!(
        availability.remove_exception_by_id(&agent(), exception.id),
        Err(ScheduleError::NotFound(_))
    ));
}
