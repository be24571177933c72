//! Property tests for the scheduling invariants.

use appointment_engine::calendar::weekday_index;
use appointment_engine::gesture::offset_to_minutes;
use appointment_engine::{
    drag_bounds, expand, find_conflicts, overlaps, resize_bounds, AppointmentInstance, Frequency,
    GridConfig, RecurrenceRule, ResizeEdge,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

prop_compose! {
    fn arb_seed()(offset_min in 0i64..(2 * 365 * 24 * 60), duration_min in 5i64..=240) -> AppointmentInstance {
        let start = base() + Duration::minutes(offset_min);
        AppointmentInstance::new("t1", "p1", start, start + Duration::minutes(duration_min))
            .unwrap()
            .with_series_id("series")
    }
}

fn arb_frequency() -> impl Strategy<Value = Frequency> {
    prop_oneof![
        Just(Frequency::Daily),
        Just(Frequency::Weekly),
        Just(Frequency::Monthly),
    ]
}

prop_compose! {
    fn arb_counted_rule()(
        frequency in arb_frequency(),
        interval in 1u32..=4,
        days in proptest::option::of(proptest::collection::vec(0u8..=6, 1..=4)),
        occurrences in 1u32..=40,
    ) -> RecurrenceRule {
        RecurrenceRule {
            frequency,
            interval,
            days_of_week: days,
            end_date: None,
            occurrences: Some(occurrences),
        }
    }
}

fn span(start_min: i64, len_min: i64) -> AppointmentInstance {
    let start = base() + Duration::minutes(start_min);
    AppointmentInstance::new("t1", "p1", start, start + Duration::minutes(len_min)).unwrap()
}

proptest! {
    #[test]
    fn expansion_count_matches_occurrences(seed in arb_seed(), rule in arb_counted_rule()) {
        let out = expand(&seed, &rule).unwrap();
        prop_assert_eq!(out.len() as u32, rule.occurrences.unwrap() - 1);
    }

    #[test]
    fn expansion_preserves_duration(seed in arb_seed(), rule in arb_counted_rule()) {
        for instance in expand(&seed, &rule).unwrap() {
            prop_assert_eq!(instance.end_time - instance.start_time, seed.duration());
        }
    }

    #[test]
    fn expansion_strictly_increasing_after_seed(seed in arb_seed(), rule in arb_counted_rule()) {
        let out = expand(&seed, &rule).unwrap();
        let mut previous = seed.start_time;
        for instance in &out {
            prop_assert!(instance.start_time > previous);
            previous = instance.start_time;
        }
    }

    #[test]
    fn expansion_is_deterministic(seed in arb_seed(), rule in arb_counted_rule()) {
        prop_assert_eq!(expand(&seed, &rule).unwrap(), expand(&seed, &rule).unwrap());
    }

    #[test]
    fn weekly_instances_fall_on_selected_days(
        seed in arb_seed(),
        days in proptest::collection::vec(0u8..=6, 1..=7),
        interval in 1u32..=3,
    ) {
        let rule = RecurrenceRule::weekly(interval).on_days(days.clone()).count(15);
        for instance in expand(&seed, &rule).unwrap() {
            prop_assert!(days.contains(&weekday_index(instance.start_time.weekday())));
        }
    }

    #[test]
    fn end_date_bounds_every_start(seed in arb_seed(), frequency in arb_frequency(), days_ahead in 0i64..200) {
        let end_date = seed.start_time + Duration::days(days_ahead);
        let rule = RecurrenceRule::new(frequency, 1).until(end_date);
        for instance in expand(&seed, &rule).unwrap() {
            prop_assert!(instance.start_time <= end_date);
        }
    }

    #[test]
    fn overlap_is_symmetric(a_start in 0i64..1000, a_len in 1i64..300, b_start in 0i64..1000, b_len in 1i64..300) {
        let a = span(a_start, a_len);
        let b = span(b_start, b_len);
        prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
    }

    #[test]
    fn back_to_back_never_overlaps(start in 0i64..1000, a_len in 1i64..300, b_len in 1i64..300) {
        let a = span(start, a_len);
        let b = span(start + a_len, b_len);
        prop_assert!(!overlaps(&a, &b));
        prop_assert!(!overlaps(&b, &a));
    }

    #[test]
    fn other_therapist_never_conflicts(a_start in 0i64..1000, a_len in 1i64..300, b_start in 0i64..1000, b_len in 1i64..300) {
        let existing = vec![span(a_start, a_len)];
        let mut candidate = span(b_start, b_len);
        candidate.therapist_id = "t2".to_string();
        prop_assert!(find_conflicts(&candidate, &existing, None).is_empty());
    }

    #[test]
    fn pixel_offsets_snap_inside_grid(offset in -2000.0f64..2000.0, cell in 20.0f64..200.0) {
        let grid = GridConfig { cell_height_px: cell, ..GridConfig::default() };
        let minutes = offset_to_minutes(offset, &grid);
        prop_assert_eq!(minutes % 15, 0);
        prop_assert!((7 * 60..=20 * 60).contains(&minutes));
    }

    #[test]
    fn drag_preserves_duration(len in 15i64..=240, offset in -200.0f64..900.0, day in 1u32..=28) {
        let appointment = span(10 * 60, len);
        let target = NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        let bounds = drag_bounds(&appointment, target, offset, &GridConfig::default()).unwrap();
        prop_assert_eq!(bounds.duration(), appointment.duration());
        prop_assert_eq!(bounds.start_time.date_naive(), target);
    }

    #[test]
    fn resize_stays_in_grid_and_duration_limits(
        (start_min, len) in (15i64..=240).prop_flat_map(|len| (7 * 60..=(20 * 60 - len), Just(len))),
        offset in -2000.0f64..2000.0,
        end_edge in any::<bool>(),
    ) {
        let appointment = span(start_min, len);
        let edge = if end_edge { ResizeEdge::End } else { ResizeEdge::Start };
        let bounds = resize_bounds(&appointment, edge, offset, &GridConfig::default()).unwrap();

        let open = base() + Duration::hours(7);
        let close = base() + Duration::hours(20);
        prop_assert!(open <= bounds.start_time, "start {} before opening", bounds.start_time);
        prop_assert!(bounds.end_time <= close, "end {} after closing", bounds.end_time);
        let minutes = bounds.duration().num_minutes();
        prop_assert!((15..=240).contains(&minutes), "duration {} minutes", minutes);
        match edge {
            ResizeEdge::Start => prop_assert_eq!(bounds.end_time, appointment.end_time),
            ResizeEdge::End => prop_assert_eq!(bounds.start_time, appointment.start_time),
        }
    }
}
