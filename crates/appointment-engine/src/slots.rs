//! Next-available-slot search within business hours.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::warn;

use crate::calendar::{at_local_time, local_parts};
use crate::conflict::find_conflicts;
use crate::error::{Result, ScheduleError};
use crate::model::{AppointmentInstance, SlotSuggestion, SuggestionReason};

/// The daily window, in whole local hours, in which slots may be proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHours {
    /// First bookable hour (inclusive).
    pub start_hour: u32,
    /// Closing hour (exclusive); a slot must end by then.
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 7,
            end_hour: 20,
        }
    }
}

impl BusinessHours {
    pub fn validate(&self) -> Result<()> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(ScheduleError::InvalidConfig(format!(
                "business hours {}:00-{}:00 must satisfy start < end <= 24",
                self.start_hour, self.end_hour
            )));
        }
        Ok(())
    }
}

/// Options for [`suggest_next_slot`].
#[derive(Debug, Clone)]
pub struct SlotOptions {
    pub business_hours: BusinessHours,
    /// Timezone the business hours are expressed in.
    pub timezone: Tz,
}

impl Default for SlotOptions {
    fn default() -> Self {
        Self {
            business_hours: BusinessHours::default(),
            timezone: Tz::UTC,
        }
    }
}

/// Propose a start time for a `duration_minutes` appointment with `therapist_id`.
///
/// Scans hour-aligned starts on the requested local day, from the requested
/// hour (or opening, whichever is later) while the slot still ends by closing,
/// and returns the first one without a therapist conflict as
/// [`SuggestionReason::SameDay`]. Failing that, returns the opening hour of the
/// next day as [`SuggestionReason::FollowingDay`]; that slot is **not** checked
/// against `existing`.
///
/// Returns `None` for a non-positive duration, a duration longer than the
/// business day (it fits on no day), or when the local day cannot be mapped to
/// instants.
pub fn suggest_next_slot(
    requested_start: DateTime<Utc>,
    duration_minutes: i64,
    therapist_id: &str,
    existing: &[AppointmentInstance],
    options: &SlotOptions,
) -> Option<SlotSuggestion> {
    let hours = options.business_hours;
    let business_day = i64::from(hours.end_hour.saturating_sub(hours.start_hour)) * 60;
    if duration_minutes <= 0 || duration_minutes > business_day {
        return None;
    }
    let tz = &options.timezone;
    let duration = Duration::try_minutes(duration_minutes)?;
    let (date, time) = local_parts(requested_start, tz);
    let close = closing_instant(tz, date, hours.end_hour)?;

    for hour in hours.start_hour.max(time.hour())..hours.end_hour {
        let Some(start) = at_local_time(tz, date, hour, 0) else {
            continue;
        };
        let Some(end) = start.checked_add_signed(duration) else {
            break;
        };
        if end > close {
            break;
        }
        if find_conflicts(&candidate_slot(therapist_id, start, end), existing, None).is_empty() {
            return Some(SlotSuggestion {
                time: start,
                reason: SuggestionReason::SameDay,
            });
        }
    }

    let next_day = date.succ_opt()?;
    let time = at_local_time(tz, next_day, hours.start_hour, 0)?;
    warn!(
        therapist = therapist_id,
        suggested = %time,
        "no free slot on requested day; following-day suggestion is not conflict-checked"
    );
    Some(SlotSuggestion {
        time,
        reason: SuggestionReason::FollowingDay,
    })
}

fn closing_instant(tz: &Tz, date: NaiveDate, end_hour: u32) -> Option<DateTime<Utc>> {
    if end_hour >= 24 {
        return at_local_time(tz, date.succ_opt()?, 0, 0);
    }
    at_local_time(tz, date, end_hour, 0)
}

/// A hypothetical booking used only to ask the conflict detector.
fn candidate_slot(therapist_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> AppointmentInstance {
    AppointmentInstance {
        id: None,
        series_id: None,
        start_time: start,
        end_time: end,
        therapist_id: therapist_id.to_string(),
        patient_id: String::new(),
        payload: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn on(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    fn booked(therapist: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> AppointmentInstance {
        AppointmentInstance::new(therapist, "p", start, end).unwrap()
    }

    #[test]
    fn test_free_requested_hour_is_returned() {
        let s = suggest_next_slot(on(4, 9, 0), 60, "T", &[], &SlotOptions::default()).unwrap();
        assert_eq!(s.time, on(4, 9, 0));
        assert_eq!(s.reason, SuggestionReason::SameDay);
    }

    #[test]
    fn test_skips_booked_hours() {
        let existing = vec![
            booked("T", on(4, 9, 0), on(4, 10, 0)),
            booked("T", on(4, 10, 0), on(4, 11, 30)),
        ];
        let s = suggest_next_slot(on(4, 9, 0), 60, "T", &existing, &SlotOptions::default()).unwrap();
        assert_eq!(s.time, on(4, 12, 0));
        assert_eq!(s.reason, SuggestionReason::SameDay);
    }

    #[test]
    fn test_other_therapists_do_not_block() {
        let existing = vec![booked("U", on(4, 9, 0), on(4, 10, 0))];
        let s = suggest_next_slot(on(4, 9, 0), 60, "T", &existing, &SlotOptions::default()).unwrap();
        assert_eq!(s.time, on(4, 9, 0));
    }

    #[test]
    fn test_early_request_starts_at_opening() {
        let s = suggest_next_slot(on(4, 5, 0), 30, "T", &[], &SlotOptions::default()).unwrap();
        assert_eq!(s.time, on(4, 7, 0));
    }

    #[test]
    fn test_slot_must_end_by_closing() {
        let s = suggest_next_slot(on(4, 19, 0), 90, "T", &[], &SlotOptions::default()).unwrap();
        assert_eq!(s.reason, SuggestionReason::FollowingDay);
        assert_eq!(s.time, on(5, 7, 0));
    }

    #[test]
    fn test_full_day_falls_back_to_following_day_unchecked() {
        let existing = vec![
            booked("T", on(4, 7, 0), on(4, 20, 0)),
            // Following-day opening is occupied too, and still suggested.
            booked("T", on(5, 7, 0), on(5, 8, 0)),
        ];
        let s = suggest_next_slot(on(4, 8, 0), 60, "T", &existing, &SlotOptions::default()).unwrap();
        assert_eq!(s.reason, SuggestionReason::FollowingDay);
        assert_eq!(s.time, on(5, 7, 0));
    }

    #[test]
    fn test_non_positive_duration_has_no_suggestion() {
        assert!(suggest_next_slot(on(4, 9, 0), 0, "T", &[], &SlotOptions::default()).is_none());
        assert!(suggest_next_slot(on(4, 9, 0), -15, "T", &[], &SlotOptions::default()).is_none());
    }

    #[test]
    fn test_oversized_duration_has_no_suggestion() {
        let options = SlotOptions::default();
        assert!(suggest_next_slot(on(4, 9, 0), i64::MAX, "T", &[], &options).is_none());
        // 13 business hours by default; 14 hours fits on no day.
        assert!(suggest_next_slot(on(4, 9, 0), 14 * 60, "T", &[], &options).is_none());
        let whole_day = suggest_next_slot(on(4, 9, 0), 13 * 60, "T", &[], &options).unwrap();
        assert_eq!(whole_day.time, on(5, 7, 0));
        assert_eq!(whole_day.reason, SuggestionReason::FollowingDay);
    }

    #[test]
    fn test_custom_hours_and_timezone() {
        let options = SlotOptions {
            business_hours: BusinessHours {
                start_hour: 8,
                end_hour: 18,
            },
            timezone: "Europe/Berlin".parse().unwrap(),
        };
        // 06:00 UTC = 07:00 in Berlin (CET), before opening.
        let s = suggest_next_slot(on(4, 6, 0), 60, "T", &[], &options).unwrap();
        assert_eq!(s.time, on(4, 7, 0));
        assert_eq!(s.reason, SuggestionReason::SameDay);
    }

    #[test]
    fn test_business_hours_validation() {
        assert!(BusinessHours::default().validate().is_ok());
        assert!(BusinessHours { start_hour: 20, end_hour: 7 }.validate().is_err());
        assert!(BusinessHours { start_hour: 0, end_hour: 25 }.validate().is_err());
        assert!(BusinessHours { start_hour: 0, end_hour: 24 }.validate().is_ok());
    }
}
