//! Pure date arithmetic shared by the expander, slot search and gestures.
//!
//! All calendar stepping happens on wall-clock dates in an IANA timezone and
//! is mapped back to UTC with [`resolve_local`]. Nothing here reads the system
//! clock.

use chrono::{
    DateTime, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;

use crate::error::{Result, ScheduleError};

// ── Parsing ─────────────────────────────────────────────────────────────────

/// Parse an IANA timezone string into `Tz`.
pub fn parse_timezone(s: &str) -> Result<Tz> {
    s.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(format!("'{}'", s)))
}

/// Parse an RFC 3339 datetime string into `DateTime<Utc>`.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ScheduleError::InvalidDatetime(format!("'{}': {}", s, e)))
}

/// Parse a recurrence end boundary.
///
/// Accepts an RFC 3339 instant, or a bare `YYYY-MM-DD` date which is read as
/// the last second of that day in `tz` so that instances on the end date are
/// still produced.
pub fn parse_end_date(s: &str, tz: &Tz) -> Result<DateTime<Utc>> {
    if let Ok(dt) = parse_rfc3339(s) {
        return Ok(dt);
    }
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| ScheduleError::InvalidDatetime(format!("'{}': {}", s, e)))?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)
        .ok_or_else(|| ScheduleError::InvalidDatetime("end of day".to_string()))?;
    resolve_local(tz, date.and_time(end_of_day)).ok_or_else(|| {
        ScheduleError::InvalidDatetime(format!("'{}' does not exist in {}", s, tz.name()))
    })
}

// ── Weekdays and months ─────────────────────────────────────────────────────

/// Weekday index with Sunday = 0 .. Saturday = 6.
pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

/// Add `months` to `date`, clamping the day to the last day of the target
/// month (Jan 31 + 1 month = Feb 28 or 29).
pub fn add_months_clamped(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = add_months_clamped(first, 1)?;
    Some((next - first).num_days() as u32)
}

// ── Local <-> UTC ───────────────────────────────────────────────────────────

/// Wall-clock date and time of `dt` in `tz`.
pub fn local_parts(dt: DateTime<Utc>, tz: &Tz) -> (NaiveDate, NaiveTime) {
    let local = dt.with_timezone(tz);
    (local.date_naive(), local.time())
}

/// Map a wall-clock datetime in `tz` to an instant.
///
/// Ambiguous times (autumn fall-back) resolve to the earlier instant. Times in
/// a spring-forward gap are read with the offset in force before the gap, which
/// moves them forward by the gap length (02:30 becomes 03:30 across a one-hour
/// gap).
pub fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let before = tz
                .from_local_datetime(&(naive - Duration::hours(3)))
                .earliest()?;
            let offset_secs = before.offset().fix().local_minus_utc() as i64;
            let utc_naive = naive - Duration::seconds(offset_secs);
            Some(Utc.from_utc_datetime(&utc_naive))
        }
    }
}

/// Instant for `date` at `hour:minute` local time.
pub fn at_local_time(tz: &Tz, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    resolve_local(tz, date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_timezone_valid_and_invalid() {
        assert_eq!(parse_timezone("Europe/Lisbon").unwrap(), chrono_tz::Europe::Lisbon);
        let err = parse_timezone("Mars/Olympus").unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidTimezone(_)));
    }

    #[test]
    fn test_parse_end_date_bare_date_is_end_of_day() {
        let dt = parse_end_date("2024-03-31", &Tz::UTC).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-31T23:59:59+00:00");
    }

    #[test]
    fn test_parse_end_date_rfc3339_passthrough() {
        let dt = parse_end_date("2024-03-31T10:00:00+02:00", &Tz::UTC).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-31T08:00:00+00:00");
    }

    #[test]
    fn test_parse_end_date_garbage() {
        assert!(parse_end_date("next tuesday", &Tz::UTC).is_err());
    }

    #[test]
    fn test_weekday_index_sunday_based() {
        assert_eq!(weekday_index(Weekday::Sun), 0);
        assert_eq!(weekday_index(Weekday::Mon), 1);
        assert_eq!(weekday_index(Weekday::Sat), 6);
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(add_months_clamped(ymd(2023, 1, 31), 1), Some(ymd(2023, 2, 28)));
        assert_eq!(add_months_clamped(ymd(2024, 1, 31), 1), Some(ymd(2024, 2, 29)));
        assert_eq!(add_months_clamped(ymd(2024, 1, 31), 3), Some(ymd(2024, 4, 30)));
        assert_eq!(add_months_clamped(ymd(2024, 11, 15), 2), Some(ymd(2025, 1, 15)));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2023, 2), Some(28));
        assert_eq!(days_in_month(2024, 12), Some(31));
        assert_eq!(days_in_month(2024, 13), None);
    }

    #[test]
    fn test_resolve_local_spring_forward_gap_shifts_forward() {
        // 2024-03-10 02:30 does not exist in New York.
        let tz: Tz = "America/New_York".parse().unwrap();
        let naive = ymd(2024, 3, 10).and_hms_opt(2, 30, 0).unwrap();
        let dt = resolve_local(&tz, naive).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-10T07:30:00+00:00");
        assert_eq!(dt.with_timezone(&tz).time(), NaiveTime::from_hms_opt(3, 30, 0).unwrap());
    }

    #[test]
    fn test_resolve_local_fall_back_takes_earlier() {
        // 2024-11-03 01:30 happens twice in New York; EDT (-04:00) comes first.
        let tz: Tz = "America/New_York".parse().unwrap();
        let naive = ymd(2024, 11, 3).and_hms_opt(1, 30, 0).unwrap();
        let dt = resolve_local(&tz, naive).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-11-03T05:30:00+00:00");
    }

    #[test]
    fn test_at_local_time() {
        let tz: Tz = "Europe/London".parse().unwrap();
        let dt = at_local_time(&tz, ymd(2024, 7, 1), 9, 0).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-07-01T08:00:00+00:00");
        assert!(at_local_time(&tz, ymd(2024, 7, 1), 24, 0).is_none());
    }
}
