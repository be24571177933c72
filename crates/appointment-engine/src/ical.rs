//! iCalendar (RFC 5545) `RRULE` interop for [`RecurrenceRule`].
//!
//! Only the subset the expander can honour is accepted: `FREQ` of DAILY,
//! WEEKLY or MONTHLY, plus `INTERVAL`, `COUNT`, `UNTIL` and plain `BYDAY`
//! weekdays. Anything else is rejected rather than silently dropped.

use chrono::{Utc, Weekday};
use rrule::{NWeekday, RRule, Unvalidated};

use crate::calendar::weekday_index;
use crate::error::{Result, ScheduleError};
use crate::model::{Frequency, RecurrenceRule};

const SUPPORTED_PARTS: &[&str] = &["FREQ", "INTERVAL", "COUNT", "UNTIL", "BYDAY", "WKST"];

/// Parse an `RRULE` value (with or without the `RRULE:` prefix).
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidRule`] for malformed rules and for parts
/// outside the supported subset (yearly/sub-daily frequencies, ordinal `BYDAY`
/// such as `2MO`, `BYMONTHDAY`, ...).
///
/// # Examples
///
/// ```
/// use appointment_engine::ical::parse_rrule;
/// use appointment_engine::Frequency;
///
/// let rule = parse_rrule("RRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE;COUNT=6").unwrap();
/// assert_eq!(rule.frequency, Frequency::Weekly);
/// assert_eq!(rule.interval, 2);
/// assert_eq!(rule.days_of_week, Some(vec![1, 3]));
/// assert_eq!(rule.occurrences, Some(6));
/// ```
pub fn parse_rrule(s: &str) -> Result<RecurrenceRule> {
    let body = s.trim();
    let body = body.strip_prefix("RRULE:").unwrap_or(body);

    for part in body.split(';').filter(|p| !p.is_empty()) {
        let key = part.split('=').next().unwrap_or_default().trim().to_ascii_uppercase();
        if !SUPPORTED_PARTS.contains(&key.as_str()) {
            return Err(ScheduleError::InvalidRule(format!("unsupported RRULE part '{}'", key)));
        }
    }

    let parsed: RRule<Unvalidated> = body
        .parse()
        .map_err(|e| ScheduleError::InvalidRule(format!("'{}': {}", s.trim(), e)))?;

    let frequency = match parsed.get_freq() {
        rrule::Frequency::Daily => Frequency::Daily,
        rrule::Frequency::Weekly => Frequency::Weekly,
        rrule::Frequency::Monthly => Frequency::Monthly,
        other => {
            return Err(ScheduleError::InvalidRule(format!("unsupported frequency {:?}", other)));
        }
    };

    let mut days = Vec::new();
    for weekday in parsed.get_by_weekday() {
        match weekday {
            NWeekday::Every(day) => days.push(weekday_index(*day)),
            NWeekday::Nth(n, day) => {
                return Err(ScheduleError::InvalidRule(format!(
                    "ordinal weekday {}{:?} is not supported",
                    n, day
                )));
            }
        }
    }

    Ok(RecurrenceRule {
        frequency,
        interval: u32::from(parsed.get_interval()),
        days_of_week: (!days.is_empty()).then_some(days),
        end_date: parsed.get_until().map(|until| until.with_timezone(&Utc)),
        occurrences: parsed.get_count(),
    })
}

/// Render `rule` as an `RRULE` value (without the `RRULE:` prefix).
pub fn format_rrule(rule: &RecurrenceRule) -> String {
    let freq = match rule.frequency {
        Frequency::Daily => "DAILY",
        Frequency::Weekly => "WEEKLY",
        Frequency::Monthly => "MONTHLY",
    };
    let mut parts = vec![format!("FREQ={freq}")];
    if rule.interval > 1 {
        parts.push(format!("INTERVAL={}", rule.interval));
    }
    if let Some(days) = rule.days_of_week.as_ref().filter(|d| !d.is_empty()) {
        let mut days = days.clone();
        days.sort_unstable();
        days.dedup();
        let codes: Vec<&str> = days.iter().filter_map(|&d| weekday_code(d)).collect();
        if !codes.is_empty() {
            parts.push(format!("BYDAY={}", codes.join(",")));
        }
    }
    if let Some(count) = rule.occurrences {
        parts.push(format!("COUNT={count}"));
    }
    if let Some(until) = rule.end_date {
        parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
    }
    parts.join(";")
}

fn weekday_code(index: u8) -> Option<&'static str> {
    let day = match index {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        6 => Weekday::Sat,
        _ => return None,
    };
    Some(match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    })
}
