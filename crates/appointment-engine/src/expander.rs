//! Recurrence expansion: one seed appointment + a rule -> the additional
//! instances the rule implies.
//!
//! Stepping happens on the seed's wall-clock date in the configured timezone,
//! so a 14:00 appointment stays at 14:00 across DST changes. The seed's
//! duration is measured once and reapplied to every produced instance.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calendar::{add_months_clamped, local_parts, resolve_local, weekday_index};
use crate::error::{Result, ScheduleError};
use crate::model::{AppointmentInstance, Frequency, RecurrenceRule};

// ── Limits and options ──────────────────────────────────────────────────────

/// Bounds applied when a rule does not bound itself, plus the absolute ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionLimits {
    /// Window after the seed start used when a rule has neither an end date
    /// nor an occurrence count.
    pub default_window_days: u32,
    /// Occurrence cap (seed included) used alongside the default window.
    pub default_max_occurrences: u32,
    /// Hard ceiling on generated instances for any rule. Hitting it truncates.
    pub max_instances: usize,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            default_window_days: 90,
            default_max_occurrences: 50,
            max_instances: 1000,
        }
    }
}

/// Largest accepted `default_window_days` (about a century).
pub const MAX_WINDOW_DAYS: u32 = 36_525;

/// Largest accepted `max_instances`.
pub const MAX_INSTANCES_CEILING: usize = 100_000;

impl ExpansionLimits {
    pub fn validate(&self) -> Result<()> {
        if self.default_window_days > MAX_WINDOW_DAYS {
            return Err(ScheduleError::InvalidConfig(format!(
                "expansion.default_window_days {} exceeds {}",
                self.default_window_days, MAX_WINDOW_DAYS
            )));
        }
        if self.max_instances == 0 || self.max_instances > MAX_INSTANCES_CEILING {
            return Err(ScheduleError::InvalidConfig(format!(
                "expansion.max_instances must be between 1 and {}, got {}",
                MAX_INSTANCES_CEILING, self.max_instances
            )));
        }
        Ok(())
    }
}

/// Options for [`expand_with_options`].
#[derive(Debug, Clone)]
pub struct ExpandOptions {
    pub limits: ExpansionLimits,
    /// Timezone whose wall clock defines "same time, next day/week/month".
    pub timezone: Tz,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            limits: ExpansionLimits::default(),
            timezone: Tz::UTC,
        }
    }
}

/// Generated instances plus whether the hard ceiling cut generation short.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expansion {
    pub instances: Vec<AppointmentInstance>,
    pub truncated: bool,
}

// ── expand ──────────────────────────────────────────────────────────────────

/// Expand `rule` starting from `seed` with default options (UTC, default limits).
///
/// The seed itself is not part of the result.
///
/// # Errors
///
/// See [`expand_with_options`].
///
/// # Examples
///
/// ```
/// use appointment_engine::{expand, AppointmentInstance, RecurrenceRule};
/// use chrono::{TimeZone, Utc};
///
/// let seed = AppointmentInstance::new(
///     "therapist-1",
///     "patient-1",
///     Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
/// )
/// .unwrap();
///
/// let rule = RecurrenceRule::weekly(2).count(4);
/// let instances = expand(&seed, &rule).unwrap();
/// assert_eq!(instances.len(), 3);
/// assert_eq!(instances[0].start_time.to_rfc3339(), "2024-03-18T14:00:00+00:00");
/// ```
pub fn expand(seed: &AppointmentInstance, rule: &RecurrenceRule) -> Result<Vec<AppointmentInstance>> {
    expand_with_options(seed, rule, &ExpandOptions::default()).map(|e| e.instances)
}

/// Expand `rule` starting from `seed`.
///
/// Termination: `occurrences` (seed included) takes precedence, then
/// `end_date` (an instance starting exactly at `end_date` is kept), then the
/// default window from [`ExpansionLimits`]. The hard ceiling
/// [`ExpansionLimits::max_instances`] always applies and sets
/// [`Expansion::truncated`] instead of failing.
///
/// # Errors
///
/// - [`ScheduleError::InvalidTimeRange`] if the seed does not end after it starts.
/// - [`ScheduleError::InvalidRule`] if `end_date` is before the seed start or a
///   weekday index is outside `0..=6`.
/// - [`ScheduleError::Expansion`] if an occurrence cannot be placed on the
///   calendar (dates beyond chrono's range).
pub fn expand_with_options(
    seed: &AppointmentInstance,
    rule: &RecurrenceRule,
    options: &ExpandOptions,
) -> Result<Expansion> {
    seed.check_time_range()?;
    if let Some(end_date) = rule.end_date {
        if end_date < seed.start_time {
            return Err(ScheduleError::InvalidRule(format!(
                "end date {} is before the first appointment at {}",
                end_date.to_rfc3339(),
                seed.start_time.to_rfc3339()
            )));
        }
    }

    let weekdays = normalized_weekdays(rule)?;
    let interval = rule.interval.max(1);
    let tz = &options.timezone;
    let duration = seed.duration();
    let (seed_date, seed_time) = local_parts(seed.start_time, tz);
    let stop = Termination::for_rule(rule, seed.start_time, &options.limits);

    let mut instances: Vec<AppointmentInstance> = Vec::new();
    let mut truncated = false;
    let mut current = seed_date;
    let mut step: u32 = 0;

    loop {
        if stop.max_generated.is_some_and(|max| instances.len() >= max) {
            break;
        }
        step += 1;
        let Some(next) = next_date(rule.frequency, interval, weekdays.as_deref(), seed_date, current, step)
        else {
            break;
        };
        let start = resolve_local(tz, next.and_time(seed_time)).ok_or_else(|| {
            ScheduleError::Expansion(format!("cannot place {} {} in {}", next, seed_time, tz.name()))
        })?;
        if stop.cutoff.is_some_and(|cutoff| start > cutoff) {
            break;
        }
        if instances.len() >= options.limits.max_instances {
            truncated = true;
            warn!(
                limit = options.limits.max_instances,
                frequency = %rule.frequency,
                "recurrence expansion truncated at hard ceiling"
            );
            break;
        }
        instances.push(occurrence(seed, start, duration));
        current = next;
    }

    debug!(
        generated = instances.len(),
        truncated,
        frequency = %rule.frequency,
        interval,
        "expanded recurrence rule"
    );

    Ok(Expansion {
        instances,
        truncated,
    })
}

// ── Internal helpers ────────────────────────────────────────────────────────

/// When generation stops, absent the hard ceiling.
struct Termination {
    /// Maximum number of generated instances (seed excluded).
    max_generated: Option<usize>,
    /// No generated instance starts after this.
    cutoff: Option<DateTime<Utc>>,
}

impl Termination {
    fn for_rule(rule: &RecurrenceRule, seed_start: DateTime<Utc>, limits: &ExpansionLimits) -> Self {
        if let Some(occurrences) = rule.occurrences {
            return Self {
                max_generated: Some(occurrences.saturating_sub(1) as usize),
                cutoff: None,
            };
        }
        if let Some(end_date) = rule.end_date {
            return Self {
                max_generated: None,
                cutoff: Some(end_date),
            };
        }
        Self {
            max_generated: Some(limits.default_max_occurrences.saturating_sub(1) as usize),
            cutoff: Duration::try_days(i64::from(limits.default_window_days))
                .and_then(|window| seed_start.checked_add_signed(window)),
        }
    }
}

/// Sorted, de-duplicated weekdays for weekly rules; `None` when the rule has
/// no usable weekday set.
fn normalized_weekdays(rule: &RecurrenceRule) -> Result<Option<Vec<u8>>> {
    let Some(days) = rule.days_of_week.as_ref() else {
        return Ok(None);
    };
    if let Some(bad) = days.iter().find(|&&d| d > 6) {
        return Err(ScheduleError::InvalidRule(format!(
            "weekday index {} is outside 0 (Sunday) ..= 6 (Saturday)",
            bad
        )));
    }
    if rule.frequency != Frequency::Weekly || days.is_empty() {
        return Ok(None);
    }
    let mut days = days.clone();
    days.sort_unstable();
    days.dedup();
    Ok(Some(days))
}

/// The local date of occurrence number `step` (seed = 0).
///
/// Monthly occurrences are computed from the seed date so day-of-month
/// clamping never accumulates (Jan 31 -> Feb 29 -> Mar 31).
fn next_date(
    frequency: Frequency,
    interval: u32,
    weekdays: Option<&[u8]>,
    seed_date: NaiveDate,
    current: NaiveDate,
    step: u32,
) -> Option<NaiveDate> {
    match frequency {
        Frequency::Daily => current.checked_add_days(Days::new(interval as u64)),
        Frequency::Weekly => match weekdays {
            None => current.checked_add_days(Days::new(7 * interval as u64)),
            Some(days) => next_weekday_date(current, days, interval),
        },
        Frequency::Monthly => add_months_clamped(seed_date, step.checked_mul(interval)?),
    }
}

/// Next matching weekday later in the same Sunday-based week, or else the
/// first matching weekday of the week `interval` weeks on.
fn next_weekday_date(current: NaiveDate, days: &[u8], interval: u32) -> Option<NaiveDate> {
    let today = weekday_index(current.weekday());
    if let Some(&later) = days.iter().find(|&&d| d > today) {
        return current.checked_add_days(Days::new((later - today) as u64));
    }
    let first = *days.first()?;
    let to_next_week = (7 - today + first) as u64;
    let skipped_weeks = 7 * (interval as u64 - 1);
    current.checked_add_days(Days::new(to_next_week + skipped_weeks))
}

fn occurrence(seed: &AppointmentInstance, start: DateTime<Utc>, duration: Duration) -> AppointmentInstance {
    let mut instance = seed.with_times(start, start + duration);
    instance.id = None;
    instance
}

// ── Tests ───────────────────────────────────────────────────────────────────
