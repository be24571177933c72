//! Recurrence rule validation for form feedback.
//!
//! Suspicious input yields `errors`/`warnings` in a [`RuleValidation`]; only a
//! structurally impossible rule (an end date before the first appointment)
//! is an `Err`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Result, ScheduleError};
use crate::expander::ExpansionLimits;
use crate::model::{Frequency, RecurrenceRule};

/// Outcome of [`validate_rule`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RuleValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate `rule` for a series starting at `seed_start`, using default limits.
pub fn validate_rule(seed_start: DateTime<Utc>, rule: &RecurrenceRule) -> Result<RuleValidation> {
    validate_rule_with_limits(seed_start, rule, &ExpansionLimits::default())
}

/// Validate `rule` against explicit [`ExpansionLimits`].
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidRule`] if `end_date` is earlier than
/// `seed_start`.
pub fn validate_rule_with_limits(
    seed_start: DateTime<Utc>,
    rule: &RecurrenceRule,
    limits: &ExpansionLimits,
) -> Result<RuleValidation> {
    if let Some(end_date) = rule.end_date {
        if end_date < seed_start {
            return Err(ScheduleError::InvalidRule(format!(
                "end date {} is before the first appointment at {}",
                end_date.to_rfc3339(),
                seed_start.to_rfc3339()
            )));
        }
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if rule.interval == 0 {
        errors.push("Interval must be at least 1".to_string());
    }

    if let Some(days) = &rule.days_of_week {
        if rule.frequency == Frequency::Weekly && days.is_empty() {
            errors.push("Select at least one day of the week".to_string());
        }
        for day in days.iter().filter(|&&d| d > 6) {
            errors.push(format!(
                "Day of week {} is invalid; use 0 (Sunday) to 6 (Saturday)",
                day
            ));
        }
        if rule.frequency != Frequency::Weekly && !days.is_empty() {
            warnings.push(format!(
                "Days of week are ignored for {} recurrence",
                rule.frequency
            ));
        }
    }

    if rule.occurrences == Some(0) {
        errors.push("Number of occurrences must be at least 1".to_string());
    }

    let large_interval = match rule.frequency {
        Frequency::Daily => 365,
        Frequency::Weekly => 52,
        Frequency::Monthly => 12,
    };
    if rule.interval > large_interval {
        warnings.push(format!(
            "An interval of {} ({}) is unusually large",
            rule.interval, rule.frequency
        ));
    }

    if let Some(occurrences) = rule.occurrences {
        if occurrences.saturating_sub(1) as usize > limits.max_instances {
            warnings.push(format!(
                "Only the first {} repeats will be created",
                limits.max_instances
            ));
        }
        if rule.end_date.is_some() {
            warnings.push(
                "Both an end date and an occurrence count were given; the occurrence count is used"
                    .to_string(),
            );
        }
    } else if rule.end_date.is_none() {
        warnings.push(format!(
            "No end date or occurrence count; the series stops after {} days or {} occurrences",
            limits.default_window_days, limits.default_max_occurrences
        ));
    }

    Ok(RuleValidation {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    })
}
