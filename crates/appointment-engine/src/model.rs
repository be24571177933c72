//! Plain data shared by every engine component.
//!
//! Nothing in here knows about persistence or presentation: an
//! [`AppointmentInstance`] carries identity, time bounds and owners, and
//! everything else the caller attaches (title, type, status, price, notes...)
//! rides along in [`AppointmentInstance::payload`] untouched.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::conflict::spans_overlap;
use crate::error::{Result, ScheduleError};

// ── AppointmentInstance ─────────────────────────────────────────────────────

/// A scheduled unit of time for one therapist and one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentInstance {
    /// Opaque identifier; `None` for instances that have not been saved yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Ties the instances of one recurring series together.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub therapist_id: String,
    pub patient_id: String,
    /// Fields the engine does not interpret, passed through unchanged.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl AppointmentInstance {
    /// Build an unsaved instance.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidTimeRange`] unless `end_time > start_time`.
    pub fn new(
        therapist_id: impl Into<String>,
        patient_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self> {
        let instance = Self {
            id: None,
            series_id: None,
            start_time,
            end_time,
            therapist_id: therapist_id.into(),
            patient_id: patient_id.into(),
            payload: Map::new(),
        };
        instance.check_time_range()?;
        Ok(instance)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_series_id(mut self, series_id: impl Into<String>) -> Self {
        self.series_id = Some(series_id.into());
        self
    }

    /// Attach an opaque payload field (e.g. `"title"`).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Whether the two instances overlap in time, ignoring ownership.
    pub fn overlaps(&self, other: &AppointmentInstance) -> bool {
        spans_overlap(self.start_time, self.end_time, other.start_time, other.end_time)
    }

    /// A copy of this instance moved to new bounds; identity and payload are kept.
    pub fn with_times(&self, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
            ..self.clone()
        }
    }

    /// Enforce `end_time > start_time`.
    pub fn check_time_range(&self) -> Result<()> {
        if self.end_time <= self.start_time {
            return Err(ScheduleError::InvalidTimeRange(format!(
                "end {} is not after start {}",
                self.end_time.to_rfc3339(),
                self.start_time.to_rfc3339()
            )));
        }
        Ok(())
    }
}

// ── RecurrenceRule ──────────────────────────────────────────────────────────

/// How often a recurring series repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

fn default_interval() -> u32 {
    1
}

/// A generative description of a recurring series.
///
/// At most one of `end_date` / `occurrences` is expected; when both are set,
/// `occurrences` wins. With neither, the expander's default window applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Every N frequency units. Zero is treated as one during expansion.
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Weekday indices, 0 = Sunday .. 6 = Saturday. Weekly rules only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    /// No instance starts after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Total occurrences, seed included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<u32>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency, interval: u32) -> Self {
        Self {
            frequency,
            interval,
            days_of_week: None,
            end_date: None,
            occurrences: None,
        }
    }

    pub fn daily(interval: u32) -> Self {
        Self::new(Frequency::Daily, interval)
    }

    pub fn weekly(interval: u32) -> Self {
        Self::new(Frequency::Weekly, interval)
    }

    pub fn monthly(interval: u32) -> Self {
        Self::new(Frequency::Monthly, interval)
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.days_of_week = Some(days.into_iter().collect());
        self
    }

    pub fn until(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn count(mut self, occurrences: u32) -> Self {
        self.occurrences = Some(occurrences);
        self
    }
}

// ── Conflict output ─────────────────────────────────────────────────────────

/// Why a slot was proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionReason {
    /// A conflict-free business-hours slot later on the requested day.
    SameDay,
    /// Opening hour of the next day. Not checked against existing bookings.
    FollowingDay,
}

impl fmt::Display for SuggestionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionReason::SameDay => f.write_str("next available same day"),
            SuggestionReason::FollowingDay => f.write_str("next available following day"),
        }
    }
}

/// A proposed alternative start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSuggestion {
    pub time: DateTime<Utc>,
    pub reason: SuggestionReason,
}

/// The outcome of checking one candidate against a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub has_conflict: bool,
    /// Colliding instances in snapshot order.
    pub conflicts: Vec<AppointmentInstance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<SlotSuggestion>,
}

impl ConflictReport {
    pub fn clear() -> Self {
        Self {
            has_conflict: false,
            conflicts: Vec::new(),
            suggestion: None,
        }
    }
}
