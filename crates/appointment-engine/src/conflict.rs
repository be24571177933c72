//! Conflict detection over a snapshot of existing appointments.
//!
//! Every overlap test in the crate goes through [`spans_overlap`]: intervals
//! are half-open, so back-to-back appointments (one ends exactly when the
//! next starts) never conflict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model::{AppointmentInstance, ConflictReport};
use crate::slots::{suggest_next_slot, SlotOptions};

// ── Overlap primitive ───────────────────────────────────────────────────────

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`.
pub fn spans_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whether two appointments overlap in time, regardless of who owns them.
pub fn overlaps(a: &AppointmentInstance, b: &AppointmentInstance) -> bool {
    spans_overlap(a.start_time, a.end_time, b.start_time, b.end_time)
}

// ── Scope and options ───────────────────────────────────────────────────────

/// Which shared resource makes two overlapping appointments a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictScope {
    /// Same therapist.
    #[default]
    Therapist,
    /// Same patient.
    Patient,
    /// Same therapist or same patient.
    Either,
}

impl ConflictScope {
    fn shares_resource(self, a: &AppointmentInstance, b: &AppointmentInstance) -> bool {
        let therapist = a.therapist_id == b.therapist_id;
        let patient = a.patient_id == b.patient_id;
        match self {
            ConflictScope::Therapist => therapist,
            ConflictScope::Patient => patient,
            ConflictScope::Either => therapist || patient,
        }
    }
}

/// Options for [`check_conflicts`] and [`check_series`].
#[derive(Debug, Clone, Default)]
pub struct ConflictOptions {
    pub scope: ConflictScope,
    /// Where to look for an alternative when the candidate conflicts.
    pub slots: SlotOptions,
}

// ── find_conflicts ──────────────────────────────────────────────────────────

/// Existing appointments of the candidate's therapist that overlap it.
///
/// `exclude_id` skips the candidate's own stored version when re-validating an
/// edit. Results keep snapshot order.
///
/// # Examples
///
/// ```
/// use appointment_engine::{find_conflicts, AppointmentInstance};
/// use chrono::{TimeZone, Utc};
///
/// let at = |h, m| Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap();
/// let existing = vec![
///     AppointmentInstance::new("t1", "p9", at(10, 0), at(11, 0)).unwrap().with_id("a-1"),
/// ];
///
/// let overlapping = AppointmentInstance::new("t1", "p1", at(10, 30), at(11, 30)).unwrap();
/// assert_eq!(find_conflicts(&overlapping, &existing, None).len(), 1);
///
/// let back_to_back = AppointmentInstance::new("t1", "p1", at(11, 0), at(12, 0)).unwrap();
/// assert!(find_conflicts(&back_to_back, &existing, None).is_empty());
/// ```
pub fn find_conflicts(
    candidate: &AppointmentInstance,
    existing: &[AppointmentInstance],
    exclude_id: Option<&str>,
) -> Vec<AppointmentInstance> {
    find_conflicts_scoped(candidate, existing, exclude_id, ConflictScope::Therapist)
}

/// [`find_conflicts`] with an explicit [`ConflictScope`].
pub fn find_conflicts_scoped(
    candidate: &AppointmentInstance,
    existing: &[AppointmentInstance],
    exclude_id: Option<&str>,
    scope: ConflictScope,
) -> Vec<AppointmentInstance> {
    existing
        .iter()
        .filter(|other| !is_excluded(other, exclude_id))
        .filter(|other| scope.shares_resource(candidate, other))
        .filter(|other| overlaps(candidate, other))
        .cloned()
        .collect()
}

fn is_excluded(appointment: &AppointmentInstance, exclude_id: Option<&str>) -> bool {
    match (exclude_id, appointment.id.as_deref()) {
        (Some(excluded), Some(id)) => excluded == id,
        _ => false,
    }
}

// ── check_conflicts ─────────────────────────────────────────────────────────

/// Check one candidate and, if it collides, propose an alternative start.
///
/// An empty conflict list is a successful "no conflict" result.
///
/// # Errors
///
/// Returns [`crate::ScheduleError::InvalidTimeRange`] if the candidate does not
/// end after it starts.
pub fn check_conflicts(
    candidate: &AppointmentInstance,
    existing: &[AppointmentInstance],
    exclude_id: Option<&str>,
    options: &ConflictOptions,
) -> Result<ConflictReport> {
    candidate.check_time_range()?;

    let conflicts = find_conflicts_scoped(candidate, existing, exclude_id, options.scope);
    if conflicts.is_empty() {
        return Ok(ConflictReport::clear());
    }

    debug!(
        therapist = %candidate.therapist_id,
        conflicts = conflicts.len(),
        "candidate appointment conflicts with existing bookings"
    );

    let suggestion = suggest_next_slot(
        candidate.start_time,
        candidate.duration().num_minutes(),
        &candidate.therapist_id,
        existing,
        &options.slots,
    );

    Ok(ConflictReport {
        has_conflict: true,
        conflicts,
        suggestion,
    })
}

// ── check_series ────────────────────────────────────────────────────────────

/// Conflicts for one instance of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesConflict {
    /// Position of the instance in the checked slice.
    pub index: usize,
    pub instance: AppointmentInstance,
    pub conflicts: Vec<AppointmentInstance>,
}

/// Validate every instance of an expanded series against the snapshot.
///
/// Only instances that collide are reported. Existing appointments belonging
/// to `exclude_series_id` are ignored so that a series can be re-validated
/// against a snapshot that still contains its previous version.
pub fn check_series(
    instances: &[AppointmentInstance],
    existing: &[AppointmentInstance],
    exclude_series_id: Option<&str>,
    scope: ConflictScope,
) -> Vec<SeriesConflict> {
    let relevant: Vec<AppointmentInstance> = match exclude_series_id {
        Some(series) => existing
            .iter()
            .filter(|e| e.series_id.as_deref() != Some(series))
            .cloned()
            .collect(),
        None => existing.to_vec(),
    };

    let report: Vec<SeriesConflict> = instances
        .iter()
        .enumerate()
        .filter_map(|(index, instance)| {
            let conflicts = find_conflicts_scoped(instance, &relevant, None, scope);
            (!conflicts.is_empty()).then(|| SeriesConflict {
                index,
                instance: instance.clone(),
                conflicts,
            })
        })
        .collect();

    debug!(
        instances = instances.len(),
        conflicting = report.len(),
        "checked recurring series"
    );
    report
}

// ── Tests ───────────────────────────────────────────────────────────────────
