//! Drag and resize support for the calendar day grid.
//!
//! Converts vertical pixel offsets into snapped local times, derives candidate
//! bounds for a moved or resized appointment, and routes every candidate
//! through the conflict detector before it may be committed. Nothing here
//! touches persisted state; a cancelled gesture just drops its candidate.
//!
//! Offsets are measured in pixels from the top of the grid, which sits at
//! [`GridConfig::grid_start_hour`] local time.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::{local_parts, resolve_local};
use crate::conflict::{find_conflicts_scoped, ConflictScope};
use crate::error::{Result, ScheduleError};
use crate::model::AppointmentInstance;

// ── Configuration ───────────────────────────────────────────────────────────

/// Geometry and clamping rules of the day grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Pixels per hour row.
    pub cell_height_px: f64,
    /// Local hour shown at offset 0; nothing may start earlier.
    pub grid_start_hour: u32,
    /// Local closing hour; nothing may end later.
    pub grid_end_hour: u32,
    pub snap_minutes: u32,
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    /// Pointer travel before a press becomes a gesture.
    pub drag_threshold_px: f64,
    /// Set from the engine-wide timezone, not from the grid section.
    #[serde(skip, default = "utc")]
    pub timezone: Tz,
}

fn utc() -> Tz {
    Tz::UTC
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_height_px: 60.0,
            grid_start_hour: 7,
            grid_end_hour: 20,
            snap_minutes: 15,
            min_duration_minutes: 15,
            max_duration_minutes: 240,
            drag_threshold_px: 5.0,
            timezone: utc(),
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.cell_height_px.is_finite() && self.cell_height_px > 0.0) {
            return Err(ScheduleError::InvalidConfig(format!(
                "cell height must be a positive number of pixels, got {}",
                self.cell_height_px
            )));
        }
        if self.grid_start_hour >= self.grid_end_hour || self.grid_end_hour > 24 {
            return Err(ScheduleError::InvalidConfig(format!(
                "grid hours {}-{} must satisfy start < end <= 24",
                self.grid_start_hour, self.grid_end_hour
            )));
        }
        if self.snap_minutes == 0 {
            return Err(ScheduleError::InvalidConfig("snap interval must be at least 1 minute".to_string()));
        }
        if self.min_duration_minutes <= 0 || self.min_duration_minutes > self.max_duration_minutes {
            return Err(ScheduleError::InvalidConfig(format!(
                "duration limits {}-{} minutes must satisfy 0 < min <= max",
                self.min_duration_minutes, self.max_duration_minutes
            )));
        }
        Ok(())
    }

    fn open_minutes(&self) -> i64 {
        self.grid_start_hour as i64 * 60
    }

    fn close_minutes(&self) -> i64 {
        self.grid_end_hour as i64 * 60
    }
}

// ── Pixel <-> time ──────────────────────────────────────────────────────────

/// Round `minutes` to the nearest multiple of `interval`.
pub fn snap_minutes(minutes: i64, interval: u32) -> i64 {
    let interval = interval.max(1) as i64;
    (minutes + interval / 2).div_euclid(interval) * interval
}

/// Snapped minutes since local midnight for a pixel offset, clamped to the grid.
pub fn offset_to_minutes(offset_px: f64, grid: &GridConfig) -> i64 {
    let raw = grid.open_minutes() as f64 + offset_px / grid.cell_height_px * 60.0;
    let raw = if raw.is_finite() { raw.round() as i64 } else { grid.open_minutes() };
    snap_minutes(raw, grid.snap_minutes).clamp(grid.open_minutes(), grid.close_minutes())
}

/// Snapped `(hour, minute)` for a pixel offset; the closing edge of a grid
/// that runs to midnight is `(24, 0)`.
pub fn offset_to_hour_minute(offset_px: f64, grid: &GridConfig) -> (u32, u32) {
    let minutes = offset_to_minutes(offset_px, grid);
    ((minutes / 60) as u32, (minutes % 60) as u32)
}

/// Pixel offset of an instant within the grid of its local day.
pub fn time_to_offset(time: DateTime<Utc>, grid: &GridConfig) -> f64 {
    let (_, local) = local_parts(time, &grid.timezone);
    let minutes = local.num_seconds_from_midnight() as f64 / 60.0 - grid.open_minutes() as f64;
    minutes / 60.0 * grid.cell_height_px
}

fn at_day_minutes(tz: &Tz, day: NaiveDate, minutes: i64) -> Result<DateTime<Utc>> {
    let naive = day.and_time(NaiveTime::MIN) + Duration::minutes(minutes);
    resolve_local(tz, naive).ok_or_else(|| {
        ScheduleError::InvalidDatetime(format!("{} +{}min cannot be placed in {}", day, minutes, tz.name()))
    })
}

// ── Bounds ──────────────────────────────────────────────────────────────────

/// Candidate start/end produced by a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Bounds {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Enforce `end_time > start_time`.
    pub fn check(&self) -> Result<()> {
        if self.end_time <= self.start_time {
            return Err(ScheduleError::InvalidTimeRange(format!(
                "bounds end {} is not after start {}",
                self.end_time.to_rfc3339(),
                self.start_time.to_rfc3339()
            )));
        }
        Ok(())
    }
}

/// Which edge of an appointment block is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeEdge {
    Start,
    End,
}

/// Move `appointment` to the snapped cell at `offset_px` on `target_day`.
///
/// The duration is preserved exactly. A block that would run past closing is
/// pulled back so it ends at closing, but never before opening.
///
/// # Errors
///
/// [`ScheduleError::InvalidTimeRange`] for an appointment that does not end
/// after it starts; [`ScheduleError::InvalidDatetime`] if the local times
/// cannot be placed.
pub fn drag_bounds(
    appointment: &AppointmentInstance,
    target_day: NaiveDate,
    offset_px: f64,
    grid: &GridConfig,
) -> Result<Bounds> {
    appointment.check_time_range()?;
    let tz = &grid.timezone;
    let duration = appointment.duration();
    let open = at_day_minutes(tz, target_day, grid.open_minutes())?;
    let close = at_day_minutes(tz, target_day, grid.close_minutes())?;

    let mut start = at_day_minutes(tz, target_day, offset_to_minutes(offset_px, grid))?;
    if start + duration > close {
        start = close - duration;
    }
    if start < open {
        start = open;
    }
    Ok(Bounds {
        start_time: start,
        end_time: start + duration,
    })
}

/// Move one edge of `appointment` to the snapped time at `offset_px` on the
/// appointment's own day.
///
/// The dragged edge is first held inside the grid, then the duration is
/// clamped to `[min_duration, max_duration]` by pulling the dragged edge back,
/// and finally held inside the grid again; the grid wins over the minimum
/// duration. The opposite edge never moves.
///
/// # Errors
///
/// Same as [`drag_bounds`], plus [`ScheduleError::InvalidTimeRange`] when the
/// fixed edge lies outside the grid so no non-empty bounds remain.
pub fn resize_bounds(
    appointment: &AppointmentInstance,
    edge: ResizeEdge,
    offset_px: f64,
    grid: &GridConfig,
) -> Result<Bounds> {
    appointment.check_time_range()?;
    let tz = &grid.timezone;
    let (day, _) = local_parts(appointment.start_time, tz);
    let pointer = at_day_minutes(tz, day, offset_to_minutes(offset_px, grid))?;
    let min = Duration::minutes(grid.min_duration_minutes);
    let max = Duration::minutes(grid.max_duration_minutes);

    match edge {
        ResizeEdge::Start => {
            let end = appointment.end_time;
            let open = at_day_minutes(tz, day, grid.open_minutes())?;
            let mut start = pointer.max(open);
            if end - start < min {
                start = end - min;
            }
            if end - start > max {
                start = end - max;
            }
            let bounds = Bounds {
                start_time: start.max(open),
                end_time: end,
            };
            bounds.check()?;
            Ok(bounds)
        }
        ResizeEdge::End => {
            let start = appointment.start_time;
            let close = at_day_minutes(tz, day, grid.close_minutes())?;
            let mut end = pointer.min(close);
            if end - start < min {
                end = start + min;
            }
            if end - start > max {
                end = start + max;
            }
            let bounds = Bounds {
                start_time: start,
                end_time: end.min(close),
            };
            bounds.check()?;
            Ok(bounds)
        }
    }
}

// ── Committing ──────────────────────────────────────────────────────────────

/// What the caller may do with a finished gesture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GestureOutcome {
    /// No conflicts: safe to persist.
    Accepted { bounds: Bounds },
    /// The new bounds collide with these appointments.
    Rejected {
        bounds: Bounds,
        conflicts: Vec<AppointmentInstance>,
    },
    /// The gesture never started or was cancelled.
    Cancelled,
}

/// Check candidate bounds for `appointment`, ignoring its own stored version.
///
/// # Errors
///
/// [`ScheduleError::InvalidTimeRange`] if `bounds` does not end after it starts.
pub fn validate_bounds(
    appointment: &AppointmentInstance,
    bounds: Bounds,
    existing: &[AppointmentInstance],
    scope: ConflictScope,
) -> Result<GestureOutcome> {
    bounds.check()?;
    let candidate = appointment.with_times(bounds.start_time, bounds.end_time);
    let conflicts = find_conflicts_scoped(&candidate, existing, appointment.id.as_deref(), scope);
    if conflicts.is_empty() {
        Ok(GestureOutcome::Accepted { bounds })
    } else {
        Ok(GestureOutcome::Rejected { bounds, conflicts })
    }
}

// ── GestureTracker ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Move,
    Resize(ResizeEdge),
}

/// Holds the candidate bounds of one in-progress drag or resize.
///
/// `update` runs once per pointer-move and does not allocate.
#[derive(Debug, Clone)]
pub struct GestureTracker {
    appointment: AppointmentInstance,
    kind: GestureKind,
    grid: GridConfig,
    origin_y: f64,
    origin_day: NaiveDate,
    /// Distance from the block's top edge to where it was grabbed.
    grab_offset_px: f64,
    started: bool,
    candidate: Option<Bounds>,
}

impl GestureTracker {
    /// Start tracking a press at `pointer_y` (pixels from the grid top).
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidTimeRange`] for an appointment that does not end
    /// after it starts.
    pub fn begin(
        appointment: &AppointmentInstance,
        kind: GestureKind,
        pointer_y: f64,
        grid: GridConfig,
    ) -> Result<Self> {
        appointment.check_time_range()?;
        let (origin_day, _) = local_parts(appointment.start_time, &grid.timezone);
        let grab_offset_px = pointer_y - time_to_offset(appointment.start_time, &grid);
        Ok(Self {
            appointment: appointment.clone(),
            kind,
            grid,
            origin_y: pointer_y,
            origin_day,
            grab_offset_px,
            started: false,
            candidate: None,
        })
    }

    /// Feed a pointer position; returns the current candidate once the drag
    /// threshold has been crossed.
    pub fn update(&mut self, pointer_y: f64, day: NaiveDate) -> Option<Bounds> {
        if !self.started {
            let moved = (pointer_y - self.origin_y).abs() >= self.grid.drag_threshold_px;
            if !moved && day == self.origin_day {
                return None;
            }
            self.started = true;
        }
        let bounds = match self.kind {
            GestureKind::Move => drag_bounds(&self.appointment, day, pointer_y - self.grab_offset_px, &self.grid),
            GestureKind::Resize(edge) => resize_bounds(&self.appointment, edge, pointer_y, &self.grid),
        };
        // Placement failures keep the last good candidate.
        if let Ok(bounds) = bounds {
            self.candidate = Some(bounds);
        }
        self.candidate
    }

    pub fn candidate(&self) -> Option<Bounds> {
        self.candidate
    }

    /// Drop the candidate; a later `finish` reports [`GestureOutcome::Cancelled`].
    pub fn cancel(&mut self) {
        self.started = false;
        self.candidate = None;
    }

    /// Release the pointer and validate the candidate against `existing`.
    ///
    /// # Errors
    ///
    /// Same as [`validate_bounds`].
    pub fn finish(self, existing: &[AppointmentInstance], scope: ConflictScope) -> Result<GestureOutcome> {
        match self.candidate {
            Some(bounds) => validate_bounds(&self.appointment, bounds, existing, scope),
            None => Ok(GestureOutcome::Cancelled),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
