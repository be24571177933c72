//! # appointment-engine
//!
//! Deterministic scheduling computation for a clinic calendar.
//!
//! Expands recurring appointments into concrete instances, detects overlaps
//! for a therapist or patient, proposes the next free slot, and turns drag or
//! resize gestures into snapped, clamped candidate bounds. Every function is
//! pure and synchronous over a snapshot supplied by the caller: no clock
//! reads, no I/O, no shared state.
//!
//! ## Modules
//!
//! - [`model`]: appointments, recurrence rules, conflict reports
//! - [`calendar`]: wall-clock date arithmetic in an IANA timezone
//! - [`expander`]: recurrence rule -> additional appointment instances
//! - [`validation`]: form-level rule validation with errors and warnings
//! - [`conflict`]: the overlap primitive and conflict search
//! - [`slots`]: next available slot within business hours
//! - [`gesture`]: drag/resize bounds and the gesture tracker
//! - [`ical`]: RFC 5545 `RRULE` import and export
//! - [`config`]: engine-wide configuration
//! - [`error`]: error types

pub mod calendar;
pub mod config;
pub mod conflict;
pub mod error;
pub mod expander;
pub mod gesture;
pub mod ical;
pub mod model;
pub mod slots;
pub mod validation;

pub use config::EngineConfig;
pub use conflict::{
    check_conflicts, check_series, find_conflicts, find_conflicts_scoped, overlaps,
    spans_overlap, ConflictOptions, ConflictScope, SeriesConflict,
};
pub use error::ScheduleError;
pub use expander::{expand, expand_with_options, ExpandOptions, Expansion, ExpansionLimits};
pub use gesture::{
    drag_bounds, resize_bounds, validate_bounds, Bounds, GestureKind, GestureOutcome,
    GestureTracker, GridConfig, ResizeEdge,
};
pub use model::{
    AppointmentInstance, ConflictReport, Frequency, RecurrenceRule, SlotSuggestion,
    SuggestionReason,
};
pub use slots::{suggest_next_slot, BusinessHours, SlotOptions};
pub use validation::{validate_rule, validate_rule_with_limits, RuleValidation};
