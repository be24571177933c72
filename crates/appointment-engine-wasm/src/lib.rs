//! WASM bindings for appointment-engine.
//!
//! Every binding takes and returns JSON strings so the calendar UI can pass
//! its own appointment objects through unchanged. The optional `config_json`
//! argument is an `EngineConfig` document; `undefined` or an empty string
//! selects the defaults. Errors surface as a thrown string.

use appointment_engine::calendar::parse_rfc3339;
use appointment_engine::ical::{format_rrule, parse_rrule};
use appointment_engine::{
    check_conflicts, check_series, drag_bounds, expand_with_options, resize_bounds,
    suggest_next_slot, validate_bounds, validate_rule_with_limits, AppointmentInstance, Bounds,
    EngineConfig, RecurrenceRule, ResizeEdge,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use wasm_bindgen::prelude::*;

type BindingResult = std::result::Result<String, String>;

fn to_js(result: BindingResult) -> Result<String, JsValue> {
    result.map_err(|e| JsValue::from_str(&e))
}

fn parse<T: DeserializeOwned>(what: &str, json: &str) -> std::result::Result<T, String> {
    serde_json::from_str(json).map_err(|e| format!("invalid {what}: {e}"))
}

fn render<T: Serialize>(value: &T) -> BindingResult {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn config(config_json: Option<&str>) -> std::result::Result<EngineConfig, String> {
    match config_json.map(str::trim).filter(|s| !s.is_empty()) {
        Some(json) => EngineConfig::from_json_str(json).map_err(|e| e.to_string()),
        None => Ok(EngineConfig::default()),
    }
}

// ── Recurrence ──────────────────────────────────────────────────────────────

/// Expand a seed appointment: `{"instances": [...], "truncated": bool}`.
///
/// With `existing_json`, a `conflicts` array lists the generated instances
/// that collide with it. Existing entries of the seed's own series are
/// skipped, so an edited series can be checked against its stored version.
#[wasm_bindgen(js_name = expandSeries)]
pub fn expand_series(
    seed_json: &str,
    rule_json: &str,
    existing_json: Option<String>,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    to_js(expand_series_impl(
        seed_json,
        rule_json,
        existing_json.as_deref(),
        config_json.as_deref(),
    ))
}

fn expand_series_impl(
    seed_json: &str,
    rule_json: &str,
    existing_json: Option<&str>,
    config_json: Option<&str>,
) -> BindingResult {
    let config = config(config_json)?;
    let seed: AppointmentInstance = parse("seed appointment", seed_json)?;
    let rule: RecurrenceRule = parse("recurrence rule", rule_json)?;
    let expansion =
        expand_with_options(&seed, &rule, &config.expand_options()).map_err(|e| e.to_string())?;

    let mut output = json!({
        "instances": expansion.instances,
        "truncated": expansion.truncated,
    });
    if let Some(existing_json) = existing_json {
        let existing: Vec<AppointmentInstance> = parse("existing appointments", existing_json)?;
        let conflicts = check_series(
            &expansion.instances,
            &existing,
            seed.series_id.as_deref(),
            config.conflict_scope,
        );
        output["conflicts"] = serde_json::to_value(conflicts).map_err(|e| e.to_string())?;
    }
    render(&output)
}

/// Form validation for a rule: `{"is_valid", "errors", "warnings"}`.
#[wasm_bindgen(js_name = validateRule)]
pub fn validate_rule_json(
    seed_start: &str,
    rule_json: &str,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    to_js(validate_rule_impl(seed_start, rule_json, config_json.as_deref()))
}

fn validate_rule_impl(seed_start: &str, rule_json: &str, config_json: Option<&str>) -> BindingResult {
    let config = config(config_json)?;
    let start = parse_rfc3339(seed_start).map_err(|e| e.to_string())?;
    let rule: RecurrenceRule = parse("recurrence rule", rule_json)?;
    let validation =
        validate_rule_with_limits(start, &rule, &config.expansion).map_err(|e| e.to_string())?;
    render(&validation)
}

/// RRULE string to rule JSON.
#[wasm_bindgen(js_name = parseRrule)]
pub fn parse_rrule_json(rrule: &str) -> Result<String, JsValue> {
    to_js(parse_rrule(rrule).map_err(|e| e.to_string()).and_then(|rule| render(&rule)))
}

/// Rule JSON to RRULE string.
#[wasm_bindgen(js_name = formatRrule)]
pub fn format_rrule_json(rule_json: &str) -> Result<String, JsValue> {
    to_js(parse::<RecurrenceRule>("recurrence rule", rule_json).map(|rule| format_rrule(&rule)))
}

// ── Conflicts ───────────────────────────────────────────────────────────────

/// Conflict report for a candidate: `{"has_conflict", "conflicts", "suggestion"?}`.
#[wasm_bindgen(js_name = findConflicts)]
pub fn find_conflicts_json(
    candidate_json: &str,
    existing_json: &str,
    exclude_id: Option<String>,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    to_js(find_conflicts_impl(
        candidate_json,
        existing_json,
        exclude_id.as_deref(),
        config_json.as_deref(),
    ))
}

fn find_conflicts_impl(
    candidate_json: &str,
    existing_json: &str,
    exclude_id: Option<&str>,
    config_json: Option<&str>,
) -> BindingResult {
    let config = config(config_json)?;
    let candidate: AppointmentInstance = parse("candidate appointment", candidate_json)?;
    let existing: Vec<AppointmentInstance> = parse("existing appointments", existing_json)?;
    let report = check_conflicts(&candidate, &existing, exclude_id, &config.conflict_options())
        .map_err(|e| e.to_string())?;
    render(&report)
}

/// Next free slot: `{"time", "reason", "description"}` or `null`.
#[wasm_bindgen(js_name = suggestSlot)]
pub fn suggest_slot(
    requested_start: &str,
    duration_minutes: i32,
    therapist_id: &str,
    existing_json: &str,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    to_js(suggest_slot_impl(
        requested_start,
        duration_minutes,
        therapist_id,
        existing_json,
        config_json.as_deref(),
    ))
}

fn suggest_slot_impl(
    requested_start: &str,
    duration_minutes: i32,
    therapist_id: &str,
    existing_json: &str,
    config_json: Option<&str>,
) -> BindingResult {
    let config = config(config_json)?;
    let start = parse_rfc3339(requested_start).map_err(|e| e.to_string())?;
    let existing: Vec<AppointmentInstance> = parse("existing appointments", existing_json)?;
    let suggestion = suggest_next_slot(
        start,
        i64::from(duration_minutes),
        therapist_id,
        &existing,
        &config.slot_options(),
    );
    match suggestion {
        Some(s) => render(&json!({
            "time": s.time,
            "reason": s.reason,
            "description": s.reason.to_string(),
        })),
        None => Ok("null".to_string()),
    }
}

// ── Gestures ────────────────────────────────────────────────────────────────

/// Candidate bounds for dropping `appointment` at `offset_px` on `target_day`
/// (`YYYY-MM-DD`).
#[wasm_bindgen(js_name = dragBounds)]
pub fn drag_bounds_json(
    appointment_json: &str,
    target_day: &str,
    offset_px: f64,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    to_js(drag_bounds_impl(appointment_json, target_day, offset_px, config_json.as_deref()))
}

fn drag_bounds_impl(
    appointment_json: &str,
    target_day: &str,
    offset_px: f64,
    config_json: Option<&str>,
) -> BindingResult {
    let config = config(config_json)?;
    let appointment: AppointmentInstance = parse("appointment", appointment_json)?;
    let day = NaiveDate::parse_from_str(target_day.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid target day '{target_day}': {e}"))?;
    let bounds = drag_bounds(&appointment, day, offset_px, &config.grid()).map_err(|e| e.to_string())?;
    render(&bounds)
}

/// Candidate bounds for dragging the `"start"` or `"end"` edge to `offset_px`.
#[wasm_bindgen(js_name = resizeBounds)]
pub fn resize_bounds_json(
    appointment_json: &str,
    edge: &str,
    offset_px: f64,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    to_js(resize_bounds_impl(appointment_json, edge, offset_px, config_json.as_deref()))
}

fn resize_bounds_impl(
    appointment_json: &str,
    edge: &str,
    offset_px: f64,
    config_json: Option<&str>,
) -> BindingResult {
    let config = config(config_json)?;
    let appointment: AppointmentInstance = parse("appointment", appointment_json)?;
    let edge = match edge.trim() {
        "start" => ResizeEdge::Start,
        "end" => ResizeEdge::End,
        other => return Err(format!("invalid edge '{other}', expected \"start\" or \"end\"")),
    };
    let bounds =
        resize_bounds(&appointment, edge, offset_px, &config.grid()).map_err(|e| e.to_string())?;
    render(&bounds)
}

/// Commit check for a finished gesture: `{"outcome": "accepted" | "rejected", ...}`.
#[wasm_bindgen(js_name = validateBounds)]
pub fn validate_bounds_json(
    appointment_json: &str,
    bounds_json: &str,
    existing_json: &str,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    to_js(validate_bounds_impl(
        appointment_json,
        bounds_json,
        existing_json,
        config_json.as_deref(),
    ))
}

fn validate_bounds_impl(
    appointment_json: &str,
    bounds_json: &str,
    existing_json: &str,
    config_json: Option<&str>,
) -> BindingResult {
    let config = config(config_json)?;
    let appointment: AppointmentInstance = parse("appointment", appointment_json)?;
    let bounds: Bounds = parse("bounds", bounds_json)?;
    let existing: Vec<AppointmentInstance> = parse("existing appointments", existing_json)?;
    let outcome = validate_bounds(&appointment, bounds, &existing, config.conflict_scope)
        .map_err(|e| e.to_string())?;
    render(&outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const SEED: &str = r#"{"id":"a1","series_id":"s1","therapist_id":"t1","patient_id":"p1","start_time":"2024-03-04T09:00:00Z","end_time":"2024-03-04T10:00:00Z"}"#;

    fn value(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_expand_series() {
        let out = value(
            &expand_series_impl(SEED, r#"{"frequency":"daily","occurrences":4}"#, None, None).unwrap(),
        );
        assert_eq!(out["instances"].as_array().unwrap().len(), 3);
        assert_eq!(out["instances"][2]["start_time"], "2024-03-07T09:00:00Z");
        assert!(out.get("conflicts").is_none());
    }

    #[test]
    fn test_expand_series_ignores_own_series_when_checking() {
        let existing = format!(
            r#"[{SEED}, {{"id":"b","therapist_id":"t1","patient_id":"p2","start_time":"2024-03-06T09:00:00Z","end_time":"2024-03-06T09:30:00Z"}}]"#
        );
        let out = value(
            &expand_series_impl(SEED, r#"{"frequency":"daily","occurrences":4}"#, Some(&existing), None)
                .unwrap(),
        );
        let conflicts = out["conflicts"].as_array().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0]["conflicts"][0]["id"], "b");
    }

    #[test]
    fn test_expand_series_uses_config_limits() {
        let out = value(
            &expand_series_impl(
                SEED,
                r#"{"frequency":"daily"}"#,
                None,
                Some(r#"{"expansion":{"default_max_occurrences":5}}"#),
            )
            .unwrap(),
        );
        assert_eq!(out["instances"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_bad_json_reports_which_input() {
        let err = expand_series_impl("{", r#"{"frequency":"daily"}"#, None, None).unwrap_err();
        assert!(err.starts_with("invalid seed appointment"), "got: {err}");
    }

    #[test]
    fn test_empty_config_is_default() {
        assert!(config(Some("  ")).is_ok());
        assert!(config(Some(r#"{"timezone":"Not/AZone"}"#)).is_err());
    }

    #[test]
    fn test_validate_rule() {
        let out = value(
            &validate_rule_impl("2024-03-04T09:00:00Z", r#"{"frequency":"weekly","days_of_week":[]}"#, None)
                .unwrap(),
        );
        assert_eq!(out["is_valid"], false);
    }

    #[test]
    fn test_find_conflicts_with_exclusion() {
        let existing = format!("[{SEED}]");
        let out = value(&find_conflicts_impl(SEED, &existing, None, None).unwrap());
        assert_eq!(out["has_conflict"], true);
        let out = value(&find_conflicts_impl(SEED, &existing, Some("a1"), None).unwrap());
        assert_eq!(out["has_conflict"], false);
    }

    #[test]
    fn test_suggest_slot() {
        let existing = format!("[{SEED}]");
        let out = value(&suggest_slot_impl("2024-03-04T09:00:00Z", 60, "t1", &existing, None).unwrap());
        assert_eq!(out["time"], "2024-03-04T10:00:00Z");
        assert_eq!(out["reason"], "same_day");

        let none = suggest_slot_impl("2024-03-04T09:00:00Z", 0, "t1", "[]", None).unwrap();
        assert_eq!(none, "null");
    }

    #[test]
    fn test_drag_bounds() {
        // 180px at 60px/hour is 10:00 past a 07:00 grid start.
        let out = value(&drag_bounds_impl(SEED, "2024-03-06", 180.0, None).unwrap());
        assert_eq!(out["start_time"], "2024-03-06T10:00:00Z");
        assert_eq!(out["end_time"], "2024-03-06T11:00:00Z");
        assert!(drag_bounds_impl(SEED, "06/03/2024", 180.0, None).is_err());
    }

    #[test]
    fn test_resize_bounds() {
        // 240px is 11:00.
        let out = value(&resize_bounds_impl(SEED, "end", 240.0, None).unwrap());
        assert_eq!(out["start_time"], "2024-03-04T09:00:00Z");
        assert_eq!(out["end_time"], "2024-03-04T11:00:00Z");
        assert!(resize_bounds_impl(SEED, "middle", 240.0, None).is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let existing = format!(
            r#"[{SEED}, {{"id":"b","therapist_id":"t1","patient_id":"p2","start_time":"2024-03-04T10:30:00Z","end_time":"2024-03-04T11:00:00Z"}}]"#
        );
        let bounds = r#"{"start_time":"2024-03-04T10:00:00Z","end_time":"2024-03-04T11:00:00Z"}"#;
        let out = value(&validate_bounds_impl(SEED, bounds, &existing, None).unwrap());
        assert_eq!(out["outcome"], "rejected");
        assert_eq!(out["conflicts"][0]["id"], "b");

        let bounds = r#"{"start_time":"2024-03-04T09:15:00Z","end_time":"2024-03-04T10:15:00Z"}"#;
        let out = value(&validate_bounds_impl(SEED, bounds, &existing, None).unwrap());
        assert_eq!(out["outcome"], "accepted");

        let inverted = r#"{"start_time":"2024-03-04T13:00:00Z","end_time":"2024-03-04T12:00:00Z"}"#;
        let err = validate_bounds_impl(SEED, inverted, &existing, None).unwrap_err();
        assert!(err.contains("Invalid time range"), "got: {err}");
    }
}
