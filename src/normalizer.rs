//! Coerces loosely-typed application records into [`CanonicalRecord`]s.
//!
//! The feed is untrusted, so nothing here can fail: a field that is missing,
//! null, or not convertible to its declared type takes the field default.

use crate::models::{CanonicalRecord, RawRecord};
use chrono::Utc;
use serde_json::Value;

/// Default for string fields without a more specific default.
pub const UNKNOWN: &str = "Unknown";
pub const DEFAULT_EDUCATION: &str = "High School";
pub const DEFAULT_PREVIOUS_DEFAULTS: &str = "No";

/// Builds the canonical form of a raw record.
pub fn normalize(raw: &RawRecord) -> CanonicalRecord {
    CanonicalRecord {
        person_age: int_field(raw, "person_age"),
        person_income: float_field(raw, "person_income"),
        person_emp_exp: int_field(raw, "person_emp_exp"),
        loan_amnt: float_field(raw, "loan_amnt"),
        loan_int_rate: float_field(raw, "loan_int_rate"),
        loan_percent_income: float_field(raw, "loan_percent_income"),
        cb_person_cred_hist_length: int_field(raw, "cb_person_cred_hist_length"),
        person_gender: text_field(raw, "person_gender", UNKNOWN),
        employment_type: text_field(raw, "employment_type", UNKNOWN),
        person_home_ownership: text_field(raw, "person_home_ownership", UNKNOWN),
        loan_intent: text_field(raw, "loan_intent", UNKNOWN),
        account_type: text_field(raw, "account_type", UNKNOWN),
        person_education: text_field(raw, "person_education", DEFAULT_EDUCATION),
        previous_loan_defaults_on_file: text_field(
            raw,
            "previous_loan_defaults_on_file",
            DEFAULT_PREVIOUS_DEFAULTS,
        ),
        application_id: text_field(raw, "application_id", ""),
        timestamp: raw
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
    }
}

fn float_field(raw: &RawRecord, field: &str) -> f64 {
    raw.get(field).and_then(coerce_f64).unwrap_or(0.0)
}

fn int_field(raw: &RawRecord, field: &str) -> i64 {
    raw.get(field).and_then(coerce_i64).unwrap_or(0)
}

fn text_field(raw: &RawRecord, field: &str, default: &str) -> String {
    match raw.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

/// Numeric coercion for float fields. `None` means "use the default".
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_text(s)?.parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Numeric coercion for integer fields.
///
/// JSON floats truncate toward zero; numeric strings must be whole numbers.
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
                .map(|v| v.trunc() as i64)
        }),
        Value::String(s) => parse_numeric_text(s)?.parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn parse_numeric_text(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "null" {
        None
    } else {
        Some(trimmed)
    }
}
