use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use utoipa::ToSchema;

// ============ Input Records ============

/// A loan application exactly as received from the feed or a batch request.
///
/// Any field may be missing, null, or carry the wrong JSON type. The only
/// structural requirement is that the record is a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    /// Looks up a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for RawRecord {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(RecordError::NotAnObject(json_kind(&other))),
        }
    }
}

/// Failure to turn one element of a batch into a scoreable record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("record must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A loan application after defaulting and type coercion.
///
/// Every field is always present. Built only by [`crate::normalizer::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CanonicalRecord {
    pub person_age: i64,
    pub person_income: f64,
    pub person_emp_exp: i64,
    pub loan_amnt: f64,
    pub loan_int_rate: f64,
    pub loan_percent_income: f64,
    pub cb_person_cred_hist_length: i64,
    pub person_gender: String,
    pub employment_type: String,
    pub person_home_ownership: String,
    pub loan_intent: String,
    pub account_type: String,
    pub person_education: String,
    pub previous_loan_defaults_on_file: String,
    pub application_id: String,
    /// ISO-8601 timestamp, taken from the input or set at normalization time.
    pub timestamp: String,
}

// ============ Decisions ============

/// Loan approval outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approved,
    Rejected,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approved => write!(f, "APPROVED"),
            Decision::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Which decision path produced a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    MlModel,
    RuleBased,
}

/// The decision for one application, with the input fields it echoes.
///
/// Also the element type of persisted prediction files, so the optional
/// echo fields default when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Prediction {
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub person_age: i64,
    #[serde(default)]
    pub person_income: f64,
    #[serde(default, alias = "loan_amount")]
    pub loan_amnt: f64,
    #[serde(default)]
    pub loan_percent_income: f64,
    pub decision: Decision,
    pub confidence: f64,
    #[serde(default)]
    pub timestamp: String,
}

// ============ Bundles ============

/// Aggregate counts for a set of predictions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchStats {
    #[serde(default)]
    pub total_applications: usize,
    #[serde(default, alias = "approved")]
    pub approved_count: usize,
    #[serde(default, alias = "rejected")]
    pub rejected_count: usize,
    /// Percentage of approved applications, rounded to two decimals.
    #[serde(default)]
    pub approval_rate: f64,
}

impl BatchStats {
    /// Computes stats from approved/rejected counts.
    pub fn from_counts(approved_count: usize, rejected_count: usize) -> Self {
        let total_applications = approved_count + rejected_count;
        Self {
            total_applications,
            approved_count,
            rejected_count,
            approval_rate: approval_rate(approved_count, total_applications),
        }
    }
}

/// `round(approved / total * 100, 2)`, or 0 for an empty set.
///
/// Exact halves round to even, so 1 of 32 is 3.12.
pub fn approval_rate(approved: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = approved as f64 / total as f64 * 100.0;
    (rate * 100.0).round_ties_even() / 100.0
}

/// A batch record that was dropped instead of scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SkippedRecord {
    /// Position of the record in the submitted batch.
    pub index: usize,
    pub reason: String,
}

/// A set of predictions plus aggregate statistics.
///
/// Never patched after construction; producers build a new bundle instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResultBundle {
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub stats: BatchStats,
    #[serde(default)]
    pub timestamp: String,
    /// Date partition (`YYYYMMDD`) the bundle was read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_partition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ScoringMethod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRecord>,
}

impl ResultBundle {
    /// The bundle served when no persisted data can be found.
    pub fn empty(timestamp: String) -> Self {
        Self {
            predictions: Vec::new(),
            stats: BatchStats::default(),
            timestamp,
            source_partition: None,
            method: None,
            skipped: Vec::new(),
        }
    }
}

/// Output of the processing stage: the normalized records of one feed pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBatch {
    pub processed_count: usize,
    pub records: Vec<CanonicalRecord>,
    pub timestamp: String,
}

// ============ API Payloads ============

/// Body of `POST /predict-batch`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BatchRequest {
    /// Loan applications to score. Elements should be JSON objects.
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub records: Option<Vec<Value>>,
}

/// Liveness probe payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub cache_valid: bool,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_approval_rate_rounding() {
        assert_eq!(approval_rate(1, 3), 33.33);
        assert_eq!(approval_rate(2, 3), 66.67);
        assert_eq!(approval_rate(0, 5), 0.0);
        assert_eq!(approval_rate(0, 0), 0.0);
        assert_eq!(approval_rate(4, 4), 100.0);
    }

    #[test]
    fn test_approval_rate_halves_round_to_even() {
        assert_eq!(approval_rate(1, 32), 3.12);
        assert_eq!(approval_rate(5, 32), 15.62);
        assert_eq!(approval_rate(3, 32), 9.38);
        assert_eq!(approval_rate(1, 8), 12.5);
    }

    #[test]
    fn test_raw_record_rejects_non_objects() {
        assert!(RawRecord::try_from(json!({"a": 1})).is_ok());
        assert_eq!(
            RawRecord::try_from(json!("garbage")),
            Err(RecordError::NotAnObject("string"))
        );
        assert_eq!(
            RawRecord::try_from(json!([1, 2])),
            Err(RecordError::NotAnObject("array"))
        );
    }

    #[test]
    fn test_persisted_bundle_accepts_legacy_field_names() {
        let doc = json!({
            "stats": {"total_applications": 2, "approved": 1, "rejected": 1, "approval_rate": 50.0},
            "predictions": [
                {"application_id": "a1", "decision": "APPROVED", "confidence": 0.91, "loan_amount": 5000.0},
                {"application_id": "a2", "decision": "REJECTED", "confidence": 0.7}
            ]
        });

        let bundle: ResultBundle = serde_json::from_value(doc).unwrap();
        assert_eq!(bundle.stats.approved_count, 1);
        assert_eq!(bundle.stats.rejected_count, 1);
        assert_eq!(bundle.predictions[0].loan_amnt, 5000.0);
        assert_eq!(bundle.predictions[1].decision, Decision::Rejected);
    }

    #[test]
    fn test_bundle_without_predictions_is_invalid() {
        let doc = json!({"stats": {"total_applications": 0}});
        assert!(serde_json::from_value::<ResultBundle>(doc).is_err());
    }

    #[test]
    fn test_empty_skipped_list_is_omitted() {
        let bundle = ResultBundle::empty("2026-01-01T00:00:00Z".to_string());
        let json = serde_json::to_value(&bundle).unwrap();
        assert!(json.get("skipped").is_none());
        assert!(json.get("method").is_none());
        assert_eq!(json["stats"]["total_applications"], 0);
    }
}
