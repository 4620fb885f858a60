//! Classifier capability used by the decision engine.
//!
//! The classifier is supplied from outside the crate as a model artifact and
//! loaded once at startup. A failed load leaves the service in rule-based
//! mode; there is no process-wide model slot.

use crate::models::CanonicalRecord;
use crate::store_client::ObjectStore;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Number of features passed to the classifier.
pub const FEATURE_COUNT: usize = 14;

/// Feature names in the order the classifier receives them.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "person_age",
    "person_income",
    "person_emp_exp",
    "loan_amnt",
    "loan_int_rate",
    "loan_percent_income",
    "cb_person_cred_hist_length",
    "person_gender",
    "employment_type",
    "person_home_ownership",
    "loan_intent",
    "account_type",
    "person_education",
    "previous_loan_defaults_on_file",
];

/// Index of the first categorical feature in [`FEATURE_NAMES`].
const FIRST_CATEGORICAL: usize = 7;

/// A single typed feature value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Integer(i64),
    Float(f64),
    Category(&'a str),
}

/// The classifier input: one value per entry of [`FEATURE_NAMES`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<'a> {
    values: [FeatureValue<'a>; FEATURE_COUNT],
}

impl<'a> FeatureVector<'a> {
    /// Extracts the features of a canonical record, leaving out
    /// `application_id` and `timestamp`.
    pub fn from_record(record: &'a CanonicalRecord) -> Self {
        use FeatureValue::*;
        Self {
            values: [
                Integer(record.person_age),
                Float(record.person_income),
                Integer(record.person_emp_exp),
                Float(record.loan_amnt),
                Float(record.loan_int_rate),
                Float(record.loan_percent_income),
                Integer(record.cb_person_cred_hist_length),
                Category(&record.person_gender),
                Category(&record.employment_type),
                Category(&record.person_home_ownership),
                Category(&record.loan_intent),
                Category(&record.account_type),
                Category(&record.person_education),
                Category(&record.previous_loan_defaults_on_file),
            ],
        }
    }

    pub fn get(&self, index: usize) -> Option<FeatureValue<'a>> {
        self.values.get(index).copied()
    }

    /// Iterates `(name, value)` pairs in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FeatureValue<'a>)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

/// Errors raised while loading or invoking a classifier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("feature mismatch: {0}")]
    FeatureMismatch(String),
    #[error("classifier produced a non-finite score")]
    NonFiniteScore,
    #[error("class {class} has no probability among {classes} classes")]
    ClassOutOfRange { class: i64, classes: usize },
    #[error("model unavailable: {0}")]
    Unavailable(String),
}

/// Binary approve/reject classifier.
///
/// Implementations must be safe to share across request handlers; they are
/// never mutated after load.
pub trait Classifier: Send + Sync {
    /// Predicted class label. `1` means approve.
    fn predict(&self, features: &FeatureVector<'_>) -> Result<i64, ClassifierError>;

    /// Probability mass per class label, indexed by label.
    fn predict_proba(&self, features: &FeatureVector<'_>) -> Result<Vec<f64>, ClassifierError>;

    /// Short identifier for logs.
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Shared, optionally-absent classifier handle.
pub type ClassifierHandle = Option<Arc<dyn Classifier>>;

// ============ Linear Model Artifact ============

#[derive(Debug, Deserialize)]
struct LinearArtifact {
    intercept: f64,
    #[serde(default)]
    numeric: HashMap<String, f64>,
    #[serde(default)]
    categorical: HashMap<String, HashMap<String, f64>>,
    #[serde(default = "default_threshold")]
    threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

/// Logistic model over the feature vector.
///
/// Numeric features contribute `weight * value`; categorical features
/// contribute the weight of their level (unseen levels contribute 0).
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    intercept: f64,
    numeric: [f64; FIRST_CATEGORICAL],
    categorical: Vec<HashMap<String, f64>>,
    threshold: f64,
}

impl LinearClassifier {
    /// Parses and validates a JSON model artifact.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ClassifierError> {
        let artifact: LinearArtifact = serde_json::from_slice(bytes)
            .map_err(|e| ClassifierError::InvalidArtifact(e.to_string()))?;

        if !artifact.intercept.is_finite() {
            return Err(ClassifierError::InvalidArtifact(
                "intercept must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&artifact.threshold) {
            return Err(ClassifierError::InvalidArtifact(format!(
                "threshold {} outside [0, 1]",
                artifact.threshold
            )));
        }

        let mut numeric = [0.0; FIRST_CATEGORICAL];
        for (name, weight) in &artifact.numeric {
            match feature_index(name) {
                Some(i) if i < FIRST_CATEGORICAL => numeric[i] = *weight,
                Some(_) => {
                    return Err(ClassifierError::FeatureMismatch(format!(
                        "'{}' is categorical but has a numeric weight",
                        name
                    )))
                }
                None => {
                    return Err(ClassifierError::FeatureMismatch(format!(
                        "unknown feature '{}'",
                        name
                    )))
                }
            }
        }

        let mut categorical = vec![HashMap::new(); FEATURE_COUNT - FIRST_CATEGORICAL];
        for (name, levels) in artifact.categorical {
            match feature_index(&name) {
                Some(i) if i >= FIRST_CATEGORICAL => categorical[i - FIRST_CATEGORICAL] = levels,
                Some(_) => {
                    return Err(ClassifierError::FeatureMismatch(format!(
                        "'{}' is numeric but has categorical weights",
                        name
                    )))
                }
                None => {
                    return Err(ClassifierError::FeatureMismatch(format!(
                        "unknown feature '{}'",
                        name
                    )))
                }
            }
        }

        Ok(Self {
            intercept: artifact.intercept,
            numeric,
            categorical,
            threshold: artifact.threshold,
        })
    }

    fn approve_probability(&self, features: &FeatureVector<'_>) -> Result<f64, ClassifierError> {
        let mut score = self.intercept;
        for (i, (name, value)) in features.iter().enumerate() {
            score += match (value, i < FIRST_CATEGORICAL) {
                (FeatureValue::Integer(v), true) => self.numeric[i] * v as f64,
                (FeatureValue::Float(v), true) => self.numeric[i] * v,
                (FeatureValue::Category(level), false) => self.categorical
                    [i - FIRST_CATEGORICAL]
                    .get(level)
                    .copied()
                    .unwrap_or(0.0),
                _ => {
                    return Err(ClassifierError::FeatureMismatch(format!(
                        "unexpected value kind for '{}'",
                        name
                    )))
                }
            };
        }

        if !score.is_finite() {
            return Err(ClassifierError::NonFiniteScore);
        }
        Ok(1.0 / (1.0 + (-score).exp()))
    }
}

impl Classifier for LinearClassifier {
    fn predict(&self, features: &FeatureVector<'_>) -> Result<i64, ClassifierError> {
        let p = self.approve_probability(features)?;
        Ok(if p >= self.threshold { 1 } else { 0 })
    }

    fn predict_proba(&self, features: &FeatureVector<'_>) -> Result<Vec<f64>, ClassifierError> {
        let p = self.approve_probability(features)?;
        Ok(vec![1.0 - p, p])
    }

    fn name(&self) -> &str {
        "linear"
    }
}

fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|f| *f == name)
}

// ============ Loading ============

/// Where the model artifact is read from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    LocalFile(String),
    Store(String),
}

/// Loads the classifier once at startup.
///
/// Any failure is logged and yields `None`, which puts the decision engine in
/// rule-based mode for the life of the process.
pub async fn load_classifier(source: &ModelSource, store: &dyn ObjectStore) -> ClassifierHandle {
    let bytes = match source {
        ModelSource::LocalFile(path) => tokio::fs::read(path)
            .await
            .map_err(|e| ClassifierError::Unavailable(format!("{}: {}", path, e))),
        ModelSource::Store(key) => store
            .get(key)
            .await
            .map_err(|e| ClassifierError::Unavailable(format!("{}: {}", key, e))),
    };

    match bytes.and_then(|b| LinearClassifier::from_json(&b)) {
        Ok(model) => {
            tracing::info!("✓ Model '{}' loaded from {:?}", model.name(), source);
            Some(Arc::new(model))
        }
        Err(e) => {
            tracing::warn!("Could not load model, using rule-based decisions: {}", e);
            None
        }
    }
}
