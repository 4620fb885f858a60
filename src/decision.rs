/// Decision engine for single applications
///
/// Two paths produce a decision:
/// 1. The injected classifier, when present and its call succeeds
/// 2. A fixed rule cascade otherwise (first match wins)
///
/// The rule thresholds are business policy and must not be tuned here.
use crate::classifier::{Classifier, ClassifierError, FeatureVector};
use crate::models::{CanonicalRecord, Decision};

/// Which path produced an [`Assessment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Model,
    Rules,
}

/// Outcome of deciding one canonical record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub decision: Decision,
    /// Probability mass of the chosen class, in `[0, 1]`.
    pub confidence: f64,
    pub source: DecisionSource,
}

/// Decides a record, falling back to rules when the classifier is absent or fails.
pub fn decide(record: &CanonicalRecord, classifier: Option<&dyn Classifier>) -> Assessment {
    if let Some(model) = classifier {
        match classify(record, model) {
            Ok(assessment) => return assessment,
            Err(e) => {
                tracing::warn!(
                    "Model '{}' failed for application '{}', using rules: {}",
                    model.name(),
                    record.application_id,
                    e
                );
            }
        }
    }
    rule_based(record)
}

/// Runs the classifier on the record's feature vector.
pub fn classify(
    record: &CanonicalRecord,
    model: &dyn Classifier,
) -> Result<Assessment, ClassifierError> {
    let features = FeatureVector::from_record(record);
    let class = model.predict(&features)?;
    let proba = model.predict_proba(&features)?;

    let confidence = usize::try_from(class)
        .ok()
        .and_then(|i| proba.get(i).copied())
        .ok_or(ClassifierError::ClassOutOfRange {
            class,
            classes: proba.len(),
        })?;
    if !confidence.is_finite() {
        return Err(ClassifierError::NonFiniteScore);
    }

    let decision = if class == 1 {
        Decision::Approved
    } else {
        Decision::Rejected
    };

    Ok(Assessment {
        decision,
        confidence: confidence.clamp(0.0, 1.0),
        source: DecisionSource::Model,
    })
}

/// Deterministic fallback cascade. Pure and total.
pub fn rule_based(record: &CanonicalRecord) -> Assessment {
    let (decision, confidence) = if record.previous_loan_defaults_on_file == "Yes"
        || record.loan_percent_income > 0.4
    {
        (Decision::Rejected, 0.75)
    } else if record.loan_percent_income < 0.2 && record.person_income > 50_000.0 {
        (Decision::Approved, 0.80)
    } else if record.loan_amnt > 35_000.0 && record.person_income < 40_000.0 {
        (Decision::Rejected, 0.70)
    } else {
        (Decision::Approved, 0.65)
    };

    Assessment {
        decision,
        confidence,
        source: DecisionSource::Rules,
    }
}
