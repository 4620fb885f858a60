//! Batch scoring: normalize, decide, and aggregate a sequence of records.

use crate::classifier::Classifier;
use crate::decision::decide;
use crate::models::{
    BatchStats, Decision, Prediction, RawRecord, RecordError, ResultBundle, ScoringMethod,
    SkippedRecord,
};
use crate::normalizer::normalize;
use chrono::Utc;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("No records provided")]
    EmptyInput,
}

/// Scores a batch of raw records.
///
/// Records that cannot be scored are skipped and listed in the bundle's
/// `skipped` field; the rest keep their input order. The `method` tag
/// reflects whether a classifier was supplied, not which path each record
/// actually took.
pub fn score_batch(
    records: Option<Vec<Value>>,
    classifier: Option<&dyn Classifier>,
) -> Result<ResultBundle, ScoreError> {
    let records = match records {
        Some(r) if !r.is_empty() => r,
        _ => return Err(ScoreError::EmptyInput),
    };

    let method = if classifier.is_some() {
        ScoringMethod::MlModel
    } else {
        ScoringMethod::RuleBased
    };
    tracing::info!(
        "Scoring {} applications using {:?}",
        records.len(),
        method
    );

    let mut predictions = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    let mut approved_count = 0;
    let mut rejected_count = 0;

    for (index, raw) in records.into_iter().enumerate() {
        match score_record(raw, classifier) {
            Ok(prediction) => {
                match prediction.decision {
                    Decision::Approved => approved_count += 1,
                    Decision::Rejected => rejected_count += 1,
                }
                predictions.push(prediction);
            }
            Err(e) => {
                tracing::warn!("Skipping application at index {}: {}", index, e);
                skipped.push(SkippedRecord {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    let stats = BatchStats::from_counts(approved_count, rejected_count);
    tracing::info!(
        "Generated {} predictions: APPROVED={}, REJECTED={}, Rate={}%",
        stats.total_applications,
        stats.approved_count,
        stats.rejected_count,
        stats.approval_rate
    );

    Ok(ResultBundle {
        predictions,
        stats,
        timestamp: Utc::now().to_rfc3339(),
        source_partition: None,
        method: Some(method),
        skipped,
    })
}

/// Scores one raw record.
pub fn score_record(
    raw: Value,
    classifier: Option<&dyn Classifier>,
) -> Result<Prediction, RecordError> {
    let raw = RawRecord::try_from(raw)?;
    let record = normalize(&raw);
    let assessment = decide(&record, classifier);

    Ok(Prediction {
        application_id: record.application_id,
        person_age: record.person_age,
        person_income: record.person_income,
        loan_amnt: record.loan_amnt,
        loan_percent_income: record.loan_percent_income,
        decision: assessment.decision,
        confidence: assessment.confidence,
        timestamp: Utc::now().to_rfc3339(),
    })
}
