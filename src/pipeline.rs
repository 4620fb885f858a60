/// Batch write path: extract → process → predict
///
/// Each stage reads its input from the object store and writes its output
/// back, so stages can also run independently:
/// 1. extract: pull the application feed and store it verbatim under `raw/`
/// 2. process: normalize the latest raw pull into `processed/`
/// 3. predict: score the processed records into `predictions/`, the
///    document the serving façade reads
use crate::classifier::Classifier;
use crate::models::{ProcessedBatch, RawRecord, ResultBundle};
use crate::normalizer::normalize;
use crate::scorer::{score_batch, ScoreError};
use crate::store_client::{predictions_key, processed_key, raw_key, ObjectStore, StoreError};
use chrono::{DateTime, Utc};
use serde_json::Value;

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("feed request failed: {0}")]
    Feed(#[from] reqwest::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid JSON in {key}: {source}")]
    Json {
        key: String,
        source: serde_json::Error,
    },
    #[error("{0} must contain a JSON array of applications")]
    NotAnArray(String),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// Pulls the feed and stores it under the `raw/` key for `now`.
///
/// Returns the key that was written.
pub async fn extract(
    client: &reqwest::Client,
    feed_url: &str,
    store: &dyn ObjectStore,
    now: DateTime<Utc>,
) -> Result<String, PipelineError> {
    tracing::info!("=== EXTRACTION ===");
    let response = client.get(feed_url).send().await?.error_for_status()?;
    tracing::info!("Feed status: {}", response.status());
    let feed: Value = response.json().await?;

    let key = raw_key(now);
    store
        .put(&key, to_pretty_json(&key, &feed)?, JSON_CONTENT_TYPE)
        .await?;

    tracing::info!("Feed stored at {}", key);
    Ok(key)
}

/// Normalizes a raw feed pull and stores the result under the `processed/`
/// key for `partition`.
pub async fn process(
    store: &dyn ObjectStore,
    raw_key: &str,
    partition: &str,
) -> Result<ProcessedBatch, PipelineError> {
    tracing::info!("=== PROCESSING {} ===", raw_key);
    let applications = match read_json(store, raw_key).await? {
        Value::Array(items) => items,
        _ => return Err(PipelineError::NotAnArray(raw_key.to_string())),
    };

    let mut records = Vec::with_capacity(applications.len());
    for (index, application) in applications.into_iter().enumerate() {
        match RawRecord::try_from(application) {
            Ok(raw) => records.push(normalize(&raw)),
            Err(e) => tracing::warn!("Error processing application {}: {}", index, e),
        }
    }

    let batch = ProcessedBatch {
        processed_count: records.len(),
        records,
        timestamp: Utc::now().to_rfc3339(),
    };

    let key = processed_key(partition);
    store
        .put(&key, to_pretty_json(&key, &batch)?, JSON_CONTENT_TYPE)
        .await?;

    tracing::info!("Processed {} applications into {}", batch.processed_count, key);
    Ok(batch)
}

/// Scores the processed records of `partition` and stores the bundle under
/// its `predictions/` key.
pub async fn predict(
    store: &dyn ObjectStore,
    partition: &str,
    classifier: Option<&dyn Classifier>,
) -> Result<ResultBundle, PipelineError> {
    let input_key = processed_key(partition);
    tracing::info!("=== PREDICTION {} ===", input_key);

    let records = match read_json(store, &input_key).await?.get_mut("records") {
        Some(Value::Array(items)) => std::mem::take(items),
        _ => return Err(PipelineError::NotAnArray(input_key)),
    };
    tracing::info!("Found {} applications to process", records.len());

    let bundle = score_batch(Some(records), classifier)?;

    let key = predictions_key(partition);
    store
        .put(&key, to_pretty_json(&key, &bundle)?, JSON_CONTENT_TYPE)
        .await?;

    tracing::info!("Predictions complete: {:?}, saved to {}", bundle.stats, key);
    Ok(bundle)
}

async fn read_json(store: &dyn ObjectStore, key: &str) -> Result<Value, PipelineError> {
    let bytes = store.get(key).await?;
    serde_json::from_slice(&bytes).map_err(|source| PipelineError::Json {
        key: key.to_string(),
        source,
    })
}

fn to_pretty_json<T: serde::Serialize>(key: &str, value: &T) -> Result<Vec<u8>, PipelineError> {
    serde_json::to_vec_pretty(value).map_err(|source| PipelineError::Json {
        key: key.to_string(),
        source,
    })
}
