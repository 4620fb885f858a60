use crate::models::{BatchStats, Decision, Prediction, ResultBundle, ScoringMethod};
use crate::result_cache::ResultCache;
use crate::store_client::{partition_key, predictions_key, ObjectStore, StoreError};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// How many date partitions are tried, most recent first.
pub const LOOKBACK_DAYS: i64 = 2;

/// Maximum predictions per decision class in a served bundle.
pub const MAX_PER_DECISION: usize = 20;

/// Prediction document as written by the batch job.
///
/// Entries are kept as raw JSON so one unreadable prediction does not
/// invalidate the whole partition.
#[derive(Debug, Deserialize)]
struct PersistedBundle {
    predictions: Vec<Value>,
    #[serde(default)]
    stats: BatchStats,
    #[serde(default)]
    method: Option<Value>,
}

/// Serves the latest persisted prediction bundle through a TTL cache.
pub struct PredictionService {
    store: Arc<dyn ObjectStore>,
    cache: ResultCache<ResultBundle>,
}

impl PredictionService {
    pub fn new(store: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: ResultCache::new(ttl),
        }
    }

    /// Latest bundle, capped to [`MAX_PER_DECISION`] predictions per decision.
    ///
    /// Never fails: when no partition yields data, an empty bundle is
    /// returned (and not cached).
    pub async fn get_latest(&self) -> Arc<ResultBundle> {
        self.get_latest_as_of(Utc::now().date_naive()).await
    }

    /// Same as [`Self::get_latest`] with an explicit "today".
    pub async fn get_latest_as_of(&self, today: NaiveDate) -> Arc<ResultBundle> {
        if let Some(entry) = self.cache.get().await {
            tracing::debug!("Serving predictions from cache (fetched at {})", entry.fetched_at);
            return entry.value;
        }

        match self.cache.get_or_refill(self.fetch_recent(today)).await {
            Ok(entry) => entry.value,
            Err(e) => {
                tracing::warn!("No prediction data found, returning empty bundle: {}", e);
                Arc::new(ResultBundle::empty(Utc::now().to_rfc3339()))
            }
        }
    }

    /// Aggregate counts of the latest bundle.
    pub async fn get_summary(&self) -> BatchStats {
        self.get_latest().await.stats.clone()
    }

    /// Whether a live cache entry exists.
    pub async fn cache_valid(&self) -> bool {
        self.cache.get().await.is_some()
    }

    async fn fetch_recent(&self, today: NaiveDate) -> Result<ResultBundle, StoreError> {
        tracing::info!("Loading predictions from store...");
        let mut last_error = StoreError::NotFound(predictions_key(&partition_key(today)));

        for days_ago in 0..LOOKBACK_DAYS {
            let partition = partition_key(today - ChronoDuration::days(days_ago));
            tracing::info!("   Trying {}...", partition);

            match self.fetch_partition(&partition).await {
                Ok(bundle) => {
                    tracing::info!(
                        "Loaded {} predictions from {}",
                        bundle.predictions.len(),
                        partition
                    );
                    return Ok(bundle);
                }
                Err(e) => {
                    tracing::info!("   {}: {}", partition, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn fetch_partition(&self, partition: &str) -> Result<ResultBundle, StoreError> {
        let key = predictions_key(partition);
        let bytes = self.store.get(&key).await?;
        let persisted: PersistedBundle =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Invalid {
                key: key.clone(),
                message: e.to_string(),
            })?;

        let total = persisted.predictions.len();
        let predictions: Vec<Prediction> = persisted
            .predictions
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();
        if predictions.len() < total {
            tracing::warn!(
                "Ignored {} unreadable predictions in {}",
                total - predictions.len(),
                key
            );
        }

        Ok(ResultBundle {
            predictions: cap_predictions(predictions, MAX_PER_DECISION),
            stats: persisted.stats,
            timestamp: Utc::now().to_rfc3339(),
            source_partition: Some(partition.to_string()),
            method: persisted
                .method
                .and_then(|m| serde_json::from_value::<ScoringMethod>(m).ok()),
            skipped: Vec::new(),
        })
    }
}

/// Keeps the first `per_decision` approved and rejected predictions,
/// approved first, preserving order within each group.
pub fn cap_predictions(predictions: Vec<Prediction>, per_decision: usize) -> Vec<Prediction> {
    let (approved, rejected): (Vec<_>, Vec<_>) = predictions
        .into_iter()
        .partition(|p| p.decision == Decision::Approved);

    approved
        .into_iter()
        .take(per_decision)
        .chain(rejected.into_iter().take(per_decision))
        .collect()
}
