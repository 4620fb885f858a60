//! Runs the batch pipeline once: extract the feed, process it, and persist predictions.

use chrono::Utc;
use loan_approval_api::classifier::load_classifier;
use loan_approval_api::config::Config;
use loan_approval_api::pipeline;
use loan_approval_api::store_client::{partition_key, HttpObjectStore};
use std::time::Duration;

/// Main entry point for the pipeline run.
///
/// Stages run in order and share today's UTC date partition. A failing
/// stage aborts the run; earlier stage outputs stay in the store.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let feed_url = config
        .feed_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("FEED_URL environment variable required"))?;

    let store = HttpObjectStore::new(
        config.store_base_url.clone(),
        config.store_token.clone(),
        config.store_connect_timeout(),
        config.store_read_timeout(),
    )?;
    let feed_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let now = Utc::now();
    let partition = partition_key(now.date_naive());

    let raw_key = pipeline::extract(&feed_client, &feed_url, &store, now).await?;
    pipeline::process(&store, &raw_key, &partition).await?;

    let classifier = load_classifier(&config.model_source(), &store).await;
    let bundle = pipeline::predict(&store, &partition, classifier.as_deref()).await?;

    tracing::info!(
        "Pipeline complete for {}: {} predictions ({}% approved)",
        partition,
        bundle.stats.total_applications,
        bundle.stats.approval_rate
    );

    Ok(())
}
