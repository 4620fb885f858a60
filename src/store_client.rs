use crate::circuit_breaker::{create_store_circuit_breaker, StoreCircuitBreaker};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use failsafe::futures::CircuitBreaker;
use reqwest::StatusCode;
use std::time::Duration;

/// Largest object body the service will read.
pub const MAX_OBJECT_BYTES: usize = 1024 * 1024;

/// Errors returned by object-store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("store returned {status} for {key}: {message}")]
    Status {
        key: String,
        status: u16,
        message: String,
    },
    #[error("store request failed: {0}")]
    Transport(String),
    #[error("object {key} exceeds {limit} bytes")]
    BodyTooLarge { key: String, limit: usize },
    #[error("store circuit open, request rejected")]
    CircuitOpen,
    #[error("invalid object {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Key/value object storage holding feed pulls, processed batches, and
/// persisted prediction bundles.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches an object's bytes.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Writes an object, replacing any previous version.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError>;
}

// ============ Key Layout ============

/// Date partition string (`YYYYMMDD`).
pub fn partition_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub fn raw_key(now: DateTime<Utc>) -> String {
    format!(
        "raw/{}/data_{}.json",
        partition_key(now.date_naive()),
        now.format("%Y%m%d_%H%M%S")
    )
}

pub fn processed_key(partition: &str) -> String {
    format!("processed/{0}/applications_{0}.json", partition)
}

pub fn predictions_key(partition: &str) -> String {
    format!("predictions/{0}/predictions_{0}.json", partition)
}

// ============ HTTP Object Store ============

/// Client for an HTTP object store (`GET`/`PUT {base_url}/{key}`).
///
/// Reads go through a circuit breaker; a missing object is an expected
/// outcome and does not count against it.
#[derive(Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    breaker: StoreCircuitBreaker,
}

impl HttpObjectStore {
    /// Creates a new `HttpObjectStore`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Bucket base URL, without trailing slash.
    /// * `token` - Optional bearer token.
    /// * `connect_timeout` - TCP connect timeout.
    /// * `request_timeout` - Whole-request timeout.
    pub fn new(
        base_url: String,
        token: Option<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to create store client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            breaker: create_store_circuit_breaker(),
        })
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.url(key);
        tracing::debug!("Fetching object: {}", url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Status {
                key: key.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let too_large = || StoreError::BodyTooLarge {
            key: key.to_string(),
            limit: MAX_OBJECT_BYTES,
        };
        if response
            .content_length()
            .is_some_and(|len| len as usize > MAX_OBJECT_BYTES)
        {
            return Err(too_large());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if body.len() > MAX_OBJECT_BYTES {
            return Err(too_large());
        }

        Ok(body.to_vec())
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let counts_as_failure = |e: &StoreError| !matches!(e, StoreError::NotFound(_));

        match self.breaker.call_with(counts_as_failure, self.fetch(key)).await {
            Ok(body) => Ok(body),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Store circuit open, skipping fetch of {}", key);
                Err(StoreError::CircuitOpen)
            }
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let url = self.url(key);
        tracing::info!("Saving object: {}", url);

        let response = self
            .authorize(self.client.put(&url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Status {
                key: key.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_layout() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let partition = partition_key(date);

        assert_eq!(partition, "20260307");
        assert_eq!(
            predictions_key(&partition),
            "predictions/20260307/predictions_20260307.json"
        );
        assert_eq!(
            processed_key(&partition),
            "processed/20260307/applications_20260307.json"
        );

        let now = Utc.with_ymd_and_hms(2026, 3, 7, 14, 5, 9).unwrap();
        assert_eq!(raw_key(now), "raw/20260307/data_20260307_140509.json");
    }

    #[test]
    fn test_client_creation_trims_base_url() {
        let store = HttpObjectStore::new(
            "https://bucket.example.com/".to_string(),
            None,
            Duration::from_secs(3),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            store.url("/models/m.json"),
            "https://bucket.example.com/models/m.json"
        );
    }
}
