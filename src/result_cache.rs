use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Time-boxed cache holding the most recently fetched value.
///
/// Backed by a single-slot `moka` cache with a time-to-live, so an entry
/// stops being served once `now - fetched_at >= ttl`.
///
/// # Refill semantics
///
/// - Concurrent misses are coalesced: only one refill future runs and the
///   other callers wait for its result
/// - A failed refill leaves the cache empty so the next call retries
/// - Entries are replaced wholesale, never updated in place
#[derive(Clone)]
pub struct ResultCache<T> {
    inner: Cache<&'static str, CacheEntry<T>>,
}

/// A cached value and the moment it was fetched.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub value: Arc<T>,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
        }
    }
}

const SLOT: &str = "latest";

impl<T: Send + Sync + 'static> ResultCache<T> {
    /// Creates an empty cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder().time_to_live(ttl).max_capacity(1).build();
        Self { inner }
    }

    /// Returns the live entry, if any.
    pub async fn get(&self) -> Option<CacheEntry<T>> {
        self.inner.get(SLOT).await
    }

    /// Returns the live entry or runs `refill` to populate the cache.
    ///
    /// The error of a failed refill is shared with every caller that was
    /// waiting on it.
    pub async fn get_or_refill<F, E>(&self, refill: F) -> Result<CacheEntry<T>, Arc<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: Send + Sync + 'static,
    {
        self.inner
            .try_get_with(SLOT, async move {
                let value = refill.await?;
                Ok(CacheEntry {
                    value: Arc::new(value),
                    fetched_at: Utc::now(),
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_hit_within_ttl_skips_refill() {
        let cache: ResultCache<String> = ResultCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_refill(async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("bundle".to_string())
            })
            .await
            .unwrap();
        let second = cache
            .get_or_refill(async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("other".to_string())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first.value, &second.value));
        assert_eq!(first.fetched_at, second.fetched_at);
    }

    #[tokio::test]
    async fn test_failed_refill_is_not_cached() {
        let cache: ResultCache<String> = ResultCache::new(Duration::from_secs(60));

        let err = cache
            .get_or_refill(async { Err::<String, _>("no data".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err.as_str(), "no data");
        assert!(cache.get().await.is_none());

        let ok = cache
            .get_or_refill(async { Ok::<_, String>("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(ok.value.as_str(), "fresh");
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache: ResultCache<u32> = ResultCache::new(Duration::from_millis(100));
        cache
            .get_or_refill(async { Ok::<_, String>(1) })
            .await
            .unwrap();
        assert!(cache.get().await.is_some());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(cache.get().await.is_none());

        let refreshed = cache
            .get_or_refill(async { Ok::<_, String>(2) })
            .await
            .unwrap();
        assert_eq!(*refreshed.value, 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_run_one_refill() {
        let cache: ResultCache<u32> = ResultCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let refill = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, String>(9)
        };

        let (a, b) = tokio::join!(cache.get_or_refill(refill()), cache.get_or_refill(refill()));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.unwrap().value, &b.unwrap().value));
    }
}
