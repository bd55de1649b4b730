//! Cached entity type catalogue.
//!
//! Several screens need the list of entity types; fetching it once and
//! sharing it avoids hammering the backend.
//!
//! Lifecycle:
//! - Empty until the first successful fetch
//! - At most one fetch in flight; concurrent callers wait for it and share
//!   its result
//! - `get(true)` refetches; `invalidate()` clears
//! - A failed fetch leaves the previous value in place

use tokio::sync::Mutex;
use tracing::debug;

use crate::adapters::{EntityTypeSource, UpstreamError};

/// Owned cache in front of an [`EntityTypeSource`]
pub struct EntityTypeCache<S> {
    source: S,
    // Held across the fetch, which is what serialises concurrent fetches
    cached: Mutex<Option<Vec<String>>>,
}

impl<S: EntityTypeSource> EntityTypeCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Return the cached entity types, fetching when empty or forced
    pub async fn get(&self, force: bool) -> Result<Vec<String>, UpstreamError> {
        let mut cached = self.cached.lock().await;

        if !force {
            if let Some(types) = cached.as_ref() {
                return Ok(types.clone());
            }
        }

        debug!(force, "Fetching entity types");
        let types = self.source.fetch_entity_types().await?;
        *cached = Some(types.clone());
        Ok(types)
    }

    /// Drop the cached value; the next `get` fetches again
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Whether a value is currently cached
    pub async fn is_cached(&self) -> bool {
        self.cached.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl EntityTypeSource for CountingSource {
        async fn fetch_entity_types(&self) -> Result<Vec<String>, UpstreamError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail {
                return Err(UpstreamError::from_status(503, "analyzer unavailable"));
            }
            Ok(vec!["PERSON".to_string(), format!("FETCH_{}", call)])
        }
    }

    #[async_trait]
    impl<T: EntityTypeSource> EntityTypeSource for Arc<T> {
        async fn fetch_entity_types(&self) -> Result<Vec<String>, UpstreamError> {
            self.as_ref().fetch_entity_types().await
        }
    }

    #[tokio::test]
    async fn test_get_caches_result() {
        let source = Arc::new(CountingSource::new(false));
        let cache = EntityTypeCache::new(source.clone());

        let first = cache.get(false).await.unwrap();
        let second = cache.get(false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_refetches() {
        let source = Arc::new(CountingSource::new(false));
        let cache = EntityTypeCache::new(source.clone());

        cache.get(false).await.unwrap();
        let refreshed = cache.get(true).await.unwrap();

        assert_eq!(refreshed[1], "FETCH_2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let source = Arc::new(CountingSource::new(false));
        let cache = EntityTypeCache::new(source.clone());

        let (a, b, c) = tokio::join!(cache.get(false), cache.get(false), cache.get(false));

        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let source = Arc::new(CountingSource::new(false));
        let cache = EntityTypeCache::new(source.clone());

        cache.get(false).await.unwrap();
        cache.invalidate().await;
        assert!(!cache.is_cached().await);

        cache.get(false).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_surfaces_and_keeps_nothing() {
        let cache = EntityTypeCache::new(CountingSource::new(true));

        let err = cache.get(false).await.unwrap_err();
        assert_eq!(err.to_string(), "analyzer unavailable");
        assert!(!cache.is_cached().await);
    }
}
