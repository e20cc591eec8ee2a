// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `CacheTier` trait default implementations.

use std::{collections::HashMap, sync::Arc, sync::Mutex};

use futures::executor::block_on;
use strata_tier::{CacheEntry, CacheTier, CacheTierExt, Error, ErrorKind, testing::CacheOp, testing::MockCache};

/// Minimal implementation that only provides required methods
struct MinimalCache<K, V> {
    data: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> MinimalCache<K, V> {
    fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> CacheTier<K, V> for MinimalCache<K, V>
where
    K: Clone + Eq + std::hash::Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        Ok(self.data.lock().expect("lock poisoned").get(key).cloned())
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.data.lock().expect("lock poisoned").insert(key.clone(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.data.lock().expect("lock poisoned").remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.data.lock().expect("lock poisoned").clear();
        Ok(())
    }
}

#[test]
fn minimal_tier_defaults() {
    let cache = MinimalCache::<String, i32>::new();
    assert_eq!(cache.len(), None);
    assert_eq!(cache.is_empty(), None);
    assert!(cache.is_active());
}

#[test]
fn minimal_tier_round_trip() {
    block_on(async {
        let cache = MinimalCache::<String, i32>::new();
        let key = "key".to_string();

        assert!(cache.get(&key).await.expect("error on get").is_none());
        cache.insert(&key, CacheEntry::new(42)).await.expect("error on insert");
        assert_eq!(cache.try_get(&key).await.expect("error on get"), Some(42));

        cache.invalidate(&key).await.expect("error on invalidate");
        assert!(cache.get(&key).await.expect("error on get").is_none());
    });
}

#[test]
fn arc_forwards_to_inner_tier() {
    block_on(async {
        let inner = MockCache::<String, i32>::new();
        let shared = Arc::new(inner.clone());
        let key = "key".to_string();

        shared.insert(&key, CacheEntry::new(1)).await.expect("error on insert");
        assert_eq!(shared.len(), Some(1));
        assert!(inner.contains_key(&key));

        inner.set_active(false);
        assert!(!shared.is_active());

        shared.clear().await.expect("error on clear");
        assert_eq!(inner.entry_count(), 0);
    });
}

#[test]
fn mock_failure_reports_tier_error_and_records_op() {
    block_on(async {
        let cache = MockCache::<String, i32>::new();
        cache.fail_when(|op| matches!(op, CacheOp::Clear));

        let error = cache.clear().await.expect_err("clear should fail");
        assert_eq!(error.kind(), ErrorKind::Tier);
        assert_eq!(cache.operations(), vec![CacheOp::Clear]);

        cache.clear_failures();
        cache.clear().await.expect("clear should succeed");
    });
}

#[test]
fn get_or_insert_converts_tier_errors() {
    block_on(async {
        let cache = MockCache::<String, i32>::new();
        cache.fail_when(|op| matches!(op, CacheOp::Get(_)));

        let error = cache
            .get_or_insert(&"key".to_string(), || async { Ok::<_, Error>(1) })
            .await
            .expect_err("get should fail");
        assert_eq!(error.kind(), ErrorKind::Tier);
    });
}
