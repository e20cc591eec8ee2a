// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The process-local level-1 tier.

use std::hash::Hash;

use moka::future::Cache;
use strata_tier::{CacheEntry, CacheTier, Error, ScopedCacheTier, ScopedValue};

use crate::builder::{InMemoryCacheBuilder, InMemoryCacheOptions};

/// A process-local cache tier, usually level 1 of a layered cache.
///
/// Entries live in a moka store and may be evicted by capacity or expiry at
/// any time; a layered cache treats such an eviction like any other level-1
/// miss and refills from level 2. Clones are handles to the same store, so
/// the copy registered under a cache name and the copy bound to a
/// synchronizer see the same entries. Calls never fail and the tier always
/// reports itself active.
///
/// Holding [`ScopedValue`]s makes it a [`ScopedCacheTier`]: scoped reads
/// compare the stored value timestamp against the caller's staleness floor.
///
/// # Examples
///
/// ```
/// use strata_memory::InMemoryCache;
/// use strata_scope::{CacheDirectives, CacheMethod, CacheMethodTaken};
/// use strata_tier::{ScopedCacheTier, ScopedValue};
/// # futures::executor::block_on(async {
///
/// let local = InMemoryCache::<String, ScopedValue<i32>>::new();
/// let written_at = "2024-05-01T10:00:00Z".parse()?;
/// local
///     .set_scoped(&"key".to_string(), ScopedValue::new(42, written_at), CacheDirectives::default())
///     .await?;
///
/// let newer_than_write = CacheDirectives::new(CacheMethod::GET, Some("2024-05-01T11:00:00Z".parse()?));
/// let (taken, value) = local.try_get_scoped(&"key".to_string(), newer_than_write).await?;
/// assert_eq!(taken, CacheMethodTaken::GET_MISS);
/// assert!(value.is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, CacheEntry<V>>,
}

impl<K, V> Default for InMemoryCache<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InMemoryCache<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a tier with no capacity bound and no expiry.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a tier that evicts once it holds more than `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a tier from the `memory` section of a cache configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the options are out of range.
    pub fn from_options(options: &InMemoryCacheOptions) -> Result<Self, Error> {
        InMemoryCacheBuilder::from_options(options).map(InMemoryCacheBuilder::build)
    }

    /// Starts configuring capacity, expiry and the store name.
    #[must_use]
    pub fn builder() -> InMemoryCacheBuilder<K, V> {
        InMemoryCacheBuilder::new()
    }

    /// Applies pending evictions and removals so that [`len`](CacheTier::len) is exact.
    ///
    /// Removals, including the full clear a synchronizer issues after a
    /// connectivity change, are reflected in `len` only after this runs.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    pub(crate) fn from_builder(builder: &InMemoryCacheBuilder<K, V>) -> Self {
        let mut moka_builder = Cache::builder();

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }
        if let Some(capacity) = builder.initial_capacity {
            moka_builder = moka_builder.initial_capacity(capacity);
        }
        if let Some(ttl) = builder.time_to_live {
            moka_builder = moka_builder.time_to_live(ttl);
        }
        if let Some(tti) = builder.time_to_idle {
            moka_builder = moka_builder.time_to_idle(tti);
        }
        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
        }
    }
}

impl<K, V> CacheTier<K, V> for InMemoryCache<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        Ok(self.inner.get(key).await)
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.inner.insert(key.clone(), entry).await;
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.inner.invalidate_all();
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.entry_count())
    }
}

impl<K, V> ScopedCacheTier<K, V> for InMemoryCache<K, ScopedValue<V>>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
}
