// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The user-facing cache type.

use std::{fmt, hash::Hash, marker::PhantomData};

use strata_lock::ShardedKeyLock;
use strata_scope::{CacheDirectives, CacheMethodTaken, Timestamp};
use strata_tier::{CacheEntry, CacheTier, Error, ScopedCacheTier, ScopedLookup, ScopedValue};
use tick::Clock;

use crate::{
    BlockingCache,
    builder::CacheBuilder,
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry, timing::timed},
};

/// A named cache over one storage tier.
///
/// `Cache` is the outermost layer callers talk to. It adds to its storage:
///
/// - A name, used in logs and metrics.
/// - Optional telemetry (`logs` and `metrics` features).
/// - Optional stampede protection: concurrent misses for keys that share a
///   lock shard run their getters one at a time, and every getter first
///   re-checks the cache, so a burst of misses for one key invokes the getter
///   once.
/// - Ambient scoped operations when the storage holds [`ScopedValue`]s.
/// - A [`blocking`](Self::blocking) facade with the same semantics.
///
/// # Examples
///
/// ```
/// use strata::Cache;
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let cache = Cache::builder::<String, u32>(Clock::new_frozen())
///     .name("users")
///     .memory()
///     .build();
///
/// let value = cache.get_or_insert(&"k".to_string(), || async { Ok::<_, strata::Error>(1) }).await?;
/// assert_eq!(value, 1);
/// assert_eq!(cache.get(&"k".to_string()).await?, Some(1));
/// # Ok::<(), strata::Error>(())
/// # });
/// ```
pub struct Cache<K, V, S> {
    pub(crate) name: String,
    pub(crate) storage: S,
    pub(crate) clock: Clock,
    pub(crate) telemetry: CacheTelemetry,
    pub(crate) lock: Option<ShardedKeyLock>,
    pub(crate) _types: PhantomData<fn() -> (K, V)>,
}

impl Cache<(), (), ()> {
    /// Starts building a cache.
    #[must_use]
    pub fn builder<K, V>(clock: Clock) -> CacheBuilder<K, V> {
        CacheBuilder::new(clock)
    }
}

impl<K, V, S> Cache<K, V, S> {
    /// Returns the cache name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cache clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Returns the storage tier.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.storage
    }

    /// Consumes the cache and returns the storage tier.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.storage
    }

    /// Returns `true` if misses are serialized through a sharded key lock.
    #[must_use]
    pub fn has_stampede_protection(&self) -> bool {
        self.lock.is_some()
    }

    /// Returns a synchronous view of this cache.
    #[must_use]
    pub fn blocking(&self) -> BlockingCache<'_, K, V, S> {
        BlockingCache::new(self)
    }

    fn record(&self, operation: CacheOperation, activity: CacheActivity, elapsed: std::time::Duration) {
        self.telemetry.record(&self.name, operation, activity, Some(elapsed));
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Hash + Send + Sync,
    V: Clone + Send + Sync,
    S: CacheTier<K, V>,
{
    /// Returns the number of entries, if the storage can tell.
    #[must_use]
    pub fn len(&self) -> Option<u64> {
        self.storage.len()
    }

    /// Returns `Some(true)` if the storage reports no entries.
    #[must_use]
    pub fn is_empty(&self) -> Option<bool> {
        self.storage.is_empty()
    }

    /// Looks up `key`.
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        let (result, elapsed) = timed(&self.clock, self.storage.get(key)).await;
        let activity = match &result {
            Ok(Some(_)) => CacheActivity::Hit,
            Ok(None) => CacheActivity::Miss,
            Err(_) => CacheActivity::Error,
        };
        self.record(CacheOperation::Get, activity, elapsed);
        Ok(result?.map(CacheEntry::into_value))
    }

    /// Stores `value` under `key`, stamped with the cache clock.
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn insert(&self, key: &K, value: V) -> Result<(), Error> {
        let entry = CacheEntry::with_cached_at(value, self.clock.system_time());
        let (result, elapsed) = timed(&self.clock, self.storage.insert(key, entry)).await;
        self.record(CacheOperation::Insert, outcome(&result, CacheActivity::Inserted), elapsed);
        self.record_size();
        result
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn invalidate(&self, key: &K) -> Result<(), Error> {
        let (result, elapsed) = timed(&self.clock, self.storage.invalidate(key)).await;
        self.record(CacheOperation::Invalidate, outcome(&result, CacheActivity::Invalidated), elapsed);
        result
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn clear(&self) -> Result<(), Error> {
        let (result, elapsed) = timed(&self.clock, self.storage.clear()).await;
        self.record(CacheOperation::Clear, outcome(&result, CacheActivity::Cleared), elapsed);
        self.record_size();
        result
    }

    /// Returns the cached value for `key`, or computes, stores and returns it.
    ///
    /// The getter runs at most once per call and never on a hit. A getter
    /// error is returned unchanged and nothing is cached.
    ///
    /// With stampede protection the getter runs while the key's lock shard is
    /// held. A getter may call back into this cache on the same task; keys on
    /// a shard the task already holds skip the lock. A getter that waits on
    /// another task which calls into this cache for a key on the same shard
    /// deadlocks.
    ///
    /// # Errors
    ///
    /// Returns the getter's error, or a storage error converted into `E`.
    pub async fn get_or_insert<E, F, Fut>(&self, key: &K, getter: F) -> Result<V, E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        match &self.lock {
            Some(lock) => lock.run_exclusive_async(key, || self.recheck_or_fill(key, getter)).await,
            None => self.fill(key, getter).await,
        }
    }

    // The recheck is not recorded: the caller's lookup already counted this miss.
    async fn recheck_or_fill<E, F, Fut>(&self, key: &K, getter: F) -> Result<V, E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        if let Some(entry) = self.storage.get(key).await? {
            return Ok(entry.into_value());
        }
        self.fill(key, getter).await
    }

    async fn fill<E, F, Fut>(&self, key: &K, getter: F) -> Result<V, E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        let value = getter().await?;
        self.insert(key, value.clone()).await?;
        Ok(value)
    }

    fn record_size(&self) {
        if self.telemetry.is_enabled()
            && let Some(size) = self.storage.len()
        {
            self.telemetry.record_size(&self.name, size);
        }
    }
}

impl<K, V, S> Cache<K, ScopedValue<V>, S>
where
    K: Hash + Send + Sync,
    V: Clone + Send + Sync,
    S: ScopedCacheTier<K, V>,
{
    /// Reads `key` under the ambient directives.
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn try_get_scoped(&self, key: &K) -> Result<ScopedLookup<V>, Error> {
        self.try_get_scoped_with(key, strata_scope::current()).await
    }

    /// Reads `key` under explicit `directives`.
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn try_get_scoped_with(&self, key: &K, directives: CacheDirectives) -> Result<ScopedLookup<V>, Error> {
        let (result, elapsed) = timed(&self.clock, self.storage.try_get_scoped(key, directives)).await;
        let activity = match &result {
            Ok((taken, _)) if taken.is_hit() => CacheActivity::Hit,
            Ok((taken, _)) if taken.is_miss() => CacheActivity::Miss,
            Ok(_) => CacheActivity::Skipped,
            Err(_) => CacheActivity::Error,
        };
        self.record(CacheOperation::ScopedGet, activity, elapsed);
        result
    }

    /// Writes `value` produced at `value_timestamp` under the ambient directives.
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn set_scoped(&self, key: &K, value: V, value_timestamp: Timestamp) -> Result<CacheMethodTaken, Error> {
        self.set_scoped_with(key, ScopedValue::new(value, value_timestamp), strata_scope::current())
            .await
    }

    /// Writes `value` under explicit `directives`.
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn set_scoped_with(&self, key: &K, value: ScopedValue<V>, directives: CacheDirectives) -> Result<CacheMethodTaken, Error> {
        let (result, elapsed) = timed(&self.clock, self.storage.set_scoped(key, value, directives)).await;
        let activity = match &result {
            Ok(taken) if taken.is_set() => CacheActivity::Inserted,
            Ok(_) => CacheActivity::Skipped,
            Err(_) => CacheActivity::Error,
        };
        self.record(CacheOperation::ScopedSet, activity, elapsed);
        result
    }

    /// Returns a fresh cached value for `key`, or produces and stores one, under the ambient directives.
    ///
    /// # Errors
    ///
    /// Returns the getter's error, or a storage error converted into `E`.
    pub async fn get_scoped<E, F, Fut>(&self, key: &K, getter: F) -> Result<(CacheMethodTaken, ScopedValue<V>), E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<ScopedValue<V>, E>> + Send,
    {
        self.get_scoped_with(key, strata_scope::current(), getter).await
    }

    /// Returns a fresh cached value for `key`, or produces and stores one, under explicit `directives`.
    ///
    /// On a fresh hit the outcome is `GET`. Otherwise the getter runs once and
    /// the outcome is `GET_MISS`, plus `SET` when the value was written. Misses
    /// only take the stampede lock when `directives` allow reads.
    ///
    /// # Errors
    ///
    /// Returns the getter's error, or a storage error converted into `E`.
    pub async fn get_scoped_with<E, F, Fut>(
        &self,
        key: &K,
        directives: CacheDirectives,
        getter: F,
    ) -> Result<(CacheMethodTaken, ScopedValue<V>), E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<ScopedValue<V>, E>> + Send,
    {
        if let (taken, Some(value)) = self.try_get_scoped_with(key, directives).await? {
            return Ok((taken, value));
        }

        match &self.lock {
            Some(lock) if directives.allows_get() => {
                lock.run_exclusive_async(key, || self.recheck_or_fill_scoped(key, directives, getter))
                    .await
            }
            _ => self.fill_scoped(key, directives, getter).await,
        }
    }

    async fn recheck_or_fill_scoped<E, F, Fut>(
        &self,
        key: &K,
        directives: CacheDirectives,
        getter: F,
    ) -> Result<(CacheMethodTaken, ScopedValue<V>), E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<ScopedValue<V>, E>> + Send,
    {
        if let (taken, Some(value)) = self.storage.try_get_scoped(key, directives).await? {
            return Ok((taken, value));
        }
        self.fill_scoped(key, directives, getter).await
    }

    async fn fill_scoped<E, F, Fut>(
        &self,
        key: &K,
        directives: CacheDirectives,
        getter: F,
    ) -> Result<(CacheMethodTaken, ScopedValue<V>), E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<ScopedValue<V>, E>> + Send,
    {
        let value = getter().await?;
        let written = self.set_scoped_with(key, value.clone(), directives).await?;
        Ok((CacheMethodTaken::GET_MISS | written, value))
    }
}

fn outcome(result: &Result<(), Error>, success: CacheActivity) -> CacheActivity {
    if result.is_ok() { success } else { CacheActivity::Error }
}

impl<K, V, S> fmt::Debug for Cache<K, V, S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("storage", &self.storage)
            .field("stampede_protection", &self.lock.is_some())
            .finish_non_exhaustive()
    }
}
