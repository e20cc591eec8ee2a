// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, future::ready, hash::Hash};

use futures::executor::block_on;
use strata_scope::{CacheDirectives, CacheMethodTaken, Timestamp};
use strata_tier::{CacheTier, Error, ScopedCacheTier, ScopedLookup, ScopedValue};

use crate::Cache;

/// Synchronous view of a [`Cache`].
///
/// Every method blocks the calling thread until the matching asynchronous
/// operation completes and behaves exactly like it, including stampede
/// protection and telemetry. Getters are plain closures.
///
/// Do not use this type from inside an asynchronous task: blocking the
/// executor thread can stall or deadlock it.
///
/// # Examples
///
/// ```
/// use strata::Cache;
/// use tick::Clock;
///
/// let cache = Cache::builder::<String, u32>(Clock::new_frozen()).memory().build();
/// let blocking = cache.blocking();
///
/// let value = blocking.get_or_insert(&"k".to_string(), || Ok::<_, strata::Error>(7))?;
/// assert_eq!(value, 7);
/// # Ok::<(), strata::Error>(())
/// ```
pub struct BlockingCache<'a, K, V, S> {
    cache: &'a Cache<K, V, S>,
}

impl<'a, K, V, S> BlockingCache<'a, K, V, S> {
    pub(crate) fn new(cache: &'a Cache<K, V, S>) -> Self {
        Self { cache }
    }

    /// Returns the underlying asynchronous cache.
    #[must_use]
    pub fn cache(&self) -> &'a Cache<K, V, S> {
        self.cache
    }
}

impl<K, V, S> BlockingCache<'_, K, V, S>
where
    K: Hash + Send + Sync,
    V: Clone + Send + Sync,
    S: CacheTier<K, V>,
{
    /// Blocking [`Cache::get`].
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub fn get(&self, key: &K) -> Result<Option<V>, Error> {
        block_on(self.cache.get(key))
    }

    /// Blocking [`Cache::insert`].
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub fn insert(&self, key: &K, value: V) -> Result<(), Error> {
        block_on(self.cache.insert(key, value))
    }

    /// Blocking [`Cache::invalidate`].
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub fn invalidate(&self, key: &K) -> Result<(), Error> {
        block_on(self.cache.invalidate(key))
    }

    /// Blocking [`Cache::clear`].
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub fn clear(&self) -> Result<(), Error> {
        block_on(self.cache.clear())
    }

    /// Blocking [`Cache::get_or_insert`].
    ///
    /// # Errors
    ///
    /// Returns the getter's error, or a storage error converted into `E`.
    pub fn get_or_insert<E, F>(&self, key: &K, getter: F) -> Result<V, E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Result<V, E> + Send,
    {
        block_on(self.cache.get_or_insert(key, || ready(getter())))
    }
}

impl<K, V, S> BlockingCache<'_, K, ScopedValue<V>, S>
where
    K: Hash + Send + Sync,
    V: Clone + Send + Sync,
    S: ScopedCacheTier<K, V>,
{
    /// Blocking [`Cache::try_get_scoped`].
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub fn try_get_scoped(&self, key: &K) -> Result<ScopedLookup<V>, Error> {
        block_on(self.cache.try_get_scoped(key))
    }

    /// Blocking [`Cache::try_get_scoped_with`].
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub fn try_get_scoped_with(&self, key: &K, directives: CacheDirectives) -> Result<ScopedLookup<V>, Error> {
        block_on(self.cache.try_get_scoped_with(key, directives))
    }

    /// Blocking [`Cache::set_scoped`].
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub fn set_scoped(&self, key: &K, value: V, value_timestamp: Timestamp) -> Result<CacheMethodTaken, Error> {
        block_on(self.cache.set_scoped(key, value, value_timestamp))
    }

    /// Blocking [`Cache::set_scoped_with`].
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub fn set_scoped_with(&self, key: &K, value: ScopedValue<V>, directives: CacheDirectives) -> Result<CacheMethodTaken, Error> {
        block_on(self.cache.set_scoped_with(key, value, directives))
    }

    /// Blocking [`Cache::get_scoped`].
    ///
    /// # Errors
    ///
    /// Returns the getter's error, or a storage error converted into `E`.
    pub fn get_scoped<E, F>(&self, key: &K, getter: F) -> Result<(CacheMethodTaken, ScopedValue<V>), E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Result<ScopedValue<V>, E> + Send,
    {
        block_on(self.cache.get_scoped(key, || ready(getter())))
    }

    /// Blocking [`Cache::get_scoped_with`].
    ///
    /// # Errors
    ///
    /// Returns the getter's error, or a storage error converted into `E`.
    pub fn get_scoped_with<E, F>(&self, key: &K, directives: CacheDirectives, getter: F) -> Result<(CacheMethodTaken, ScopedValue<V>), E>
    where
        E: From<Error> + Send,
        F: FnOnce() -> Result<ScopedValue<V>, E> + Send,
    {
        block_on(self.cache.get_scoped_with(key, directives, || ready(getter())))
    }
}

impl<K, V, S> fmt::Debug for BlockingCache<'_, K, V, S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingCache").field("cache", self.cache).finish()
    }
}
