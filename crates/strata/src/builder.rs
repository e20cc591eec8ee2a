// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, marker::PhantomData, num::NonZeroUsize};

use strata_lock::ShardedKeyLock;
#[cfg(feature = "memory")]
use strata_memory::InMemoryCache;
use strata_tier::CacheTier;
use tick::Clock;

use crate::{Cache, telemetry::TelemetryConfig};

const DEFAULT_NAME: &str = "default";

const DEFAULT_LOCK_SHARDS: NonZeroUsize = NonZeroUsize::new(64).expect("literal must have non-zero value");

/// Builds a [`Cache`].
///
/// Created by [`Cache::builder`]. A storage tier must be chosen with
/// [`storage`](Self::storage) (or [`memory`](Self::memory)) before
/// [`build`](Self::build) becomes available.
pub struct CacheBuilder<K, V, S = ()> {
    name: String,
    storage: S,
    clock: Clock,
    telemetry: TelemetryConfig,
    lock_shards: Option<NonZeroUsize>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> CacheBuilder<K, V> {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            storage: (),
            clock,
            telemetry: TelemetryConfig::default(),
            lock_shards: None,
            _types: PhantomData,
        }
    }
}

impl<K, V, S> CacheBuilder<K, V, S> {
    /// Sets the name reported in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Uses `storage` as the backing tier.
    #[must_use]
    pub fn storage<T>(self, storage: T) -> CacheBuilder<K, V, T>
    where
        T: CacheTier<K, V>,
    {
        CacheBuilder {
            name: self.name,
            storage,
            clock: self.clock,
            telemetry: self.telemetry,
            lock_shards: self.lock_shards,
            _types: PhantomData,
        }
    }

    /// Uses an unbounded [`InMemoryCache`] as the backing tier.
    #[cfg(feature = "memory")]
    #[must_use]
    pub fn memory(self) -> CacheBuilder<K, V, InMemoryCache<K, V>>
    where
        K: Clone + std::hash::Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.storage(InMemoryCache::new())
    }

    /// Emits a `tracing` event for every cache operation.
    #[cfg(any(feature = "logs", test))]
    #[must_use]
    pub fn enable_logs(mut self) -> Self {
        self.telemetry = self.telemetry.with_logs();
        self
    }

    /// Records OpenTelemetry metrics for every cache operation.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn enable_metrics(mut self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.telemetry = self.telemetry.with_metrics(provider);
        self
    }

    /// Serializes concurrent misses through a sharded key lock with the default shard count.
    #[must_use]
    pub fn stampede_protection(self) -> Self {
        self.lock_shards(DEFAULT_LOCK_SHARDS)
    }

    /// Serializes concurrent misses through a sharded key lock with `shards` shards.
    ///
    /// Keys that share a shard also share its lock, so fewer shards means
    /// more contention between unrelated keys.
    #[must_use]
    pub fn lock_shards(mut self, shards: NonZeroUsize) -> Self {
        self.lock_shards = Some(shards);
        self
    }
}

impl<K, V, S> CacheBuilder<K, V, S>
where
    S: CacheTier<K, V>,
{
    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> Cache<K, V, S> {
        Cache {
            name: self.name,
            storage: self.storage,
            clock: self.clock,
            telemetry: self.telemetry.build(),
            lock: self.lock_shards.map(ShardedKeyLock::new),
            _types: PhantomData,
        }
    }
}

impl<K, V, S> fmt::Debug for CacheBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("name", &self.name)
            .field("lock_shards", &self.lock_shards)
            .finish_non_exhaustive()
    }
}
