// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache storage backends.
//!
//! [`CacheTier`] defines the interface that all cache backends must implement.
//! Layered composition, scoping and telemetry are built on top of it.

use std::sync::Arc;

use crate::{CacheEntry, Error};

/// Trait for cache tier implementations.
///
/// Implement this trait to create custom cache backends.
///
/// All four core methods are required: `get`, `insert`, `invalidate`, and `clear`.
/// The remaining methods have default implementations:
/// - `len`: Returns `None` (not all tiers track size)
/// - `is_empty`: Delegates to `len`
/// - `is_active`: Returns `true`; remote tiers return `false` while unreachable
#[cfg_attr(
    any(test, feature = "dynamic-cache"),
    dynosaur::dynosaur(pub(crate) DynCacheTier = dyn(box) CacheTier, bridge(none))
)]
pub trait CacheTier<K, V>: Send + Sync {
    /// Gets a value, returning an error if the operation fails.
    fn get(&self, key: &K) -> impl Future<Output = Result<Option<CacheEntry<V>>, Error>> + Send;

    /// Inserts a value, returning an error if the operation fails.
    fn insert(&self, key: &K, entry: CacheEntry<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Invalidates a value, returning an error if the operation fails.
    fn invalidate(&self, key: &K) -> impl Future<Output = Result<(), Error>> + Send;

    /// Clears all entries, returning an error if the operation fails.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns the number of entries, if supported.
    ///
    /// Returns `None` for implementations that don't track size.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the cache contains no entries.
    ///
    /// Returns `None` for implementations that don't track size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }

    /// Returns `false` while the tier's underlying resource is unreachable.
    ///
    /// Layered caches skip an inactive level-2 tier and serve from level 1 alone.
    fn is_active(&self) -> bool {
        true
    }
}

impl<K, V, T> CacheTier<K, V> for Arc<T>
where
    T: CacheTier<K, V>,
{
    fn get(&self, key: &K) -> impl Future<Output = Result<Option<CacheEntry<V>>, Error>> + Send {
        <T as CacheTier<K, V>>::get(self, key)
    }

    fn insert(&self, key: &K, entry: CacheEntry<V>) -> impl Future<Output = Result<(), Error>> + Send {
        <T as CacheTier<K, V>>::insert(self, key, entry)
    }

    fn invalidate(&self, key: &K) -> impl Future<Output = Result<(), Error>> + Send {
        <T as CacheTier<K, V>>::invalidate(self, key)
    }

    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send {
        <T as CacheTier<K, V>>::clear(self)
    }

    fn len(&self) -> Option<u64> {
        <T as CacheTier<K, V>>::len(self)
    }

    fn is_empty(&self) -> Option<bool> {
        <T as CacheTier<K, V>>::is_empty(self)
    }

    fn is_active(&self) -> bool {
        <T as CacheTier<K, V>>::is_active(self)
    }
}
