// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dynamic cache tier wrapper for type erasure.

use std::{fmt::Debug, sync::Arc};

use crate::{CacheEntry, CacheTier, Error, ScopedCacheTier, ScopedValue, tier::DynCacheTier};

/// Extension trait for converting any `CacheTier` into a `DynamicCache`.
///
/// This trait is automatically implemented for all types that implement `CacheTier`.
///
/// # Examples
///
/// ```
/// use strata_tier::{CacheTier, DynamicCache, DynamicCacheExt};
///
/// fn erase<T>(tier: T) -> DynamicCache<String, i32>
/// where
///     T: CacheTier<String, i32> + 'static,
/// {
///     tier.into_dynamic()
/// }
/// ```
pub trait DynamicCacheExt<K, V>: Sized {
    /// Converts this cache tier into a `DynamicCache`.
    fn into_dynamic(self) -> DynamicCache<K, V>;
}

impl<K, V, T> DynamicCacheExt<K, V> for T
where
    T: CacheTier<K, V> + 'static,
{
    fn into_dynamic(self) -> DynamicCache<K, V> {
        DynamicCache::new(self)
    }
}

/// A clonable dynamic cache tier with type erasure.
///
/// `DynamicCache` wraps a trait object in an `Arc`, so clones share one
/// underlying store. Registries use it to hold stores of different concrete
/// types under one handle type.
///
/// A `DynamicCache` of [`ScopedValue`]s is a [`ScopedCacheTier`] that applies
/// the standard protocol on top of the erased store. Composite tiers that
/// override the scoped methods should be held by their concrete type instead.
pub struct DynamicCache<K, V>(Arc<DynCacheTier<'static, K, V>>);

impl<K, V> DynamicCache<K, V> {
    pub(crate) fn new<T>(tier: T) -> Self
    where
        T: CacheTier<K, V> + Send + Sync + 'static,
    {
        Self(DynCacheTier::new_arc(tier))
    }

    /// Returns `true` if both handles erase the same store instance.
    ///
    /// ```
    /// use strata_tier::{DynamicCacheExt, testing::MockCache};
    ///
    /// let a = MockCache::<String, i32>::new().into_dynamic();
    /// let b = MockCache::<String, i32>::new().into_dynamic();
    /// assert!(a.same_instance(&a.clone()));
    /// assert!(!a.same_instance(&b));
    /// ```
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<K, V> Debug for DynamicCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicCache").finish()
    }
}

impl<K, V> Clone for DynamicCache<K, V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K, V> CacheTier<K, V> for DynamicCache<K, V>
where
    K: Sync,
    V: Send,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        self.0.get(key).await
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.0.insert(key, entry).await
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.0.invalidate(key).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.0.clear().await
    }

    fn len(&self) -> Option<u64> {
        self.0.len()
    }

    fn is_empty(&self) -> Option<bool> {
        self.0.is_empty()
    }

    fn is_active(&self) -> bool {
        self.0.is_active()
    }
}

impl<K, V> ScopedCacheTier<K, V> for DynamicCache<K, ScopedValue<V>>
where
    K: Sync,
    V: Send,
{
}
