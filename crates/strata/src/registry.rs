// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use strata_notify::{SharedNotifier, Synchronizer};
use strata_tier::{CacheTier, DynamicCache, Error};

use crate::{CacheName, NameMatcher};

/// Resolves logical cache names to stores and notifiers.
///
/// Stores and notifiers are registered under [`CacheName`]s and resolved by
/// longest prefix, so one registration such as `"svc.Users*"` serves every
/// cache whose name starts with `svc.Users`. A name that resolves to nothing
/// is not an error; callers usually bypass caching in that case.
///
/// # Examples
///
/// ```
/// use strata::{CacheRegistry, InMemoryCache};
/// use strata_tier::DynamicCacheExt;
///
/// let registry = CacheRegistry::<String, u32>::new();
/// registry.register("svc.Users*", InMemoryCache::new().into_dynamic());
///
/// assert!(registry.resolve("svc.Users.Admin").is_some());
/// assert!(registry.resolve("svc.Orders").is_none());
/// ```
pub struct CacheRegistry<K, V> {
    stores: NameMatcher<DynamicCache<K, V>>,
    notifiers: NameMatcher<SharedNotifier>,
}

impl<K, V> CacheRegistry<K, V> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stores: NameMatcher::new(),
            notifiers: NameMatcher::new(),
        }
    }

    /// Registers `store` under `name`, returning the store it replaced.
    pub fn register(&self, name: &str, store: DynamicCache<K, V>) -> Option<DynamicCache<K, V>> {
        tracing::debug!(cache.name = name, "cache store registered");
        self.stores.register(name, store)
    }

    /// Registers `store` under `name`, or removes the registration when `store` is `None`.
    pub fn set(&self, name: &str, store: Option<DynamicCache<K, V>>) -> Option<DynamicCache<K, V>> {
        self.stores.replace(name, store)
    }

    /// Removes the store registered under `name`.
    pub fn unregister(&self, name: &str) -> Option<DynamicCache<K, V>> {
        self.stores.unregister(name)
    }

    /// Returns the store that best matches `name`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<DynamicCache<K, V>> {
        self.stores.resolve(name)
    }

    /// Registers `notifier` under `name`, returning the notifier it replaced.
    pub fn register_notifier(&self, name: &str, notifier: SharedNotifier) -> Option<SharedNotifier> {
        self.notifiers.register(name, notifier)
    }

    /// Removes the notifier registered under `name`.
    pub fn unregister_notifier(&self, name: &str) -> Option<SharedNotifier> {
        self.notifiers.unregister(name)
    }

    /// Returns the notifier that best matches `name`.
    #[must_use]
    pub fn resolve_notifier(&self, name: &str) -> Option<SharedNotifier> {
        self.notifiers.resolve(name)
    }

    /// Returns the names of all registered stores, sorted.
    #[must_use]
    pub fn list_names(&self) -> Vec<CacheName> {
        self.stores.names()
    }
}

impl<K, V> CacheRegistry<K, V>
where
    K: From<String> + Send + Sync,
{
    /// Binds `tier` to the notifier registered for `cache_name`.
    ///
    /// The returned [`Synchronizer`] applies remote invalidations for
    /// `cache_name` to `tier` until it is dropped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no notifier matches `cache_name`, or
    /// the notifier's error when subscribing fails.
    pub fn bind<T>(&self, cache_name: &str, tier: T) -> Result<Synchronizer<K, V, T, SharedNotifier>, Error>
    where
        T: CacheTier<K, V>,
    {
        let notifier = self
            .resolve_notifier(cache_name)
            .ok_or_else(|| Error::configuration(format!("no cache notifier registered for '{cache_name}'")))?;
        Synchronizer::bind(cache_name, tier, notifier)
    }
}

impl<K, V> Default for CacheRegistry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for CacheRegistry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("stores", &self.stores)
            .field("notifiers", &self.notifiers)
            .finish()
    }
}
