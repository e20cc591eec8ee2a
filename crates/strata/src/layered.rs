// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Two-level cache composition.
//!
//! A [`LayeredCache`] puts a fast level-1 tier in front of a shared level-2
//! tier. Reads consult level 1 first and promote level-2 hits into level 1.
//! Writes and removals go to level 2 first, then level 1, so level 1 never
//! holds a value the shared tier has not accepted yet.

use std::{fmt, marker::PhantomData, sync::Arc};

use strata_notify::{CacheNotifier, NotificationAction, SharedNotifier};
use strata_scope::{CacheDirectives, CacheMethodTaken};
use strata_tier::{CacheEntry, CacheTier, DynamicCache, Error, ErrorKind, ScopedCacheTier, ScopedLookup, ScopedValue};

use crate::{CacheRegistry, LayeredCacheOptions};

/// A layered cache whose tiers store [`ScopedValue`]s.
///
/// Both tiers must implement [`ScopedCacheTier`]; the layered cache then
/// implements it too, threading the caller's directives through both levels.
pub type LayeredScopedCache<K, V, P, F> = LayeredCache<K, ScopedValue<V>, P, F>;

/// Publishes level-1 invalidations after level-2 writes.
#[derive(Clone, Debug)]
struct Level1Invalidation {
    cache_name: String,
    notifier: SharedNotifier,
}

/// A fast level-1 tier in front of a shared level-2 tier.
///
/// | Operation    | Behavior                                                             |
/// |--------------|----------------------------------------------------------------------|
/// | `get`        | level 1, then level 2; a level-2 hit is promoted into level 1        |
/// | `insert`     | level 2, then level 1; a level-2 failure leaves level 1 untouched    |
/// | `invalidate` | level 2, then level 1; level 1 is always attempted                   |
/// | `clear`      | level 2, then level 1; level 1 is always attempted                   |
///
/// When level 2 reports itself inactive it is skipped, and the cache serves
/// what level 1 alone can.
///
/// With the level-1 invalidation policy enabled, every write that reaches
/// level 2 publishes an [`Updated`](NotificationAction::Updated) notification
/// for the level-1 cache name, so other processes drop their local copy.
/// Publishing is best effort. The write has already reached both levels when
/// the notification goes out, so a failed publish is logged and the write
/// still succeeds. Publishing without a subscription is a wiring mistake and
/// is logged at error level.
///
/// Keys travel in notifications as their [`Display`](fmt::Display) form.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use strata::{LayeredCache, InMemoryCache};
/// use strata_tier::CacheTierExt;
/// # futures::executor::block_on(async {
///
/// let local = Arc::new(InMemoryCache::<String, u32>::new());
/// let shared = Arc::new(InMemoryCache::<String, u32>::new());
/// let cache = LayeredCache::builder(Arc::clone(&local), Arc::clone(&shared))
///     .invalidate_level1_on_level2_upsert(false)
///     .build()?;
///
/// let value = cache.get_or_insert(&"k".to_string(), || async { Ok::<_, strata::Error>(7) }).await?;
/// assert_eq!(value, 7);
/// assert_eq!(local.try_get(&"k".to_string()).await?, Some(7));
/// assert_eq!(shared.try_get(&"k".to_string()).await?, Some(7));
/// # Ok::<(), strata::Error>(())
/// # });
/// ```
pub struct LayeredCache<K, V, P, F> {
    level1: Arc<P>,
    level2: Arc<F>,
    invalidation: Option<Level1Invalidation>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V, P, F> LayeredCache<K, V, P, F> {
    /// Starts building a layered cache over the two tiers.
    #[must_use]
    pub fn builder(level1: Arc<P>, level2: Arc<F>) -> LayeredCacheBuilder<K, V, P, F> {
        LayeredCacheBuilder {
            level1,
            level2,
            invalidate_level1_on_level2_upsert: None,
            level1_name: None,
            notifier: None,
            _types: PhantomData,
        }
    }

    /// Returns the level-1 tier.
    #[must_use]
    pub fn level1(&self) -> &Arc<P> {
        &self.level1
    }

    /// Returns the level-2 tier.
    #[must_use]
    pub fn level2(&self) -> &Arc<F> {
        &self.level2
    }

    /// Returns `true` if level-2 writes publish level-1 invalidations.
    #[must_use]
    pub fn invalidates_level1_on_level2_upsert(&self) -> bool {
        self.invalidation.is_some()
    }
}

impl<K, V> LayeredCache<K, V, DynamicCache<K, V>, DynamicCache<K, V>> {
    /// Builds a layered cache from stores and notifiers registered in `registry`.
    ///
    /// # Errors
    ///
    /// Returns a [`Configuration`](ErrorKind::Configuration) error when a tier
    /// name does not resolve, when both names resolve to the same store, or
    /// when the invalidation policy is enabled and no notifier is registered
    /// for the level-1 name.
    pub fn from_registry(registry: &CacheRegistry<K, V>, options: &LayeredCacheOptions) -> Result<Self, Error> {
        let resolve = |name: &str| {
            registry
                .resolve(name)
                .ok_or_else(|| Error::configuration(format!("no cache store registered for '{name}'")))
        };
        let level1 = resolve(&options.level1)?;
        let level2 = resolve(&options.level2)?;
        if level1.same_instance(&level2) {
            return Err(Error::configuration(format!(
                "'{}' and '{}' resolve to the same store",
                options.level1, options.level2
            )));
        }

        let mut builder = Self::builder(Arc::new(level1), Arc::new(level2))
            .invalidate_level1_on_level2_upsert(options.invalidate_level1_on_level2_upsert)
            .level1_name(options.level1.clone());
        if options.invalidate_level1_on_level2_upsert {
            let notifier = registry.resolve_notifier(&options.level1).ok_or_else(|| {
                Error::configuration(format!("no cache notifier registered for '{}'", options.level1))
            })?;
            builder = builder.notifier(notifier);
        }
        builder.build()
    }
}

impl<K, V, P, F> LayeredCache<K, V, P, F>
where
    K: fmt::Display + Send + Sync,
    V: Send,
    P: CacheTier<K, V>,
    F: CacheTier<K, V>,
{
    fn level2_active(&self) -> bool {
        let active = self.level2.is_active();
        if !active {
            tracing::warn!("level-2 cache tier is inactive, serving from level 1 only");
        }
        active
    }

    async fn publish_level1_invalidation(&self, key: &K) {
        let Some(invalidation) = &self.invalidation else {
            return;
        };
        let key = key.to_string();
        let published = invalidation
            .notifier
            .publish(&invalidation.cache_name, Some(&key), NotificationAction::Updated)
            .await;
        match published {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::Protocol => {
                tracing::error!(cache.name = %invalidation.cache_name, %error, "level-1 invalidation published without a subscription");
            }
            Err(error) => {
                tracing::warn!(cache.name = %invalidation.cache_name, %error, "failed to publish level-1 invalidation");
            }
        }
    }
}

impl<K, V, P, F> CacheTier<K, V> for LayeredCache<K, V, P, F>
where
    K: fmt::Display + Send + Sync,
    V: Clone + Send + Sync,
    P: CacheTier<K, V>,
    F: CacheTier<K, V>,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        if let Some(entry) = self.level1.get(key).await? {
            return Ok(Some(entry));
        }
        if !self.level2_active() {
            return Ok(None);
        }

        // Boxed so deeply nested layers keep a bounded future size.
        let found = Box::pin(self.level2.get(key)).await?;
        if let Some(entry) = &found
            && let Err(error) = self.level1.insert(key, entry.clone()).await
        {
            tracing::warn!(%error, "failed to promote level-2 hit into level 1");
        }
        Ok(found)
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        let upserted = if self.level2_active() {
            Box::pin(self.level2.insert(key, entry.clone())).await?;
            true
        } else {
            false
        };
        self.level1.insert(key, entry).await?;
        if upserted {
            self.publish_level1_invalidation(key).await;
        }
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        let level2 = if self.level2_active() {
            Box::pin(self.level2.invalidate(key)).await
        } else {
            Ok(())
        };
        let level1 = self.level1.invalidate(key).await;
        level2?;
        level1
    }

    async fn clear(&self) -> Result<(), Error> {
        let level2 = if self.level2_active() {
            Box::pin(self.level2.clear()).await
        } else {
            Ok(())
        };
        let level1 = self.level1.clear().await;
        level2?;
        level1
    }

    fn len(&self) -> Option<u64> {
        self.level1.len()
    }

    fn is_active(&self) -> bool {
        self.level1.is_active()
    }
}

impl<K, V, P, F> ScopedCacheTier<K, V> for LayeredCache<K, ScopedValue<V>, P, F>
where
    K: fmt::Display + Send + Sync,
    V: Clone + Send + Sync,
    P: ScopedCacheTier<K, V>,
    F: ScopedCacheTier<K, V>,
{
    async fn try_get_scoped(&self, key: &K, directives: CacheDirectives) -> Result<ScopedLookup<V>, Error> {
        if !directives.allows_get() {
            return Ok((CacheMethodTaken::NONE, None));
        }

        let (level1_taken, found) = self.level1.try_get_scoped(key, directives).await?;
        if found.is_some() {
            return Ok((level1_taken, found));
        }
        if !self.level2_active() {
            return Ok((level1_taken, None));
        }

        let (level2_taken, found) = Box::pin(self.level2.try_get_scoped(key, directives)).await?;
        let Some(value) = found else {
            return Ok((level1_taken | level2_taken, None));
        };

        let promoted = match self.level1.set_scoped(key, value.clone(), directives).await {
            Ok(taken) => taken,
            Err(error) => {
                tracing::warn!(%error, "failed to promote level-2 hit into level 1");
                CacheMethodTaken::NONE
            }
        };
        let taken = (level1_taken | level2_taken | promoted) - CacheMethodTaken::GET_MISS;
        Ok((taken, Some(value)))
    }

    async fn set_scoped(&self, key: &K, value: ScopedValue<V>, directives: CacheDirectives) -> Result<CacheMethodTaken, Error> {
        if !directives.allows_set() {
            return Ok(CacheMethodTaken::NONE);
        }

        let level2_taken = if self.level2_active() {
            Box::pin(self.level2.set_scoped(key, value.clone(), directives)).await?
        } else {
            CacheMethodTaken::NONE
        };
        let level1_taken = self.level1.set_scoped(key, value, directives).await?;
        if level2_taken.is_set() {
            self.publish_level1_invalidation(key).await;
        }
        Ok(level1_taken | level2_taken)
    }
}

impl<K, V, P, F> Clone for LayeredCache<K, V, P, F> {
    fn clone(&self) -> Self {
        Self {
            level1: Arc::clone(&self.level1),
            level2: Arc::clone(&self.level2),
            invalidation: self.invalidation.clone(),
            _types: PhantomData,
        }
    }
}

impl<K, V, P, F> fmt::Debug for LayeredCache<K, V, P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredCache")
            .field("invalidation", &self.invalidation)
            .finish_non_exhaustive()
    }
}

/// Builder for [`LayeredCache`].
///
/// The level-1 invalidation policy must be set explicitly. Enabling it also
/// requires the level-1 cache name and a notifier.
pub struct LayeredCacheBuilder<K, V, P, F> {
    level1: Arc<P>,
    level2: Arc<F>,
    invalidate_level1_on_level2_upsert: Option<bool>,
    level1_name: Option<String>,
    notifier: Option<SharedNotifier>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V, P, F> LayeredCacheBuilder<K, V, P, F> {
    /// Sets whether writes reaching level 2 publish level-1 invalidations.
    #[must_use]
    pub fn invalidate_level1_on_level2_upsert(mut self, enabled: bool) -> Self {
        self.invalidate_level1_on_level2_upsert = Some(enabled);
        self
    }

    /// Sets the cache name that level-1 invalidations are published under.
    #[must_use]
    pub fn level1_name(mut self, name: impl Into<String>) -> Self {
        self.level1_name = Some(name.into());
        self
    }

    /// Sets the notifier that level-1 invalidations are published through.
    #[must_use]
    pub fn notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validates the wiring and builds the cache.
    ///
    /// # Errors
    ///
    /// Returns a [`Configuration`](ErrorKind::Configuration) error when both
    /// levels are the same instance, when the invalidation policy was never
    /// set, or when it is enabled without a level-1 name and a notifier.
    pub fn build(self) -> Result<LayeredCache<K, V, P, F>, Error> {
        if std::ptr::addr_eq(Arc::as_ptr(&self.level1), Arc::as_ptr(&self.level2)) {
            return Err(Error::configuration("level 1 and level 2 must be distinct cache instances"));
        }
        let Some(enabled) = self.invalidate_level1_on_level2_upsert else {
            return Err(Error::configuration("the level-1 invalidation policy must be set"));
        };

        let invalidation = if enabled {
            let (Some(cache_name), Some(notifier)) = (self.level1_name, self.notifier) else {
                return Err(Error::configuration(
                    "level-1 invalidation requires a level-1 cache name and a notifier",
                ));
            };
            Some(Level1Invalidation { cache_name, notifier })
        } else {
            None
        };

        Ok(LayeredCache {
            level1: self.level1,
            level2: self.level2,
            invalidation,
            _types: PhantomData,
        })
    }
}

impl<K, V, P, F> fmt::Debug for LayeredCacheBuilder<K, V, P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredCacheBuilder")
            .field("invalidate_level1_on_level2_upsert", &self.invalidate_level1_on_level2_upsert)
            .field("level1_name", &self.level1_name)
            .finish_non_exhaustive()
    }
}
