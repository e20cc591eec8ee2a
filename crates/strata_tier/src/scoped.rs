// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The timestamp-gated consistency protocol for scoped tiers.
//!
//! A scoped tier stores [`ScopedValue`]s. Whether a scoped read may consult the
//! tier, whether a scoped write may reach it, and how fresh a hit must be are
//! all decided by the [`CacheDirectives`] of the calling scope. Every scoped
//! operation reports what it actually did as a [`CacheMethodTaken`].

use std::sync::Arc;

use strata_scope::{CacheDirectives, CacheMethodTaken};

use crate::{CacheEntry, CacheTier, Error, ScopedValue};

/// The outcome of a scoped read: what the tier did, and the fresh value if one was found.
pub type ScopedLookup<V> = (CacheMethodTaken, Option<ScopedValue<V>>);

/// A tier that stores [`ScopedValue`]s and honors [`CacheDirectives`].
///
/// The provided methods implement the protocol on top of [`CacheTier`], so a
/// store only has to opt in:
///
/// ```
/// use strata_tier::{ScopedCacheTier, ScopedValue, testing::MockCache};
///
/// fn assert_scoped<T: ScopedCacheTier<String, u32>>(_: &T) {}
///
/// assert_scoped(&MockCache::<String, ScopedValue<u32>>::new());
/// ```
///
/// Composite tiers override both methods to thread the directives through
/// their parts.
pub trait ScopedCacheTier<K, V>: CacheTier<K, ScopedValue<V>>
where
    K: Sync,
    V: Send,
{
    /// Reads a value if the directives permit it and the value is fresh enough.
    ///
    /// - Reads disabled: [`CacheMethodTaken::NONE`], the tier is not consulted.
    /// - Value absent, or older than the staleness floor: [`CacheMethodTaken::GET_MISS`].
    /// - Otherwise: [`CacheMethodTaken::GET`] and the value.
    fn try_get_scoped(
        &self,
        key: &K,
        directives: CacheDirectives,
    ) -> impl Future<Output = Result<ScopedLookup<V>, Error>> + Send {
        async move {
            if !directives.allows_get() {
                return Ok((CacheMethodTaken::NONE, None));
            }
            let stored = self.get(key).await?.map(CacheEntry::into_value);
            Ok(evaluate(stored, &directives))
        }
    }

    /// Writes a value if the directives permit it.
    ///
    /// The write is unconditional: an existing value is replaced regardless of
    /// its timestamp. Returns [`CacheMethodTaken::SET`] when written and
    /// [`CacheMethodTaken::NONE`] when writes are disabled.
    fn set_scoped(
        &self,
        key: &K,
        value: ScopedValue<V>,
        directives: CacheDirectives,
    ) -> impl Future<Output = Result<CacheMethodTaken, Error>> + Send {
        async move {
            if !directives.allows_set() {
                return Ok(CacheMethodTaken::NONE);
            }
            self.insert(key, CacheEntry::new(value)).await?;
            Ok(CacheMethodTaken::SET)
        }
    }
}

impl<K, V, T> ScopedCacheTier<K, V> for Arc<T>
where
    K: Sync,
    V: Send,
    T: ScopedCacheTier<K, V>,
{
    fn try_get_scoped(
        &self,
        key: &K,
        directives: CacheDirectives,
    ) -> impl Future<Output = Result<ScopedLookup<V>, Error>> + Send {
        <T as ScopedCacheTier<K, V>>::try_get_scoped(self, key, directives)
    }

    fn set_scoped(
        &self,
        key: &K,
        value: ScopedValue<V>,
        directives: CacheDirectives,
    ) -> impl Future<Output = Result<CacheMethodTaken, Error>> + Send {
        <T as ScopedCacheTier<K, V>>::set_scoped(self, key, value, directives)
    }
}

/// Classifies a stored value against the staleness floor of `directives`.
///
/// Assumes reads are permitted; callers check [`CacheDirectives::allows_get`] first.
///
/// ```
/// use strata_scope::{CacheDirectives, CacheMethod, CacheMethodTaken, Timestamp};
/// use strata_tier::{ScopedValue, evaluate};
///
/// let floor: Timestamp = "2024-05-01T00:00:00Z".parse().unwrap();
/// let directives = CacheDirectives::new(CacheMethod::GET, Some(floor));
/// let stale = ScopedValue::new(1, "2024-04-01T00:00:00Z".parse().unwrap());
///
/// let (taken, value) = evaluate(Some(stale), &directives);
/// assert_eq!(taken, CacheMethodTaken::GET_MISS);
/// assert!(value.is_none());
/// ```
#[must_use]
pub fn evaluate<V>(stored: Option<ScopedValue<V>>, directives: &CacheDirectives) -> ScopedLookup<V> {
    match stored {
        Some(value) if directives.accepts(value.value_timestamp()) => (CacheMethodTaken::GET, Some(value)),
        _ => (CacheMethodTaken::GET_MISS, None),
    }
}
