// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{ops::Deref, time::SystemTime};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A cached value with associated metadata.
///
/// `CacheEntry` wraps a value with the time it was written to a tier. The
/// write time is tier bookkeeping only; freshness decisions of scoped tiers use
/// the producer timestamp carried by [`ScopedValue`] instead.
///
/// # Examples
///
/// ```
/// use strata_tier::CacheEntry;
///
/// let entry = CacheEntry::new(42);
/// assert_eq!(*entry.value(), 42);
/// assert!(entry.cached_at().is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    cached_at: Option<SystemTime>,
}

impl<V> CacheEntry<V> {
    /// Creates a new cache entry with the given value.
    ///
    /// The write time is set by the tier when the entry is inserted.
    pub fn new(value: V) -> Self {
        Self { value, cached_at: None }
    }

    /// Creates a new cache entry with an explicit write time.
    ///
    /// ```
    /// use std::time::SystemTime;
    /// use strata_tier::CacheEntry;
    ///
    /// let now = SystemTime::now();
    /// let entry = CacheEntry::with_cached_at(42, now);
    /// assert_eq!(entry.cached_at(), Some(now));
    /// ```
    pub fn with_cached_at(value: V, cached_at: SystemTime) -> Self {
        Self {
            value,
            cached_at: Some(cached_at),
        }
    }

    /// Returns the time the entry was written, if known.
    #[must_use]
    pub fn cached_at(&self) -> Option<SystemTime> {
        self.cached_at
    }

    /// Sets the time the entry was written.
    pub fn set_cached_at(&mut self, cached_at: SystemTime) {
        self.cached_at = Some(cached_at);
    }

    /// Sets the write time unless one is already recorded.
    pub fn ensure_cached_at(&mut self, now: SystemTime) {
        self.cached_at.get_or_insert(now);
    }

    /// Consumes the entry and returns the inner value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<V> Deref for CacheEntry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<V> From<V> for CacheEntry<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}

/// A value stored in a scoped tier, tagged with its producer timestamp.
///
/// The timestamp records when the producer created the value, not when it was
/// cached. Scoped reads compare it against the staleness floor of the current
/// [`CacheDirectives`](strata_scope::CacheDirectives).
///
/// # Examples
///
/// ```
/// use strata_scope::Timestamp;
/// use strata_tier::ScopedValue;
///
/// let produced: Timestamp = "2024-05-01T00:00:00Z".parse().unwrap();
/// let value = ScopedValue::new("profile", produced);
/// assert_eq!(value.value_timestamp(), produced);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedValue<V> {
    value: V,
    value_timestamp: Timestamp,
}

impl<V> ScopedValue<V> {
    /// Creates a value produced at `value_timestamp`.
    pub fn new(value: V, value_timestamp: Timestamp) -> Self {
        Self { value, value_timestamp }
    }

    /// Returns the producer timestamp.
    #[must_use]
    pub fn value_timestamp(&self) -> Timestamp {
        self.value_timestamp
    }

    /// Returns a reference to the value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the wrapper and returns the value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Consumes the wrapper and returns the value and its producer timestamp.
    #[must_use]
    pub fn into_parts(self) -> (V, Timestamp) {
        (self.value, self.value_timestamp)
    }
}

impl<V> Deref for ScopedValue<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_cached_at_keeps_existing_time() {
        let earlier = SystemTime::UNIX_EPOCH;
        let mut entry = CacheEntry::with_cached_at(1, earlier);
        entry.ensure_cached_at(SystemTime::now());
        assert_eq!(entry.cached_at(), Some(earlier));

        let mut fresh = CacheEntry::new(2);
        fresh.ensure_cached_at(earlier);
        assert_eq!(fresh.cached_at(), Some(earlier));
    }

    #[test]
    fn scoped_value_serializes_producer_timestamp() {
        let produced: Timestamp = "2024-05-01T00:00:00Z".parse().expect("valid timestamp");
        let value = ScopedValue::new(7_u32, produced);

        let json = serde_json::to_value(&value).expect("serialize failed");
        assert_eq!(json["valueTimestamp"], "2024-05-01T00:00:00Z");

        let back: ScopedValue<u32> = serde_json::from_value(json).expect("deserialize failed");
        assert_eq!(back, value);
    }
}
