// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder and options for in-memory caches.
//!
//! The builder abstracts the moka configuration so moka types stay out of
//! the public API. [`InMemoryCacheOptions`] is the serde form of the same
//! settings, for caches declared in configuration.

use std::{hash::Hash, marker::PhantomData, time::Duration};

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};
use strata_tier::Error;

use crate::tier::InMemoryCache;

/// Declarative settings of an [`InMemoryCache`].
///
/// Durations use jiff's friendly or ISO 8601 format, for example `"5m"` or
/// `"PT5M"`.
///
/// ```
/// use strata_memory::InMemoryCacheOptions;
///
/// let options: InMemoryCacheOptions = serde_json::from_str(
///     r#"{ "maxCapacity": 10000, "timeToLive": "5m" }"#,
/// ).unwrap();
/// assert_eq!(options.max_capacity, Some(10_000));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[non_exhaustive]
pub struct InMemoryCacheOptions {
    /// Maximum number of entries; unbounded when absent.
    #[serde(default)]
    pub max_capacity: Option<u64>,
    /// Pre-allocation hint.
    #[serde(default)]
    pub initial_capacity: Option<usize>,
    /// Expiry after insertion.
    #[serde(default)]
    pub time_to_live: Option<SignedDuration>,
    /// Expiry after the last access.
    #[serde(default)]
    pub time_to_idle: Option<SignedDuration>,
}

/// Builder for configuring an `InMemoryCache`.
///
/// # Examples
///
/// ```
/// use strata_memory::InMemoryCache;
/// use std::time::Duration;
///
/// let cache = InMemoryCache::<String, i32>::builder()
///     .max_capacity(1000)
///     .time_to_live(Duration::from_secs(300))
///     .time_to_idle(Duration::from_secs(60))
///     .initial_capacity(100)
///     .name("my-cache")
///     .build();
/// ```
#[derive(Debug)]
pub struct InMemoryCacheBuilder<K, V> {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) time_to_live: Option<Duration>,
    pub(crate) time_to_idle: Option<Duration>,
    pub(crate) name: Option<String>,
    _phantom: PhantomData<(K, V)>,
}

impl<K, V> Default for InMemoryCacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InMemoryCacheBuilder<K, V> {
    /// Creates a builder for an unbounded cache without expiry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_capacity: None,
            initial_capacity: None,
            time_to_live: None,
            time_to_idle: None,
            name: None,
            _phantom: PhantomData,
        }
    }

    /// Creates a builder from declarative options.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Configuration`](strata_tier::ErrorKind::Configuration)
    /// error if the capacity is zero or a duration is zero or negative.
    pub fn from_options(options: &InMemoryCacheOptions) -> Result<Self, Error> {
        if options.max_capacity == Some(0) {
            return Err(Error::configuration("max capacity must be positive"));
        }

        let mut builder = Self::new();
        builder.max_capacity = options.max_capacity;
        builder.initial_capacity = options.initial_capacity;
        builder.time_to_live = options.time_to_live.map(|d| positive(d, "time to live")).transpose()?;
        builder.time_to_idle = options.time_to_idle.map(|d| positive(d, "time to idle")).transpose()?;
        Ok(builder)
    }

    /// Sets the maximum number of entries.
    ///
    /// Once reached, entries are evicted with the `TinyLFU` policy (LRU
    /// eviction combined with LFU admission).
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets the pre-allocation hint. The cache may grow beyond it.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Sets the time-to-live of every entry.
    ///
    /// Expiry is independent of the producer timestamp of scoped values: a
    /// value can expire while still fresh, and stay stored while already stale.
    #[must_use]
    pub fn time_to_live(mut self, duration: Duration) -> Self {
        self.time_to_live = Some(duration);
        self
    }

    /// Sets the time-to-idle of every entry. Each read or write resets it.
    #[must_use]
    pub fn time_to_idle(mut self, duration: Duration) -> Self {
        self.time_to_idle = Some(duration);
        self
    }

    /// Sets the store's debug name.
    ///
    /// The name is unrelated to the logical name a registry resolves the cache under.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured `InMemoryCache`.
    #[must_use]
    pub fn build(self) -> InMemoryCache<K, V>
    where
        K: Clone + Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        InMemoryCache::from_builder(&self)
    }
}

fn positive(duration: SignedDuration, what: &str) -> Result<Duration, Error> {
    if !duration.is_positive() {
        return Err(Error::configuration(format!("{what} must be positive, got {duration}")));
    }
    Duration::try_from(duration).map_err(Error::configuration)
}

#[cfg(test)]
mod tests {
    use strata_tier::ErrorKind;

    use super::*;

    #[test]
    fn options_convert_to_builder() {
        let options = InMemoryCacheOptions {
            max_capacity: Some(10),
            initial_capacity: Some(4),
            time_to_live: Some(SignedDuration::from_mins(5)),
            time_to_idle: None,
        };
        let builder = InMemoryCacheBuilder::<String, u32>::from_options(&options).expect("valid options");

        assert_eq!(builder.max_capacity, Some(10));
        assert_eq!(builder.initial_capacity, Some(4));
        assert_eq!(builder.time_to_live, Some(Duration::from_secs(300)));
        assert_eq!(builder.time_to_idle, None);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let options = InMemoryCacheOptions {
            max_capacity: Some(0),
            ..InMemoryCacheOptions::default()
        };
        let error = InMemoryCacheBuilder::<String, u32>::from_options(&options).expect_err("should fail");
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let options = InMemoryCacheOptions {
            time_to_idle: Some(SignedDuration::from_secs(-1)),
            ..InMemoryCacheOptions::default()
        };
        let error = InMemoryCacheBuilder::<String, u32>::from_options(&options).expect_err("should fail");
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn options_deserialize_friendly_durations() {
        let options: InMemoryCacheOptions =
            serde_json::from_str(r#"{ "timeToLive": "PT5M", "timeToIdle": "30s" }"#).expect("valid json");
        assert_eq!(options.time_to_live, Some(SignedDuration::from_mins(5)));
        assert_eq!(options.time_to_idle, Some(SignedDuration::from_secs(30)));
    }

    #[test]
    fn unknown_option_is_rejected() {
        assert!(serde_json::from_str::<InMemoryCacheOptions>(r#"{ "evictionPolicy": "lru" }"#).is_err());
    }
}
