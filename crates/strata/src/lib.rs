// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Name-routed, layered caching with scoped consistency and cross-process invalidation.
//!
//! This crate ties the `strata_*` building blocks together:
//!
//! - [`CacheRegistry`] resolves logical cache names such as `svc.Users.Admin`
//!   to stores and notifiers by longest prefix.
//! - [`LayeredCache`] puts a process-local tier in front of a shared one and
//!   can tell other processes to drop their local copies after a write.
//! - Scoped operations ([`Cache::get_scoped`] and friends) read and write
//!   under the ambient [`CacheDirectives`], so a caller can demand values no
//!   older than a given timestamp for a whole call tree.
//! - [`Cache`] wraps any tier with a name, telemetry, stampede protection and
//!   a [`blocking`](Cache::blocking) facade.
//!
//! # Examples
//!
//! ## Resolving a store by name
//!
//! ```
//! use strata::{Cache, CacheRegistry, DynamicCacheExt, InMemoryCache};
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let registry = CacheRegistry::<String, String>::new();
//! registry.register("svc.Users*", InMemoryCache::new().into_dynamic());
//!
//! let store = registry.resolve("svc.Users.Admin").expect("registered above");
//! let cache = Cache::builder::<String, String>(Clock::new_frozen())
//!     .name("svc.Users.Admin")
//!     .storage(store)
//!     .stampede_protection()
//!     .build();
//!
//! let name = cache
//!     .get_or_insert(&"42".to_string(), || async { Ok::<_, strata::Error>("Ada".to_string()) })
//!     .await?;
//! assert_eq!(name, "Ada");
//! # Ok::<(), strata::Error>(())
//! # });
//! ```
//!
//! ## Reading under a staleness floor
//!
//! ```
//! use strata::{Cache, CacheDirectives, CacheMethod, CacheMethodTaken, ScopedValue, Timestamp, with_directives};
//! use strata_tier::testing::MockCache;
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let cache = Cache::builder::<String, ScopedValue<u32>>(Clock::new_frozen())
//!     .storage(MockCache::new())
//!     .build();
//! let key = "k".to_string();
//! let written: Timestamp = "2024-05-01T10:00:00Z".parse()?;
//! cache.set_scoped(&key, 1, written).await?;
//!
//! let floor: Timestamp = "2024-05-01T11:00:00Z".parse()?;
//! let directives = CacheDirectives::new(CacheMethod::GET, Some(floor));
//! let (taken, value) = with_directives(directives, cache.try_get_scoped(&key)).await?;
//!
//! assert_eq!(taken, CacheMethodTaken::GET_MISS);
//! assert!(value.is_none());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! # Features
//!
//! - `memory` (default): [`InMemoryCache`] and [`CacheBuilder::memory`].
//! - `logs`: per-operation `tracing` events.
//! - `metrics`: per-operation OpenTelemetry metrics.
//! - `test-util`: [`MockCache`] for testing code that uses caches.

mod blocking;
mod builder;
mod cache;
mod layered;
mod matcher;
mod name;
mod options;
mod registry;
mod telemetry;

#[doc(inline)]
pub use blocking::BlockingCache;
#[doc(inline)]
pub use builder::CacheBuilder;
#[doc(inline)]
pub use cache::Cache;
#[doc(inline)]
pub use layered::{LayeredCache, LayeredCacheBuilder, LayeredScopedCache};
#[doc(inline)]
pub use matcher::NameMatcher;
#[doc(inline)]
pub use name::CacheName;
#[doc(inline)]
pub use options::LayeredCacheOptions;
#[doc(inline)]
pub use registry::CacheRegistry;
#[doc(inline)]
pub use strata_lock::{ShardGuard, ShardedKeyLock};
#[cfg(feature = "memory")]
#[doc(inline)]
pub use strata_memory::{InMemoryCache, InMemoryCacheBuilder, InMemoryCacheOptions};
#[doc(inline)]
pub use strata_notify::{
    BusNotifier, CacheItemNotification, CacheNotifier, MessageBus, NotificationAction, NotifierEvent, SenderId, SharedNotifier,
    Subscription, SyncOutcome, Synchronizer, SynchronizerHandle,
};
#[doc(inline)]
pub use strata_scope::{
    CacheDirectives, CacheMethod, CacheMethodTaken, DirectivesError, HEADER_NAME, ScopeGuard, ScopeStack, Timestamp, current,
    with_directives,
};
#[doc(inline)]
pub use strata_tier::{
    CacheEntry, CacheTier, CacheTierExt, DynamicCache, DynamicCacheExt, Error, ErrorKind, Result, ScopedCacheTier,
    ScopedCacheTierExt, ScopedLookup, ScopedValue,
};

#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use strata_tier::testing::{CacheOp, MockCache};
