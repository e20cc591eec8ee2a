// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Process-local cache tier backed by moka.
//!
//! This crate provides [`InMemoryCache`], a concurrent in-memory store using moka's
//! `TinyLFU` eviction. Use [`InMemoryCacheBuilder`] to configure capacity, TTL, and
//! TTI without exposing moka types directly.
//!
//! # Quick Start
//!
//! ```
//! use strata_memory::InMemoryCacheBuilder;
//! use strata_tier::{CacheEntry, CacheTier};
//! use std::time::Duration;
//!
//! # futures::executor::block_on(async {
//! let cache = InMemoryCacheBuilder::<String, i32>::new()
//!     .max_capacity(1000)
//!     .time_to_live(Duration::from_secs(300))
//!     .build();
//!
//! cache.insert(&"key".to_string(), CacheEntry::new(42)).await?;
//! let value = cache.get(&"key".to_string()).await?;
//! assert_eq!(*value.unwrap().value(), 42);
//! # Ok::<(), strata_tier::Error>(())
//! # });
//! ```
//!
//! Storing [`ScopedValue`](strata_tier::ScopedValue)s makes the cache a
//! [`ScopedCacheTier`](strata_tier::ScopedCacheTier).

pub mod builder;
pub mod tier;

#[doc(inline)]
pub use builder::{InMemoryCacheBuilder, InMemoryCacheOptions};
#[doc(inline)]
pub use tier::InMemoryCache;
