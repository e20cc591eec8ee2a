// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Store contracts and the consistency protocol for layered caches.
//!
//! This crate defines the [`CacheTier`] trait that all cache backends satisfy,
//! along with [`CacheEntry`] for storing values with metadata and [`Error`] for
//! fallible operations.
//!
//! Tiers that store [`ScopedValue`]s, values tagged with a producer timestamp,
//! additionally implement [`ScopedCacheTier`]. Its provided methods gate reads
//! and writes by the caller's [`CacheDirectives`](strata_scope::CacheDirectives)
//! and treat values older than the directives' staleness floor as misses.
//!
//! # Implementing a Cache Tier
//!
//! Implement all required methods of [`CacheTier`]:
//!
//! ```
//! use strata_tier::{CacheEntry, CacheTier, Error, ScopedCacheTier, ScopedValue};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//!
//! struct SimpleCache<K, V>(RwLock<HashMap<K, CacheEntry<V>>>);
//!
//! impl<K, V> CacheTier<K, V> for SimpleCache<K, V>
//! where
//!     K: Clone + Eq + std::hash::Hash + Send + Sync,
//!     V: Clone + Send + Sync,
//! {
//!     async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.clone(), entry);
//!         Ok(())
//!     }
//!
//!     async fn invalidate(&self, key: &K) -> Result<(), Error> {
//!         self.0.write().unwrap().remove(key);
//!         Ok(())
//!     }
//!
//!     async fn clear(&self) -> Result<(), Error> {
//!         self.0.write().unwrap().clear();
//!         Ok(())
//!     }
//! }
//!
//! // Opt into the scoped protocol for timestamped values.
//! impl<K, V> ScopedCacheTier<K, V> for SimpleCache<K, ScopedValue<V>>
//! where
//!     K: Clone + Eq + std::hash::Hash + Send + Sync,
//!     V: Clone + Send + Sync,
//! {
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! Enable the `dynamic-cache` feature for [`DynamicCache`], which wraps any `CacheTier`
//! in a type-erased container so registries can hold heterogeneous stores.

mod entry;
pub mod error;
mod ext;
mod scoped;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
pub(crate) mod tier;

#[cfg(any(test, feature = "dynamic-cache"))]
mod dynamic;

#[cfg(any(test, feature = "dynamic-cache"))]
#[doc(inline)]
pub use dynamic::{DynamicCache, DynamicCacheExt};
#[doc(inline)]
pub use entry::{CacheEntry, ScopedValue};
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use ext::{CacheTierExt, ScopedCacheTierExt};
#[doc(inline)]
pub use scoped::{ScopedCacheTier, ScopedLookup, evaluate};
#[doc(inline)]
pub use tier::CacheTier;
