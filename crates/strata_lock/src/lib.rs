// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Key-based mutual exclusion over a fixed table of lock shards.
//!
//! [`ShardedKeyLock`] bounds the number of locks a process allocates no matter
//! how many distinct keys it guards. A key is hashed onto one of `N` shards and
//! holding a key's lock means holding its shard.
//!
//! ```
//! use std::num::NonZeroUsize;
//! use strata_lock::ShardedKeyLock;
//!
//! let locks = ShardedKeyLock::new(NonZeroUsize::new(64).unwrap());
//!
//! let value = locks.run_exclusive("user:42", || 7 * 6);
//! assert_eq!(value, 42);
//! assert_eq!(locks.lock_number("user:42"), locks.lock_number("user:42"));
//! ```

mod lock;

#[doc(inline)]
pub use lock::{ShardGuard, ShardedKeyLock};
