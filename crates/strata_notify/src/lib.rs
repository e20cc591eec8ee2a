// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Cross-process invalidation for layered caches.
//!
//! A process that writes to a shared level-2 tier can tell other processes to
//! drop their local level-1 copies. This crate provides the pieces:
//!
//! - [`CacheItemNotification`], the wire message.
//! - [`CacheNotifier`], the publish/subscribe contract, and [`SharedNotifier`],
//!   its type-erased form.
//! - [`MessageBus`] and [`BusNotifier`], an in-process transport.
//! - [`Synchronizer`], which applies incoming notifications to a tier.
//!
//! # Example
//!
//! ```
//! use strata_notify::{BusNotifier, CacheNotifier, MessageBus, NotificationAction, SenderId, SyncOutcome, Synchronizer};
//! use strata_tier::{CacheEntry, CacheTier, testing::MockCache};
//!
//! # futures::executor::block_on(async {
//! let bus = MessageBus::new();
//! let local = MockCache::<String, u32>::new();
//! local.insert(&"42".to_string(), CacheEntry::new(1)).await?;
//!
//! let mut sync = Synchronizer::bind("users", local.clone(), BusNotifier::new(&bus))?;
//!
//! // Another process updates key 42.
//! let remote = BusNotifier::with_sender(&bus, SenderId::random());
//! let _remote_sub = remote.subscribe("users")?;
//! remote.publish("users", Some("42"), NotificationAction::Updated).await?;
//!
//! assert_eq!(sync.drain().await, 1);
//! assert!(!local.contains_key(&"42".to_string()));
//! # Ok::<(), strata_tier::Error>(())
//! # });
//! ```

mod bus;
mod message;
mod notifier;
mod synchronizer;

#[doc(inline)]
pub use bus::{BusNotifier, MessageBus};
#[doc(inline)]
pub use message::{CacheItemNotification, NotificationAction, NotifierEvent, SenderId};
#[doc(inline)]
pub use notifier::{CacheNotifier, SharedNotifier, Subscription};
#[doc(inline)]
pub use synchronizer::{SyncOutcome, Synchronizer, SynchronizerHandle};
