// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt,
    hash::{Hash, Hasher},
    num::NonZeroUsize,
};

use tokio::sync::{Mutex, MutexGuard};
use xxhash_rust::xxh3::Xxh3;

tokio::task_local! {
    // Shards held by `run_exclusive_async` frames of the current task, as (table address, shard).
    static HELD: Vec<(usize, usize)>;
}

/// A fixed table of mutexes that keys hash onto.
///
/// Exclusion is per shard, not per key: two keys that map to the same shard
/// serialize with each other. Callers that need strict per-key exclusion must
/// not rely on this type alone.
///
/// The shards are async-aware mutexes, so a guard may be held across `.await`
/// points. The blocking methods must not be called from inside an asynchronous
/// execution context.
///
/// The mutexes are not reentrant. Taking a shard the current task already
/// holds through [`take`](Self::take) or [`take_blocking`](Self::take_blocking)
/// waits forever. [`run_exclusive_async`](Self::run_exclusive_async) tracks the
/// shards held by the task it runs on and lets nested calls through. Work
/// spawned onto another task does not inherit that tracking.
pub struct ShardedKeyLock {
    shards: Box<[Mutex<()>]>,
}

impl ShardedKeyLock {
    /// Creates a table of `shards` unlocked mutexes.
    #[must_use]
    pub fn new(shards: NonZeroUsize) -> Self {
        Self {
            shards: (0..shards.get()).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Returns the number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the shard `key` maps to.
    ///
    /// The result depends only on the key and the shard count.
    #[must_use]
    pub fn lock_number<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        let mut hasher = Xxh3::new();
        key.hash(&mut hasher);
        let count = self.shards.len() as u64;
        usize::try_from(hasher.finish() % count).unwrap_or_default()
    }

    /// Takes the shard of `key`, blocking the current thread while it is held elsewhere.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an asynchronous execution context.
    pub fn take_blocking<Q>(&self, key: &Q) -> ShardGuard<'_>
    where
        Q: Hash + ?Sized,
    {
        let shard = self.lock_number(key);
        ShardGuard {
            shard,
            _guard: self.shards[shard].blocking_lock(),
        }
    }

    /// Takes the shard of `key`, yielding while it is held elsewhere.
    pub async fn take<Q>(&self, key: &Q) -> ShardGuard<'_>
    where
        Q: Hash + ?Sized,
    {
        let shard = self.lock_number(key);
        ShardGuard {
            shard,
            _guard: self.shards[shard].lock().await,
        }
    }

    /// Takes the shard of `key` if it is free.
    pub fn try_take<Q>(&self, key: &Q) -> Option<ShardGuard<'_>>
    where
        Q: Hash + ?Sized,
    {
        let shard = self.lock_number(key);
        self.shards[shard]
            .try_lock()
            .ok()
            .map(|guard| ShardGuard { shard, _guard: guard })
    }

    /// Runs `f` while holding the shard of `key`.
    ///
    /// The shard is released when `f` returns or unwinds.
    pub fn run_exclusive<Q, R>(&self, key: &Q, f: impl FnOnce() -> R) -> R
    where
        Q: Hash + ?Sized,
    {
        let _guard = self.take_blocking(key);
        f()
    }

    /// Runs the future produced by `f` while holding the shard of `key`.
    ///
    /// The shard is released when the future completes, panics, or is dropped.
    ///
    /// A call made from inside `f` on the same task, for a key on a shard this
    /// task already holds, runs its future directly instead of waiting on
    /// itself.
    pub async fn run_exclusive_async<Q, F, Fut>(&self, key: &Q, f: F) -> Fut::Output
    where
        Q: Hash + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let held = (self.shards.as_ptr().addr(), self.lock_number(key));
        if HELD.try_with(|shards| shards.contains(&held)).unwrap_or(false) {
            return f().await;
        }

        let _guard = self.take(key).await;
        let mut shards = HELD.try_with(Clone::clone).unwrap_or_default();
        shards.push(held);
        HELD.scope(shards, async move { f().await }).await
    }

    /// Returns `true` if the current task holds the shard of `key` through
    /// [`run_exclusive_async`](Self::run_exclusive_async).
    #[must_use]
    pub fn is_held_by_current_task<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + ?Sized,
    {
        let held = (self.shards.as_ptr().addr(), self.lock_number(key));
        HELD.try_with(|shards| shards.contains(&held)).unwrap_or(false)
    }
}

impl fmt::Debug for ShardedKeyLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedKeyLock").field("shards", &self.shards.len()).finish()
    }
}

/// Holds one shard of a [`ShardedKeyLock`]; dropping it releases the shard.
#[derive(Debug)]
pub struct ShardGuard<'a> {
    shard: usize,
    _guard: MutexGuard<'a, ()>,
}

impl ShardGuard<'_> {
    /// Returns the index of the held shard.
    #[must_use]
    pub fn shard(&self) -> usize {
        self.shard
    }

    /// Releases the shard. Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}
