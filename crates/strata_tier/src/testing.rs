// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A scripted cache tier for tests.
//!
//! [`MockCache`] stands in for either level of a layered cache. It keeps a
//! journal of the calls it receives, fails the calls a test selects, and can
//! report itself unreachable the way a remote level-2 tier does during an
//! outage. When it stores [`ScopedValue`]s it also serves scoped reads and
//! writes through the default [`ScopedCacheTier`] methods, so staleness floors
//! and directive gating can be exercised without a real backend.

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use parking_lot::Mutex;

use crate::{CacheEntry, CacheTier, Error, ScopedCacheTier, ScopedValue};

/// One call a [`MockCache`] received, in journal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp<K, V> {
    /// A lookup. Scoped reads show up as lookups too.
    Get(K),
    /// A write. Scoped writes that the directives allowed show up here.
    Insert {
        /// The written key.
        key: K,
        /// The written entry.
        entry: CacheEntry<V>,
    },
    /// A single-key removal.
    Invalidate(K),
    /// A full removal.
    Clear,
}

impl<K, V> CacheOp<K, V> {
    fn label(&self) -> &'static str {
        match self {
            Self::Get(_) => "get",
            Self::Insert { .. } => "insert",
            Self::Invalidate(_) => "invalidate",
            Self::Clear => "clear",
        }
    }
}

type FailureRule<K, V> = Box<dyn Fn(&CacheOp<K, V>) -> bool + Send + Sync>;

struct State<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    journal: Vec<CacheOp<K, V>>,
    failure: Option<FailureRule<K, V>>,
    reachable: bool,
}

/// A cache tier that records its calls and fails on demand.
///
/// Clones are handles to the same tier. A test typically passes one clone
/// into a layered cache and keeps another to seed entries, inject failures,
/// and inspect what the layered cache did to that level.
///
/// # Examples
///
/// Inspecting the calls that reached a level:
///
/// ```
/// use strata_tier::{testing::{MockCache, CacheOp}, CacheTier, CacheEntry};
///
/// # futures::executor::block_on(async {
/// let level2 = MockCache::<String, i32>::new();
///
/// level2.insert(&"key".to_string(), CacheEntry::new(42)).await?;
/// assert_eq!(*level2.get(&"key".to_string()).await?.unwrap().value(), 42);
///
/// assert_eq!(level2.operations(), vec![
///     CacheOp::Insert { key: "key".to_string(), entry: CacheEntry::new(42) },
///     CacheOp::Get("key".to_string()),
/// ]);
/// # Ok::<(), strata_tier::Error>(())
/// # });
/// ```
///
/// Simulating a backend that rejects one key:
///
/// ```
/// use strata_tier::{testing::{MockCache, CacheOp}, CacheTier, ErrorKind};
///
/// # futures::executor::block_on(async {
/// let level2: MockCache<String, i32> = MockCache::new();
///
/// level2.fail_when(|op| matches!(op, CacheOp::Get(k) if k == "forbidden"));
/// let error = level2.get(&"forbidden".to_string()).await.unwrap_err();
/// assert_eq!(error.kind(), ErrorKind::Tier);
/// assert_eq!(level2.get(&"allowed".to_string()).await?, None);
/// # Ok::<(), strata_tier::Error>(())
/// # });
/// ```
pub struct MockCache<K, V> {
    state: Arc<Mutex<State<K, V>>>,
}

impl<K, V> MockCache<K, V> {
    /// Creates an empty, reachable tier.
    #[must_use]
    pub fn new() -> Self {
        Self::seeded(HashMap::new())
    }

    fn seeded(entries: HashMap<K, CacheEntry<V>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries,
                journal: Vec::new(),
                failure: None,
                reachable: true,
            })),
        }
    }

    /// Sets what [`CacheTier::is_active`] reports.
    ///
    /// An unreachable mock still serves calls. Layered caches are expected
    /// to consult `is_active` and skip the level themselves.
    pub fn set_active(&self, active: bool) {
        self.state.lock().reachable = active;
    }

    /// Forgets the failure rule set by [`fail_when`](Self::fail_when).
    pub fn clear_failures(&self) {
        self.state.lock().failure = None;
    }

    /// Empties the call journal, keeping the entries.
    pub fn clear_operations(&self) {
        self.state.lock().journal.clear();
    }

    /// Makes every call for which `rule` returns `true` fail with an
    /// [`ErrorKind::Tier`](crate::ErrorKind::Tier) error.
    ///
    /// Failing calls are journaled and leave the entries untouched.
    pub fn fail_when<F>(&self, rule: F)
    where
        F: Fn(&CacheOp<K, V>) -> bool + Send + Sync + 'static,
    {
        self.state.lock().failure = Some(Box::new(rule));
    }
}

impl<K, V> MockCache<K, V>
where
    K: Eq + Hash,
{
    /// Creates a reachable tier holding `data`.
    #[must_use]
    pub fn with_data(data: HashMap<K, CacheEntry<V>>) -> Self {
        Self::seeded(data)
    }

    /// Returns how many entries the tier holds.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` if `key` has an entry.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    // Journals `op`, then applies `apply` unless the failure rule rejects it.
    fn call<R>(&self, op: CacheOp<K, V>, apply: impl FnOnce(&mut HashMap<K, CacheEntry<V>>) -> R) -> Result<R, Error> {
        let mut state = self.state.lock();
        let rejected = state.failure.as_ref().is_some_and(|rule| rule(&op));
        let label = op.label();
        state.journal.push(op);
        if rejected {
            return Err(Error::tier(format!("mock tier rejected {label}")));
        }
        Ok(apply(&mut state.entries))
    }
}

impl<K, V> MockCache<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Returns the journal of calls received so far.
    #[must_use]
    pub fn operations(&self) -> Vec<CacheOp<K, V>> {
        self.state.lock().journal.clone()
    }
}

impl<K, V> CacheTier<K, V> for MockCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        self.call(CacheOp::Get(key.clone()), |entries| entries.get(key).cloned())
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        let op = CacheOp::Insert {
            key: key.clone(),
            entry: entry.clone(),
        };
        self.call(op, |entries| {
            entries.insert(key.clone(), entry);
        })
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.call(CacheOp::Invalidate(key.clone()), |entries| {
            entries.remove(key);
        })
    }

    async fn clear(&self) -> Result<(), Error> {
        self.call(CacheOp::Clear, HashMap::clear)
    }

    fn len(&self) -> Option<u64> {
        u64::try_from(self.state.lock().entries.len()).ok()
    }

    fn is_active(&self) -> bool {
        self.state.lock().reachable
    }
}

impl<K, V> ScopedCacheTier<K, V> for MockCache<K, ScopedValue<V>>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
}

impl<K, V> Clone for MockCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K, V> Default for MockCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for MockCache<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockCache")
            .field("entries", &state.entries)
            .field("journal", &state.journal)
            .field("failing", &state.failure.is_some())
            .field("active", &state.reachable)
            .finish()
    }
}
