// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use dashmap::DashMap;

use crate::CacheName;

/// Longest-prefix resolution of cache names to handles.
///
/// Each registration is a [`CacheName`] mapped to a handle. Resolving a query
/// picks the matching registration with the longest prefix; when an exact name
/// and a wildcard share that prefix, the exact name wins. The universal
/// wildcard matches everything but ranks below any other match.
///
/// Registrations live in a concurrent map. [`resolve`](Self::resolve) copies
/// the registrations out before comparing, so lookups never hold a lock while
/// scanning and writers are never blocked for the length of a scan.
///
/// # Examples
///
/// ```
/// use strata::NameMatcher;
///
/// let matcher = NameMatcher::new();
/// matcher.register("a*", 1);
/// matcher.register("ab*", 2);
/// matcher.register("ab", 3);
///
/// assert_eq!(matcher.resolve("ab"), Some(3));
/// assert_eq!(matcher.resolve("abc"), Some(2));
/// assert_eq!(matcher.resolve("axyz"), Some(1));
/// assert_eq!(matcher.resolve("zzz"), None);
/// ```
pub struct NameMatcher<H> {
    entries: DashMap<CacheName, H>,
}

impl<H> NameMatcher<H> {
    /// Creates an empty matcher.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers `handle` under `name`, returning the handle it replaced.
    pub fn register(&self, name: &str, handle: H) -> Option<H> {
        self.entries.insert(CacheName::parse(name), handle)
    }

    /// Removes the registration for `name`, returning its handle.
    pub fn unregister(&self, name: &str) -> Option<H> {
        self.entries.remove(&CacheName::parse(name)).map(|(_, handle)| handle)
    }

    /// Registers `handle` under `name`, or removes the registration when `handle` is `None`.
    pub fn replace(&self, name: &str, handle: Option<H>) -> Option<H> {
        match handle {
            Some(handle) => self.register(name, handle),
            None => self.unregister(name),
        }
    }

    /// Returns every registered name, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<CacheName> {
        let mut names: Vec<_> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

impl<H> NameMatcher<H>
where
    H: Clone,
{
    /// Returns the handle of the best registration matching `query`.
    #[must_use]
    pub fn resolve(&self, query: &str) -> Option<H> {
        self.resolve_entry(query).map(|(_, handle)| handle)
    }

    /// Returns the best registration matching `query` together with its name.
    #[must_use]
    pub fn resolve_entry(&self, query: &str) -> Option<(CacheName, H)> {
        let snapshot: Vec<(CacheName, H)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        snapshot
            .into_iter()
            .filter_map(|(name, handle)| {
                let level = name.match_level(query)?;
                let rank = (level, name.is_exact(query));
                Some((rank, name, handle))
            })
            .max_by(|(a, ..), (b, ..)| a.cmp(b))
            .map(|(_, name, handle)| (name, handle))
    }
}

impl<H> Default for NameMatcher<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for NameMatcher<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameMatcher").field("names", &self.names()).finish()
    }
}
