// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use bitflags::bitflags;

bitflags! {
    /// The cache operations a scope permits.
    ///
    /// `GET` allows a scoped read to consult the store, `SET` allows a scoped
    /// write. `IGNORE_MINIMUM_TIMESTAMP` disables the staleness floor of the
    /// scope, so any stored value counts as a hit.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_scope::CacheMethod;
    ///
    /// let method = CacheMethod::GET | CacheMethod::IGNORE_MINIMUM_TIMESTAMP;
    /// assert!(method.allows_get());
    /// assert!(!method.allows_set());
    /// ```
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct CacheMethod: u8 {
        /// Reads may consult the store.
        const GET = 1 << 0;
        /// Writes may reach the store.
        const SET = 1 << 1;
        /// Reads and writes are both permitted.
        const GET_OR_SET = Self::GET.bits() | Self::SET.bits();
        /// The scope's minimum value timestamp is not enforced.
        const IGNORE_MINIMUM_TIMESTAMP = 1 << 2;
    }
}

impl CacheMethod {
    /// No cache access at all.
    pub const NONE: Self = Self::empty();

    /// Returns `true` if reads may consult the store.
    #[must_use]
    pub fn allows_get(self) -> bool {
        self.contains(Self::GET)
    }

    /// Returns `true` if writes may reach the store.
    #[must_use]
    pub fn allows_set(self) -> bool {
        self.contains(Self::SET)
    }

    /// Returns `true` if the staleness floor is disabled.
    #[must_use]
    pub fn ignores_minimum_timestamp(self) -> bool {
        self.contains(Self::IGNORE_MINIMUM_TIMESTAMP)
    }
}

impl Default for CacheMethod {
    fn default() -> Self {
        Self::GET_OR_SET
    }
}

bitflags! {
    /// What a scoped cache operation actually did.
    ///
    /// A single tier either reads or writes on a given call, so `GET` and `SET`
    /// never appear together for one tier. The aggregate outcome of a layered
    /// operation may combine them, for example when a level-2 hit was promoted
    /// into level 1.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CacheMethodTaken: u8 {
        /// The value was written to the store.
        const SET = 1 << 0;
        /// A fresh value was read from the store.
        const GET = 1 << 1;
        /// The store was consulted but held no acceptable value.
        const GET_MISS = 1 << 2;
    }
}

impl CacheMethodTaken {
    /// The store was not touched.
    pub const NONE: Self = Self::empty();

    /// Returns `true` if a fresh value was read.
    #[must_use]
    pub fn is_hit(self) -> bool {
        self.contains(Self::GET)
    }

    /// Returns `true` if the store was consulted without finding an acceptable value.
    #[must_use]
    pub fn is_miss(self) -> bool {
        self.contains(Self::GET_MISS)
    }

    /// Returns `true` if a value was written.
    #[must_use]
    pub fn is_set(self) -> bool {
        self.contains(Self::SET)
    }
}
