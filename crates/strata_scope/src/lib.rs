// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Call-chain scoped cache directives.
//!
//! A [`CacheDirectives`] value governs three things for every scoped cache call:
//! whether the store may be read, whether it may be written, and how fresh a
//! stored value must be to count as a hit (its *staleness floor*).
//!
//! Directives are arranged on a [`ScopeStack`]. Pushing a frame returns a
//! [`ScopeGuard`]; dropping the guard pops exactly that frame. Frames must be
//! released in strict reverse order of acquisition, and releasing them out of
//! order panics.
//!
//! # Explicit and ambient scopes
//!
//! The primary API is explicit: a caller owns a [`ScopeStack`] and passes
//! [`ScopeStack::current`] down to the cache operations. For call trees where
//! threading a value through every function is impractical, a stack can be
//! installed as the *ambient* scope of a future with [`ScopeStack::scope`] and
//! read back with [`current`]. The ambient scope follows the logical call
//! tree: futures awaited inside the scope observe it, unrelated tasks do not.
//!
//! Ambient frames are pushed with [`with_directives`], which runs its future on
//! a fork of the ambient stack. Concurrent siblings, such as the branches of a
//! `join!`, therefore never see each other's frames.
//!
//! ```
//! use strata_scope::{CacheDirectives, CacheMethod, current, with_directives};
//! # futures::executor::block_on(async {
//!
//! let read_only = CacheDirectives::new(CacheMethod::GET, None);
//! let (left, right) = futures::join!(
//!     with_directives(read_only, async { current() }),
//!     with_directives(CacheDirectives::bypass(), async { current() }),
//! );
//!
//! assert_eq!(left, read_only);
//! assert_eq!(right, CacheDirectives::bypass());
//! assert_eq!(current(), CacheDirectives::default());
//! # });
//! ```

mod directives;
mod error;
mod method;
mod stack;

#[doc(inline)]
pub use directives::{CacheDirectives, HEADER_NAME};
#[doc(inline)]
pub use error::DirectivesError;
#[doc(inline)]
pub use jiff::Timestamp;
#[doc(inline)]
pub use method::{CacheMethod, CacheMethodTaken};
#[doc(inline)]
pub use stack::{ScopeGuard, ScopeStack, current, with_directives};
