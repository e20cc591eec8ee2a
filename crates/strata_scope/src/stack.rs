// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::Arc};

use jiff::Timestamp;
use parking_lot::Mutex;

use crate::{CacheDirectives, CacheMethod};

tokio::task_local! {
    static AMBIENT_SCOPE: ScopeStack;
}

#[derive(Debug)]
struct Frame {
    id: u64,
    directives: CacheDirectives,
}

#[derive(Debug)]
struct StackState {
    base: CacheDirectives,
    frames: Vec<Frame>,
    next_id: u64,
}

/// A strictly nested stack of [`CacheDirectives`] frames.
///
/// `ScopeStack` is a cheap handle: clones share the same frames. Use
/// [`fork`](Self::fork) to start an independent stack for a concurrent
/// sibling operation; the fork begins at the current directives of its parent
/// but frames pushed on either side stay invisible to the other.
///
/// When no frame is active, [`current`](Self::current) returns the stack's
/// base directives, which default to [`CacheDirectives::default`].
///
/// # Examples
///
/// ```
/// use strata_scope::{CacheMethod, ScopeStack};
///
/// let stack = ScopeStack::new();
/// let outer = stack.set_scope(CacheMethod::GET_OR_SET, None);
/// let inner = stack.set_scope(CacheMethod::GET, None);
/// assert_eq!(stack.current().method, CacheMethod::GET);
///
/// drop(inner);
/// drop(outer);
/// assert_eq!(stack.depth(), 0);
/// ```
#[derive(Clone)]
pub struct ScopeStack {
    state: Arc<Mutex<StackState>>,
}

impl ScopeStack {
    /// Creates an empty stack whose base directives are the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base(CacheDirectives::default())
    }

    /// Creates an empty stack with the given base directives.
    #[must_use]
    pub fn with_base(base: CacheDirectives) -> Self {
        Self {
            state: Arc::new(Mutex::new(StackState {
                base,
                frames: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Returns the directives of the innermost active frame, or the base directives.
    #[must_use]
    pub fn current(&self) -> CacheDirectives {
        let state = self.state.lock();
        state.frames.last().map_or(state.base, |frame| frame.directives)
    }

    /// Returns the number of active frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Pushes a frame built from a method and an optional staleness floor.
    #[must_use = "the frame is popped as soon as the guard is dropped"]
    pub fn set_scope(&self, method: CacheMethod, minimum_value_timestamp: Option<Timestamp>) -> ScopeGuard {
        self.push(CacheDirectives::new(method, minimum_value_timestamp))
    }

    /// Pushes a frame and returns the guard that pops it.
    #[must_use = "the frame is popped as soon as the guard is dropped"]
    pub fn push(&self, directives: CacheDirectives) -> ScopeGuard {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.frames.push(Frame { id, directives });
        ScopeGuard {
            stack: self.clone(),
            id,
            directives,
        }
    }

    /// Creates an independent stack whose base is this stack's current directives.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self::with_base(self.current())
    }

    /// Returns a [`fork`](Self::fork) of the ambient stack of the running task, if one is installed.
    ///
    /// The ambient stack itself is never handed out: futures joined under the
    /// same scope would otherwise push onto one shared stack and observe each
    /// other's frames. Frames pushed on the returned stack only take effect
    /// once it is installed with [`scope`](Self::scope). To run a future under
    /// extra directives, prefer [`with_directives`].
    #[must_use]
    pub fn fork_ambient() -> Option<Self> {
        AMBIENT_SCOPE.try_with(Self::fork).ok()
    }

    /// Runs `future` with this stack installed as the ambient scope.
    ///
    /// Every future awaited inside `future` observes the stack through
    /// [`ScopeStack::ambient`] and [`current`](crate::current). Tasks spawned from
    /// inside do not inherit it; hand them a [`fork`](Self::fork) instead.
    pub async fn scope<F>(self, future: F) -> F::Output
    where
        F: Future,
    {
        AMBIENT_SCOPE.scope(self, future).await
    }

    /// Runs `f` synchronously with this stack installed as the ambient scope.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        AMBIENT_SCOPE.sync_scope(self, f)
    }

    fn pop(&self, id: u64) {
        let in_order = {
            let mut state = self.state.lock();
            match state.frames.iter().rposition(|frame| frame.id == id) {
                Some(position) if position + 1 == state.frames.len() => {
                    state.frames.pop();
                    true
                }
                Some(position) if std::thread::panicking() => {
                    // Already unwinding: drop the frame without raising a second panic.
                    state.frames.remove(position);
                    true
                }
                Some(_) => false,
                None => true,
            }
        };

        assert!(in_order, "cache scope frame {id} disposed out of order");
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ScopeStack")
            .field("base", &state.base)
            .field("depth", &state.frames.len())
            .finish()
    }
}

/// Keeps one [`ScopeStack`] frame active.
///
/// Dropping the guard pops the frame. Guards of the same stack must be dropped
/// in reverse order of creation; dropping a guard while a newer frame is still
/// active panics, because the newer frame's directives would otherwise leak
/// into the outer caller.
#[derive(Debug)]
pub struct ScopeGuard {
    stack: ScopeStack,
    id: u64,
    directives: CacheDirectives,
}

impl ScopeGuard {
    /// Returns the directives this frame pushed.
    #[must_use]
    pub fn directives(&self) -> CacheDirectives {
        self.directives
    }

    /// Pops the frame. Equivalent to dropping the guard.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.stack.pop(self.id);
    }
}

/// Returns the current directives of the ambient scope, or the defaults when none is installed.
#[must_use]
pub fn current() -> CacheDirectives {
    AMBIENT_SCOPE.try_with(ScopeStack::current).unwrap_or_default()
}

/// Runs `future` under `directives`, nested inside the ambient scope.
///
/// The future gets a fresh fork of the ambient stack (or a new stack when none
/// is installed) with `directives` pushed on top, so concurrent calls never
/// share frames.
///
/// # Examples
///
/// ```
/// use strata_scope::{CacheDirectives, CacheMethod, current, with_directives};
/// # futures::executor::block_on(async {
///
/// let seen = with_directives(CacheDirectives::bypass(), async { current() }).await;
/// assert_eq!(seen.method, CacheMethod::NONE);
/// # });
/// ```
pub async fn with_directives<F>(directives: CacheDirectives, future: F) -> F::Output
where
    F: Future,
{
    let stack = ScopeStack::fork_ambient().unwrap_or_default();
    let frame = stack.push(directives);
    let output = stack.clone().scope(future).await;
    frame.dispose();
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_reports_base() {
        let stack = ScopeStack::new();
        assert_eq!(stack.current(), CacheDirectives::default());
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn innermost_frame_wins() {
        let stack = ScopeStack::new();
        let _a = stack.set_scope(CacheMethod::GET_OR_SET, None);
        let _b = stack.set_scope(CacheMethod::SET, None);
        assert_eq!(stack.current().method, CacheMethod::SET);
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn frames_pop_in_reverse_order() {
        let stack = ScopeStack::new();
        let a = stack.set_scope(CacheMethod::GET, None);
        let b = stack.set_scope(CacheMethod::SET, None);
        let c = stack.set_scope(CacheMethod::NONE, None);

        c.dispose();
        assert_eq!(stack.current().method, CacheMethod::SET);
        b.dispose();
        assert_eq!(stack.current().method, CacheMethod::GET);
        a.dispose();
        assert_eq!(stack.current(), CacheDirectives::default());
    }

    #[test]
    #[should_panic(expected = "disposed out of order")]
    fn disposing_out_of_order_panics() {
        let stack = ScopeStack::new();
        let _a = stack.set_scope(CacheMethod::GET, None);
        let b = stack.set_scope(CacheMethod::SET, None);
        let _c = stack.set_scope(CacheMethod::NONE, None);
        drop(b);
    }

    #[test]
    fn clones_share_frames() {
        let stack = ScopeStack::new();
        let alias = stack.clone();
        let _frame = stack.set_scope(CacheMethod::GET, None);
        assert_eq!(alias.current().method, CacheMethod::GET);
    }

    #[test]
    fn fork_is_isolated_from_parent() {
        let parent = ScopeStack::new();
        let _outer = parent.set_scope(CacheMethod::GET, None);
        let child = parent.fork();
        assert_eq!(child.current().method, CacheMethod::GET);

        let _inner = child.set_scope(CacheMethod::SET, None);
        assert_eq!(child.current().method, CacheMethod::SET);
        assert_eq!(parent.current().method, CacheMethod::GET);
        assert_eq!(parent.depth(), 1);
    }

    #[test]
    fn current_without_ambient_scope_is_default() {
        assert_eq!(current(), CacheDirectives::default());
        assert!(ScopeStack::fork_ambient().is_none());
    }

    #[test]
    fn ambient_fork_does_not_alias_installed_stack() {
        let stack = ScopeStack::new();
        let _outer = stack.set_scope(CacheMethod::GET, None);

        stack.clone().sync_scope(|| {
            let fork = ScopeStack::fork_ambient().expect("ambient stack installed");
            assert_eq!(fork.current().method, CacheMethod::GET);

            let _inner = fork.set_scope(CacheMethod::SET, None);
            assert_eq!(current().method, CacheMethod::GET);
        });
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn sync_scope_installs_ambient_stack() {
        let stack = ScopeStack::with_base(CacheDirectives::bypass());
        let seen = stack.sync_scope(current);
        assert_eq!(seen, CacheDirectives::bypass());
    }
}
