// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Ambient scope propagation across asynchronous call trees.

use std::time::Duration;

use strata_scope::{CacheDirectives, CacheMethod, ScopeStack, Timestamp, current, with_directives};

async fn nested_reader() -> CacheDirectives {
    tokio::task::yield_now().await;
    current()
}

#[tokio::test]
async fn awaited_children_see_parent_frame() {
    let stack = ScopeStack::new();
    let _frame = stack.set_scope(CacheMethod::GET, None);
    let seen = stack.clone().scope(nested_reader()).await;

    assert_eq!(seen.method, CacheMethod::GET);
}

#[tokio::test]
async fn joined_siblings_under_one_scope_stay_isolated() {
    let stack = ScopeStack::new();
    let _outer = stack.set_scope(CacheMethod::GET_OR_SET, None);

    let (left, right) = stack
        .clone()
        .scope(async {
            tokio::join!(
                with_directives(CacheDirectives::new(CacheMethod::GET, None), async {
                    tokio::task::yield_now().await;
                    let before = current();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    (before, current())
                }),
                with_directives(CacheDirectives::new(CacheMethod::SET, None), async {
                    tokio::task::yield_now().await;
                    current()
                }),
            )
        })
        .await;

    assert_eq!(left.0.method, CacheMethod::GET);
    assert_eq!(left.1.method, CacheMethod::GET);
    assert_eq!(right.method, CacheMethod::SET);
    assert_eq!(stack.depth(), 1);
}

#[tokio::test]
async fn concurrent_siblings_do_not_observe_each_other() {
    let floor: Timestamp = "2024-05-01T00:00:00Z".parse().expect("valid timestamp");

    let left = with_directives(CacheDirectives::new(CacheMethod::GET, Some(floor)), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        current()
    });
    let right = with_directives(CacheDirectives::new(CacheMethod::SET, None), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        current()
    });

    let (left, right) = tokio::join!(left, right);

    assert_eq!(left, CacheDirectives::new(CacheMethod::GET, Some(floor)));
    assert_eq!(right, CacheDirectives::new(CacheMethod::SET, None));
}

#[tokio::test]
async fn nested_directives_inherit_and_restore() {
    let outer = CacheDirectives::new(CacheMethod::GET, None);
    let inner = CacheDirectives::bypass();

    let (during, after) = with_directives(outer, async {
        let during = with_directives(inner, async { current() }).await;
        (during, current())
    })
    .await;

    assert_eq!(during, inner);
    assert_eq!(after, outer);
    assert_eq!(current(), CacheDirectives::default());
}

#[tokio::test]
async fn spawned_task_with_fork_starts_from_parent_directives() {
    let stack = ScopeStack::new();
    let _frame = stack.set_scope(CacheMethod::GET, None);

    let fork = stack.fork();
    let handle = tokio::spawn(fork.scope(async {
        with_directives(CacheDirectives::new(CacheMethod::SET, None), async { current() }).await
    }));

    let child = handle.await.expect("task panicked");
    assert_eq!(child.method, CacheMethod::SET);
    assert_eq!(stack.current().method, CacheMethod::GET);
    assert_eq!(stack.depth(), 1);
}

#[tokio::test]
async fn spawned_task_does_not_inherit_ambient_scope() {
    let stack = ScopeStack::with_base(CacheDirectives::bypass());
    let seen = stack
        .scope(async { tokio::spawn(async { current() }).await.expect("task panicked") })
        .await;

    assert_eq!(seen, CacheDirectives::default());
}
