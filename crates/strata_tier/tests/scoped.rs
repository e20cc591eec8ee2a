// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Scoped reads and writes driven by a directives stack.

use futures::executor::block_on;
use jiff::{SignedDuration, Timestamp};
use strata_scope::{CacheMethod, CacheMethodTaken, ScopeStack};
use strata_tier::{Error, ScopedCacheTier, ScopedCacheTierExt, ScopedValue, testing::MockCache};

fn t0() -> Timestamp {
    "2024-05-01T12:00:00Z".parse().expect("valid timestamp")
}

fn hours(n: i64) -> SignedDuration {
    SignedDuration::from_hours(n)
}

#[test]
fn value_older_than_floor_is_a_miss_until_floor_is_relaxed() {
    block_on(async {
        let tier = MockCache::<String, ScopedValue<&str>>::new();
        let stack = ScopeStack::new();
        let key = "profile".to_string();
        let produced = t0() - hours(1);

        {
            let frame = stack.set_scope(CacheMethod::GET_OR_SET, Some(t0() - hours(2)));
            let (taken, _) = tier
                .get_scoped(&key, frame.directives(), || async { Ok::<_, Error>(ScopedValue::new("v1", produced)) })
                .await
                .expect("get_scoped failed");
            assert_eq!(taken, CacheMethodTaken::GET_MISS | CacheMethodTaken::SET);
        }

        {
            let _strict = stack.set_scope(CacheMethod::GET, Some(t0()));
            let (taken, value) = tier.try_get_scoped(&key, stack.current()).await.expect("get failed");
            assert_eq!(taken, CacheMethodTaken::GET_MISS);
            assert!(value.is_none());
            assert!(tier.contains_key(&key), "stale value stays stored");
        }

        {
            let _relaxed = stack.set_scope(CacheMethod::GET, Some(t0() - hours(2)));
            let (taken, value) = tier.try_get_scoped(&key, stack.current()).await.expect("get failed");
            assert_eq!(taken, CacheMethodTaken::GET);
            assert_eq!(value.map(ScopedValue::into_value), Some("v1"));
        }

        assert_eq!(stack.depth(), 0);
    });
}

#[test]
fn stale_hit_is_refreshed_by_getter() {
    block_on(async {
        let tier = MockCache::<String, ScopedValue<u32>>::new();
        let stack = ScopeStack::new();
        let key = "k".to_string();

        tier.set_scoped(&key, ScopedValue::new(1, t0() - hours(3)), stack.current())
            .await
            .expect("set failed");

        let _frame = stack.set_scope(CacheMethod::GET_OR_SET, Some(t0()));
        let (taken, value) = tier
            .get_scoped(&key, stack.current(), || async { Ok::<_, Error>(ScopedValue::new(2, t0())) })
            .await
            .expect("get_scoped failed");

        assert_eq!(taken, CacheMethodTaken::GET_MISS | CacheMethodTaken::SET);
        assert_eq!(*value.value(), 2);

        let (taken, value) = tier.try_get_scoped(&key, stack.current()).await.expect("get failed");
        assert_eq!(taken, CacheMethodTaken::GET);
        assert_eq!(value.map(ScopedValue::into_value), Some(2));
    });
}

#[test]
fn read_only_scope_returns_fresh_value_without_writing() {
    block_on(async {
        let tier = MockCache::<String, ScopedValue<u32>>::new();
        let stack = ScopeStack::new();
        let key = "k".to_string();

        let _frame = stack.set_scope(CacheMethod::GET, None);
        let (taken, value) = tier
            .get_scoped(&key, stack.current(), || async { Ok::<_, Error>(ScopedValue::new(5, t0())) })
            .await
            .expect("get_scoped failed");

        assert_eq!(taken, CacheMethodTaken::GET_MISS);
        assert_eq!(*value.value(), 5);
        assert_eq!(tier.entry_count(), 0);
    });
}
