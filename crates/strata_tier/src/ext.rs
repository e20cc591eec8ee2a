// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Getter-based operations available on every tier.

use strata_scope::{CacheDirectives, CacheMethodTaken};

use crate::{CacheEntry, CacheTier, Error, ScopedCacheTier, ScopedValue};

/// "Compute once, serve many" on top of any [`CacheTier`].
///
/// Implemented for every tier.
pub trait CacheTierExt<K, V>: CacheTier<K, V> {
    /// Returns the cached value for `key`, if any.
    fn try_get(&self, key: &K) -> impl Future<Output = Result<Option<V>, Error>> + Send
    where
        K: Sync,
    {
        async move { Ok(self.get(key).await?.map(CacheEntry::into_value)) }
    }

    /// Returns the cached value for `key`, calling `getter` and caching its result on a miss.
    ///
    /// The getter is called at most once. Its error is returned unchanged and
    /// nothing is cached; tier errors are converted into the getter's error type.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_tier::{CacheTierExt, Error, testing::MockCache};
    ///
    /// # futures::executor::block_on(async {
    /// let tier = MockCache::<String, u32>::new();
    /// let key = "k".to_string();
    ///
    /// let first = tier.get_or_insert(&key, || async { Ok::<_, Error>(1) }).await?;
    /// let second = tier.get_or_insert(&key, || async { Ok::<_, Error>(2) }).await?;
    /// assert_eq!((first, second), (1, 1));
    /// # Ok::<(), Error>(())
    /// # });
    /// ```
    fn get_or_insert<E, F, Fut>(&self, key: &K, getter: F) -> impl Future<Output = Result<V, E>> + Send
    where
        K: Sync,
        V: Clone + Send,
        E: From<Error>,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        async move {
            if let Some(entry) = self.get(key).await? {
                return Ok(entry.into_value());
            }
            let value = getter().await?;
            self.insert(key, CacheEntry::new(value.clone())).await?;
            Ok(value)
        }
    }
}

impl<K, V, T> CacheTierExt<K, V> for T where T: CacheTier<K, V> + ?Sized {}

/// Getter-based scoped reads on top of any [`ScopedCacheTier`].
///
/// Implemented for every scoped tier.
pub trait ScopedCacheTierExt<K, V>: ScopedCacheTier<K, V>
where
    K: Sync,
    V: Send,
{
    /// Returns a fresh value for `key`, producing and storing one on a miss.
    ///
    /// On a fresh hit the outcome is [`CacheMethodTaken::GET`] and `getter` is
    /// not called. Otherwise (absent, stale, or reads disabled) `getter` is
    /// called exactly once, its value is offered to
    /// [`set_scoped`](ScopedCacheTier::set_scoped), and the outcome is
    /// [`CacheMethodTaken::GET_MISS`] plus [`CacheMethodTaken::SET`] if the
    /// value was written.
    ///
    /// A getter error is returned unchanged and nothing is written.
    fn get_scoped<E, F, Fut>(
        &self,
        key: &K,
        directives: CacheDirectives,
        getter: F,
    ) -> impl Future<Output = Result<(CacheMethodTaken, ScopedValue<V>), E>> + Send
    where
        V: Clone,
        E: From<Error>,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<ScopedValue<V>, E>> + Send,
    {
        async move {
            if let (taken, Some(value)) = self.try_get_scoped(key, directives).await? {
                return Ok((taken, value));
            }
            let value = getter().await?;
            let written = self.set_scoped(key, value.clone(), directives).await?;
            Ok((CacheMethodTaken::GET_MISS | written, value))
        }
    }
}

impl<K, V, T> ScopedCacheTierExt<K, V> for T
where
    K: Sync,
    V: Send,
    T: ScopedCacheTier<K, V> + ?Sized,
{
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::executor::block_on;
    use strata_scope::{CacheMethod, Timestamp};

    use super::*;
    use crate::testing::{CacheOp, MockCache};

    fn ts(s: &str) -> Timestamp {
        s.parse().expect("valid timestamp")
    }

    #[test]
    fn get_or_insert_calls_getter_once() {
        block_on(async {
            let tier = MockCache::<String, u32>::new();
            let calls = AtomicU32::new(0);
            let key = "k".to_string();

            for _ in 0..3 {
                let value = tier
                    .get_or_insert(&key, || async {
                        calls.fetch_add(1, Ordering::Relaxed);
                        Ok::<_, Error>(9)
                    })
                    .await
                    .expect("get_or_insert failed");
                assert_eq!(value, 9);
            }

            assert_eq!(calls.load(Ordering::Relaxed), 1);
        });
    }

    #[test]
    fn getter_error_is_not_cached() {
        block_on(async {
            let tier = MockCache::<String, u32>::new();
            let key = "k".to_string();

            let result = tier.get_or_insert(&key, || async { Err::<u32, _>(Error::tier("upstream down")) }).await;

            assert!(result.is_err());
            assert!(!tier.contains_key(&key));
        });
    }

    #[test]
    fn try_get_unwraps_entry() {
        block_on(async {
            let tier = MockCache::<String, u32>::new();
            let key = "k".to_string();
            assert_eq!(tier.try_get(&key).await.expect("get failed"), None);

            tier.insert(&key, CacheEntry::new(4)).await.expect("insert failed");
            assert_eq!(tier.try_get(&key).await.expect("get failed"), Some(4));
        });
    }

    #[test]
    fn get_scoped_hit_skips_getter() {
        block_on(async {
            let tier = MockCache::<String, ScopedValue<u32>>::new();
            let key = "k".to_string();
            let stored = ScopedValue::new(1, ts("2024-05-01T00:00:00Z"));
            tier.insert(&key, CacheEntry::new(stored.clone())).await.expect("insert failed");

            let calls = AtomicU32::new(0);

            let (taken, value) = tier
                .get_scoped(&key, CacheDirectives::default(), || async {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok::<_, Error>(ScopedValue::new(0, Timestamp::UNIX_EPOCH))
                })
                .await
                .expect("get_scoped failed");

            assert_eq!(taken, CacheMethodTaken::GET);
            assert_eq!(value, stored);
            assert_eq!(calls.load(Ordering::Relaxed), 0);
        });
    }

    #[test]
    fn get_scoped_miss_reports_write() {
        block_on(async {
            let tier = MockCache::<String, ScopedValue<u32>>::new();
            let key = "k".to_string();
            let fresh = ScopedValue::new(2, ts("2024-05-01T00:00:00Z"));

            let (taken, value) = tier
                .get_scoped(&key, CacheDirectives::default(), || async { Ok::<_, Error>(fresh.clone()) })
                .await
                .expect("get_scoped failed");

            assert_eq!(taken, CacheMethodTaken::GET_MISS | CacheMethodTaken::SET);
            assert_eq!(value, fresh);
            assert!(tier.contains_key(&key));
        });
    }

    #[test]
    fn get_scoped_with_reads_disabled_still_produces_value() {
        block_on(async {
            let tier = MockCache::<String, ScopedValue<u32>>::new();
            let key = "k".to_string();
            let directives = CacheDirectives::new(CacheMethod::SET, None);

            let (taken, _) = tier
                .get_scoped(&key, directives, || async { Ok::<_, Error>(ScopedValue::new(3, Timestamp::UNIX_EPOCH)) })
                .await
                .expect("get_scoped failed");

            assert_eq!(taken, CacheMethodTaken::GET_MISS | CacheMethodTaken::SET);
            assert!(!tier.operations().iter().any(|op| matches!(op, CacheOp::Get(_))));
        });
    }

    #[test]
    fn get_scoped_getter_error_writes_nothing() {
        block_on(async {
            let tier = MockCache::<String, ScopedValue<u32>>::new();
            let key = "k".to_string();

            let result = tier
                .get_scoped(&key, CacheDirectives::default(), || async {
                    Err::<ScopedValue<u32>, _>(Error::tier("producer failed"))
                })
                .await;

            assert!(result.is_err());
            assert_eq!(tier.entry_count(), 0);
        });
    }
}
