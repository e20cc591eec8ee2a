// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, marker::PhantomData, pin::pin};

use strata_tier::{CacheTier, Error};
use tokio::{sync::oneshot, task::JoinHandle};

use crate::{CacheNotifier, NotificationAction, NotifierEvent, Subscription};

/// What a [`Synchronizer`] did with one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The event was published by this synchronizer's own process.
    IgnoredOwn,
    /// The event refers to another cache.
    IgnoredOtherCache,
    /// One key was invalidated.
    Invalidated,
    /// The whole tier was cleared.
    Cleared,
}

/// Keeps one cache tier consistent with invalidations published elsewhere.
///
/// Binding subscribes the notifier to the cache name; dropping the
/// synchronizer unsubscribes it. Incoming events are applied to the tier:
///
/// - A notification whose sender is the notifier's own id is ignored, so a
///   process never evicts the entry it just wrote.
/// - `RemoveAll`, or a notification without a key, clears the tier.
/// - Any other notification invalidates its key.
/// - A connectivity change clears the tier, since staleness cannot be bounded
///   across a disconnect.
///
/// Keys travel as strings and are converted with `K: From<String>`.
pub struct Synchronizer<K, V, T, N>
where
    N: CacheNotifier,
{
    cache_name: String,
    tier: T,
    notifier: N,
    subscription: Subscription,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V, T, N> Synchronizer<K, V, T, N>
where
    K: From<String> + Send + Sync,
    T: CacheTier<K, V>,
    N: CacheNotifier,
{
    /// Subscribes `notifier` to `cache_name` and binds it to `tier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notifier rejects the subscription.
    pub fn bind(cache_name: impl Into<String>, tier: T, notifier: N) -> Result<Self, Error> {
        let cache_name = cache_name.into();
        let subscription = notifier.subscribe(&cache_name)?;
        tracing::debug!(cache.name = %cache_name, sender = %notifier.sender_id(), "cache synchronizer bound");
        Ok(Self {
            cache_name,
            tier,
            notifier,
            subscription,
            _types: PhantomData,
        })
    }

    /// Returns the cache name this synchronizer listens to.
    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Returns the bound tier.
    #[must_use]
    pub fn tier(&self) -> &T {
        &self.tier
    }

    /// Applies one event to the tier.
    ///
    /// # Errors
    ///
    /// Returns the tier's error if invalidating or clearing fails.
    pub async fn handle(&self, event: NotifierEvent) -> Result<SyncOutcome, Error> {
        match event {
            NotifierEvent::Item(item) => {
                if item.sender == self.notifier.sender_id() {
                    return Ok(SyncOutcome::IgnoredOwn);
                }
                if item.cache_name != self.cache_name {
                    return Ok(SyncOutcome::IgnoredOtherCache);
                }
                match item.key {
                    Some(key) if item.action != NotificationAction::RemoveAll => {
                        self.tier.invalidate(&K::from(key)).await?;
                        Ok(SyncOutcome::Invalidated)
                    }
                    _ => {
                        self.tier.clear().await?;
                        Ok(SyncOutcome::Cleared)
                    }
                }
            }
            NotifierEvent::ConnectionChanged { connected } => {
                tracing::warn!(cache.name = %self.cache_name, connected, "notifier connectivity changed, clearing cache");
                self.tier.clear().await?;
                Ok(SyncOutcome::Cleared)
            }
        }
    }

    /// Applies every event already queued, without waiting for more.
    ///
    /// Returns the number of events handled. Failures are logged and do not
    /// stop processing.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.subscription.try_recv() {
            self.apply(event).await;
            handled += 1;
        }
        handled
    }

    /// Applies events until the subscription closes.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await;
    }

    /// Applies events until `shutdown` completes or the subscription closes.
    ///
    /// An event that is being applied when `shutdown` completes is finished
    /// first. The synchronizer is dropped on return, which unsubscribes it.
    pub async fn run_until<S>(mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                event = self.subscription.recv() => match event {
                    Some(event) => self.apply(event).await,
                    None => break,
                },
            }
        }
        tracing::debug!(cache.name = %self.cache_name, "cache synchronizer stopped");
    }

    async fn apply(&self, event: NotifierEvent) {
        match self.handle(event).await {
            Ok(outcome) => tracing::trace!(cache.name = %self.cache_name, ?outcome, "cache notification applied"),
            Err(error) => tracing::warn!(cache.name = %self.cache_name, %error, "failed to apply cache notification"),
        }
    }
}

impl<K, V, T, N> Synchronizer<K, V, T, N>
where
    K: From<String> + Send + Sync + 'static,
    V: 'static,
    T: CacheTier<K, V> + 'static,
    N: CacheNotifier + 'static,
{
    /// Runs the synchronizer on the current tokio runtime.
    ///
    /// The task stops when the returned handle is shut down or dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(self) -> SynchronizerHandle {
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(self.run_until(async move {
            _ = stopped.await;
        }));
        SynchronizerHandle { stop: Some(stop), task }
    }
}

/// Controls a spawned [`Synchronizer`]; dropping it stops the task.
#[derive(Debug)]
pub struct SynchronizerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SynchronizerHandle {
    /// Returns `true` once the synchronizer task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the synchronizer and waits for its task to exit.
    pub async fn shutdown(mut self) {
        drop(self.stop.take());
        if let Err(error) = (&mut self.task).await {
            tracing::warn!(%error, "cache synchronizer task failed");
        }
    }
}

impl Drop for SynchronizerHandle {
    fn drop(&mut self) {
        drop(self.stop.take());
    }
}

impl<K, V, T, N> Drop for Synchronizer<K, V, T, N>
where
    N: CacheNotifier,
{
    fn drop(&mut self) {
        self.notifier.unsubscribe(&self.cache_name);
    }
}

impl<K, V, T, N> fmt::Debug for Synchronizer<K, V, T, N>
where
    N: CacheNotifier,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("cache_name", &self.cache_name)
            .field("sender", &self.notifier.sender_id())
            .finish_non_exhaustive()
    }
}
