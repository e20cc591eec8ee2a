// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The publish/subscribe contract for cache invalidation.

use std::{fmt, sync::Arc};

use strata_tier::Error;
use tokio::sync::mpsc;

use crate::{NotificationAction, NotifierEvent, SenderId};

/// Publishes and receives cache invalidation notifications.
///
/// A notifier holds at most one subscription per cache name. Publishing for a
/// cache name requires an active subscription for that name on the same
/// notifier; publishing without one is a usage error.
#[dynosaur::dynosaur(pub(crate) DynCacheNotifier = dyn(box) CacheNotifier, bridge(none))]
pub trait CacheNotifier: Send + Sync {
    /// Returns the id this notifier stamps on published messages.
    fn sender_id(&self) -> SenderId;

    /// Subscribes to notifications for `cache_name`, replacing any earlier subscription for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    fn subscribe(&self, cache_name: &str) -> Result<Subscription, Error>;

    /// Drops the subscription for `cache_name`, if any.
    fn unsubscribe(&self, cache_name: &str);

    /// Publishes a notification about `key` (or the whole cache when `None`) of `cache_name`.
    fn publish(
        &self,
        cache_name: &str,
        key: Option<&str>,
        action: NotificationAction,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns `false` while the notifier cannot reach its transport.
    fn is_connected(&self) -> bool {
        true
    }
}

impl<T> CacheNotifier for Arc<T>
where
    T: CacheNotifier,
{
    fn sender_id(&self) -> SenderId {
        T::sender_id(self)
    }

    fn subscribe(&self, cache_name: &str) -> Result<Subscription, Error> {
        T::subscribe(self, cache_name)
    }

    fn unsubscribe(&self, cache_name: &str) {
        T::unsubscribe(self, cache_name);
    }

    fn publish(
        &self,
        cache_name: &str,
        key: Option<&str>,
        action: NotificationAction,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        T::publish(self, cache_name, key, action)
    }

    fn is_connected(&self) -> bool {
        T::is_connected(self)
    }
}

/// The receiving end of a notifier subscription.
///
/// Events arrive in publication order. `recv` returns `None` once the
/// notifier drops the subscription.
pub struct Subscription {
    cache_name: String,
    events: mpsc::UnboundedReceiver<NotifierEvent>,
}

impl Subscription {
    /// Creates a subscription for `cache_name` fed by `events`.
    ///
    /// Notifier implementations call this when a subscriber registers.
    #[must_use]
    pub fn new(cache_name: impl Into<String>, events: mpsc::UnboundedReceiver<NotifierEvent>) -> Self {
        Self {
            cache_name: cache_name.into(),
            events,
        }
    }

    /// Returns the subscribed cache name.
    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Waits for the next event.
    pub async fn recv(&mut self) -> Option<NotifierEvent> {
        self.events.recv().await
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<NotifierEvent> {
        self.events.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("cache_name", &self.cache_name).finish_non_exhaustive()
    }
}

/// A clonable, type-erased [`CacheNotifier`].
///
/// # Examples
///
/// ```
/// use strata_notify::{BusNotifier, CacheNotifier, MessageBus, SharedNotifier};
///
/// let bus = MessageBus::new();
/// let shared = SharedNotifier::new(BusNotifier::new(&bus));
/// let alias = shared.clone();
/// assert!(shared.same_instance(&alias));
/// assert_eq!(shared.sender_id(), alias.sender_id());
/// ```
pub struct SharedNotifier(Arc<DynCacheNotifier<'static>>);

impl SharedNotifier {
    /// Erases the type of `notifier`.
    #[must_use]
    pub fn new<N>(notifier: N) -> Self
    where
        N: CacheNotifier + 'static,
    {
        Self(DynCacheNotifier::new_arc(notifier))
    }

    /// Returns `true` if both handles erase the same notifier instance.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Clone for SharedNotifier {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl fmt::Debug for SharedNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedNotifier").field("sender", &self.0.sender_id()).finish()
    }
}

impl CacheNotifier for SharedNotifier {
    fn sender_id(&self) -> SenderId {
        self.0.sender_id()
    }

    fn subscribe(&self, cache_name: &str) -> Result<Subscription, Error> {
        self.0.subscribe(cache_name)
    }

    fn unsubscribe(&self, cache_name: &str) {
        self.0.unsubscribe(cache_name);
    }

    async fn publish(&self, cache_name: &str, key: Option<&str>, action: NotificationAction) -> Result<(), Error> {
        self.0.publish(cache_name, key, action).await
    }

    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }
}
