// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An in-process message bus implementing the notifier contract.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use dashmap::DashMap;
use strata_tier::Error;
use tokio::sync::mpsc;

use crate::{CacheItemNotification, CacheNotifier, NotificationAction, NotifierEvent, SenderId, Subscription};

#[derive(Debug)]
struct Endpoint {
    id: u64,
    events: mpsc::UnboundedSender<NotifierEvent>,
}

#[derive(Debug)]
struct BusInner {
    channels: DashMap<String, Vec<Endpoint>>,
    connected: AtomicBool,
    next_endpoint: AtomicU64,
}

/// A shared in-process transport for cache notifications.
///
/// The bus stands in for an external pub/sub service. Every [`BusNotifier`]
/// attached to it plays the part of one process. Messages are encoded to JSON
/// on publish and decoded once per delivery, so the full wire round trip is
/// exercised.
///
/// Clones share the same bus.
#[derive(Clone, Debug)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Creates a connected bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: DashMap::new(),
                connected: AtomicBool::new(true),
                next_endpoint: AtomicU64::new(0),
            }),
        }
    }

    /// Returns `true` while the bus delivers messages.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Simulates losing or regaining the connection.
    ///
    /// Every subscriber receives a [`NotifierEvent::ConnectionChanged`] when
    /// the state actually changes.
    pub fn set_connected(&self, connected: bool) {
        if self.inner.connected.swap(connected, Ordering::AcqRel) == connected {
            return;
        }
        tracing::info!(connected, "message bus connectivity changed");
        for channel in &self.inner.channels {
            for endpoint in channel.value() {
                // A closed endpoint belongs to a subscriber that is going away.
                let _ = endpoint.events.send(NotifierEvent::ConnectionChanged { connected });
            }
        }
    }

    /// Returns the number of subscriptions for `cache_name`.
    #[must_use]
    pub fn subscriber_count(&self, cache_name: &str) -> usize {
        self.inner.channels.get(cache_name).map_or(0, |channel| channel.len())
    }

    fn attach(&self, cache_name: &str) -> (u64, mpsc::UnboundedReceiver<NotifierEvent>) {
        let id = self.inner.next_endpoint.fetch_add(1, Ordering::Relaxed);
        let (events, receiver) = mpsc::unbounded_channel();
        self.inner
            .channels
            .entry(cache_name.to_owned())
            .or_default()
            .push(Endpoint { id, events });
        (id, receiver)
    }

    fn detach(&self, cache_name: &str, endpoint: u64) {
        self.inner.channels.remove_if_mut(cache_name, |_, endpoints| {
            endpoints.retain(|e| e.id != endpoint);
            endpoints.is_empty()
        });
    }

    fn deliver(&self, cache_name: &str, payload: &str) -> Result<usize, Error> {
        let notification = CacheItemNotification::from_json(payload)?;
        let Some(channel) = self.inner.channels.get(cache_name) else {
            return Ok(0);
        };
        let delivered = channel
            .iter()
            .filter(|endpoint| endpoint.events.send(NotifierEvent::Item(notification.clone())).is_ok())
            .count();
        Ok(delivered)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One process's connection to a [`MessageBus`].
///
/// # Examples
///
/// ```
/// use strata_notify::{BusNotifier, CacheNotifier, MessageBus, NotificationAction, NotifierEvent, SenderId};
///
/// # futures::executor::block_on(async {
/// let bus = MessageBus::new();
/// let here = BusNotifier::new(&bus);
/// let there = BusNotifier::with_sender(&bus, SenderId::random());
///
/// let mut inbox = there.subscribe("users")?;
/// let _own = here.subscribe("users")?;
/// here.publish("users", Some("42"), NotificationAction::Updated).await?;
///
/// let Some(NotifierEvent::Item(item)) = inbox.recv().await else { panic!("expected an item") };
/// assert_eq!(item.key.as_deref(), Some("42"));
/// assert_eq!(item.sender, here.sender_id());
/// # Ok::<(), strata_tier::Error>(())
/// # });
/// ```
#[derive(Debug)]
pub struct BusNotifier {
    bus: MessageBus,
    sender: SenderId,
    subscriptions: DashMap<String, u64>,
}

impl BusNotifier {
    /// Attaches a notifier that publishes as this process.
    #[must_use]
    pub fn new(bus: &MessageBus) -> Self {
        Self::with_sender(bus, SenderId::process())
    }

    /// Attaches a notifier that publishes as `sender`.
    #[must_use]
    pub fn with_sender(bus: &MessageBus, sender: SenderId) -> Self {
        Self {
            bus: bus.clone(),
            sender,
            subscriptions: DashMap::new(),
        }
    }
}

impl CacheNotifier for BusNotifier {
    fn sender_id(&self) -> SenderId {
        self.sender
    }

    fn subscribe(&self, cache_name: &str) -> Result<Subscription, Error> {
        let (endpoint, events) = self.bus.attach(cache_name);
        if let Some(previous) = self.subscriptions.insert(cache_name.to_owned(), endpoint) {
            self.bus.detach(cache_name, previous);
        }
        Ok(Subscription::new(cache_name, events))
    }

    fn unsubscribe(&self, cache_name: &str) {
        if let Some((_, endpoint)) = self.subscriptions.remove(cache_name) {
            self.bus.detach(cache_name, endpoint);
        }
    }

    async fn publish(&self, cache_name: &str, key: Option<&str>, action: NotificationAction) -> Result<(), Error> {
        if !self.subscriptions.contains_key(cache_name) {
            return Err(Error::protocol(format!("publishing to cache '{cache_name}' without a subscription")));
        }
        if !self.bus.is_connected() {
            return Err(Error::notification("message bus is disconnected"));
        }

        let notification = CacheItemNotification::new(self.sender, cache_name, key.map(str::to_owned), action);
        let delivered = self.bus.deliver(cache_name, &notification.to_json()?)?;
        tracing::trace!(cache.name = cache_name, delivered, "cache notification published");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.bus.is_connected()
    }
}

impl Drop for BusNotifier {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            self.bus.detach(subscription.key(), *subscription.value());
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use strata_tier::ErrorKind;

    use super::*;

    #[test]
    fn publish_without_subscription_is_a_protocol_error() {
        block_on(async {
            let bus = MessageBus::new();
            let notifier = BusNotifier::new(&bus);

            let error = notifier
                .publish("orders", None, NotificationAction::RemoveAll)
                .await
                .expect_err("should fail");
            assert_eq!(error.kind(), ErrorKind::Protocol);
        });
    }

    #[test]
    fn publish_while_disconnected_fails() {
        block_on(async {
            let bus = MessageBus::new();
            let notifier = BusNotifier::new(&bus);
            let _subscription = notifier.subscribe("orders").expect("subscribe failed");

            bus.set_connected(false);
            let error = notifier
                .publish("orders", Some("1"), NotificationAction::Removed)
                .await
                .expect_err("should fail");
            assert_eq!(error.kind(), ErrorKind::Notification);
            assert!(!notifier.is_connected());
        });
    }

    #[test]
    fn resubscribe_replaces_previous_subscription() {
        let bus = MessageBus::new();
        let notifier = BusNotifier::new(&bus);

        let _first = notifier.subscribe("orders").expect("subscribe failed");
        let _second = notifier.subscribe("orders").expect("subscribe failed");
        assert_eq!(bus.subscriber_count("orders"), 1);

        notifier.unsubscribe("orders");
        assert_eq!(bus.subscriber_count("orders"), 0);
    }

    #[test]
    fn dropping_notifier_detaches_endpoints() {
        let bus = MessageBus::new();
        let notifier = BusNotifier::new(&bus);
        let _subscription = notifier.subscribe("a").expect("subscribe failed");
        let _other = notifier.subscribe("b").expect("subscribe failed");

        drop(notifier);
        assert_eq!(bus.subscriber_count("a"), 0);
        assert_eq!(bus.subscriber_count("b"), 0);
    }

    #[test]
    fn connectivity_change_reaches_every_subscriber_once() {
        let bus = MessageBus::new();
        let notifier = BusNotifier::new(&bus);
        let mut subscription = notifier.subscribe("orders").expect("subscribe failed");

        bus.set_connected(false);
        bus.set_connected(false);
        bus.set_connected(true);

        assert_eq!(
            subscription.try_recv(),
            Some(NotifierEvent::ConnectionChanged { connected: false })
        );
        assert_eq!(subscription.try_recv(), Some(NotifierEvent::ConnectionChanged { connected: true }));
        assert_eq!(subscription.try_recv(), None);
    }

    #[test]
    fn publisher_also_receives_its_own_message() {
        block_on(async {
            let bus = MessageBus::new();
            let notifier = BusNotifier::new(&bus);
            let mut subscription = notifier.subscribe("orders").expect("subscribe failed");

            notifier
                .publish("orders", Some("7"), NotificationAction::Added)
                .await
                .expect("publish failed");

            let Some(NotifierEvent::Item(item)) = subscription.try_recv() else {
                panic!("expected an item");
            };
            assert_eq!(item.sender, notifier.sender_id());
            assert_eq!(item.action, NotificationAction::Added);
        });
    }
}
