// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Applying published notifications to a local tier.

use std::time::Duration;

use pretty_assertions::assert_eq;
use strata_notify::{
    BusNotifier, CacheItemNotification, CacheNotifier, MessageBus, NotificationAction, NotifierEvent, SenderId, SharedNotifier,
    SyncOutcome, Synchronizer,
};
use strata_tier::{
    CacheEntry, CacheTier, ErrorKind,
    testing::{CacheOp, MockCache},
};

type Local = MockCache<String, u32>;

async fn seeded(keys: &[&str]) -> Local {
    let cache = Local::new();
    for (value, key) in (0_u32..).zip(keys) {
        cache.insert(&(*key).to_string(), CacheEntry::new(value)).await.expect("insert failed");
    }
    cache.clear_operations();
    cache
}

fn remote(bus: &MessageBus, cache_name: &str) -> (BusNotifier, strata_notify::Subscription) {
    let notifier = BusNotifier::with_sender(bus, SenderId::random());
    let subscription = notifier.subscribe(cache_name).expect("subscribe failed");
    (notifier, subscription)
}

#[tokio::test]
async fn own_notifications_do_not_evict_local_entries() {
    let bus = MessageBus::new();
    let local = seeded(&["1"]).await;
    let notifier = SharedNotifier::new(BusNotifier::new(&bus));
    let mut sync = Synchronizer::bind("users", local.clone(), notifier.clone()).expect("bind failed");

    notifier
        .publish("users", Some("1"), NotificationAction::Updated)
        .await
        .expect("publish failed");

    assert_eq!(sync.drain().await, 1);
    assert!(local.contains_key(&"1".to_string()));
    assert_eq!(local.operations(), vec![]);
}

#[tokio::test]
async fn remote_update_invalidates_the_key() {
    let bus = MessageBus::new();
    let local = seeded(&["1", "2"]).await;
    let mut sync = Synchronizer::bind("users", local.clone(), BusNotifier::new(&bus)).expect("bind failed");
    let (other, _inbox) = remote(&bus, "users");

    other
        .publish("users", Some("1"), NotificationAction::Updated)
        .await
        .expect("publish failed");

    assert_eq!(sync.drain().await, 1);
    assert!(!local.contains_key(&"1".to_string()));
    assert!(local.contains_key(&"2".to_string()));
    assert_eq!(local.operations(), vec![CacheOp::Invalidate("1".to_string())]);
}

#[tokio::test]
async fn remove_all_clears_the_tier() {
    let bus = MessageBus::new();
    let local = seeded(&["1", "2"]).await;
    let mut sync = Synchronizer::bind("users", local.clone(), BusNotifier::new(&bus)).expect("bind failed");
    let (other, _inbox) = remote(&bus, "users");

    other
        .publish("users", Some("ignored"), NotificationAction::RemoveAll)
        .await
        .expect("publish failed");

    assert_eq!(sync.drain().await, 1);
    assert_eq!(local.entry_count(), 0);
    assert_eq!(local.operations(), vec![CacheOp::Clear]);
}

#[tokio::test]
async fn keyless_notification_clears_the_tier() {
    let local = seeded(&["1"]).await;
    let sync = Synchronizer::bind("users", local.clone(), BusNotifier::new(&MessageBus::new())).expect("bind failed");

    let event = NotifierEvent::Item(CacheItemNotification::new(
        SenderId::random(),
        "users",
        None,
        NotificationAction::Removed,
    ));

    assert_eq!(sync.handle(event).await.expect("handle failed"), SyncOutcome::Cleared);
    assert_eq!(local.entry_count(), 0);
}

#[tokio::test]
async fn other_cache_names_are_ignored() {
    let local = seeded(&["1"]).await;
    let sync = Synchronizer::bind("users", local.clone(), BusNotifier::new(&MessageBus::new())).expect("bind failed");

    let event = NotifierEvent::Item(CacheItemNotification::new(
        SenderId::random(),
        "orders",
        Some("1".to_string()),
        NotificationAction::Removed,
    ));

    assert_eq!(sync.handle(event).await.expect("handle failed"), SyncOutcome::IgnoredOtherCache);
    assert!(local.contains_key(&"1".to_string()));
}

#[tokio::test]
async fn connectivity_change_clears_the_tier() {
    let bus = MessageBus::new();
    let local = seeded(&["1", "2"]).await;
    let mut sync = Synchronizer::bind("users", local.clone(), BusNotifier::new(&bus)).expect("bind failed");

    bus.set_connected(false);
    assert_eq!(sync.drain().await, 1);
    assert_eq!(local.entry_count(), 0);

    local.insert(&"3".to_string(), CacheEntry::new(3)).await.expect("insert failed");
    bus.set_connected(true);
    assert_eq!(sync.drain().await, 1);
    assert_eq!(local.entry_count(), 0);
}

#[tokio::test]
async fn tier_failures_surface_from_handle_and_do_not_stop_draining() {
    let bus = MessageBus::new();
    let local = seeded(&["1", "2"]).await;
    local.fail_when(|op| matches!(op, CacheOp::Invalidate(key) if key == "1"));
    let mut sync = Synchronizer::bind("users", local.clone(), BusNotifier::new(&bus)).expect("bind failed");

    let failing = NotifierEvent::Item(CacheItemNotification::new(
        SenderId::random(),
        "users",
        Some("1".to_string()),
        NotificationAction::Removed,
    ));
    let error = sync.handle(failing).await.expect_err("should fail");
    assert_eq!(error.kind(), ErrorKind::Tier);

    let (other, _inbox) = remote(&bus, "users");
    other
        .publish("users", Some("1"), NotificationAction::Removed)
        .await
        .expect("publish failed");
    other
        .publish("users", Some("2"), NotificationAction::Removed)
        .await
        .expect("publish failed");

    assert_eq!(sync.drain().await, 2);
    assert!(local.contains_key(&"1".to_string()));
    assert!(!local.contains_key(&"2".to_string()));
}

#[tokio::test]
async fn spawned_synchronizer_applies_events_as_they_arrive() {
    let bus = MessageBus::new();
    let local = seeded(&["1"]).await;
    let sync = Synchronizer::bind("users", local.clone(), BusNotifier::new(&bus)).expect("bind failed");
    let handle = sync.spawn();
    let (other, _inbox) = remote(&bus, "users");

    other
        .publish("users", Some("1"), NotificationAction::Removed)
        .await
        .expect("publish failed");

    tokio::time::timeout(Duration::from_secs(5), async {
        while local.contains_key(&"1".to_string()) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("notification was not applied");

    handle.shutdown().await;
    assert_eq!(bus.subscriber_count("users"), 1, "only the remote inbox remains");
}

#[tokio::test]
async fn dropping_the_handle_stops_a_live_synchronizer() {
    let bus = MessageBus::new();
    let local = seeded(&["1"]).await;
    let handle = Synchronizer::bind("users", local.clone(), BusNotifier::new(&bus))
        .expect("bind failed")
        .spawn();
    assert_eq!(bus.subscriber_count("users"), 1);
    assert!(!handle.is_finished());

    drop(handle);

    tokio::time::timeout(Duration::from_secs(5), async {
        while bus.subscriber_count("users") > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("synchronizer did not stop");
}

#[tokio::test]
async fn dropping_the_synchronizer_unsubscribes() {
    let bus = MessageBus::new();
    let sync = Synchronizer::bind("users", seeded(&[]).await, BusNotifier::new(&bus)).expect("bind failed");
    assert_eq!(bus.subscriber_count("users"), 1);
    assert_eq!(sync.cache_name(), "users");

    drop(sync);
    assert_eq!(bus.subscriber_count("users"), 0);
}
