// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::LazyLock};

use serde::{Deserialize, Serialize};
use strata_tier::Error;
use uuid::Uuid;

static PROCESS_SENDER: LazyLock<SenderId> = LazyLock::new(SenderId::random);

/// Identifies the process that published a notification.
///
/// Every notifier of a process tags its messages with the same random id, so
/// a synchronizer can recognize and ignore its own process's broadcasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(Uuid);

impl SenderId {
    /// Returns the id shared by every notifier of this process.
    #[must_use]
    pub fn process() -> Self {
        *PROCESS_SENDER
    }

    /// Creates a new random id.
    ///
    /// Useful to simulate several processes inside one test.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// What happened to the cache item a notification refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationAction {
    /// An item was added.
    Added,
    /// An existing item was replaced.
    Updated,
    /// An item was removed.
    Removed,
    /// Every item of the cache was removed.
    RemoveAll,
}

/// The invalidation message exchanged between processes.
///
/// Serialized with camel-case field names:
///
/// ```
/// use strata_notify::{CacheItemNotification, NotificationAction, SenderId};
///
/// let notification = CacheItemNotification::new(SenderId::process(), "svc.users", None, NotificationAction::RemoveAll);
/// let json = notification.to_json().unwrap();
/// assert!(json.contains(r#""cacheName":"svc.users""#));
/// assert!(json.contains(r#""key":null"#));
/// assert_eq!(CacheItemNotification::from_json(&json).unwrap(), notification);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheItemNotification {
    /// The publishing process.
    pub sender: SenderId,
    /// The logical name of the affected cache.
    pub cache_name: String,
    /// The affected key; `None` addresses the whole cache.
    pub key: Option<String>,
    /// What happened.
    pub action: NotificationAction,
}

impl CacheItemNotification {
    /// Creates a notification.
    #[must_use]
    pub fn new(sender: SenderId, cache_name: impl Into<String>, key: Option<String>, action: NotificationAction) -> Self {
        Self {
            sender,
            cache_name: cache_name.into(),
            key,
            action,
        }
    }

    /// Encodes the notification as JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::serialization)
    }

    /// Decodes a notification from JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `json` is not a valid notification.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(Error::serialization)
    }
}

/// An event delivered to a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifierEvent {
    /// A notification for the subscribed cache.
    Item(CacheItemNotification),
    /// The notifier lost or regained its connection.
    ///
    /// Staleness cannot be bounded across a disconnect, so subscribers treat
    /// either transition as a request to clear everything.
    ConnectionChanged {
        /// Whether the notifier is connected after the change.
        connected: bool,
    },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strata_tier::ErrorKind;

    use super::*;

    #[test]
    fn process_sender_is_stable() {
        assert_eq!(SenderId::process(), SenderId::process());
        assert_ne!(SenderId::random(), SenderId::random());
    }

    #[test]
    fn wire_format_uses_action_names() {
        let sender = SenderId::random();
        let notification = CacheItemNotification::new(sender, "orders", Some("42".to_string()), NotificationAction::Updated);
        let json: serde_json::Value = serde_json::from_str(&notification.to_json().expect("encode failed")).expect("valid json");

        assert_eq!(json["sender"], sender.to_string());
        assert_eq!(json["cacheName"], "orders");
        assert_eq!(json["key"], "42");
        assert_eq!(json["action"], "Updated");
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let error = CacheItemNotification::from_json(r#"{"cacheName":"c"}"#).expect_err("should fail");
        assert_eq!(error.kind(), ErrorKind::Serialization);
    }
}
