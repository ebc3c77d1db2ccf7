//! Notifications and the bounded FIFO queue that holds them.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::NotificationId;

/// Visual intent of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// Where a notification is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Transient on-screen toast only.
    #[default]
    Toast,
    /// Persisted to the server inbox only.
    Inbox,
    /// Shown as a toast and persisted to the inbox.
    Both,
}

impl Channel {
    #[must_use]
    pub const fn shows_toast(self) -> bool {
        matches!(self, Self::Toast | Self::Both)
    }

    #[must_use]
    pub const fn reaches_inbox(self) -> bool {
        matches!(self, Self::Inbox | Self::Both)
    }
}

/// Priority tag carried on the wire.
///
/// Stored and round-tripped, but queues are strictly FIFO: priority does not
/// change delivery order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub read: bool,
    /// In-app link to follow when the notification is opened.
    #[serde(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create a toast-channel notification with a fresh ID.
    #[must_use]
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: NotificationId::new(uuid::Uuid::new_v4().to_string()),
            kind,
            title: None,
            message: message.into(),
            channel: Channel::Toast,
            priority: Priority::Normal,
            read: false,
            link: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, message)
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub const fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

// =============================================================================
// BoundedQueue
// =============================================================================

/// FIFO queue with a fixed capacity.
///
/// Pushing onto a full queue evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning the evicted oldest entry if the queue was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Remove and return the oldest entry.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Remove every entry matching `predicate`, returning how many were removed.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !predicate(item));
        before - self.items.len()
    }

    /// Replace the contents with `items`, keeping only the newest `capacity`.
    pub fn replace(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.clear();
        for item in items {
            self.push(item);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    /// Iterate oldest to newest, mutably.
    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut T> {
        self.items.iter_mut()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_never_exceeds_capacity_and_drops_oldest() {
        let mut queue = BoundedQueue::new(3);
        for n in 0..10 {
            queue.push(n);
            assert!(queue.len() <= 3);
        }
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![7, 8, 9]);
    }

    #[test]
    fn test_push_returns_evicted() {
        let mut queue = BoundedQueue::new(2);
        assert_eq!(queue.push("a"), None);
        assert_eq!(queue.push("b"), None);
        assert_eq!(queue.push("c"), Some("a"));
        assert_eq!(queue.pop(), Some("b"));
    }

    #[test]
    fn test_priority_does_not_reorder() {
        let mut queue = BoundedQueue::new(5);
        queue.push(Notification::info("first").with_priority(Priority::Low));
        queue.push(Notification::error("second").with_priority(Priority::Urgent));

        assert_eq!(queue.pop().unwrap().message, "first");
        assert_eq!(queue.pop().unwrap().message, "second");
    }

    #[test]
    fn test_replace_keeps_newest() {
        let mut queue = BoundedQueue::new(2);
        queue.replace([1, 2, 3, 4]);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut queue = BoundedQueue::new(0);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_notification_wire_format() {
        let json = r#"{
            "id": "n1",
            "type": "warning",
            "message": "Price dropped",
            "channel": "both",
            "priority": "high",
            "created_at": "2026-10-01T10:00:00Z"
        }"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.kind, NotificationKind::Warning);
        assert_eq!(n.priority, Priority::High);
        assert!(n.channel.shows_toast() && n.channel.reaches_inbox());
        assert!(!n.read);
    }
}
