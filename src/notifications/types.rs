//! Notification payloads and live channel frames.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Comment,
    Reply,
    Mention,
    Upvote,
    Follow,
    Moderation,
    System,
    /// Any type this client does not know yet.
    #[serde(other)]
    Other,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationType::Comment => "comment",
            NotificationType::Reply => "reply",
            NotificationType::Mention => "mention",
            NotificationType::Upvote => "upvote",
            NotificationType::Follow => "follow",
            NotificationType::Moderation => "moderation",
            NotificationType::System => "system",
            NotificationType::Other => "other",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Notification {
    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Input to `NotificationCenter::add_notification`; the center assigns the
/// id, read flag and creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub expires_at: Option<DateTime<Utc>>,
    pub action_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewNotification {
    pub fn new(kind: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            priority: Priority::Normal,
            expires_at: None,
            action_url: None,
            metadata: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// A message on the live channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelFrame {
    Notification { notification: Notification },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_frame() {
        let frame: ChannelFrame = serde_json::from_value(json!({
            "type": "notification",
            "notification": {
                "id": "n1",
                "type": "mention",
                "title": "You were mentioned",
                "priority": "urgent"
            }
        }))
        .unwrap();

        let ChannelFrame::Notification { notification } = frame else {
            panic!("expected a notification frame");
        };
        assert_eq!(notification.kind, NotificationType::Mention);
        assert!(notification.is_urgent());
        assert!(!notification.is_read);
        assert!(notification.message.is_empty());
    }

    #[test]
    fn test_unknown_frame_type() {
        let frame: ChannelFrame = serde_json::from_str(r#"{"type":"presence","online":3}"#).unwrap();
        assert_eq!(frame, ChannelFrame::Other);
    }

    #[test]
    fn test_unknown_notification_type() {
        let frame: ChannelFrame = serde_json::from_value(json!({
            "type": "notification",
            "notification": { "id": "n3", "type": "award", "title": "Gold" }
        }))
        .unwrap();

        let ChannelFrame::Notification { notification } = frame else {
            panic!("expected a notification frame");
        };
        assert_eq!(notification.kind, NotificationType::Other);
        assert_eq!(notification.kind.to_string(), "other");
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut n: Notification = serde_json::from_value(json!({
            "type": "system", "title": "Maintenance"
        }))
        .unwrap();
        assert!(!n.is_expired(now));
        n.expires_at = Some(now);
        assert!(n.is_expired(now));
    }

    #[test]
    fn test_wire_names() {
        let n: Notification = serde_json::from_value(json!({
            "id": "n2", "type": "reply", "title": "t", "actionUrl": "/p/1"
        }))
        .unwrap();
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "reply");
        assert_eq!(v["actionUrl"], "/p/1");
        assert_eq!(v["isRead"], false);
        assert!(v.get("expiresAt").is_none());
    }
}
