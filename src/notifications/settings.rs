//! Per-user notification preferences.

use std::collections::HashMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::notifications::types::NotificationType;

const TIME_FORMAT: &str = "%H:%M";

/// Daily window, in local wall-clock time, during which notifications are
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHours {
    pub enabled: bool,
    /// Start of the window, `HH:mm`, inclusive.
    pub start: String,
    /// End of the window, `HH:mm`, exclusive.
    pub end: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

impl QuietHours {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            enabled: true,
            start: start.into(),
            end: end.into(),
        }
    }

    /// Parsed `(start, end)`.
    pub fn window(&self) -> Result<(NaiveTime, NaiveTime), chrono::ParseError> {
        Ok((
            NaiveTime::parse_from_str(&self.start, TIME_FORMAT)?,
            NaiveTime::parse_from_str(&self.end, TIME_FORMAT)?,
        ))
    }

    /// Whether `now` falls inside the window.
    ///
    /// A window whose start is after its end wraps past midnight. A window
    /// with equal bounds is empty. An unparseable window never matches.
    pub fn contains(&self, now: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        let (start, end) = match self.window() {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(start = %self.start, end = %self.end, error = %e, "Ignoring malformed quiet hours");
                return false;
            }
        };

        if start <= end {
            start <= now && now < end
        } else {
            now >= start || now < end
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Per-type switches. A type that is absent is enabled.
    pub types: HashMap<NotificationType, bool>,
    pub desktop_alerts: bool,
    pub quiet_hours: QuietHours,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            types: HashMap::new(),
            desktop_alerts: true,
            quiet_hours: QuietHours::default(),
        }
    }
}

impl NotificationSettings {
    pub fn is_enabled(&self, kind: NotificationType) -> bool {
        self.types.get(&kind).copied().unwrap_or(true)
    }

    pub fn set_enabled(&mut self, kind: NotificationType, enabled: bool) {
        self.types.insert(kind, enabled);
    }

    pub fn is_quiet(&self, now: NaiveTime) -> bool {
        self.quiet_hours.contains(now)
    }
}
