//! Notification center.
//!
//! # Responsibilities
//! - Keep a bounded list of notifications, newest first, unique by id
//! - Drop notifications for disabled types or during quiet hours
//! - Raise desktop alerts and schedule auto-read for non-urgent items
//! - Feed live channel frames into the list
//!
//! # Design Decisions
//! - Settings are swapped whole; readers never see a half-applied update
//! - Every auto-read timer is owned by the center and cancelled when its
//!   notification is read, removed, evicted or the center is torn down
//! - Background tasks hold a weak reference; dropping the last handle stops
//!   them from touching state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::lifecycle::Shutdown;
use crate::notifications::channel::{run_supervisor, FrameSink, LiveChannel, ReconnectPolicy, SupervisorExit};
use crate::notifications::clock::{Clock, SystemClock};
use crate::notifications::scheduler::ScheduledTasks;
use crate::notifications::settings::NotificationSettings;
use crate::notifications::types::{ChannelFrame, NewNotification, Notification, NotificationType};
use crate::observability::metrics;

/// What a desktop notifier is asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopAlert {
    /// Notification id, so the platform can replace a stale alert.
    pub tag: String,
    pub title: String,
    pub body: String,
    /// Keep the alert on screen until dismissed.
    pub require_interaction: bool,
}

impl DesktopAlert {
    fn for_notification(n: &Notification) -> Self {
        Self {
            tag: n.id.clone(),
            title: n.title.clone(),
            body: n.message.clone(),
            require_interaction: n.is_urgent(),
        }
    }
}

/// Platform hook for desktop alerts.
pub trait DesktopNotifier: Send + Sync {
    fn notify(&self, alert: &DesktopAlert);
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl DesktopNotifier for LogNotifier {
    fn notify(&self, alert: &DesktopAlert) {
        tracing::info!(
            tag = %alert.tag,
            require_interaction = alert.require_interaction,
            "{}: {}",
            alert.title,
            alert.body
        );
    }
}

/// Handle to a notification center. Clones share state.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

struct Inner {
    items: Mutex<Vec<Notification>>,
    settings: ArcSwap<NotificationSettings>,
    max_notifications: usize,
    auto_read_delay: Duration,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn DesktopNotifier>,
    timers: ScheduledTasks,
    shutdown: Shutdown,
    supervisor: Mutex<Option<JoinHandle<SupervisorExit>>>,
    torn_down: AtomicBool,
}

impl NotificationCenter {
    pub fn new(config: &NotificationConfig) -> Self {
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(LogNotifier))
    }

    pub fn with_parts(
        config: &NotificationConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn DesktopNotifier>,
    ) -> Self {
        let settings = NotificationSettings {
            desktop_alerts: config.desktop_alerts,
            ..NotificationSettings::default()
        };
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(Vec::new()),
                settings: ArcSwap::from_pointee(settings),
                max_notifications: config.max_notifications,
                auto_read_delay: config.auto_read_delay(),
                clock,
                notifier,
                timers: ScheduledTasks::new(),
                shutdown: Shutdown::new(),
                supervisor: Mutex::new(None),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    /// Add a locally raised notification.
    ///
    /// Returns `None` when it was suppressed by settings, quiet hours or
    /// teardown. Must be called inside a Tokio runtime.
    pub fn add_notification(&self, data: NewNotification) -> Option<Notification> {
        if !self.admits(data.kind) {
            return None;
        }

        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            kind: data.kind,
            title: data.title,
            message: data.message,
            priority: data.priority,
            is_read: false,
            created_at: self.inner.clock.now(),
            expires_at: data.expires_at,
            action_url: data.action_url,
            metadata: data.metadata,
        };
        self.insert(notification.clone(), false);
        Some(notification)
    }

    /// Add a notification delivered by the server.
    ///
    /// Keeps the server's id, filling one in when missing. An id already in
    /// the list is ignored. Returns whether the notification was added.
    pub fn receive(&self, mut notification: Notification) -> bool {
        if !self.admits(notification.kind) {
            return false;
        }
        let dedupe = !notification.id.is_empty();
        if !dedupe {
            notification.id = Uuid::new_v4().to_string();
        }
        self.insert(notification, dedupe)
    }

    pub fn mark_as_read(&self, id: &str) -> bool {
        self.inner.timers.cancel(id);
        self.inner.set_read(id)
    }

    /// Mark everything read. Returns how many were unread.
    pub fn mark_all_as_read(&self) -> usize {
        self.inner.timers.cancel_all();
        let mut items = self.items();
        let mut changed = 0;
        for n in items.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            changed += 1;
        }
        changed
    }

    pub fn remove_notification(&self, id: &str) -> bool {
        self.inner.timers.cancel(id);
        let mut items = self.items();
        let before = items.len();
        items.retain(|n| n.id != id);
        items.len() != before
    }

    pub fn clear_all(&self) {
        self.inner.timers.cancel_all();
        self.items().clear();
    }

    pub fn get_notifications_by_type(&self, kind: NotificationType) -> Vec<Notification> {
        self.items().iter().filter(|n| n.kind == kind).cloned().collect()
    }

    pub fn is_notification_enabled(&self, kind: NotificationType) -> bool {
        self.inner.settings.load().is_enabled(kind)
    }

    /// Apply `update` to a copy of the settings and publish it.
    ///
    /// `update` may run more than once under contention.
    pub fn update_settings<F>(&self, mut update: F)
    where
        F: FnMut(&mut NotificationSettings),
    {
        self.inner.settings.rcu(|current| {
            let mut next = NotificationSettings::clone(current);
            update(&mut next);
            next
        });
        tracing::debug!("Notification settings updated");
    }

    pub fn settings(&self) -> Arc<NotificationSettings> {
        self.inner.settings.load_full()
    }

    /// Snapshot, newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.items().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.items().iter().filter(|n| !n.is_read).count()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop notifications whose `expires_at` has passed.
    pub fn purge_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let expired: Vec<Notification> = {
            let mut items = self.items();
            let (expired, kept) = std::mem::take(&mut *items)
                .into_iter()
                .partition(|n| n.is_expired(now));
            *items = kept;
            expired
        };
        for n in &expired {
            self.inner.timers.cancel(&n.id);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "Purged expired notifications");
        }
        expired.len()
    }

    /// Start feeding `channel` into this center. Replaces any channel
    /// attached earlier. Must be called inside a Tokio runtime.
    pub fn attach_channel<C>(&self, channel: C, policy: ReconnectPolicy)
    where
        C: LiveChannel + 'static,
    {
        if self.is_torn_down() {
            return;
        }
        let sink = CenterSink(Arc::downgrade(&self.inner));
        let handle = tokio::spawn(run_supervisor(channel, sink, policy, self.inner.shutdown.subscribe()));

        let previous = self.inner.supervisor_slot().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Cancel every timer, close the live channel and ignore further input.
    pub async fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.inner.timers.cancel_all();
        self.inner.shutdown.trigger();

        let supervisor = self.inner.supervisor_slot().take();
        if let Some(handle) = supervisor {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Live channel supervisor did not exit cleanly");
            }
        }
        tracing::debug!(cancelled_timers = cancelled, "Notification center torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    fn admits(&self, kind: NotificationType) -> bool {
        if self.is_torn_down() {
            return false;
        }
        let settings = self.inner.settings.load();
        if !settings.is_enabled(kind) {
            tracing::debug!(kind = %kind, "Notification type disabled, dropping");
            metrics::record_notification("suppressed");
            return false;
        }
        if settings.is_quiet(self.inner.clock.local_time()) {
            tracing::debug!(kind = %kind, "Quiet hours, dropping notification");
            metrics::record_notification("suppressed");
            return false;
        }
        true
    }

    /// Insert newest first. With `dedupe`, an id already present is dropped
    /// under the same lock that does the insert.
    fn insert(&self, notification: Notification, dedupe: bool) -> bool {
        let evicted = {
            let mut items = self.items();
            if dedupe && items.iter().any(|n| n.id == notification.id) {
                drop(items);
                tracing::debug!(id = %notification.id, "Ignoring duplicate notification");
                metrics::record_notification("duplicate");
                return false;
            }
            items.insert(0, notification.clone());
            if items.len() > self.inner.max_notifications {
                items.split_off(self.inner.max_notifications)
            } else {
                Vec::new()
            }
        };
        for old in &evicted {
            self.inner.timers.cancel(&old.id);
            metrics::record_notification("evicted");
        }
        if evicted.iter().any(|n| n.id == notification.id) {
            return true;
        }

        metrics::record_notification("added");
        tracing::debug!(id = %notification.id, kind = %notification.kind, "Notification added");

        if self.inner.settings.load().desktop_alerts {
            self.inner.notifier.notify(&DesktopAlert::for_notification(&notification));
        }
        if !notification.is_urgent() && !notification.is_read {
            self.schedule_auto_read(&notification.id);
        }
        true
    }

    fn schedule_auto_read(&self, id: &str) {
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.auto_read_delay;
        let task_id = id.to_string();

        self.inner.timers.schedule(id, async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.timers.finish(&task_id);
                if inner.set_read(&task_id) {
                    metrics::record_notification("auto_read");
                }
            }
        });
    }

    fn items(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.inner.items()
    }
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("len", &self.len())
            .field("max_notifications", &self.inner.max_notifications)
            .field("pending_timers", &self.inner.timers.len())
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

impl Inner {
    fn items(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn supervisor_slot(&self) -> MutexGuard<'_, Option<JoinHandle<SupervisorExit>>> {
        self.supervisor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns true if the notification existed and was unread.
    fn set_read(&self, id: &str) -> bool {
        match self.items().iter_mut().find(|n| n.id == id) {
            Some(n) if !n.is_read => {
                n.is_read = true;
                true
            }
            _ => false,
        }
    }
}

struct CenterSink(Weak<Inner>);

impl FrameSink for CenterSink {
    fn on_frame(&self, payload: &str) {
        let Some(inner) = self.0.upgrade() else {
            return;
        };
        match serde_json::from_str::<ChannelFrame>(payload) {
            Ok(ChannelFrame::Notification { notification }) => {
                NotificationCenter { inner }.receive(notification);
            }
            Ok(ChannelFrame::Other) => tracing::debug!("Ignoring live channel frame"),
            Err(e) => tracing::warn!(error = %e, "Malformed live channel frame"),
        }
    }
}
