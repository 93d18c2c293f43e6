//! Notification delivery.
//!
//! # Data Flow
//! ```text
//! add_notification / live channel frame
//!     → settings.rs (type toggles, quiet hours)
//!     → center.rs (bounded list, desktop alert, auto-read timer)
//!     → scheduler.rs (cancellable timers)
//! ```

pub mod center;
pub mod channel;
pub mod clock;
pub mod scheduler;
pub mod settings;
pub mod types;

pub use center::{DesktopAlert, DesktopNotifier, LogNotifier, NotificationCenter};
pub use channel::{ChannelError, LiveChannel, ReconnectPolicy, SupervisorExit, WebSocketChannel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use settings::{NotificationSettings, QuietHours};
pub use types::{NewNotification, Notification, NotificationType, Priority};
