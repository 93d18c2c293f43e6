//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Ctrl-C / NotificationCenter::teardown
//!     → Shutdown::trigger
//!     → live channel supervisor closes its connection and exits
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
