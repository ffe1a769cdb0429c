//! Platform collaborator contracts
//!
//! The health subsystem never talks to the OS directly. It drives the capture
//! component through [`CapturePlatform`] and informs the user through
//! [`AlertSink`]. Both are fire-and-forget from the caller's point of view:
//! the platform applies component-state changes asynchronously, which is why
//! recovery inserts delays between steps.
//!
//! `simulated` provides in-process implementations used by the CLI and tests.

pub mod simulated;

pub use simulated::{AlertEvent, PlatformOp, SimulatedPlatform, TracingAlertSink};

use chrono::{DateTime, Utc};

use crate::types::{AlertCategory, AlertReason};

/// Errors raised by platform operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("component toggle refused: {0}")]
    ToggleRefused(String),
    #[error("restart request rejected: {0}")]
    RestartRejected(String),
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle control of the notification-capture component.
pub trait CapturePlatform: Send + Sync {
    /// Whether the platform currently grants the capture capability.
    fn is_capture_enabled(&self) -> bool;

    fn disable_capture(&self) -> Result<(), PlatformError>;

    fn enable_capture(&self) -> Result<(), PlatformError>;

    /// Lightweight request to rebind the capture component.
    fn request_rebind(&self) -> Result<(), PlatformError>;

    /// Ask the platform to (re)start the background worker.
    fn request_restart(&self) -> Result<(), PlatformError>;
}

/// User-visible alert presentation.
pub trait AlertSink: Send + Sync {
    fn show_alert(&self, reason: &AlertReason, last_activity: Option<DateTime<Utc>>);

    fn dismiss_alert(&self, category: AlertCategory);

    fn dismiss_all(&self) {
        for category in AlertCategory::ALL {
            self.dismiss_alert(category);
        }
    }
}
