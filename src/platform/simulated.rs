//! In-process platform used when no real device is attached.
//!
//! `SimulatedPlatform` keeps the capture flag in memory and records every
//! operation; failures can be injected per operation. `TracingAlertSink`
//! renders alerts as log lines and keeps a history.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

use super::{AlertSink, CapturePlatform, PlatformError};
use crate::types::{AlertCategory, AlertReason};

/// One recorded platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformOp {
    DisableCapture,
    EnableCapture,
    RequestRebind,
    RequestRestart,
}

#[derive(Debug)]
pub struct SimulatedPlatform {
    capture_enabled: AtomicBool,
    ops: Mutex<Vec<PlatformOp>>,
    failing: Mutex<HashSet<PlatformOp>>,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SimulatedPlatform {
    pub fn new(capture_enabled: bool) -> Self {
        Self {
            capture_enabled: AtomicBool::new(capture_enabled),
            ops: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Simulate the user or OS revoking / granting capture.
    pub fn set_capture_enabled(&self, enabled: bool) {
        self.capture_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Make every future call of `op` fail until [`clear_failures`](Self::clear_failures).
    pub fn fail_on(&self, op: PlatformOp) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(op);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    /// All calls made so far, including failed ones.
    pub fn operations(&self) -> Vec<PlatformOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    pub fn clear_operations(&self) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.clear();
        }
    }

    fn perform(&self, op: PlatformOp) -> Result<(), PlatformError> {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
        let should_fail = self.failing.lock().is_ok_and(|f| f.contains(&op));
        if should_fail {
            warn!(?op, "Simulated platform operation failed");
            return Err(match op {
                PlatformOp::DisableCapture | PlatformOp::EnableCapture => {
                    PlatformError::ToggleRefused(format!("{op:?} injected failure"))
                }
                PlatformOp::RequestRebind | PlatformOp::RequestRestart => {
                    PlatformError::RestartRejected(format!("{op:?} injected failure"))
                }
            });
        }
        info!(?op, "Simulated platform operation");
        Ok(())
    }
}

impl CapturePlatform for SimulatedPlatform {
    fn is_capture_enabled(&self) -> bool {
        self.capture_enabled.load(Ordering::SeqCst)
    }

    fn disable_capture(&self) -> Result<(), PlatformError> {
        self.perform(PlatformOp::DisableCapture)?;
        self.capture_enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn enable_capture(&self) -> Result<(), PlatformError> {
        self.perform(PlatformOp::EnableCapture)?;
        self.capture_enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn request_rebind(&self) -> Result<(), PlatformError> {
        self.perform(PlatformOp::RequestRebind)
    }

    fn request_restart(&self) -> Result<(), PlatformError> {
        self.perform(PlatformOp::RequestRestart)
    }
}

/// One recorded alert interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    Shown {
        reason: AlertReason,
        last_activity: Option<DateTime<Utc>>,
    },
    Dismissed(AlertCategory),
}

/// Alert sink that logs every alert and keeps the history.
#[derive(Debug, Default)]
pub struct TracingAlertSink {
    events: Mutex<Vec<AlertEvent>>,
}

impl TracingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Reasons of all alerts shown so far, oldest first.
    pub fn shown(&self) -> Vec<AlertReason> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AlertEvent::Shown { reason, .. } => Some(reason),
                AlertEvent::Dismissed(_) => None,
            })
            .collect()
    }

    pub fn dismissed(&self) -> Vec<AlertCategory> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AlertEvent::Dismissed(c) => Some(c),
                AlertEvent::Shown { .. } => None,
            })
            .collect()
    }

    fn push(&self, event: AlertEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl AlertSink for TracingAlertSink {
    fn show_alert(&self, reason: &AlertReason, last_activity: Option<DateTime<Utc>>) {
        warn!(
            category = ?reason.category(),
            last_activity = ?last_activity,
            "ALERT: {}",
            reason
        );
        if let AlertReason::ManufacturerRestriction {
            remediation_steps, ..
        } = reason
        {
            for (i, step) in remediation_steps.iter().enumerate() {
                info!("  {}. {}", i + 1, step);
            }
        }
        self.push(AlertEvent::Shown {
            reason: reason.clone(),
            last_activity,
        });
    }

    fn dismiss_alert(&self, category: AlertCategory) {
        info!(?category, "Alert dismissed");
        self.push(AlertEvent::Dismissed(category));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_track_capture_state() {
        let platform = SimulatedPlatform::new(true);
        platform.disable_capture().unwrap();
        assert!(!platform.is_capture_enabled());
        platform.enable_capture().unwrap();
        assert!(platform.is_capture_enabled());
        assert_eq!(
            platform.operations(),
            vec![PlatformOp::DisableCapture, PlatformOp::EnableCapture]
        );
    }

    #[test]
    fn injected_failure_is_recorded_and_returned() {
        let platform = SimulatedPlatform::new(true);
        platform.fail_on(PlatformOp::DisableCapture);
        assert!(matches!(
            platform.disable_capture(),
            Err(PlatformError::ToggleRefused(_))
        ));
        assert!(platform.is_capture_enabled());
        assert_eq!(platform.operations(), vec![PlatformOp::DisableCapture]);
    }

    #[test]
    fn dismiss_all_covers_every_category() {
        let sink = TracingAlertSink::new();
        sink.show_alert(&AlertReason::BatteryOptimization, None);
        sink.dismiss_all();
        assert_eq!(sink.shown(), vec![AlertReason::BatteryOptimization]);
        assert_eq!(sink.dismissed(), AlertCategory::ALL.to_vec());
    }
}
