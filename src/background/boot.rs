//! Restore the worker after a device reboot

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::platform::CapturePlatform;
use crate::storage::HeartbeatStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootAction {
    /// The user had stopped the service before the reboot.
    Skipped,
    RestartRequested,
    RestartFailed(String),
}

pub struct BootRestorer {
    store: HeartbeatStore,
    platform: Arc<dyn CapturePlatform>,
    clock: Arc<dyn Clock>,
}

impl BootRestorer {
    pub fn new(
        store: HeartbeatStore,
        platform: Arc<dyn CapturePlatform>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            platform,
            clock,
        }
    }

    /// Bring the worker back if it was meant to be running.
    ///
    /// The pre-reboot heartbeat is discarded first; otherwise the monitor
    /// would see it as a stale heartbeat and report the reboot gap as an outage.
    pub fn on_boot_completed(&self) -> BootAction {
        if !self.store.should_be_running() {
            info!("Boot completed, service was stopped by the user");
            return BootAction::Skipped;
        }

        if let Err(e) = self.store.clear_activity() {
            warn!(error = %e, "Failed to clear pre-boot heartbeat");
        }

        if let Err(e) = self.platform.request_restart() {
            error!(error = %e, "Boot restart request rejected");
            return BootAction::RestartFailed(e.to_string());
        }

        if let Err(e) = self.store.mark_running(self.clock.now()) {
            warn!(error = %e, "Failed to mark service running after boot");
        }
        info!("Service restart requested after boot");
        BootAction::RestartRequested
    }
}
