//! Recovery Manager: escalating restart strategies
//!
//! Each failed attempt moves one rung up the ladder:
//!
//! | attempt index        | strategy        |
//! |----------------------|-----------------|
//! | 0                    | SoftRestart     |
//! | 1 ..= max-1          | ForceRestart    |
//! | max ..= 2*max-1      | DeepReset       |
//! | 2*max and beyond     | VendorSpecific  |
//!
//! Only one attempt runs at a time. A concurrent call returns
//! `RecoveryResult::InProgress` without touching the platform.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::platform::{CapturePlatform, PlatformError};
use crate::policy::ManufacturerProfile;
use crate::storage::{HeartbeatStore, StorageError};
use crate::types::{RecoveryAttemptState, RecoveryResult, RecoveryStrategy};

/// Failure of a single recovery step
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("clearing liveness record: {0}")]
    Storage(#[from] StorageError),
}

/// Clears the in-flight flag however the attempt ends, including when the
/// future is dropped mid-delay.
struct RecoveringGuard<'a>(&'a AtomicBool);

impl Drop for RecoveringGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RecoveryManager {
    platform: Arc<dyn CapturePlatform>,
    store: HeartbeatStore,
    clock: Arc<dyn Clock>,
    profile: ManufacturerProfile,
    step_delay: Duration,
    recovering: AtomicBool,
    current_attempt: AtomicU32,
}

impl RecoveryManager {
    pub fn new(
        platform: Arc<dyn CapturePlatform>,
        store: HeartbeatStore,
        clock: Arc<dyn Clock>,
        profile: ManufacturerProfile,
        step_delay: Duration,
    ) -> Self {
        Self {
            platform,
            store,
            clock,
            profile,
            step_delay,
            recovering: AtomicBool::new(false),
            current_attempt: AtomicU32::new(0),
        }
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt.load(Ordering::Acquire)
    }

    pub fn is_recovering(&self) -> bool {
        self.recovering.load(Ordering::Acquire)
    }

    pub fn max_retries(&self) -> u32 {
        self.profile.max_retries
    }

    /// Strategy for a given zero-based attempt index.
    pub fn strategy_for_attempt(&self, attempt: u32) -> RecoveryStrategy {
        let max = self.profile.max_retries.max(1);
        if attempt == 0 {
            RecoveryStrategy::SoftRestart
        } else if attempt < max {
            RecoveryStrategy::ForceRestart
        } else if attempt < max.saturating_mul(2) {
            RecoveryStrategy::DeepReset
        } else {
            RecoveryStrategy::VendorSpecific
        }
    }

    /// Strategy the next automatic attempt will use.
    pub fn appropriate_strategy(&self) -> RecoveryStrategy {
        self.strategy_for_attempt(self.current_attempt())
    }

    /// Automatic recovery has run out of quiet retries; the user must be told.
    pub fn should_notify_user(&self) -> bool {
        self.current_attempt() >= self.profile.max_retries
    }

    pub fn state(&self) -> RecoveryAttemptState {
        RecoveryAttemptState {
            current_attempt: self.current_attempt(),
            strategy: self.appropriate_strategy(),
            is_recovering: self.is_recovering(),
        }
    }

    /// End the current episode. Called once the worker is healthy again.
    pub fn reset(&self) {
        let previous = self.current_attempt.swap(0, Ordering::AcqRel);
        if previous > 0 {
            info!(attempts = previous, "Recovery episode finished, escalation reset");
        }
    }

    /// Run one recovery attempt.
    ///
    /// `strategy` overrides the escalation ladder for on-demand attempts.
    /// Step failures are reported as `RecoveryResult::Failure`; the attempt
    /// counter advances either way.
    pub async fn attempt_recovery(&self, strategy: Option<RecoveryStrategy>) -> RecoveryResult {
        if self
            .recovering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Recovery already in progress, ignoring request");
            return RecoveryResult::InProgress;
        }
        let _guard = RecoveringGuard(&self.recovering);

        let attempt = self.current_attempt();
        let strategy = strategy.unwrap_or_else(|| self.strategy_for_attempt(attempt));
        info!(
            attempt = attempt + 1,
            strategy = %strategy,
            vendor = %self.profile.vendor,
            "Attempting recovery"
        );

        let result = match self.execute(strategy).await {
            Ok(()) => {
                info!(strategy = %strategy, "Recovery steps completed");
                RecoveryResult::Success { strategy }
            }
            Err(e) => {
                warn!(strategy = %strategy, error = %e, "Recovery attempt failed");
                RecoveryResult::Failure {
                    strategy,
                    reason: e.to_string(),
                }
            }
        };

        let attempts = self
            .current_attempt
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1);
        if let Err(e) = self.store.record_recovery_attempt(
            self.clock.now(),
            attempts,
            strategy.as_str(),
            &result.outcome_label(),
        ) {
            error!(error = %e, "Failed to persist recovery diagnostics");
        }

        result
    }

    /// The concrete ladder rung a strategy runs as.
    pub fn resolve(&self, strategy: RecoveryStrategy) -> RecoveryStrategy {
        match strategy {
            RecoveryStrategy::VendorSpecific if self.profile.is_aggressive() => {
                RecoveryStrategy::DeepReset
            }
            RecoveryStrategy::VendorSpecific => RecoveryStrategy::ForceRestart,
            other => other,
        }
    }

    async fn execute(&self, strategy: RecoveryStrategy) -> Result<(), StepError> {
        match self.resolve(strategy) {
            RecoveryStrategy::SoftRestart => {
                self.platform.request_rebind()?;
            }
            RecoveryStrategy::DeepReset => {
                self.platform.disable_capture()?;
                self.pause().await;
                self.store.clear_activity()?;
                self.platform.enable_capture()?;
                self.pause().await;
                self.platform.request_restart()?;
            }
            // ForceRestart; VendorSpecific never survives `resolve`.
            _ => {
                self.platform.disable_capture()?;
                self.pause().await;
                self.platform.enable_capture()?;
                self.pause().await;
                self.platform.request_restart()?;
            }
        }
        Ok(())
    }

    /// The platform applies component toggles asynchronously.
    async fn pause(&self) {
        tokio::time::sleep(self.step_delay).await;
    }
}
