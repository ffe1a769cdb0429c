//! Heartbeat Store
//!
//! The one component that reads and writes the worker's persisted liveness
//! record. The running worker, the cold-start death detector, the boot
//! restorer, the health monitor and the recovery manager all go through this
//! type, so key names and defaults are defined exactly once.
//!
//! Write ordering for multi-key updates is timestamp first, then the boolean,
//! then counters. A reader that observes a half-applied update therefore never
//! sees fresh liveness evidence that was not actually produced.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use super::kv::{KeyValueStore, StorageError};

mod keys {
    pub const SHOULD_BE_RUNNING: &str = "service.should_be_running";
    pub const LAST_HEARTBEAT_MS: &str = "service.last_heartbeat_ms";
    pub const STARTED_AT_MS: &str = "service.started_at_ms";
    pub const DEATH_COUNT: &str = "service.death_count";
    pub const LAST_DEATH_MS: &str = "service.last_death_ms";
    pub const DEATH_ALERT_SHOWN: &str = "service.death_alert_shown";
    pub const RECOVERY_LAST_ATTEMPT_MS: &str = "recovery.last_attempt_ms";
    pub const RECOVERY_ATTEMPT_COUNT: &str = "recovery.attempt_count";
    pub const RECOVERY_LAST_STRATEGY: &str = "recovery.last_strategy";
    pub const RECOVERY_LAST_OUTCOME: &str = "recovery.last_outcome";
}

/// Snapshot of the persisted liveness record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartbeatRecord {
    pub should_be_running: bool,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub death_count: u32,
    pub last_death_at: Option<DateTime<Utc>>,
}

/// Persisted diagnostics of the most recent recovery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RecoveryDiagnostics {
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub last_strategy: Option<String>,
    pub last_outcome: Option<String>,
}

/// Typed access to the liveness record.
#[derive(Clone)]
pub struct HeartbeatStore {
    kv: Arc<dyn KeyValueStore>,
}

impl HeartbeatStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn backend_name(&self) -> &'static str {
        self.kv.backend_name()
    }

    // ------------------------------------------------------------------
    // Worker-side writes
    // ------------------------------------------------------------------

    /// Declare that the worker has started and intends to keep running.
    ///
    /// Also re-arms the cold-start death alert.
    pub fn mark_running(&self, now: DateTime<Utc>) -> Result<(), StorageError> {
        self.kv.put_i64(keys::STARTED_AT_MS, now.timestamp_millis())?;
        self.kv.put_bool(keys::DEATH_ALERT_SHOWN, false)?;
        self.kv.put_bool(keys::SHOULD_BE_RUNNING, true)
    }

    pub fn record_heartbeat(&self, now: DateTime<Utc>) -> Result<(), StorageError> {
        self.kv.put_i64(keys::LAST_HEARTBEAT_MS, now.timestamp_millis())
    }

    pub fn set_should_be_running(&self, value: bool) -> Result<(), StorageError> {
        self.kv.put_bool(keys::SHOULD_BE_RUNNING, value)
    }

    // ------------------------------------------------------------------
    // Reads (defaults on backend failure)
    // ------------------------------------------------------------------

    pub fn should_be_running(&self) -> bool {
        self.read_bool(keys::SHOULD_BE_RUNNING).unwrap_or(false)
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.read_time(keys::LAST_HEARTBEAT_MS)
    }

    /// When the worker last called [`mark_running`](Self::mark_running).
    pub fn service_started_at(&self) -> Option<DateTime<Utc>> {
        self.read_time(keys::STARTED_AT_MS)
    }

    pub fn death_count(&self) -> u32 {
        self.read_i64(keys::DEATH_COUNT)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    }

    pub fn last_death_at(&self) -> Option<DateTime<Utc>> {
        self.read_time(keys::LAST_DEATH_MS)
    }

    pub fn record(&self) -> HeartbeatRecord {
        HeartbeatRecord {
            should_be_running: self.should_be_running(),
            last_heartbeat_at: self.last_heartbeat(),
            death_count: self.death_count(),
            last_death_at: self.last_death_at(),
        }
    }

    // ------------------------------------------------------------------
    // Death bookkeeping
    // ------------------------------------------------------------------

    pub fn increment_death_count(&self) -> Result<u32, StorageError> {
        let count = self.kv.increment(keys::DEATH_COUNT)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Record a detected silent death: timestamp, then stopped state, then counter.
    pub fn record_death(&self, now: DateTime<Utc>) -> Result<u32, StorageError> {
        self.kv.put_i64(keys::LAST_DEATH_MS, now.timestamp_millis())?;
        self.kv.put_bool(keys::SHOULD_BE_RUNNING, false)?;
        self.increment_death_count()
    }

    pub fn death_alert_shown(&self) -> bool {
        self.read_bool(keys::DEATH_ALERT_SHOWN).unwrap_or(false)
    }

    pub fn set_death_alert_shown(&self, shown: bool) -> Result<(), StorageError> {
        self.kv.put_bool(keys::DEATH_ALERT_SHOWN, shown)
    }

    /// Forget all liveness evidence so stale pre-reset heartbeats cannot be
    /// read as proof that the worker is alive.
    pub fn clear_activity(&self) -> Result<(), StorageError> {
        self.kv.remove(keys::LAST_HEARTBEAT_MS)?;
        self.kv.remove(keys::STARTED_AT_MS)
    }

    // ------------------------------------------------------------------
    // Recovery diagnostics
    // ------------------------------------------------------------------

    pub fn record_recovery_attempt(
        &self,
        now: DateTime<Utc>,
        attempt_count: u32,
        strategy: &str,
        outcome: &str,
    ) -> Result<(), StorageError> {
        self.kv
            .put_i64(keys::RECOVERY_LAST_ATTEMPT_MS, now.timestamp_millis())?;
        self.kv
            .put_i64(keys::RECOVERY_ATTEMPT_COUNT, i64::from(attempt_count))?;
        self.kv.put_string(keys::RECOVERY_LAST_STRATEGY, strategy)?;
        self.kv.put_string(keys::RECOVERY_LAST_OUTCOME, outcome)
    }

    pub fn recovery_diagnostics(&self) -> RecoveryDiagnostics {
        RecoveryDiagnostics {
            last_attempt_at: self.read_time(keys::RECOVERY_LAST_ATTEMPT_MS),
            attempt_count: self
                .read_i64(keys::RECOVERY_ATTEMPT_COUNT)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            last_strategy: self.read_string(keys::RECOVERY_LAST_STRATEGY),
            last_outcome: self.read_string(keys::RECOVERY_LAST_OUTCOME),
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn read_i64(&self, key: &str) -> Option<i64> {
        self.kv.get_i64(key).unwrap_or_else(|e| {
            warn!(key, error = %e, "Heartbeat store read failed");
            None
        })
    }

    fn read_bool(&self, key: &str) -> Option<bool> {
        self.kv.get_bool(key).unwrap_or_else(|e| {
            warn!(key, error = %e, "Heartbeat store read failed");
            None
        })
    }

    fn read_string(&self, key: &str) -> Option<String> {
        self.kv.get_string(key).unwrap_or_else(|e| {
            warn!(key, error = %e, "Heartbeat store read failed");
            None
        })
    }

    fn read_time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.read_i64(key).and_then(DateTime::from_timestamp_millis)
    }
}
