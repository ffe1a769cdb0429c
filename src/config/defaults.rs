//! System-wide default constants.
//!
//! Every value here is the built-in default for a field of
//! [`SentinelConfig`](super::SentinelConfig); operators can override any of them
//! from `sentinel.toml`.

// ============================================================================
// Liveness thresholds
// ============================================================================

/// Heartbeat age at cold start beyond which the worker is presumed dead (minutes).
pub const DEAD_ON_START_THRESHOLD_MINS: i64 = 15;

/// Heartbeat age beyond which the worker is considered degraded (minutes).
pub const DEGRADED_TIMEOUT_MINS: i64 = 30;

/// Heartbeat age beyond which the worker is considered critical (minutes).
pub const CRITICAL_TIMEOUT_MINS: i64 = 60;

/// Minimum spacing between two alerts of the same category (seconds).
pub const ALERT_COOLDOWN_SECS: i64 = 300;

// ============================================================================
// Recovery
// ============================================================================

/// Pause between platform component-state changes during recovery (ms).
///
/// The platform applies enable/disable asynchronously; the next step must not
/// run before the previous one has propagated.
pub const RECOVERY_STEP_DELAY_MS: u64 = 1_000;

// ============================================================================
// Connection
// ============================================================================

/// Saturating reconnect ladder (seconds). The last entry repeats forever.
pub const RECONNECT_LADDER_SECS: [u64; 5] = [2, 5, 15, 30, 60];

/// Client identifier presented to the broker.
pub const DEFAULT_CLIENT_ID: &str = "relay-sentinel";

// ============================================================================
// Worker
// ============================================================================

/// How often the running worker writes its heartbeat (seconds).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Storage
// ============================================================================

/// Default location of the durable heartbeat database.
pub const DEFAULT_STORE_PATH: &str = "./data/sentinel.db";
