//! Health classification and alert vocabulary

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::policy::Vendor;

/// Why the worker is considered unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthIssue {
    /// Last heartbeat is older than the degraded (or critical) threshold.
    StaleHeartbeat { age_secs: i64 },
    /// The worker started but never produced a heartbeat.
    NoHeartbeatSinceStart,
}

impl std::fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleHeartbeat { age_secs } => {
                write!(f, "no heartbeat for {} min", age_secs / 60)
            }
            Self::NoHeartbeatSinceStart => write!(f, "no heartbeat since service start"),
        }
    }
}

/// Current health of the background worker, recomputed on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthState {
    Healthy,
    Degraded {
        reason: HealthIssue,
        since: DateTime<Utc>,
    },
    Critical {
        reason: HealthIssue,
        last_activity: Option<DateTime<Utc>>,
    },
    /// The platform revoked the capture capability.
    Dead,
}

impl HealthState {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Degraded { .. } => "DEGRADED",
            Self::Critical { .. } => "CRITICAL",
            Self::Dead => "DEAD",
        }
    }

    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Critical or Dead: states that warrant recovery.
    pub const fn needs_recovery(&self) -> bool {
        matches!(self, Self::Critical { .. } | Self::Dead)
    }

    /// Same variant, ignoring attached data.
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "HEALTHY"),
            Self::Degraded { reason, .. } => write!(f, "DEGRADED: {reason}"),
            Self::Critical { reason, .. } => write!(f, "CRITICAL: {reason}"),
            Self::Dead => write!(f, "DEAD: capture disabled by platform"),
        }
    }
}

/// Alert channel. Cooldowns and dismissals are tracked per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AlertCategory {
    ServiceHealth,
    CapturePermission,
    ServiceStopped,
    Recovery,
}

impl AlertCategory {
    pub const ALL: [Self; 4] = [
        Self::ServiceHealth,
        Self::CapturePermission,
        Self::ServiceStopped,
        Self::Recovery,
    ];
}

/// What a user-visible alert tells the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AlertReason {
    /// The vendor's process killer stopped the worker; whitelist the app.
    ManufacturerRestriction {
        vendor: Vendor,
        remediation_steps: Vec<String>,
    },
    /// Stock battery optimisation stopped the worker.
    BatteryOptimization,
    /// Notification capture permission was revoked.
    CaptureDisabled,
    /// Found dead at cold start.
    ServiceStopped,
    /// Automatic recovery gave up; user action required.
    RecoveryExhausted { attempts: u32 },
}

impl AlertReason {
    pub const fn category(&self) -> AlertCategory {
        match self {
            Self::ManufacturerRestriction { .. } | Self::BatteryOptimization => {
                AlertCategory::ServiceHealth
            }
            Self::CaptureDisabled => AlertCategory::CapturePermission,
            Self::ServiceStopped => AlertCategory::ServiceStopped,
            Self::RecoveryExhausted { .. } => AlertCategory::Recovery,
        }
    }
}

impl std::fmt::Display for AlertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ManufacturerRestriction { vendor, .. } => {
                write!(f, "{vendor} background restrictions stopped notification relay")
            }
            Self::BatteryOptimization => {
                write!(f, "battery optimisation stopped notification relay")
            }
            Self::CaptureDisabled => write!(f, "notification access was revoked"),
            Self::ServiceStopped => write!(f, "notification relay stopped while the app was closed"),
            Self::RecoveryExhausted { attempts } => {
                write!(f, "automatic restart failed after {attempts} attempts")
            }
        }
    }
}
