//! Recovery escalation vocabulary

use serde::{Deserialize, Serialize};

/// Rungs of the escalation ladder, least to most invasive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecoveryStrategy {
    /// Ask the platform to rebind the capture component.
    SoftRestart,
    /// Disable and re-enable the capture component, then restart.
    ForceRestart,
    /// ForceRestart plus wiping persisted liveness evidence.
    DeepReset,
    /// Last resort, resolved per vendor profile to ForceRestart or DeepReset.
    VendorSpecific,
}

impl RecoveryStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SoftRestart => "SoftRestart",
            Self::ForceRestart => "ForceRestart",
            Self::DeepReset => "DeepReset",
            Self::VendorSpecific => "VendorSpecific",
        }
    }
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecoveryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "softrestart" | "soft" => Ok(Self::SoftRestart),
            "forcerestart" | "force" => Ok(Self::ForceRestart),
            "deepreset" | "deep" => Ok(Self::DeepReset),
            "vendorspecific" | "vendor" => Ok(Self::VendorSpecific),
            other => Err(format!("unknown recovery strategy '{other}'")),
        }
    }
}

/// Outcome of one `attempt_recovery` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RecoveryResult {
    Success { strategy: RecoveryStrategy },
    Failure { strategy: RecoveryStrategy, reason: String },
    /// Another attempt is running; nothing was done.
    InProgress,
}

impl RecoveryResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn outcome_label(&self) -> String {
        match self {
            Self::Success { .. } => "success".to_string(),
            Self::Failure { reason, .. } => format!("failure: {reason}"),
            Self::InProgress => "in progress".to_string(),
        }
    }
}

/// In-memory state of the current recovery episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecoveryAttemptState {
    pub current_attempt: u32,
    pub strategy: RecoveryStrategy,
    pub is_recovering: bool,
}

impl Default for RecoveryAttemptState {
    fn default() -> Self {
        Self {
            current_attempt: 0,
            strategy: RecoveryStrategy::SoftRestart,
            is_recovering: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_are_ordered_by_invasiveness() {
        assert!(RecoveryStrategy::SoftRestart < RecoveryStrategy::ForceRestart);
        assert!(RecoveryStrategy::ForceRestart < RecoveryStrategy::DeepReset);
        assert!(RecoveryStrategy::DeepReset < RecoveryStrategy::VendorSpecific);
    }

    #[test]
    fn parses_cli_spellings() {
        assert_eq!("deep-reset".parse::<RecoveryStrategy>(), Ok(RecoveryStrategy::DeepReset));
        assert_eq!("SoftRestart".parse::<RecoveryStrategy>(), Ok(RecoveryStrategy::SoftRestart));
        assert_eq!("force".parse::<RecoveryStrategy>(), Ok(RecoveryStrategy::ForceRestart));
        assert!("reboot".parse::<RecoveryStrategy>().is_err());
    }
}
