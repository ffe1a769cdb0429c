//! Shared types for health classification, alerting and recovery.

pub mod health;
pub mod recovery;

pub use health::{AlertCategory, AlertReason, HealthIssue, HealthState};
pub use recovery::{RecoveryAttemptState, RecoveryResult, RecoveryStrategy};
