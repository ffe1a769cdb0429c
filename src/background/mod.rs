//! Background services: death detection, health monitoring and recovery
//!
//! The supervisor wires the components together for one worker run; each
//! component is usable on its own for on-demand checks from the CLI.

pub mod boot;
pub mod cooldown;
pub mod death_detector;
pub mod health_monitor;
pub mod recovery;
pub mod supervisor;

pub use boot::{BootAction, BootRestorer};
pub use cooldown::AlertCooldown;
pub use death_detector::{DeathCause, DeathDetector, DeathVerdict};
pub use health_monitor::HealthMonitor;
pub use recovery::RecoveryManager;
pub use supervisor::{
    RecoveryCoordinator, StartReason, StartReport, Supervisor, SupervisorDeps,
};
