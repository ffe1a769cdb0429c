//! Relay Sentinel: keeps a notification-relay background worker alive
//!
//! Vendor Android builds kill background work aggressively, and the kill is
//! usually silent. This crate infers worker death from missing heartbeats,
//! escalates through increasingly invasive restarts, tells the user when
//! automatic recovery is not enough, and keeps the relay's pub/sub
//! connection and subscriptions alive across drops.
//!
//! ## Architecture
//!
//! - **Policy**: per-vendor tuning and remediation steps
//! - **Storage**: durable heartbeat record (sled)
//! - **Background**: death detector, health monitor, recovery manager, supervisor
//! - **Connection**: reconnect ladder and subscription replay
//! - **Platform**: traits for the capture component and user alerts

pub mod background;
pub mod clock;
pub mod config;
pub mod connection;
pub mod platform;
pub mod policy;
pub mod storage;
pub mod types;

pub use config::SentinelConfig;

pub use background::{
    BootRestorer, DeathDetector, DeathVerdict, HealthMonitor, RecoveryManager, StartReason,
    Supervisor, SupervisorDeps,
};

pub use clock::{Clock, ManualClock, SystemClock};

pub use connection::{ConnectionManager, LoopbackTransport, PubSubTransport, QoS, TransportError};

pub use platform::{AlertSink, CapturePlatform, PlatformError, SimulatedPlatform, TracingAlertSink};

pub use policy::{ManufacturerProfile, Vendor};

pub use storage::{HeartbeatStore, InMemoryStore, KeyValueStore, SledStore, StorageError};

pub use types::{
    AlertCategory, AlertReason, HealthState, RecoveryAttemptState, RecoveryResult,
    RecoveryStrategy,
};
