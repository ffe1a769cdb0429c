//! Worker supervisor
//!
//! Owns every health component for the lifetime of one worker run. Created
//! at worker start and dropped at worker stop, so no state outlives the
//! worker except what is in the heartbeat store.
//!
//! Tasks (all cancelled through one `CancellationToken`):
//! - heartbeat writer
//! - health monitor poll loop
//! - recovery coordinator reacting to monitor results
//! - the connection manager's reconnect loop (child token)

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::boot::{BootAction, BootRestorer};
use super::cooldown::AlertCooldown;
use super::death_detector::{DeathDetector, DeathVerdict};
use super::health_monitor::HealthMonitor;
use super::recovery::RecoveryManager;
use crate::clock::Clock;
use crate::config::SentinelConfig;
use crate::connection::{ConnectionManager, PubSubTransport, QoS, ReconnectPolicy};
use crate::platform::{AlertSink, CapturePlatform};
use crate::policy::ManufacturerProfile;
use crate::storage::HeartbeatStore;
use crate::types::{AlertReason, HealthState, RecoveryResult};

/// Why the worker is starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartReason {
    /// Process start: check for a silent death first.
    ColdStart,
    /// Device boot: restore instead of reporting the reboot as a death.
    Boot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    pub death: Option<DeathVerdict>,
    pub boot: Option<BootAction>,
    pub connected: bool,
}

/// External collaborators.
#[derive(Clone)]
pub struct SupervisorDeps {
    pub store: HeartbeatStore,
    pub platform: Arc<dyn CapturePlatform>,
    pub alerts: Arc<dyn AlertSink>,
    pub transport: Arc<dyn PubSubTransport>,
    pub clock: Arc<dyn Clock>,
}

/// Turns monitor results into recovery attempts and the exhaustion alert.
pub struct RecoveryCoordinator {
    recovery: Arc<RecoveryManager>,
    store: HeartbeatStore,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    cooldown: AlertCooldown,
    exhaustion_alerted: bool,
}

impl RecoveryCoordinator {
    pub fn new(
        recovery: Arc<RecoveryManager>,
        store: HeartbeatStore,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        cooldown: AlertCooldown,
    ) -> Self {
        Self {
            recovery,
            store,
            alerts,
            clock,
            cooldown,
            exhaustion_alerted: false,
        }
    }

    /// Highest attempt index tried automatically: the first VendorSpecific rung.
    fn automatic_limit(&self) -> u32 {
        self.recovery.max_retries().max(1).saturating_mul(2)
    }

    /// React to one monitor result. Returns the attempt made, if any.
    pub async fn on_health(&mut self, state: &HealthState) -> Option<RecoveryResult> {
        if state.is_healthy() {
            self.recovery.reset();
            self.exhaustion_alerted = false;
            return None;
        }
        if !state.needs_recovery() {
            return None;
        }
        if !self.store.should_be_running() {
            debug!("Service intentionally stopped, no recovery");
            return None;
        }
        if self.recovery.current_attempt() > self.automatic_limit() {
            debug!(
                attempts = self.recovery.current_attempt(),
                "Automatic recovery exhausted, waiting for user action"
            );
            return None;
        }

        let result = self.recovery.attempt_recovery(None).await;
        if self.recovery.should_notify_user() {
            self.alert_exhausted();
        }
        Some(result)
    }

    fn alert_exhausted(&mut self) {
        if self.exhaustion_alerted {
            return;
        }
        let now = self.clock.now();
        let reason = AlertReason::RecoveryExhausted {
            attempts: self.recovery.current_attempt(),
        };
        if !self.cooldown.can_alert(reason.category(), now) {
            debug!("Recovery exhaustion alert suppressed by cooldown");
            return;
        }
        warn!(attempts = self.recovery.current_attempt(), "Automatic recovery exhausted");
        self.alerts.show_alert(&reason, self.store.last_heartbeat());
        self.cooldown.record(reason.category(), now);
        self.exhaustion_alerted = true;
    }

    async fn run(mut self, mut updates: watch::Receiver<HealthState>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = updates.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
            let state = updates.borrow_and_update().clone();
            if let Some(result) = self.on_health(&state).await {
                info!(outcome = %result.outcome_label(), "Automatic recovery attempt finished");
            }
        }
    }
}

pub struct Supervisor {
    config: SentinelConfig,
    profile: ManufacturerProfile,
    store: HeartbeatStore,
    platform: Arc<dyn CapturePlatform>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    monitor: Arc<HealthMonitor>,
    recovery: Arc<RecoveryManager>,
    connection: Arc<ConnectionManager>,
    health_tx: watch::Sender<HealthState>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl Supervisor {
    pub fn new(config: SentinelConfig, deps: SupervisorDeps) -> Self {
        let profile = ManufacturerProfile::for_vendor(&config.device.vendor);
        let cancel = CancellationToken::new();

        let monitor = Arc::new(HealthMonitor::new(
            deps.store.clone(),
            deps.platform.clone(),
            deps.alerts.clone(),
            deps.clock.clone(),
            profile.clone(),
            config.thresholds,
        ));
        let recovery = Arc::new(RecoveryManager::new(
            deps.platform.clone(),
            deps.store.clone(),
            deps.clock.clone(),
            profile.clone(),
            config.recovery.step_delay(),
        ));
        let connection = Arc::new(ConnectionManager::new(
            deps.transport,
            ReconnectPolicy::new(config.connection.reconnect_ladder()),
            cancel.child_token(),
        ));
        let (health_tx, _) = watch::channel(HealthState::Healthy);

        Self {
            config,
            profile,
            store: deps.store,
            platform: deps.platform,
            alerts: deps.alerts,
            clock: deps.clock,
            monitor,
            recovery,
            connection,
            health_tx,
            cancel,
            tasks: JoinSet::new(),
        }
    }

    pub fn profile(&self) -> &ManufacturerProfile {
        &self.profile
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn recovery(&self) -> &Arc<RecoveryManager> {
        &self.recovery
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn store(&self) -> &HeartbeatStore {
        &self.store
    }

    /// Receive every monitor poll result.
    pub fn subscribe_health(&self) -> watch::Receiver<HealthState> {
        self.health_tx.subscribe()
    }

    /// Start-of-run checks, then the worker tasks.
    pub async fn start(&mut self, reason: StartReason) -> StartReport {
        info!(
            vendor = %self.profile.vendor,
            check_interval_secs = self.profile.check_interval.as_secs(),
            max_retries = self.profile.max_retries,
            client_id = %self.config.connection.client_id,
            ?reason,
            "Supervisor starting"
        );

        let mut report = StartReport {
            death: None,
            boot: None,
            connected: false,
        };
        match reason {
            StartReason::ColdStart => {
                let detector = DeathDetector::new(
                    self.store.clone(),
                    self.alerts.clone(),
                    self.clock.clone(),
                    self.config.thresholds.dead_on_start(),
                );
                report.death = Some(detector.check_on_start());
            }
            StartReason::Boot => {
                let restorer =
                    BootRestorer::new(self.store.clone(), self.platform.clone(), self.clock.clone());
                report.boot = Some(restorer.on_boot_completed());
            }
        }

        let now = self.clock.now();
        if let Err(e) = self.store.mark_running(now) {
            error!(error = %e, "Failed to mark service running");
        }
        if let Err(e) = self.store.record_heartbeat(now) {
            error!(error = %e, "Failed to record initial heartbeat");
        }

        for topic in &self.config.connection.topics {
            if let Err(e) = self.connection.subscribe(topic, QoS::AtLeastOnce).await {
                warn!(topic = %topic, error = %e, "Initial subscribe failed");
            }
        }
        report.connected = match self.connection.connect().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Initial connect failed, scheduling reconnect");
                self.connection.schedule_reconnect(None);
                false
            }
        };

        self.spawn_tasks();
        info!(connected = report.connected, "Supervisor started");
        report
    }

    fn spawn_tasks(&mut self) {
        let store = self.store.clone();
        let clock = self.clock.clone();
        let interval = Duration::from_secs(self.config.worker.heartbeat_interval_secs);
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            heartbeat_loop(store, clock, interval, cancel).await;
        });

        let monitor = self.monitor.clone();
        let health_tx = self.health_tx.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            monitor.run(cancel, health_tx).await;
        });

        let coordinator = RecoveryCoordinator::new(
            self.recovery.clone(),
            self.store.clone(),
            self.alerts.clone(),
            self.clock.clone(),
            AlertCooldown::new(self.config.thresholds.alert_cooldown()),
        );
        let updates = self.health_tx.subscribe();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            coordinator.run(updates, cancel).await;
        });
    }

    /// Diagnostics across monitor, recovery and connection.
    pub fn status(&self) -> BTreeMap<String, Value> {
        let mut status = self.monitor.report_health_metrics();
        let recovery = self.recovery.state();
        status.insert("recovery_current_attempt".to_string(), json!(recovery.current_attempt));
        status.insert("recovery_next_strategy".to_string(), json!(recovery.strategy.as_str()));
        status.insert("recovery_in_progress".to_string(), json!(recovery.is_recovering));

        let backoff = self.connection.backoff_state();
        status.insert("connected".to_string(), json!(self.connection.is_connected()));
        status.insert("reconnecting".to_string(), json!(backoff.is_reconnecting));
        status.insert("reconnect_attempt".to_string(), json!(backoff.attempt_index));
        status.insert("reconnections".to_string(), json!(backoff.reconnections));
        status.insert("subscriptions".to_string(), json!(self.connection.subscriptions()));
        status
    }

    /// Intentional stop: clear the intent to run, dismiss alerts, stop tasks.
    pub async fn stop(self) {
        info!("Service stopped by user");
        if let Err(e) = self.store.set_should_be_running(false) {
            error!(error = %e, "Failed to persist stopped state");
        }
        self.alerts.dismiss_all();
        self.shutdown().await;
    }

    /// Stop all tasks without touching the persisted intent, as when the
    /// process is killed.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        self.connection.shutdown().await;
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "Supervisor task ended abnormally");
            }
        }
        info!("Supervisor shut down");
    }
}

async fn heartbeat_loop(
    store: HeartbeatStore,
    clock: Arc<dyn Clock>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {
                let now: DateTime<Utc> = clock.now();
                if let Err(e) = store.record_heartbeat(now) {
                    error!(error = %e, "Failed to record heartbeat");
                }
            }
        }
    }
}
