//! Health Monitor: periodic heartbeat-age classification
//!
//! Every `check_interval` (taken from the vendor profile) the monitor reads
//! the heartbeat record and the capture flag, classifies the worker and acts
//! on state transitions:
//!
//! - into Healthy: dismiss every outstanding alert
//! - into Degraded: log only
//! - into Critical: alert, subject to the per-category cooldown
//! - into Dead: alert
//!
//! Nothing is ever raised while the worker is intentionally stopped.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cooldown::AlertCooldown;
use crate::clock::Clock;
use crate::config::ThresholdConfig;
use crate::platform::{AlertSink, CapturePlatform};
use crate::policy::ManufacturerProfile;
use crate::storage::HeartbeatStore;
use crate::types::{AlertReason, HealthIssue, HealthState};

struct MonitorState {
    previous: HealthState,
    cooldown: AlertCooldown,
    polls: u64,
    last_transition_at: Option<DateTime<Utc>>,
}

pub struct HealthMonitor {
    store: HeartbeatStore,
    platform: Arc<dyn CapturePlatform>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    profile: ManufacturerProfile,
    thresholds: ThresholdConfig,
    state: Mutex<MonitorState>,
}

impl HealthMonitor {
    pub fn new(
        store: HeartbeatStore,
        platform: Arc<dyn CapturePlatform>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        profile: ManufacturerProfile,
        thresholds: ThresholdConfig,
    ) -> Self {
        let cooldown = AlertCooldown::new(thresholds.alert_cooldown());
        Self {
            store,
            platform,
            alerts,
            clock,
            profile,
            thresholds,
            state: Mutex::new(MonitorState {
                previous: HealthState::Healthy,
                cooldown,
                polls: 0,
                last_transition_at: None,
            }),
        }
    }

    pub fn profile(&self) -> &ManufacturerProfile {
        &self.profile
    }

    /// Classify the worker at `now`. Reads only; no alerts, no state change.
    pub fn classify(&self, now: DateTime<Utc>) -> HealthState {
        if !self.platform.is_capture_enabled() {
            return HealthState::Dead;
        }

        let Some(last) = self.store.last_heartbeat() else {
            // Fresh start: give the worker time to produce its first heartbeat.
            let grace = self
                .thresholds
                .critical_timeout()
                .checked_mul(2)
                .unwrap_or(TimeDelta::MAX);
            let started = self.store.service_started_at();
            return match started {
                Some(at) if now - at <= grace => HealthState::Healthy,
                _ => HealthState::Critical {
                    reason: HealthIssue::NoHeartbeatSinceStart,
                    last_activity: started,
                },
            };
        };

        let age = now - last;
        if age > self.thresholds.critical_timeout() {
            HealthState::Critical {
                reason: HealthIssue::StaleHeartbeat {
                    age_secs: age.num_seconds(),
                },
                last_activity: Some(last),
            }
        } else if age > self.thresholds.degraded_timeout() {
            HealthState::Degraded {
                reason: HealthIssue::StaleHeartbeat {
                    age_secs: age.num_seconds(),
                },
                since: last + self.thresholds.degraded_timeout(),
            }
        } else {
            HealthState::Healthy
        }
    }

    /// Health right now, without side effects.
    pub fn current_health(&self) -> HealthState {
        self.classify(self.clock.now())
    }

    /// State observed by the most recent poll.
    pub fn last_observed(&self) -> HealthState {
        self.lock().previous.clone()
    }

    /// One monitoring cycle: classify, then handle a transition if any.
    pub fn poll(&self) -> HealthState {
        let now = self.clock.now();
        let current = self.classify(now);
        let intentionally_stopped = !self.store.should_be_running();

        let mut state = self.lock();
        state.polls += 1;
        let previous = std::mem::replace(&mut state.previous, current.clone());

        if current.same_kind(&previous) {
            debug!(state = current.label(), "Health unchanged");
            return current;
        }

        state.last_transition_at = Some(now);
        info!(
            from = previous.label(),
            to = current.label(),
            detail = %current,
            "Health state transition"
        );

        if intentionally_stopped {
            info!("Service intentionally stopped, alerts suppressed");
            return current;
        }

        match &current {
            HealthState::Healthy => self.alerts.dismiss_all(),
            HealthState::Degraded { reason, .. } => {
                warn!(reason = %reason, "Service degraded");
            }
            HealthState::Critical { last_activity, .. } => {
                let reason = self.critical_reason();
                let category = reason.category();
                if state.cooldown.can_alert(category, now) {
                    self.alerts.show_alert(&reason, *last_activity);
                    state.cooldown.record(category, now);
                } else {
                    debug!(?category, "Critical alert suppressed by cooldown");
                }
            }
            HealthState::Dead => {
                error!("Notification capture disabled by the platform");
                let reason = AlertReason::CaptureDisabled;
                self.alerts
                    .show_alert(&reason, self.store.last_heartbeat());
                state.cooldown.record(reason.category(), now);
            }
        }

        current
    }

    fn critical_reason(&self) -> AlertReason {
        if self.profile.is_aggressive() {
            AlertReason::ManufacturerRestriction {
                vendor: self.profile.vendor,
                remediation_steps: self.profile.remediation_steps.clone(),
            }
        } else {
            AlertReason::BatteryOptimization
        }
    }

    /// Poll every `check_interval` until cancelled, publishing each result.
    pub async fn run(&self, cancel: CancellationToken, updates: watch::Sender<HealthState>) {
        let interval = self.profile.check_interval;
        info!(
            vendor = %self.profile.vendor,
            interval_secs = interval.as_secs(),
            "Health monitor started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Health monitor stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    let state = self.poll();
                    updates.send_replace(state);
                }
            }
        }
    }

    /// Diagnostics snapshot for status output.
    pub fn report_health_metrics(&self) -> BTreeMap<String, Value> {
        let now = self.clock.now();
        let health = self.classify(now);
        let record = self.store.record();
        let recovery = self.store.recovery_diagnostics();
        let (polls, last_transition_at) = {
            let state = self.lock();
            (state.polls, state.last_transition_at)
        };

        let mut metrics = BTreeMap::new();
        metrics.insert("state".to_string(), json!(health.label()));
        metrics.insert("detail".to_string(), json!(health.to_string()));
        metrics.insert(
            "heartbeat_age_secs".to_string(),
            json!(record.last_heartbeat_at.map(|t| (now - t).num_seconds())),
        );
        metrics.insert(
            "last_heartbeat".to_string(),
            json!(record.last_heartbeat_at.map(|t| t.to_rfc3339())),
        );
        metrics.insert("should_be_running".to_string(), json!(record.should_be_running));
        metrics.insert(
            "capture_enabled".to_string(),
            json!(self.platform.is_capture_enabled()),
        );
        metrics.insert("vendor".to_string(), json!(self.profile.vendor.display_name()));
        metrics.insert("survival_rate".to_string(), json!(self.profile.survival_rate));
        metrics.insert(
            "check_interval_secs".to_string(),
            json!(self.profile.check_interval.as_secs()),
        );
        metrics.insert(
            "retry_interval_secs".to_string(),
            json!(self.profile.retry_interval.as_secs()),
        );
        metrics.insert("max_retries".to_string(), json!(self.profile.max_retries));
        metrics.insert("death_count".to_string(), json!(record.death_count));
        metrics.insert(
            "last_death".to_string(),
            json!(record.last_death_at.map(|t| t.to_rfc3339())),
        );
        metrics.insert(
            "recovery_attempts".to_string(),
            json!(recovery.attempt_count),
        );
        metrics.insert(
            "recovery_last_attempt".to_string(),
            json!(recovery.last_attempt_at.map(|t| t.to_rfc3339())),
        );
        metrics.insert(
            "recovery_last_strategy".to_string(),
            json!(recovery.last_strategy),
        );
        metrics.insert(
            "recovery_last_outcome".to_string(),
            json!(recovery.last_outcome),
        );
        metrics.insert("polls".to_string(), json!(polls));
        metrics.insert(
            "last_transition".to_string(),
            json!(last_transition_at.map(|t| t.to_rfc3339())),
        );
        metrics.insert("storage_backend".to_string(), json!(self.store.backend_name()));
        metrics
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::platform::{SimulatedPlatform, TracingAlertSink};
    use crate::policy::Vendor;
    use crate::storage::InMemoryStore;
    use crate::types::AlertCategory;
    use chrono::TimeZone;

    struct Fixture {
        store: HeartbeatStore,
        platform: Arc<SimulatedPlatform>,
        alerts: Arc<TracingAlertSink>,
        clock: Arc<ManualClock>,
        monitor: HealthMonitor,
    }

    fn fixture(vendor: Vendor) -> Fixture {
        let store = HeartbeatStore::new(Arc::new(InMemoryStore::new()));
        let platform = Arc::new(SimulatedPlatform::new(true));
        let alerts = Arc::new(TracingAlertSink::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        ));
        let monitor = HealthMonitor::new(
            store.clone(),
            platform.clone(),
            alerts.clone(),
            clock.clone(),
            ManufacturerProfile::for_family(vendor),
            ThresholdConfig::default(),
        );
        store.mark_running(clock.now()).unwrap();
        store.record_heartbeat(clock.now()).unwrap();
        Fixture {
            store,
            platform,
            alerts,
            clock,
            monitor,
        }
    }

    #[test]
    fn classification_bands() {
        let fx = fixture(Vendor::Generic);
        let start = fx.clock.now();
        let at = |mins| start + TimeDelta::minutes(mins);

        assert_eq!(fx.monitor.classify(at(0)), HealthState::Healthy);
        assert_eq!(fx.monitor.classify(at(30)), HealthState::Healthy);
        assert!(matches!(fx.monitor.classify(at(31)), HealthState::Degraded { .. }));
        assert!(matches!(fx.monitor.classify(at(60)), HealthState::Degraded { .. }));
        assert!(matches!(
            fx.monitor.classify(at(61)),
            HealthState::Critical { last_activity: Some(t), .. } if t == start
        ));
    }

    #[test]
    fn capture_disabled_is_dead_even_with_fresh_heartbeat() {
        let fx = fixture(Vendor::Generic);
        fx.platform.set_capture_enabled(false);
        assert_eq!(fx.monitor.current_health(), HealthState::Dead);
    }

    #[test]
    fn no_heartbeat_gets_grace_after_start() {
        let fx = fixture(Vendor::Generic);
        fx.store.clear_activity().unwrap();
        fx.store.mark_running(fx.clock.now()).unwrap();
        let start = fx.clock.now();

        assert_eq!(
            fx.monitor.classify(start + TimeDelta::minutes(120)),
            HealthState::Healthy
        );
        assert_eq!(
            fx.monitor.classify(start + TimeDelta::minutes(121)),
            HealthState::Critical {
                reason: HealthIssue::NoHeartbeatSinceStart,
                last_activity: Some(start),
            }
        );
    }

    #[test]
    fn aggressive_vendor_gets_manufacturer_alert() {
        let fx = fixture(Vendor::Xiaomi);
        fx.clock.advance(TimeDelta::minutes(61));
        fx.monitor.poll();

        let shown = fx.alerts.shown();
        assert_eq!(shown.len(), 1);
        assert!(matches!(
            &shown[0],
            AlertReason::ManufacturerRestriction { vendor: Vendor::Xiaomi, remediation_steps }
                if !remediation_steps.is_empty()
        ));
    }

    #[test]
    fn generic_vendor_gets_battery_alert() {
        let fx = fixture(Vendor::Generic);
        fx.clock.advance(TimeDelta::minutes(61));
        fx.monitor.poll();
        assert_eq!(fx.alerts.shown(), vec![AlertReason::BatteryOptimization]);
    }

    #[test]
    fn degraded_only_logs() {
        let fx = fixture(Vendor::Generic);
        fx.clock.advance(TimeDelta::minutes(45));
        assert!(matches!(fx.monitor.poll(), HealthState::Degraded { .. }));
        assert!(fx.alerts.events().is_empty());
    }

    #[test]
    fn recovery_to_healthy_dismisses_alerts() {
        let fx = fixture(Vendor::Generic);
        fx.clock.advance(TimeDelta::minutes(61));
        fx.monitor.poll();
        fx.store.record_heartbeat(fx.clock.now()).unwrap();
        assert_eq!(fx.monitor.poll(), HealthState::Healthy);
        assert_eq!(fx.alerts.dismissed(), AlertCategory::ALL.to_vec());
    }

    #[test]
    fn intentional_stop_never_alerts() {
        let fx = fixture(Vendor::Xiaomi);
        fx.store.set_should_be_running(false).unwrap();
        fx.clock.advance(TimeDelta::minutes(61));
        assert!(fx.monitor.poll().needs_recovery());
        fx.platform.set_capture_enabled(false);
        assert_eq!(fx.monitor.poll(), HealthState::Dead);
        assert!(fx.alerts.events().is_empty());
    }

    #[test]
    fn repeated_critical_poll_alerts_once() {
        let fx = fixture(Vendor::Generic);
        fx.clock.advance(TimeDelta::minutes(61));
        fx.monitor.poll();
        fx.clock.advance(TimeDelta::minutes(20));
        fx.monitor.poll();
        assert_eq!(fx.alerts.shown().len(), 1);
    }

    #[test]
    fn metrics_report_core_fields() {
        let fx = fixture(Vendor::Huawei);
        fx.clock.advance(TimeDelta::minutes(2));
        let metrics = fx.monitor.report_health_metrics();
        assert_eq!(metrics["state"], json!("HEALTHY"));
        assert_eq!(metrics["heartbeat_age_secs"], json!(120));
        assert_eq!(metrics["vendor"], json!("Huawei"));
        assert_eq!(
            metrics["retry_interval_secs"],
            json!(ManufacturerProfile::for_family(Vendor::Huawei).retry_interval.as_secs())
        );
        assert_eq!(metrics["should_be_running"], json!(true));
        assert_eq!(metrics["storage_backend"], json!("in-memory"));
    }
}
