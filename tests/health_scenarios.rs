//! Health Scenario Tests
//!
//! Heartbeat-age classification with custom thresholds, alert cooldown
//! across repeated Critical transitions, and the escalation ladder as
//! driven by monitor results.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use relay_sentinel::background::{AlertCooldown, HealthMonitor, RecoveryCoordinator, RecoveryManager};
use relay_sentinel::clock::{Clock, ManualClock};
use relay_sentinel::config::ThresholdConfig;
use relay_sentinel::platform::{PlatformOp, SimulatedPlatform, TracingAlertSink};
use relay_sentinel::policy::{ManufacturerProfile, Vendor};
use relay_sentinel::storage::{HeartbeatStore, InMemoryStore};
use relay_sentinel::types::{AlertReason, HealthIssue, HealthState, RecoveryResult, RecoveryStrategy};

struct Harness {
    store: HeartbeatStore,
    platform: Arc<SimulatedPlatform>,
    alerts: Arc<TracingAlertSink>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        let harness = Self {
            store: HeartbeatStore::new(Arc::new(InMemoryStore::new())),
            platform: Arc::new(SimulatedPlatform::new(true)),
            alerts: Arc::new(TracingAlertSink::new()),
            clock: Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            )),
        };
        harness.store.mark_running(harness.clock.now()).unwrap();
        harness.store.record_heartbeat(harness.clock.now()).unwrap();
        harness
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn monitor(&self, vendor: Vendor, thresholds: ThresholdConfig) -> HealthMonitor {
        HealthMonitor::new(
            self.store.clone(),
            self.platform.clone(),
            self.alerts.clone(),
            self.clock.clone(),
            ManufacturerProfile::for_family(vendor),
            thresholds,
        )
    }

    fn recovery(&self, vendor: Vendor) -> Arc<RecoveryManager> {
        Arc::new(RecoveryManager::new(
            self.platform.clone(),
            self.store.clone(),
            self.clock.clone(),
            ManufacturerProfile::for_family(vendor),
            Duration::from_millis(500),
        ))
    }

    fn coordinator(&self, recovery: Arc<RecoveryManager>) -> RecoveryCoordinator {
        RecoveryCoordinator::new(
            recovery,
            self.store.clone(),
            self.alerts.clone(),
            self.clock.clone(),
            AlertCooldown::new(TimeDelta::minutes(5)),
        )
    }
}

fn critical() -> HealthState {
    HealthState::Critical {
        reason: HealthIssue::StaleHeartbeat { age_secs: 3700 },
        last_activity: None,
    }
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn classification_follows_configured_thresholds() {
    for (degraded, critical) in [(5_i64, 10_i64), (30, 60), (90, 240)] {
        let h = Harness::new();
        let thresholds = ThresholdConfig {
            degraded_timeout_mins: degraded,
            critical_timeout_mins: critical,
            ..ThresholdConfig::default()
        };
        let monitor = h.monitor(Vendor::Generic, thresholds);
        let at = |mins: i64| h.now() + TimeDelta::minutes(mins);

        assert_eq!(monitor.classify(at(degraded)), HealthState::Healthy, "{degraded}/{critical}");
        assert!(
            matches!(monitor.classify(at(degraded + 1)), HealthState::Degraded { .. }),
            "{degraded}/{critical}"
        );
        assert!(
            matches!(monitor.classify(at(critical)), HealthState::Degraded { .. }),
            "{degraded}/{critical}"
        );
        assert!(
            matches!(monitor.classify(at(critical + 1)), HealthState::Critical { .. }),
            "{degraded}/{critical}"
        );
    }
}

#[test]
fn degraded_since_marks_threshold_crossing() {
    let h = Harness::new();
    let monitor = h.monitor(Vendor::Generic, ThresholdConfig::default());
    let heartbeat = h.now();
    match monitor.classify(heartbeat + TimeDelta::minutes(45)) {
        HealthState::Degraded { since, .. } => {
            assert_eq!(since, heartbeat + TimeDelta::minutes(30));
        }
        other => panic!("expected degraded, got {other}"),
    }
}

#[test]
fn capture_disabled_overrides_heartbeat() {
    let h = Harness::new();
    let monitor = h.monitor(Vendor::Samsung, ThresholdConfig::default());
    h.platform.set_capture_enabled(false);

    assert_eq!(monitor.poll(), HealthState::Dead);
    assert_eq!(h.alerts.shown(), vec![AlertReason::CaptureDisabled]);
}

#[test]
fn current_health_has_no_side_effects() {
    let h = Harness::new();
    let monitor = h.monitor(Vendor::Generic, ThresholdConfig::default());
    h.clock.advance(TimeDelta::minutes(90));

    assert!(monitor.current_health().needs_recovery());
    assert!(h.alerts.events().is_empty());
    assert_eq!(monitor.last_observed(), HealthState::Healthy);
}

// ============================================================================
// Alert cooldown
// ============================================================================

#[test]
fn critical_alerts_respect_cooldown() {
    let h = Harness::new();
    let monitor = h.monitor(Vendor::Generic, ThresholdConfig::default());
    let stale = |now: DateTime<Utc>| now - TimeDelta::hours(2);

    // t+61: first Critical, alerted
    h.clock.advance(TimeDelta::minutes(61));
    assert!(monitor.poll().needs_recovery());

    // t+62: healthy again
    h.clock.advance(TimeDelta::minutes(1));
    h.store.record_heartbeat(h.now()).unwrap();
    assert!(monitor.poll().is_healthy());

    // t+63: second Critical inside the 5 min window, suppressed
    h.clock.advance(TimeDelta::minutes(1));
    h.store.record_heartbeat(stale(h.now())).unwrap();
    assert!(monitor.poll().needs_recovery());
    assert_eq!(h.alerts.shown().len(), 1);

    // t+64: healthy, then t+67: third Critical after the window, alerted
    h.clock.advance(TimeDelta::minutes(1));
    h.store.record_heartbeat(h.now()).unwrap();
    assert!(monitor.poll().is_healthy());
    h.clock.advance(TimeDelta::minutes(3));
    h.store.record_heartbeat(stale(h.now())).unwrap();
    assert!(monitor.poll().needs_recovery());

    assert_eq!(
        h.alerts.shown(),
        vec![AlertReason::BatteryOptimization, AlertReason::BatteryOptimization]
    );
}

// ============================================================================
// Escalation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn escalation_is_monotone_and_bounded() {
    let h = Harness::new();
    let recovery = h.recovery(Vendor::Generic);
    let mut coordinator = h.coordinator(recovery.clone());

    let mut strategies = Vec::new();
    for _ in 0..10 {
        if let Some(result) = coordinator.on_health(&critical()).await {
            match result {
                RecoveryResult::Success { strategy } | RecoveryResult::Failure { strategy, .. } => {
                    strategies.push(strategy);
                }
                RecoveryResult::InProgress => panic!("no concurrent attempt expected"),
            }
        }
    }

    // Generic: max_retries = 3, automatic attempts stop after the first VendorSpecific
    assert_eq!(
        strategies,
        vec![
            RecoveryStrategy::SoftRestart,
            RecoveryStrategy::ForceRestart,
            RecoveryStrategy::ForceRestart,
            RecoveryStrategy::DeepReset,
            RecoveryStrategy::DeepReset,
            RecoveryStrategy::DeepReset,
            RecoveryStrategy::VendorSpecific,
        ]
    );
    assert!(strategies.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(h.store.recovery_diagnostics().attempt_count, 7);

    // exactly one exhaustion alert, raised once the third attempt ran
    assert_eq!(
        h.alerts.shown(),
        vec![AlertReason::RecoveryExhausted { attempts: 3 }]
    );
}

#[tokio::test(start_paused = true)]
async fn healthy_result_resets_escalation() {
    let h = Harness::new();
    let recovery = h.recovery(Vendor::Generic);
    let mut coordinator = h.coordinator(recovery.clone());

    coordinator.on_health(&critical()).await;
    coordinator.on_health(&critical()).await;
    assert_eq!(recovery.current_attempt(), 2);

    assert!(coordinator.on_health(&HealthState::Healthy).await.is_none());
    assert_eq!(recovery.current_attempt(), 0);
    assert_eq!(recovery.appropriate_strategy(), RecoveryStrategy::SoftRestart);
}

#[tokio::test(start_paused = true)]
async fn degraded_and_stopped_states_do_not_recover() {
    let h = Harness::new();
    let recovery = h.recovery(Vendor::Generic);
    let mut coordinator = h.coordinator(recovery.clone());

    let degraded = HealthState::Degraded {
        reason: HealthIssue::StaleHeartbeat { age_secs: 2000 },
        since: h.now(),
    };
    assert!(coordinator.on_health(&degraded).await.is_none());

    h.store.set_should_be_running(false).unwrap();
    assert!(coordinator.on_health(&critical()).await.is_none());
    assert!(coordinator.on_health(&HealthState::Dead).await.is_none());
    assert!(h.platform.operations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn vendor_specific_rung_resolves_per_vendor() {
    let h = Harness::new();
    let aggressive = h.recovery(Vendor::Xiaomi);
    aggressive
        .attempt_recovery(Some(RecoveryStrategy::VendorSpecific))
        .await;
    // DeepReset wipes liveness evidence; ForceRestart does not
    assert_eq!(h.store.last_heartbeat(), None);

    let h = Harness::new();
    let lenient = h.recovery(Vendor::Generic);
    lenient
        .attempt_recovery(Some(RecoveryStrategy::VendorSpecific))
        .await;
    assert!(h.store.last_heartbeat().is_some());
    assert_eq!(
        h.platform.operations(),
        vec![
            PlatformOp::DisableCapture,
            PlatformOp::EnableCapture,
            PlatformOp::RequestRestart
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_toggle_aborts_attempt_and_escalates() {
    let h = Harness::new();
    let recovery = h.recovery(Vendor::Generic);
    h.platform.fail_on(PlatformOp::DisableCapture);

    let result = recovery
        .attempt_recovery(Some(RecoveryStrategy::ForceRestart))
        .await;

    assert!(matches!(result, RecoveryResult::Failure { .. }));
    assert_eq!(h.platform.operations(), vec![PlatformOp::DisableCapture]);
    assert_eq!(recovery.current_attempt(), 1);
    assert!(!recovery.is_recovering());
}
