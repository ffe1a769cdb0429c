//! Cold-start death detection
//!
//! Runs once when the process starts, before the monitor. If the stored
//! intent says the worker should be running but there is no recent heartbeat,
//! the worker died while nobody was watching: tell the user once and record
//! the death.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::platform::AlertSink;
use crate::storage::HeartbeatStore;
use crate::types::AlertReason;

/// Why the worker was found dead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeathCause {
    /// Intent to run is set but no heartbeat was ever recorded.
    NeverStarted,
    StaleHeartbeat {
        age_secs: i64,
        last_heartbeat: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeathVerdict {
    /// The user stopped the service; not a death.
    IntentionallyStopped,
    Alive { heartbeat_age_secs: i64 },
    Dead { cause: DeathCause, death_count: u32 },
}

impl DeathVerdict {
    pub const fn is_dead(&self) -> bool {
        matches!(self, Self::Dead { .. })
    }
}

pub struct DeathDetector {
    store: HeartbeatStore,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    threshold: TimeDelta,
}

impl DeathDetector {
    pub fn new(
        store: HeartbeatStore,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        threshold: TimeDelta,
    ) -> Self {
        Self {
            store,
            alerts,
            clock,
            threshold,
        }
    }

    /// Inspect the persisted record. Consumes the detector: one check per
    /// cold start.
    pub fn check_on_start(self) -> DeathVerdict {
        if !self.store.should_be_running() {
            info!("Service intentionally stopped, skipping death check");
            return DeathVerdict::IntentionallyStopped;
        }

        let now = self.clock.now();
        let last = self.store.last_heartbeat();
        let cause = match last {
            None => DeathCause::NeverStarted,
            Some(last) => {
                let age = now - last;
                if age <= self.threshold {
                    info!(heartbeat_age_secs = age.num_seconds(), "Service alive at cold start");
                    return DeathVerdict::Alive {
                        heartbeat_age_secs: age.num_seconds(),
                    };
                }
                DeathCause::StaleHeartbeat {
                    age_secs: age.num_seconds(),
                    last_heartbeat: last,
                }
            }
        };

        warn!(?cause, "Service died while the app was not running");

        if self.store.death_alert_shown() {
            info!("Death alert already shown for this episode");
        } else {
            self.alerts.show_alert(&AlertReason::ServiceStopped, last);
            if let Err(e) = self.store.set_death_alert_shown(true) {
                error!(error = %e, "Failed to persist death alert flag");
            }
        }

        let death_count = match self.store.record_death(now) {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "Failed to record service death");
                self.store.death_count()
            }
        };
        info!(death_count, "Service death recorded");

        DeathVerdict::Dead { cause, death_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::platform::TracingAlertSink;
    use crate::storage::InMemoryStore;
    use chrono::TimeZone;

    struct Fixture {
        store: HeartbeatStore,
        alerts: Arc<TracingAlertSink>,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: HeartbeatStore::new(Arc::new(InMemoryStore::new())),
                alerts: Arc::new(TracingAlertSink::new()),
                clock: Arc::new(ManualClock::new(
                    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
                )),
            }
        }

        fn check(&self) -> DeathVerdict {
            DeathDetector::new(
                self.store.clone(),
                self.alerts.clone(),
                self.clock.clone(),
                TimeDelta::minutes(15),
            )
            .check_on_start()
        }
    }

    #[test]
    fn intentional_stop_is_not_a_death() {
        let fx = Fixture::new();
        fx.store.record_heartbeat(fx.clock.now()).unwrap();
        fx.store.set_should_be_running(false).unwrap();
        fx.clock.advance(TimeDelta::hours(5));

        assert_eq!(fx.check(), DeathVerdict::IntentionallyStopped);
        assert!(fx.alerts.shown().is_empty());
        assert_eq!(fx.store.death_count(), 0);
    }

    #[test]
    fn missing_heartbeat_means_never_started() {
        let fx = Fixture::new();
        fx.store.set_should_be_running(true).unwrap();

        let verdict = fx.check();
        assert_eq!(
            verdict,
            DeathVerdict::Dead {
                cause: DeathCause::NeverStarted,
                death_count: 1
            }
        );
        assert!(!fx.store.should_be_running());
    }

    #[test]
    fn recent_heartbeat_is_alive() {
        let fx = Fixture::new();
        fx.store.mark_running(fx.clock.now()).unwrap();
        fx.store.record_heartbeat(fx.clock.now()).unwrap();
        fx.clock.advance(TimeDelta::minutes(14));

        assert!(!fx.check().is_dead());
        assert!(fx.alerts.shown().is_empty());
    }

    #[test]
    fn stale_heartbeat_alerts_once_and_counts() {
        let fx = Fixture::new();
        fx.store.mark_running(fx.clock.now()).unwrap();
        fx.store.record_heartbeat(fx.clock.now()).unwrap();
        fx.clock.advance(TimeDelta::minutes(16));

        let verdict = fx.check();
        assert!(matches!(
            verdict,
            DeathVerdict::Dead {
                cause: DeathCause::StaleHeartbeat { age_secs: 960, .. },
                death_count: 1
            }
        ));
        assert_eq!(fx.alerts.shown(), vec![AlertReason::ServiceStopped]);
        assert!(fx.store.death_alert_shown());
        assert_eq!(fx.store.last_death_at(), Some(fx.clock.now()));
    }

    #[test]
    fn alert_not_repeated_while_flag_set() {
        let fx = Fixture::new();
        fx.store.set_should_be_running(true).unwrap();
        fx.store.set_death_alert_shown(true).unwrap();

        assert!(fx.check().is_dead());
        assert!(fx.alerts.shown().is_empty());
        assert_eq!(fx.store.death_count(), 1);
    }
}
