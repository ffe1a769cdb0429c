//! Connection manager with ladder backoff and subscription replay
//!
//! The broker connection drops whenever the device sleeps, changes network
//! or the worker is restarted. `ConnectionManager` owns the single pending
//! reconnect loop, tracks which topics the application wants and replays
//! them after every successful (re)connect.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::subscriptions::SubscriptionSet;
use super::transport::{PubSubTransport, QoS, TransportError};
use crate::config::defaults::RECONNECT_LADDER_SECS;

/// Fixed delay ladder indexed by consecutive failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    ladder: Vec<Duration>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            ladder: RECONNECT_LADDER_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }
}

impl ReconnectPolicy {
    /// An empty ladder falls back to the default one.
    pub fn new(ladder: Vec<Duration>) -> Self {
        if ladder.is_empty() {
            Self::default()
        } else {
            Self { ladder }
        }
    }

    /// Delay before the attempt following `failures` consecutive failures.
    /// Clamped to the last rung.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let idx = usize::try_from(failures)
            .unwrap_or(usize::MAX)
            .min(self.ladder.len().saturating_sub(1));
        self.ladder.get(idx).copied().unwrap_or_default()
    }

    pub fn ladder(&self) -> &[Duration] {
        &self.ladder
    }
}

/// Outcome of replaying tracked subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResubscribeReport {
    pub restored: Vec<String>,
    pub failed: Vec<(String, TransportError)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconnectBackoffState {
    pub attempt_index: u32,
    pub next_delay: Duration,
    pub is_reconnecting: bool,
    pub reconnections: u64,
}

/// Resets the pending-reconnect flag when the loop ends or is dropped.
struct PendingReconnect<'a>(&'a AtomicBool);

impl Drop for PendingReconnect<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ConnectionManager {
    transport: Arc<dyn PubSubTransport>,
    policy: ReconnectPolicy,
    subscriptions: Mutex<SubscriptionSet>,
    /// Serialises broker-side subscribe/unsubscribe with the replay.
    broker_ops: AsyncMutex<()>,
    attempt_index: AtomicU32,
    reconnecting: AtomicBool,
    reconnections: AtomicU64,
    cancel: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        policy: ReconnectPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            policy,
            subscriptions: Mutex::new(SubscriptionSet::new()),
            broker_ops: AsyncMutex::new(()),
            attempt_index: AtomicU32::new(0),
            reconnecting: AtomicBool::new(false),
            reconnections: AtomicU64::new(0),
            cancel,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::Acquire)
    }

    /// Connect once. On success the backoff resets and every tracked topic
    /// is resubscribed. Failures are returned, never retried here.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.transport.connect().await?;
        self.attempt_index.store(0, Ordering::Release);
        info!("Broker connection established");

        let report = self.resubscribe_all().await;
        if !report.failed.is_empty() {
            warn!(
                failed = report.failed.len(),
                restored = report.restored.len(),
                "Some subscriptions could not be restored"
            );
        }
        Ok(())
    }

    /// Track `topic` and subscribe now if connected.
    ///
    /// Returns `Ok(false)` when the topic was already tracked with this QoS.
    /// A tracked topic stays tracked even if the live subscribe fails; it is
    /// replayed on the next reconnect.
    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<bool, TransportError> {
        let _broker = self.broker_ops.lock().await;
        let inserted = self.lock_subscriptions().insert(topic, qos);
        if !inserted {
            debug!(topic, "Already subscribed");
            return Ok(false);
        }
        if self.transport.is_connected() {
            self.transport.subscribe(topic, qos).await?;
        }
        info!(topic, ?qos, "Subscribed");
        Ok(true)
    }

    /// Stop tracking `topic` whatever the connection state, then unsubscribe
    /// from the broker if connected. A replay already in flight will not
    /// resubscribe it.
    pub async fn unsubscribe(&self, topic: &str) -> Result<bool, TransportError> {
        let removed = self.lock_subscriptions().remove(topic);
        let _broker = self.broker_ops.lock().await;
        if removed && self.transport.is_connected() {
            self.transport.unsubscribe(topic).await?;
        }
        Ok(removed)
    }

    /// Publish if connected. Never triggers a connect.
    pub async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), TransportError> {
        if !self.transport.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.transport.publish(topic, payload, qos).await
    }

    /// Reissue every tracked subscription once.
    ///
    /// Topics unsubscribed while the replay is running are skipped.
    pub async fn resubscribe_all(&self) -> ResubscribeReport {
        let _broker = self.broker_ops.lock().await;
        let topics = self.lock_subscriptions().snapshot();
        let mut report = ResubscribeReport::default();

        for (topic, qos) in topics {
            if !self.lock_subscriptions().contains(&topic) {
                debug!(topic = %topic, "Unsubscribed during replay, skipping");
                continue;
            }
            match self.transport.subscribe(&topic, qos).await {
                Ok(()) => report.restored.push(topic),
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Resubscribe failed");
                    report.failed.push((topic, e));
                }
            }
        }

        if !report.restored.is_empty() {
            info!(count = report.restored.len(), "Subscriptions restored");
        }
        report
    }

    /// Start the reconnect loop unless one is already pending.
    ///
    /// `delay` overrides the first wait; later waits follow the ladder.
    /// Returns false if a reconnect was already pending.
    pub fn schedule_reconnect(self: &Arc<Self>, delay: Option<Duration>) -> bool {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Reconnect already pending");
            return false;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _pending = PendingReconnect(&this.reconnecting);
            this.reconnect_loop(delay).await;
        });
        true
    }

    /// Transport callback for an unexpected drop.
    pub fn connection_lost(self: &Arc<Self>) -> bool {
        warn!("Broker connection lost");
        self.schedule_reconnect(None)
    }

    async fn reconnect_loop(&self, first_delay: Option<Duration>) {
        let mut delay = first_delay
            .unwrap_or_else(|| self.policy.delay_for(self.attempt_index.load(Ordering::Acquire)));

        loop {
            info!(
                attempt = self.attempt_index.load(Ordering::Acquire) + 1,
                delay_secs = delay.as_secs_f64(),
                "Reconnecting after delay"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match self.connect().await {
                Ok(()) => {
                    let total = self.reconnections.fetch_add(1, Ordering::AcqRel) + 1;
                    info!(total_reconnections = total, "Reconnection successful");
                    return;
                }
                Err(e) => {
                    let failures = self
                        .attempt_index
                        .fetch_add(1, Ordering::AcqRel)
                        .saturating_add(1);
                    delay = self.policy.delay_for(failures);
                    warn!(attempt = failures, error = %e, "Reconnection attempt failed");
                }
            }
        }
    }

    pub fn backoff_state(&self) -> ReconnectBackoffState {
        let attempt_index = self.attempt_index.load(Ordering::Acquire);
        ReconnectBackoffState {
            attempt_index,
            next_delay: self.policy.delay_for(attempt_index),
            is_reconnecting: self.is_reconnecting(),
            reconnections: self.reconnections.load(Ordering::Acquire),
        }
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.lock_subscriptions()
            .iter()
            .map(|(t, _)| t.to_string())
            .collect()
    }

    /// Cancel any pending reconnect and close the connection.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.transport.disconnect().await;
        info!("Connection manager shut down");
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, SubscriptionSet> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_clamped_to_last_rung() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..8).map(|i| policy.delay_for(i).as_secs()).collect();
        assert_eq!(delays, vec![2, 5, 15, 30, 60, 60, 60, 60]);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn ladder_is_monotone() {
        let policy = ReconnectPolicy::default();
        assert!((0..20)
            .map(|i| policy.delay_for(i))
            .collect::<Vec<_>>()
            .windows(2)
            .all(|w| w[0] <= w[1]));
    }

    #[test]
    fn empty_ladder_uses_default() {
        assert_eq!(ReconnectPolicy::new(Vec::new()), ReconnectPolicy::default());
    }
}
