//! In-process transport
//!
//! Behaves like a broker that forgets every subscription when the
//! connection drops. Connect failures can be injected and every call is
//! recorded, which is what the CLI's `run` command and the tests need.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::transport::{PubSubTransport, QoS, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Disconnect,
    Publish { topic: String },
    Subscribe { topic: String, qos: QoS },
    Unsubscribe { topic: String },
}

#[derive(Debug, Default)]
struct Broker {
    subscriptions: BTreeMap<String, QoS>,
    published: Vec<(String, Vec<u8>)>,
    calls: Vec<TransportCall>,
}

#[derive(Debug, Default)]
pub struct LoopbackTransport {
    client_id: String,
    connected: AtomicBool,
    failing_connects: AtomicU32,
    broker: Mutex<Broker>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that identifies itself to the broker as `client_id`.
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Fail the next `n` connect calls.
    pub fn fail_next_connects(&self, n: u32) {
        self.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Simulate the network dropping the connection.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.broker().subscriptions.clear();
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.broker().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.broker().calls.clear();
    }

    /// Topics passed to `subscribe`, in call order.
    pub fn subscribe_calls(&self) -> Vec<String> {
        self.broker()
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Subscribe { topic, .. } => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connect_calls(&self) -> usize {
        self.broker()
            .calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Connect))
            .count()
    }

    /// Topics the broker currently has subscriptions for.
    pub fn active_subscriptions(&self) -> Vec<String> {
        self.broker().subscriptions.keys().cloned().collect()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.broker().published.clone()
    }

    fn broker(&self) -> MutexGuard<'_, Broker> {
        self.broker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PubSubTransport for LoopbackTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.broker().calls.push(TransportCall::Connect);
        let failing = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(TransportError::ConnectFailed(
                "loopback: injected failure".to_string(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        debug!(client_id = %self.client_id, "Loopback connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.broker().calls.push(TransportCall::Disconnect);
        self.drop_connection();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: &[u8], _qos: QoS) -> Result<(), TransportError> {
        let mut broker = self.broker();
        broker.calls.push(TransportCall::Publish {
            topic: topic.to_string(),
        });
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if broker.subscriptions.contains_key(topic) {
            debug!(topic, bytes = payload.len(), "Loopback delivery");
        }
        broker.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        let mut broker = self.broker();
        broker.calls.push(TransportCall::Subscribe {
            topic: topic.to_string(),
            qos,
        });
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        broker.subscriptions.insert(topic.to_string(), qos);
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        let mut broker = self.broker();
        broker.calls.push(TransportCall::Unsubscribe {
            topic: topic.to_string(),
        });
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        broker.subscriptions.remove(topic);
        Ok(())
    }
}
