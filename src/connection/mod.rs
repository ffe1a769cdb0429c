//! Resilient publish/subscribe connection
//!
//! - `transport`: the broker contract and its error type
//! - `subscriptions`: the set of topics to replay after a reconnect
//! - `reconnect`: ladder backoff and the single pending reconnect loop
//! - `loopback`: in-process transport with failure injection

pub mod loopback;
pub mod reconnect;
pub mod subscriptions;
pub mod transport;

pub use loopback::{LoopbackTransport, TransportCall};
pub use reconnect::{ConnectionManager, ReconnectBackoffState, ReconnectPolicy, ResubscribeReport};
pub use subscriptions::SubscriptionSet;
pub use transport::{PubSubTransport, QoS, TransportError};
