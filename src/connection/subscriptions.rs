//! Subscription tracking
//!
//! The transport loses every subscription on reconnect, so the set of topics
//! the application wants is kept here and replayed verbatim.

use std::collections::BTreeMap;

use super::transport::QoS;

/// Topics currently required from the broker, with their QoS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    topics: BTreeMap<String, QoS>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `topic`. Returns false when it was already tracked with the same QoS.
    pub fn insert(&mut self, topic: &str, qos: QoS) -> bool {
        self.topics.insert(topic.to_string(), qos) != Some(qos)
    }

    /// Stop tracking `topic`. Returns whether it was tracked.
    pub fn remove(&mut self, topic: &str) -> bool {
        self.topics.remove(topic).is_some()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, QoS)> {
        self.topics.iter().map(|(t, q)| (t.as_str(), *q))
    }

    /// Owned copy for iterating without holding a lock across awaits.
    pub fn snapshot(&self) -> Vec<(String, QoS)> {
        self.topics.iter().map(|(t, q)| (t.clone(), *q)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_is_idempotent() {
        let mut set = SubscriptionSet::new();
        assert!(set.insert("relay/notifications", QoS::AtLeastOnce));
        assert!(!set.insert("relay/notifications", QoS::AtLeastOnce));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn qos_change_counts_as_new() {
        let mut set = SubscriptionSet::new();
        set.insert("relay/acks", QoS::AtMostOnce);
        assert!(set.insert("relay/acks", QoS::ExactlyOnce));
        assert_eq!(set.snapshot(), vec![("relay/acks".to_string(), QoS::ExactlyOnce)]);
    }

    #[test]
    fn remove_reports_membership() {
        let mut set = SubscriptionSet::new();
        set.insert("a", QoS::AtLeastOnce);
        assert!(set.remove("a"));
        assert!(!set.remove("a"));
        assert!(set.is_empty());
    }
}
