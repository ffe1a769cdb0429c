//! Per-category alert cooldown tracker

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

use crate::types::AlertCategory;

/// Suppresses repeat alerts of the same category inside the cooldown window.
#[derive(Debug, Clone)]
pub struct AlertCooldown {
    cooldown: TimeDelta,
    last_alert: HashMap<AlertCategory, DateTime<Utc>>,
}

impl AlertCooldown {
    pub fn new(cooldown: TimeDelta) -> Self {
        Self {
            cooldown,
            last_alert: HashMap::new(),
        }
    }

    /// True if no alert of this category was raised, or the last one is at
    /// least `cooldown` old.
    pub fn can_alert(&self, category: AlertCategory, now: DateTime<Utc>) -> bool {
        match self.last_alert.get(&category) {
            None => true,
            Some(last) => now - *last >= self.cooldown,
        }
    }

    pub fn record(&mut self, category: AlertCategory, now: DateTime<Utc>) {
        self.last_alert.insert(category, now);
    }

    pub fn last_alert_at(&self, category: AlertCategory) -> Option<DateTime<Utc>> {
        self.last_alert.get(&category).copied()
    }
}
