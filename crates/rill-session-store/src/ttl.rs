//! TTL tracking for entry expiration.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks expiry deadlines for keys written with a lifetime.
///
/// Keys without a recorded deadline never expire.
#[derive(Debug, Default)]
pub struct TtlTracker {
    deadlines: HashMap<String, Instant>,
}

impl TtlTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write for `key`, replacing any previous deadline.
    pub fn set(&mut self, key: &str, ttl: Option<Duration>) {
        match ttl {
            Some(ttl) => {
                self.deadlines.insert(key.to_string(), Instant::now() + ttl);
            }
            None => {
                self.deadlines.remove(key);
            }
        }
    }

    /// Check if a key has passed its deadline.
    pub fn is_expired(&self, key: &str) -> bool {
        self.deadlines
            .get(key)
            .is_some_and(|deadline| Instant::now() >= *deadline)
    }

    /// Remove tracking for a key.
    pub fn remove(&mut self, key: &str) {
        self.deadlines.remove(key);
    }

    /// Get all expired keys.
    pub fn get_expired(&self) -> Vec<String> {
        let now = Instant::now();
        self.deadlines
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Remove all expired entries and return their keys.
    pub fn drain_expired(&mut self) -> Vec<String> {
        let expired = self.get_expired();
        for key in &expired {
            self.deadlines.remove(key);
        }
        expired
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Check if there are no tracked keys.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
