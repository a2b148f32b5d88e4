//! Subscription tracking for one broker connection.
//!
//! Maps each destination to the subscription id the broker knows it by and
//! the handler its messages go to. At most one live subscription exists per
//! destination.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Receives the decoded JSON body of each message on a destination.
pub type Handler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

#[derive(Clone)]
pub struct Subscription {
    pub id: String,
    pub destination: String,
    pub handler: Handler,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_destination: HashMap<String, Subscription>,
    destination_by_id: HashMap<String, String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription. Returns `false`, leaving the live one in
    /// place, if `destination` is already subscribed.
    pub fn insert(&mut self, destination: &str, id: &str, handler: Handler) -> bool {
        if self.by_destination.contains_key(destination) {
            return false;
        }
        debug!(destination = %destination, id = %id, "Registered subscription");
        self.destination_by_id
            .insert(id.to_string(), destination.to_string());
        self.by_destination.insert(
            destination.to_string(),
            Subscription {
                id: id.to_string(),
                destination: destination.to_string(),
                handler,
            },
        );
        true
    }

    pub fn remove(&mut self, destination: &str) -> Option<Subscription> {
        let subscription = self.by_destination.remove(destination)?;
        self.destination_by_id.remove(&subscription.id);
        debug!(destination = %destination, id = %subscription.id, "Removed subscription");
        Some(subscription)
    }

    /// Subscription the broker refers to as `id`.
    pub fn by_id(&self, id: &str) -> Option<&Subscription> {
        self.destination_by_id
            .get(id)
            .and_then(|destination| self.by_destination.get(destination))
    }

    pub fn is_subscribed(&self, destination: &str) -> bool {
        self.by_destination.contains_key(destination)
    }

    pub fn count(&self) -> usize {
        self.by_destination.len()
    }

    /// Drop every subscription, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.by_destination.len();
        self.by_destination.clear();
        self.destination_by_id.clear();
        n
    }
}
