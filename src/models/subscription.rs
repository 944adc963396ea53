//! Subscription edge between a subscriber and a channel.

use serde::{Deserialize, Serialize};

/// Subscription edge. Document ID is `"{subscriber}:{channel}"`, which makes
/// subscribing idempotent. Both sides are usernames: every user is also a
/// channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber: String,
    pub channel: String,
    pub created_at: String,
}

impl Subscription {
    /// Document ID for this edge.
    pub fn doc_id(subscriber: &str, channel: &str) -> String {
        format!("{subscriber}:{channel}")
    }
}
