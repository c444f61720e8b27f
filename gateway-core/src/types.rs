use std::collections::HashMap;

use nostr::{EventId, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

/// Per-(pubkey, relay_url) hint extracted from a kind-10002 relay list event.
///
/// Invariant: at least one of `can_read`/`can_write` is true. Never owned
/// by anything but its pubkey; overwritten wholesale on a fresher 10002.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayHint {
    pub pubkey: PublicKey,
    pub relay_url: String,
    pub can_read: bool,
    pub can_write: bool,
    pub freshness: i64,
    pub last_seen_event_id: Option<EventId>,
}

/// Per-relay-URL reconciliation capability, refreshed on a 7-day TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayCapability {
    pub url: String,
    pub supports_set_reconciliation: bool,
    pub software: Option<String>,
    pub version: Option<String>,
    pub last_checked: Timestamp,
    pub expires_at: Timestamp,
}

/// Per-(relay, kind) sync cursor. `since` never moves backward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cursor {
    pub since: u64,
    pub updated_at: Timestamp,
}

/// Per-event derived counters. Monotonically non-decreasing under ingest;
/// reconciliation may resynchronize to query-derived truth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aggregate {
    pub event_id: String,
    pub reply_count: u64,
    pub reaction_total: u64,
    pub reaction_counts: HashMap<String, u64>,
    pub zap_sats_total: u64,
    pub last_interaction_at: Option<u64>,
}

impl Aggregate {
    pub fn new(event_id: String) -> Self {
        Self {
            event_id,
            ..Default::default()
        }
    }

    fn bump_interaction(&mut self, ts: u64) {
        self.last_interaction_at = Some(self.last_interaction_at.map_or(ts, |cur| cur.max(ts)));
    }

    pub fn add_reply(&mut self, count: u64, ts: u64) {
        self.reply_count += count;
        self.bump_interaction(ts);
    }

    pub fn add_reaction(&mut self, emoji: &str, count: u64, ts: u64) {
        *self.reaction_counts.entry(emoji.to_string()).or_insert(0) += count;
        self.reaction_total += count;
        self.bump_interaction(ts);
    }

    pub fn add_zap(&mut self, sats: u64, ts: u64) {
        self.zap_sats_total += sats;
        self.bump_interaction(ts);
    }
}

/// Node in the bounded-depth friend-of-a-friend graph rooted at a pubkey.
///
/// Invariant: `depth == 1` iff `target` is directly followed by `root`.
/// `mutual == true` implies `depth == 1` and the reverse contact-list
/// exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphNode {
    pub depth: u32,
    pub mutual: bool,
    pub last_seen: Timestamp,
}

/// Retention decision for one event, persisted as retention metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionDecision {
    pub event_id: EventId,
    pub rule_name: String,
    pub rule_priority: i32,
    /// `None` means "forever".
    pub retain_until: Option<Timestamp>,
    pub protected: bool,
    pub score: i64,
}

/// Derived reply-threading info for one event (NIP-10), never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadInfo {
    pub root_event_id: Option<EventId>,
    pub reply_to_id: Option<EventId>,
    pub mentioned_ids: Vec<EventId>,
}

/// Scope over which the sync engine computes its author set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    #[serde(rename = "self")]
    SelfOnly,
    Following,
    Mutual,
    Foaf,
}

impl Default for ScopeMode {
    fn default() -> Self {
        ScopeMode::Following
    }
}

/// Outcome of an interaction-kind parse, ready for the aggregate batcher.
#[derive(Debug, Clone)]
pub struct ReactionInfo {
    pub target_event_id: EventId,
    pub content: String,
    pub created_at: u64,
}

#[derive(Debug, Clone)]
pub struct ZapInfo {
    pub target_event_id: EventId,
    pub sats: u64,
    pub created_at: u64,
}

/// Connection statistics surfaced to diagnostics / protocol servers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub connected_relays: usize,
    pub total_relays: usize,
    pub pending_subscriptions: usize,
}

/// Per-relay information surfaced to diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayInfo {
    pub url: String,
    pub status: String,
    pub connected: bool,
}
