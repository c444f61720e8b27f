use std::time::Duration;

use nostr::PublicKey;
use serde::{Deserialize, Serialize};

use crate::types::ScopeMode;

/// Full configuration consumed by the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub identity: IdentityConfig,
    pub relays: RelaysConfig,
    pub sync: EngineConfig,
    pub inbox: InboxConfig,
}

/// Owner identity. `owner_pubkey` is resolved (hex or bech32) before the
/// engine starts; a config error here is fatal at startup.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub owner_pubkey: PublicKey,
}

/// Relay discovery and connection settings.
#[derive(Debug, Clone)]
pub struct RelaysConfig {
    /// Bootstrap relays, used when no relay hints are known yet and kept
    /// as a permanent backup set alongside discovered outbox relays.
    pub seeds: Vec<String>,
    pub policy: RelayPolicy,
}

impl Default for RelaysConfig {
    fn default() -> Self {
        Self {
            seeds: vec![
                "wss://relay.damus.io".to_string(),
                "wss://nos.lol".to_string(),
                "wss://relay.nostr.band".to_string(),
            ],
            policy: RelayPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayPolicy {
    pub connect_timeout: Duration,
    pub max_concurrent_subs: usize,
    pub backoff: Vec<Duration>,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_concurrent_subs: 8,
            backoff: vec![
                Duration::from_millis(500),
                Duration::from_millis(1500),
                Duration::from_secs(5),
            ],
        }
    }
}

/// Which event kinds the engine pulls, and how broadly.
#[derive(Debug, Clone)]
pub struct KindsConfig {
    pub notes: bool,
    pub reposts: bool,
    pub reactions: bool,
    pub zaps: bool,
    pub articles: bool,
    pub extra: Vec<u16>,
}

impl Default for KindsConfig {
    fn default() -> Self {
        Self {
            notes: true,
            reposts: true,
            reactions: true,
            zaps: true,
            articles: true,
            extra: Vec::new(),
        }
    }
}

impl KindsConfig {
    /// Enabled kinds as the wire-level kind set (profiles/contacts/hints
    /// are always implicitly included by the replaceable-kind filter).
    pub fn enabled_kinds(&self) -> Vec<u16> {
        let mut kinds = Vec::new();
        if self.notes {
            kinds.push(1);
        }
        if self.reposts {
            kinds.push(6);
        }
        if self.reactions {
            kinds.push(7);
        }
        if self.zaps {
            kinds.push(9735);
        }
        if self.articles {
            kinds.push(30023);
        }
        kinds.extend(self.extra.iter().copied());
        kinds
    }
}

/// Author-set scope: who the engine ingests content for.
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    pub mode: ScopeMode,
    pub depth: u32,
    pub max_authors: usize,
    pub include_direct_mentions: bool,
    pub include_threads_of_mine: bool,
    pub allowlist_pubkeys: Vec<PublicKey>,
    pub denylist_pubkeys: Vec<PublicKey>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            mode: ScopeMode::Following,
            depth: 2,
            max_authors: 500,
            include_direct_mentions: true,
            include_threads_of_mine: true,
            allowlist_pubkeys: Vec::new(),
            denylist_pubkeys: Vec::new(),
        }
    }
}

/// Retention configuration: simple keep-days mode, or the advanced
/// rule-based engine.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub advanced: bool,
    pub keep_days: u32,
    pub prune_on_start: bool,
    pub prune_interval_hours: u64,
    pub reevaluate_interval_hours: u64,
    pub reevaluate_batch_size: usize,
    pub max_total_events: Option<u64>,
    /// Decision applied when no rule in `rules` matches an event.
    pub default_action: DefaultAction,
    pub rules: Vec<crate::retention_engine::RetentionRule>,
}

/// §9 Open Question 1: the source deletes-by-default on no match, which
/// is hazardous for operators enabling rules piecemeal. Configurable here
/// with a keep-by-default setting (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultAction {
    Keep,
    Delete,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            advanced: false,
            keep_days: 90,
            prune_on_start: false,
            prune_interval_hours: 6,
            reevaluate_interval_hours: 24,
            reevaluate_batch_size: 500,
            max_total_events: None,
            default_action: DefaultAction::Keep,
            rules: Vec::new(),
        }
    }
}

/// Concurrency and protocol-negotiation tuning.
#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub workers: usize,
    pub use_set_reconciliation: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            use_set_reconciliation: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub kinds: KindsConfig,
    pub scope: ScopeConfig,
    pub retention: RetentionConfig,
    pub performance: PerformanceConfig,
    /// Whether to additionally subscribe on the owner's inbox relays for
    /// mentions directed at them.
    pub inbox_sync_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kinds: KindsConfig::default(),
            scope: ScopeConfig::default(),
            retention: RetentionConfig::default(),
            performance: PerformanceConfig::default(),
            inbox_sync_enabled: true,
        }
    }
}

/// Noise filters applied before an interaction reaches the aggregate
/// batcher (§4.R).
#[derive(Debug, Clone)]
pub struct InboxConfig {
    pub min_zap_sats: u64,
    pub allowed_reaction_chars: Vec<String>,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            min_zap_sats: 0,
            allowed_reaction_chars: vec!["+".to_string()],
        }
    }
}
