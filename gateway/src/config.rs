//! Daemon configuration: a TOML-deserializable mirror of
//! [`gateway_core::SyncConfig`], plus the environment-variable overrides
//! documented in SPEC_FULL.md §6 (`GATEWAY_OWNER_NSEC`/`GATEWAY_OWNER_NPUB`,
//! `GATEWAY_DB_PATH`).
//!
//! Field names and nesting mirror the teacher's `NuruNuruConfig`/
//! `RelayConfig` shape, adapted to this gateway's own field set.

use std::time::Duration;

use gateway_core::config::{
    DefaultAction, EngineConfig, IdentityConfig, InboxConfig, KindsConfig, PerformanceConfig,
    RelayPolicy, RelaysConfig, RetentionConfig, ScopeConfig, SyncConfig,
};
use gateway_core::retention_engine::RetentionRule;
use gateway_core::types::ScopeMode;
use nostr::PublicKey;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
    #[error("identity.owner_pubkey is required (or set GATEWAY_OWNER_NPUB/GATEWAY_OWNER_NSEC)")]
    MissingOwner,
    #[error("invalid owner pubkey/nsec: {0}")]
    InvalidOwner(String),
}

/// The on-disk / environment-overridable shape. Every field has a
/// `#[serde(default)]` so a mostly-empty TOML file is valid, matching the
/// teacher's permissive `Default`-heavy config style.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub identity: IdentityFile,
    pub relays: RelaysFile,
    pub kinds: KindsFile,
    pub scope: ScopeFile,
    pub retention: RetentionFile,
    pub performance: PerformanceFile,
    pub inbox: InboxFile,
    /// Path to the store directory. Only meaningful once a durable
    /// `EventStore` backend is wired in; the in-memory store this crate
    /// ships with ignores it but the field round-trips so config files
    /// remain valid across backend swaps.
    pub db_path: Option<String>,
    pub inbox_sync_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityFile {
    /// Hex or `npub1...` public key. May be left unset if
    /// `GATEWAY_OWNER_NPUB`/`GATEWAY_OWNER_NSEC` is provided instead.
    pub owner_pubkey: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaysFile {
    pub seeds: Vec<String>,
    pub connect_timeout_secs: u64,
    pub max_concurrent_subs: usize,
    pub backoff_ms: Vec<u64>,
}

impl Default for RelaysFile {
    fn default() -> Self {
        let defaults = RelaysConfig::default();
        let policy = RelayPolicy::default();
        Self {
            seeds: defaults.seeds,
            connect_timeout_secs: policy.connect_timeout.as_secs(),
            max_concurrent_subs: policy.max_concurrent_subs,
            backoff_ms: policy.backoff.iter().map(|d| d.as_millis() as u64).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KindsFile {
    pub notes: bool,
    pub reposts: bool,
    pub reactions: bool,
    pub zaps: bool,
    pub articles: bool,
    pub extra: Vec<u16>,
}

impl Default for KindsFile {
    fn default() -> Self {
        let d = KindsConfig::default();
        Self {
            notes: d.notes,
            reposts: d.reposts,
            reactions: d.reactions,
            zaps: d.zaps,
            articles: d.articles,
            extra: d.extra,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScopeFile {
    /// One of `self`, `following`, `mutual`, `foaf`.
    pub mode: String,
    pub depth: u32,
    pub max_authors: usize,
    pub include_direct_mentions: bool,
    pub include_threads_of_mine: bool,
    pub allowlist_pubkeys: Vec<String>,
    pub denylist_pubkeys: Vec<String>,
}

impl Default for ScopeFile {
    fn default() -> Self {
        let d = ScopeConfig::default();
        Self {
            mode: "following".to_string(),
            depth: d.depth,
            max_authors: d.max_authors,
            include_direct_mentions: d.include_direct_mentions,
            include_threads_of_mine: d.include_threads_of_mine,
            allowlist_pubkeys: Vec::new(),
            denylist_pubkeys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionFile {
    pub advanced: bool,
    pub keep_days: u32,
    pub prune_on_start: bool,
    pub prune_interval_hours: u64,
    pub reevaluate_interval_hours: u64,
    pub reevaluate_batch_size: usize,
    pub max_total_events: Option<u64>,
    /// `keep` or `delete`; see DESIGN.md's Open Question 1 resolution.
    pub default_action: String,
    pub rules: Vec<RetentionRule>,
}

impl Default for RetentionFile {
    fn default() -> Self {
        let d = RetentionConfig::default();
        Self {
            advanced: d.advanced,
            keep_days: d.keep_days,
            prune_on_start: d.prune_on_start,
            prune_interval_hours: d.prune_interval_hours,
            reevaluate_interval_hours: d.reevaluate_interval_hours,
            reevaluate_batch_size: d.reevaluate_batch_size,
            max_total_events: d.max_total_events,
            default_action: "keep".to_string(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerformanceFile {
    pub workers: usize,
    pub use_set_reconciliation: bool,
}

impl Default for PerformanceFile {
    fn default() -> Self {
        let d = PerformanceConfig::default();
        Self { workers: d.workers, use_set_reconciliation: d.use_set_reconciliation }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InboxFile {
    pub min_zap_sats: u64,
    pub allowed_reaction_chars: Vec<String>,
}

impl Default for InboxFile {
    fn default() -> Self {
        let d = InboxConfig::default();
        Self { min_zap_sats: d.min_zap_sats, allowed_reaction_chars: d.allowed_reaction_chars }
    }
}

impl GatewayConfig {
    /// Loads from `path`, falling back to defaults if the file doesn't
    /// exist (a fresh install with no config file yet is not an error —
    /// only a malformed one is).
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Read { path: path.to_string(), source }),
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
    }

    /// Resolves the owner identity, `GATEWAY_OWNER_NPUB`/`GATEWAY_OWNER_NSEC`
    /// taking priority over `identity.owner_pubkey` in the file, and
    /// returns it alongside the converted engine config. A secret key
    /// overrides the public key it derives (so `GATEWAY_OWNER_NSEC` alone
    /// is sufficient).
    pub fn resolve(&self) -> Result<(PublicKey, Option<nostr::SecretKey>, SyncConfig), ConfigError> {
        let nsec_env = std::env::var("GATEWAY_OWNER_NSEC").ok().filter(|s| !s.is_empty());
        let npub_env = std::env::var("GATEWAY_OWNER_NPUB").ok().filter(|s| !s.is_empty());

        let (owner_pubkey, secret_key) = if let Some(nsec) = nsec_env {
            let keys = nostr::Keys::parse(&nsec).map_err(|e| ConfigError::InvalidOwner(e.to_string()))?;
            (keys.public_key(), Some(keys.secret_key().clone()))
        } else if let Some(npub) = npub_env {
            let pk = PublicKey::parse(&npub).map_err(|e| ConfigError::InvalidOwner(e.to_string()))?;
            (pk, None)
        } else {
            let raw = self.identity.owner_pubkey.as_deref().ok_or(ConfigError::MissingOwner)?;
            let pk = PublicKey::parse(raw).map_err(|e| ConfigError::InvalidOwner(e.to_string()))?;
            (pk, None)
        };

        let sync_config = SyncConfig {
            identity: IdentityConfig { owner_pubkey },
            relays: RelaysConfig {
                seeds: self.relays.seeds.clone(),
                policy: RelayPolicy {
                    connect_timeout: Duration::from_secs(self.relays.connect_timeout_secs),
                    max_concurrent_subs: self.relays.max_concurrent_subs,
                    backoff: self.relays.backoff_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
                },
            },
            sync: EngineConfig {
                kinds: KindsConfig {
                    notes: self.kinds.notes,
                    reposts: self.kinds.reposts,
                    reactions: self.kinds.reactions,
                    zaps: self.kinds.zaps,
                    articles: self.kinds.articles,
                    extra: self.kinds.extra.clone(),
                },
                scope: ScopeConfig {
                    mode: parse_scope_mode(&self.scope.mode),
                    depth: self.scope.depth,
                    max_authors: self.scope.max_authors,
                    include_direct_mentions: self.scope.include_direct_mentions,
                    include_threads_of_mine: self.scope.include_threads_of_mine,
                    allowlist_pubkeys: parse_pubkeys(&self.scope.allowlist_pubkeys),
                    denylist_pubkeys: parse_pubkeys(&self.scope.denylist_pubkeys),
                },
                retention: RetentionConfig {
                    advanced: self.retention.advanced,
                    keep_days: self.retention.keep_days,
                    prune_on_start: self.retention.prune_on_start,
                    prune_interval_hours: self.retention.prune_interval_hours,
                    reevaluate_interval_hours: self.retention.reevaluate_interval_hours,
                    reevaluate_batch_size: self.retention.reevaluate_batch_size,
                    max_total_events: self.retention.max_total_events,
                    default_action: if self.retention.default_action.eq_ignore_ascii_case("delete") {
                        DefaultAction::Delete
                    } else {
                        DefaultAction::Keep
                    },
                    rules: self.retention.rules.clone(),
                },
                performance: PerformanceConfig {
                    workers: self.performance.workers,
                    use_set_reconciliation: self.performance.use_set_reconciliation,
                },
                inbox_sync_enabled: self.inbox_sync_enabled.unwrap_or(true),
            },
            inbox: InboxConfig {
                min_zap_sats: self.inbox.min_zap_sats,
                allowed_reaction_chars: self.inbox.allowed_reaction_chars.clone(),
            },
        };

        Ok((owner_pubkey, secret_key, sync_config))
    }

    /// `GATEWAY_DB_PATH`, falling back to the file's `db_path`, falling
    /// back to a sensible default.
    pub fn db_path(&self) -> String {
        std::env::var("GATEWAY_DB_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.db_path.clone())
            .unwrap_or_else(|| "./gateway-data".to_string())
    }
}

fn parse_scope_mode(raw: &str) -> ScopeMode {
    match raw {
        "self" => ScopeMode::SelfOnly,
        "mutual" => ScopeMode::Mutual,
        "foaf" => ScopeMode::Foaf,
        _ => ScopeMode::Following,
    }
}

fn parse_pubkeys(raw: &[String]) -> Vec<PublicKey> {
    raw.iter().filter_map(|s| PublicKey::parse(s).ok()).collect()
}
