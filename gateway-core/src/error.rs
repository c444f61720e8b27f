use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Unified error type for the gateway core.
///
/// Grouped by the error-kind policy the sync engine applies to each:
/// config errors are fatal at startup, network/relay errors are logged
/// and retried per-relay, parse/store errors are logged and the
/// offending item is skipped.
#[derive(Debug, Error)]
pub enum GatewayError {
    // --- Config (fatal at startup) ---
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no seed relays configured")]
    NoSeedRelays,

    #[error("missing owner identity")]
    MissingIdentity,

    // --- Network / relay (logged, retried, never fatal) ---
    #[error("connect timeout: {0}")]
    ConnectTimeout(String),

    #[error("relay error: {0}")]
    Relay(String),

    #[error("invalid relay url: {0}")]
    InvalidRelayUrl(String),

    // --- Protocol mismatch (silently demoted to fallback) ---
    #[error("reconciliation unsupported: {0}")]
    ReconciliationUnsupported(String),

    // --- Event validation / parsing (logged, item skipped) ---
    #[error("event validation failed: {0}")]
    EventValidation(String),

    #[error("parse error: {0}")]
    Parse(String),

    // --- Store (logged per-operation, loop continues) ---
    #[error("store error: {0}")]
    Store(String),

    // --- Retention evaluation (logged, metadata simply not written) ---
    #[error("retention evaluation error: {0}")]
    Retention(String),

    // --- Wrapped upstream errors ---
    #[error(transparent)]
    NostrSdk(#[from] nostr_sdk::client::Error),

    #[error(transparent)]
    Nostr(#[from] nostr::event::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}
