//! §4.O Reconciliation Client — a per-relay attempt at NIP-77 set
//! reconciliation, with the outcome expressed so the caller can fall back
//! to the Subscription Client (§4.P) transparently.

use std::sync::Arc;
use std::time::Duration;

use nostr::{Filter, RelayUrl};
use nostr_sdk::prelude::*;
use regex::RegexBuilder;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::store::capability_cache::RelayCapabilityCache;

const RECONCILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Error substrings a relay uses to signal "I don't speak NIP-77" rather
/// than a genuine transient failure. Matched case-insensitively against
/// the stringified error, per spec.md §4.O.
const UNSUPPORTED_PATTERN: &str = r"unsupported|unknown message|neg-|invalid";

pub struct ReconciliationClient {
    client: Client,
    cache: Arc<dyn RelayCapabilityCache>,
}

/// Outcome of one reconciliation attempt. `Ok(true)` means events were
/// pulled via NIP-77 and no further action is needed. `Ok(false)` means
/// the relay doesn't support set-reconciliation (cache already updated);
/// the caller should fall back to the Subscription Client. `Err` is a
/// hard failure unrelated to protocol support; the caller also falls
/// back, but may want to log it distinctly.
impl ReconciliationClient {
    pub fn new(client: Client, cache: Arc<dyn RelayCapabilityCache>) -> Self {
        Self { client, cache }
    }

    pub async fn attempt(&self, relay_url: &RelayUrl, filter: Filter) -> Result<bool> {
        if let Some(capability) = self.cache.get(relay_url.as_str()).await? {
            if !capability.supports_set_reconciliation {
                debug!(relay = %relay_url, "skipping reconciliation, cached as unsupported");
                return Ok(false);
            }
        }

        let relays = self.client.relays().await;
        let Some(relay) = relays.get(relay_url) else {
            return Err(GatewayError::Relay(format!("relay {relay_url} not in pool")));
        };

        let opts = SyncOptions::default();
        let result = tokio::time::timeout(RECONCILE_TIMEOUT, relay.sync(filter, &opts)).await;

        match result {
            Err(_) => {
                warn!(relay = %relay_url, "reconciliation handshake timed out");
                Err(GatewayError::ConnectTimeout(relay_url.to_string()))
            }
            Ok(Err(err)) => {
                let message = err.to_string();
                if is_unsupported_error(&message) {
                    self.cache.mark_unsupported(relay_url.as_str()).await?;
                    debug!(relay = %relay_url, error = %message, "relay rejected NEG-OPEN, falling back");
                    Ok(false)
                } else {
                    Err(GatewayError::Relay(message))
                }
            }
            Ok(Ok(_reconciliation)) => Ok(true),
        }
    }
}

fn is_unsupported_error(message: &str) -> bool {
    RegexBuilder::new(UNSUPPORTED_PATTERN)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(message))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_unsupported_phrasings() {
        assert!(is_unsupported_error("ERROR: unknown message type NEG-OPEN"));
        assert!(is_unsupported_error("negentropy not supported by this relay"));
        assert!(is_unsupported_error("bad msg: invalid message"));
        assert!(is_unsupported_error("NEG-ERR: unsupported"));
    }

    #[test]
    fn does_not_flag_unrelated_errors() {
        assert!(!is_unsupported_error("connection reset by peer"));
        assert!(!is_unsupported_error("timed out waiting for response"));
    }
}
