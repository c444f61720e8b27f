//! §4.L Capability Probe — NIP-11 relay information document fetch,
//! caching whether a relay supports NIP-77 set-reconciliation.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::store::capability_cache::{RelayCapabilityCache, CAPABILITY_TTL_SECS};
use crate::types::RelayCapability;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const NIP_77_SET_RECONCILIATION: u32 = 77;

#[derive(Debug, Deserialize)]
struct RelayInfoDocument {
    #[serde(default)]
    software: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    supported_nips: Vec<u32>,
}

pub struct CapabilityProbe {
    http: reqwest::Client,
    cache: Arc<dyn RelayCapabilityCache>,
}

impl CapabilityProbe {
    pub fn new(cache: Arc<dyn RelayCapabilityCache>) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(PROBE_TIMEOUT).build().unwrap_or_default(),
            cache,
        }
    }

    /// Returns the capability for `url`, from cache if fresh, else by
    /// fetching the relay's NIP-11 info document. Any fetch failure is
    /// cached as "unsupported" with a fresh TTL — this is the one eager
    /// probe the gateway performs; the reconciliation handshake itself
    /// remains the authoritative fallback signal.
    pub async fn get_capabilities(&self, url: &str) -> Result<RelayCapability> {
        if let Some(cached) = self.cache.get(url).await? {
            return Ok(cached);
        }

        let capability = self.fetch(url).await.unwrap_or_else(|err| {
            debug!(relay = %url, error = %err, "NIP-11 probe failed, assuming no set-reconciliation support");
            unsupported(url)
        });
        self.cache.put(capability.clone()).await?;
        Ok(capability)
    }

    async fn fetch(&self, ws_url: &str) -> Result<RelayCapability> {
        let http_url = to_http_scheme(ws_url);
        let doc: RelayInfoDocument = self
            .http
            .get(&http_url)
            .header("Accept", "application/nostr+json")
            .send()
            .await?
            .json()
            .await?;

        let now = nostr::Timestamp::now();
        Ok(RelayCapability {
            url: ws_url.to_string(),
            supports_set_reconciliation: doc.supported_nips.contains(&NIP_77_SET_RECONCILIATION),
            software: doc.software,
            version: doc.version,
            last_checked: now,
            expires_at: now + CAPABILITY_TTL_SECS,
        })
    }
}

fn unsupported(url: &str) -> RelayCapability {
    let now = nostr::Timestamp::now();
    RelayCapability {
        url: url.to_string(),
        supports_set_reconciliation: false,
        software: None,
        version: None,
        last_checked: now,
        expires_at: now + CAPABILITY_TTL_SECS,
    }
}

fn to_http_scheme(ws_url: &str) -> String {
    if let Some(rest) = ws_url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = ws_url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        ws_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_wss_to_https() {
        assert_eq!(to_http_scheme("wss://relay.example"), "https://relay.example");
    }

    #[test]
    fn rewrites_ws_to_http() {
        assert_eq!(to_http_scheme("ws://relay.example"), "http://relay.example");
    }

    #[test]
    fn leaves_already_http_urls_alone() {
        assert_eq!(to_http_scheme("https://relay.example"), "https://relay.example");
    }
}
