//! §2.C Relay Capability Cache — per-URL {supports set-reconciliation,
//! software tag, checked-at, expires-at}. TTL 7 days.

use std::collections::HashMap;

use async_trait::async_trait;
use nostr::Timestamp;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::RelayCapability;

pub const CAPABILITY_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[async_trait]
pub trait RelayCapabilityCache: Send + Sync {
    /// Cached capability for a relay, `None` if absent or expired.
    async fn get(&self, url: &str) -> Result<Option<RelayCapability>>;

    async fn put(&self, capability: RelayCapability) -> Result<()>;

    /// Flip `supports_set_reconciliation` to `false` with a fresh TTL, on
    /// protocol-level rejection of a NEG-OPEN handshake.
    async fn mark_unsupported(&self, url: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryRelayCapabilityCache {
    inner: RwLock<HashMap<String, RelayCapability>>,
}

impl InMemoryRelayCapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelayCapabilityCache for InMemoryRelayCapabilityCache {
    async fn get(&self, url: &str) -> Result<Option<RelayCapability>> {
        let inner = self.inner.read().await;
        Ok(inner.get(url).filter(|c| c.expires_at > Timestamp::now()).cloned())
    }

    async fn put(&self, capability: RelayCapability) -> Result<()> {
        self.inner.write().await.insert(capability.url.clone(), capability);
        Ok(())
    }

    async fn mark_unsupported(&self, url: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let now = Timestamp::now();
        let entry = inner.entry(url.to_string()).or_insert_with(|| RelayCapability {
            url: url.to_string(),
            supports_set_reconciliation: false,
            software: None,
            version: None,
            last_checked: now,
            expires_at: now + CAPABILITY_TTL_SECS,
        });
        entry.supports_set_reconciliation = false;
        entry.last_checked = now;
        entry.expires_at = now + CAPABILITY_TTL_SECS;
        Ok(())
    }
}
