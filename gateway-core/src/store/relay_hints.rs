//! §2.B Relay Hint Store — per-pubkey {relay URL, read?, write?, freshness}.

use std::collections::HashMap;

use async_trait::async_trait;
use nostr::PublicKey;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::RelayHint;

#[async_trait]
pub trait RelayHintStore: Send + Sync {
    /// Upsert a hint, keyed on (pubkey, relay_url). Overwrites any
    /// existing hint for that pair unconditionally — freshness ordering
    /// is the caller's (Discovery's) responsibility, since a whole
    /// 10002 event replaces a pubkey's prior hint set.
    async fn upsert(&self, hint: RelayHint) -> Result<()>;

    /// Replace all hints for a pubkey (used when a fresher 10002 arrives).
    async fn replace_for_pubkey(&self, pubkey: &PublicKey, hints: Vec<RelayHint>) -> Result<()>;

    async fn hints_for(&self, pubkey: &PublicKey) -> Result<Vec<RelayHint>>;

    /// Oldest `freshness` among a pubkey's known hints, if any.
    async fn oldest_freshness(&self, pubkey: &PublicKey) -> Result<Option<i64>>;
}

#[derive(Default)]
pub struct InMemoryRelayHintStore {
    inner: RwLock<HashMap<PublicKey, Vec<RelayHint>>>,
}

impl InMemoryRelayHintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelayHintStore for InMemoryRelayHintStore {
    async fn upsert(&self, hint: RelayHint) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entries = inner.entry(hint.pubkey).or_default();
        if let Some(existing) = entries.iter_mut().find(|h| h.relay_url == hint.relay_url) {
            *existing = hint;
        } else {
            entries.push(hint);
        }
        Ok(())
    }

    async fn replace_for_pubkey(&self, pubkey: &PublicKey, hints: Vec<RelayHint>) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.insert(*pubkey, hints);
        Ok(())
    }

    async fn hints_for(&self, pubkey: &PublicKey) -> Result<Vec<RelayHint>> {
        Ok(self.inner.read().await.get(pubkey).cloned().unwrap_or_default())
    }

    async fn oldest_freshness(&self, pubkey: &PublicKey) -> Result<Option<i64>> {
        Ok(self
            .inner
            .read()
            .await
            .get(pubkey)
            .and_then(|hints| hints.iter().map(|h| h.freshness).min()))
    }
}
