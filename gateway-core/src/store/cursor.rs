//! §2.D Cursor Store — per (relay, kind) last-seen timestamp. Monotonic:
//! `since` never moves backward.

use std::collections::HashMap;

use async_trait::async_trait;
use nostr::Timestamp;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::Cursor;

#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, relay_url: &str, kind: u16) -> Result<Option<Cursor>>;

    /// Advance the cursor to `since`, a no-op if it would move backward.
    async fn advance(&self, relay_url: &str, kind: u16, since: u64) -> Result<()>;

    /// Every known `(relay_url, kind, cursor)`, for diagnostics.
    async fn list_all(&self) -> Result<Vec<(String, u16, Cursor)>>;
}

#[derive(Default)]
pub struct InMemoryCursorStore {
    inner: RwLock<HashMap<(String, u16), Cursor>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn get(&self, relay_url: &str, kind: u16) -> Result<Option<Cursor>> {
        Ok(self
            .inner
            .read()
            .await
            .get(&(relay_url.to_string(), kind))
            .copied())
    }

    async fn advance(&self, relay_url: &str, kind: u16, since: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (relay_url.to_string(), kind);
        match inner.get_mut(&key) {
            Some(cursor) if since > cursor.since => {
                cursor.since = since;
                cursor.updated_at = Timestamp::now();
            }
            Some(_) => {}
            None => {
                inner.insert(
                    key,
                    Cursor {
                        since,
                        updated_at: Timestamp::now(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<(String, u16, Cursor)>> {
        Ok(self
            .inner
            .read()
            .await
            .iter()
            .map(|((url, kind), cursor)| (url.clone(), *kind, *cursor))
            .collect())
    }
}
