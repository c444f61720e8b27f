//! §2.G Retention-Metadata Store — per-event {rule name, priority,
//! retain-until, score, protected}.

use std::collections::HashMap;

use async_trait::async_trait;
use nostr::{EventId, Timestamp};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::RetentionDecision;

#[async_trait]
pub trait RetentionMetadataStore: Send + Sync {
    async fn upsert(&self, decision: RetentionDecision) -> Result<()>;

    async fn get(&self, event_id: &EventId) -> Result<Option<RetentionDecision>>;

    /// Event IDs whose `retain_until <= now` and `protected == false`,
    /// up to `limit`.
    async fn expired(&self, now: Timestamp, limit: usize) -> Result<Vec<EventId>>;

    /// Event IDs ordered by ascending score (lowest first), up to
    /// `limit`, excluding protected events.
    async fn lowest_score(&self, limit: usize) -> Result<Vec<EventId>>;

    async fn total_non_protected(&self) -> Result<u64>;

    /// Count of tracked events marked `protected` (never pruned by cap
    /// enforcement), for diagnostics.
    async fn total_protected(&self) -> Result<u64>;

    async fn delete(&self, event_id: &EventId) -> Result<()>;

    /// Event IDs whose metadata was last evaluated before `before`, up
    /// to `limit` (used by the periodic re-evaluation worker).
    async fn stale_since(&self, before: Timestamp, limit: usize) -> Result<Vec<EventId>>;

    async fn mark_evaluated(&self, event_id: &EventId, at: Timestamp) -> Result<()>;
}

#[derive(Default)]
struct Entry {
    decision: RetentionDecision,
    last_evaluated_at: Timestamp,
}

#[derive(Default)]
pub struct InMemoryRetentionMetadataStore {
    inner: RwLock<HashMap<EventId, Entry>>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            decision: RetentionDecision {
                event_id: EventId::all_zeros(),
                rule_name: String::new(),
                rule_priority: 0,
                retain_until: None,
                protected: false,
                score: 0,
            },
            last_evaluated_at: Timestamp::from(0),
        }
    }
}

impl InMemoryRetentionMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RetentionMetadataStore for InMemoryRetentionMetadataStore {
    async fn upsert(&self, decision: RetentionDecision) -> Result<()> {
        let mut inner = self.inner.write().await;
        let id = decision.event_id;
        inner.insert(
            id,
            Entry {
                decision,
                last_evaluated_at: Timestamp::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, event_id: &EventId) -> Result<Option<RetentionDecision>> {
        Ok(self
            .inner
            .read()
            .await
            .get(event_id)
            .map(|e| e.decision.clone()))
    }

    async fn expired(&self, now: Timestamp, limit: usize) -> Result<Vec<EventId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .values()
            .filter(|e| {
                !e.decision.protected
                    && e.decision.retain_until.map(|until| until <= now).unwrap_or(false)
            })
            .map(|e| e.decision.event_id)
            .take(limit)
            .collect())
    }

    async fn lowest_score(&self, limit: usize) -> Result<Vec<EventId>> {
        let inner = self.inner.read().await;
        let mut scored: Vec<(i64, EventId)> = inner
            .values()
            .filter(|e| !e.decision.protected)
            .map(|e| (e.decision.score, e.decision.event_id))
            .collect();
        scored.sort_by_key(|(score, _)| *score);
        Ok(scored.into_iter().take(limit).map(|(_, id)| id).collect())
    }

    async fn total_non_protected(&self) -> Result<u64> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|e| !e.decision.protected)
            .count() as u64)
    }

    async fn total_protected(&self) -> Result<u64> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|e| e.decision.protected)
            .count() as u64)
    }

    async fn delete(&self, event_id: &EventId) -> Result<()> {
        self.inner.write().await.remove(event_id);
        Ok(())
    }

    async fn stale_since(&self, before: Timestamp, limit: usize) -> Result<Vec<EventId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .values()
            .filter(|e| e.last_evaluated_at < before)
            .map(|e| e.decision.event_id)
            .take(limit)
            .collect())
    }

    async fn mark_evaluated(&self, event_id: &EventId, at: Timestamp) -> Result<()> {
        if let Some(entry) = self.inner.write().await.get_mut(event_id) {
            entry.last_evaluated_at = at;
        }
        Ok(())
    }
}
