//! §2.E Aggregate Store — per-event reply count, reaction bag, zap sats
//! total, last-interaction. All counters monotonically non-decreasing
//! under ingest; reconciliation may resynchronize to query-derived truth.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::Aggregate;

#[async_trait]
pub trait AggregateStore: Send + Sync {
    async fn get(&self, event_id: &str) -> Result<Option<Aggregate>>;

    async fn get_batch(&self, ids: &[String]) -> Result<HashMap<String, Aggregate>>;

    /// `(target_event_id, count, last_seen_ts)` triples; increments each
    /// target's reply_count by `count` and bumps last_interaction_at.
    async fn batch_increment_replies(&self, updates: &[(String, u64, u64)]) -> Result<()>;

    /// `(target_event_id, emoji, count, last_seen_ts)` quadruples.
    async fn batch_increment_reactions(&self, updates: &[(String, String, u64, u64)]) -> Result<()>;

    /// `(target_event_id, sats, last_seen_ts)` triples.
    async fn batch_add_zaps(&self, updates: &[(String, u64, u64)]) -> Result<()>;

    /// Overwrite an aggregate wholesale (used by periodic reconciliation
    /// against authoritative event counts).
    async fn reconcile(&self, aggregate: Aggregate) -> Result<()>;

    /// Number of events with at least one tracked aggregate, for
    /// diagnostics.
    async fn count(&self) -> Result<u64>;
}

#[derive(Default)]
pub struct InMemoryAggregateStore {
    inner: RwLock<HashMap<String, Aggregate>>,
}

impl InMemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AggregateStore for InMemoryAggregateStore {
    async fn get(&self, event_id: &str) -> Result<Option<Aggregate>> {
        Ok(self.inner.read().await.get(event_id).cloned())
    }

    async fn get_batch(&self, ids: &[String]) -> Result<HashMap<String, Aggregate>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.get(id).map(|agg| (id.clone(), agg.clone())))
            .collect())
    }

    async fn batch_increment_replies(&self, updates: &[(String, u64, u64)]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for (target, count, ts) in updates {
            inner
                .entry(target.clone())
                .or_insert_with(|| Aggregate::new(target.clone()))
                .add_reply(*count, *ts);
        }
        Ok(())
    }

    async fn batch_increment_reactions(&self, updates: &[(String, String, u64, u64)]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for (target, emoji, count, ts) in updates {
            inner
                .entry(target.clone())
                .or_insert_with(|| Aggregate::new(target.clone()))
                .add_reaction(emoji, *count, *ts);
        }
        Ok(())
    }

    async fn batch_add_zaps(&self, updates: &[(String, u64, u64)]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for (target, sats, ts) in updates {
            inner
                .entry(target.clone())
                .or_insert_with(|| Aggregate::new(target.clone()))
                .add_zap(*sats, *ts);
        }
        Ok(())
    }

    async fn reconcile(&self, aggregate: Aggregate) -> Result<()> {
        self.inner
            .write()
            .await
            .insert(aggregate.event_id.clone(), aggregate);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.inner.read().await.len() as u64)
    }
}
