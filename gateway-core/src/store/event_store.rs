//! §2.A Event Store interface — opaque persistence with replaceable-event
//! upsert semantics, delete-by-id, and filter query (including NIP-50
//! search).

use std::collections::HashMap;

use async_trait::async_trait;
use nostr::{Event, EventId, Filter, Kind, TagKind, Timestamp};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::event::{is_parameterized_replaceable, is_replaceable};

fn d_tag(event: &Event) -> String {
    event
        .tags
        .iter()
        .find(|t| t.kind() == TagKind::d())
        .and_then(|t| t.content())
        .unwrap_or("")
        .to_string()
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Query events matching a filter (no full-text search).
    async fn query(&self, filter: &Filter) -> Result<Vec<Event>>;

    /// Query events matching a filter, honoring NIP-50 `search`.
    async fn query_with_search(&self, filter: &Filter) -> Result<Vec<Event>>;

    /// Upsert an event, applying replaceable/parameterized-replaceable
    /// dominance rules. Returns `true` if the event was newly stored
    /// (i.e. not a duplicate and not superseded by an existing newer
    /// replaceable event).
    async fn upsert(&self, event: Event) -> Result<bool>;

    async fn delete(&self, id: &EventId) -> Result<()>;

    async fn exists(&self, id: &EventId) -> Result<bool>;

    async fn count_by_kind(&self) -> Result<HashMap<u16, i64>>;

    async fn count_in_range(&self, since: Timestamp, until: Timestamp) -> Result<i64>;

    async fn database_size_bytes(&self) -> Result<u64>;
}

#[derive(Default)]
struct Inner {
    events: HashMap<EventId, Event>,
    /// (pubkey, kind) -> event id, for replaceable kinds.
    replaceable: HashMap<(String, u16), EventId>,
    /// (pubkey, kind, d-tag) -> event id, for parameterized-replaceable kinds.
    addressable: HashMap<(String, u16, String), EventId>,
}

/// In-memory `EventStore`. Sufficient for tests and for running the
/// gateway standalone; a production deployment backs `EventStore` with a
/// durable database instead.
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(filter: &Filter, event: &Event) -> bool {
    if let Some(ids) = &filter.ids {
        if !ids.contains(&event.id) {
            return false;
        }
    }
    if let Some(authors) = &filter.authors {
        if !authors.contains(&event.pubkey) {
            return false;
        }
    }
    if let Some(kinds) = &filter.kinds {
        if !kinds.contains(&event.kind) {
            return false;
        }
    }
    if let Some(since) = filter.since {
        if event.created_at < since {
            return false;
        }
    }
    if let Some(until) = filter.until {
        if event.created_at > until {
            return false;
        }
    }
    for (tag_kind, values) in filter.generic_tags.iter() {
        let has_match = event.tags.iter().any(|t| {
            t.kind() == nostr::TagKind::SingleLetter(*tag_kind)
                && t.content().map(|c| values.contains(&c.to_string())).unwrap_or(false)
        });
        if !has_match {
            return false;
        }
    }
    true
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn query(&self, filter: &Filter) -> Result<Vec<Event>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Event> = inner.events.values().filter(|e| matches(filter, e)).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn query_with_search(&self, filter: &Filter) -> Result<Vec<Event>> {
        let results = self.query(filter).await?;
        match &filter.search {
            Some(q) if !q.is_empty() => {
                let needle = q.to_lowercase();
                Ok(results
                    .into_iter()
                    .filter(|e| e.content.to_lowercase().contains(&needle))
                    .collect())
            }
            _ => Ok(results),
        }
    }

    async fn upsert(&self, event: Event) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let kind = event.kind.as_u16();
        let pubkey = event.pubkey.to_hex();

        if inner.events.contains_key(&event.id) {
            return Ok(false);
        }

        if is_replaceable(kind) {
            let key = (pubkey.clone(), kind);
            if let Some(existing_id) = inner.replaceable.get(&key) {
                if let Some(existing) = inner.events.get(existing_id) {
                    if existing.created_at >= event.created_at {
                        return Ok(false);
                    }
                    let stale = *existing_id;
                    inner.events.remove(&stale);
                }
            }
            let id = event.id;
            inner.replaceable.insert(key, id);
            inner.events.insert(id, event);
            return Ok(true);
        }

        if is_parameterized_replaceable(kind) {
            let d = d_tag(&event);
            let key = (pubkey.clone(), kind, d);
            if let Some(existing_id) = inner.addressable.get(&key) {
                if let Some(existing) = inner.events.get(existing_id) {
                    if existing.created_at >= event.created_at {
                        return Ok(false);
                    }
                    let stale = *existing_id;
                    inner.events.remove(&stale);
                }
            }
            let id = event.id;
            inner.addressable.insert(key, id);
            inner.events.insert(id, event);
            return Ok(true);
        }

        inner.events.insert(event.id, event);
        Ok(true)
    }

    async fn delete(&self, id: &EventId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.events.remove(id);
        Ok(())
    }

    async fn exists(&self, id: &EventId) -> Result<bool> {
        Ok(self.inner.read().await.events.contains_key(id))
    }

    async fn count_by_kind(&self) -> Result<HashMap<u16, i64>> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        for event in inner.events.values() {
            *counts.entry(event.kind.as_u16()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_in_range(&self, since: Timestamp, until: Timestamp) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .values()
            .filter(|e| e.created_at >= since && e.created_at <= until)
            .count() as i64)
    }

    async fn database_size_bytes(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .values()
            .map(|e| e.content.len() as u64 + 256)
            .sum())
    }
}

// Kind helpers used elsewhere in the crate.
pub fn is_replaceable_kind(kind: Kind) -> bool {
    is_replaceable(kind.as_u16())
}

pub fn is_parameterized_replaceable_kind(kind: Kind) -> bool {
    is_parameterized_replaceable(kind.as_u16())
}
