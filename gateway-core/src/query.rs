//! §6 Query helper — derived reads consumed by the protocol servers and
//! static exporters (read-only, per §3 "the protocol servers are
//! read-only"). Thin filter-building wrappers over the Event Store; no
//! new persistence, no writes.

use nostr::{Event, EventId, Filter, Kind, PublicKey};

use crate::error::Result;
use crate::event::KIND_ARTICLE;
use crate::parse::parse_thread_info;
use crate::store::event_store::EventStore;

/// A thread rooted at `root_id`, with `children` in chronological order
/// (oldest first) — every stored event whose thread parsing resolves to
/// this root, including replies and mentions.
#[derive(Debug, Clone)]
pub struct ThreadView {
    pub root_id: EventId,
    pub root: Option<Event>,
    pub focus_id: EventId,
    pub children: Vec<Event>,
}

/// Derived-read helper over an [`EventStore`]. Stateless; constructed
/// per-call by whatever holds the store (a protocol server, a static
/// exporter, or a diagnostics endpoint).
pub struct QueryHelper<'a> {
    store: &'a dyn EventStore,
}

impl<'a> QueryHelper<'a> {
    pub fn new(store: &'a dyn EventStore) -> Self {
        Self { store }
    }

    /// Top-level notes (kind 1 with no `reply_to`), most recent first.
    pub async fn get_notes(&self, limit: usize) -> Result<Vec<Event>> {
        // Over-fetch: replies are a subset of kind-1 and are filtered out
        // below, so the store-level limit alone would under-fill the page.
        let filter = Filter::new().kind(Kind::TextNote).limit(limit.saturating_mul(4).max(limit));
        let mut notes: Vec<Event> = self
            .store
            .query(&filter)
            .await?
            .into_iter()
            .filter(|e| parse_thread_info(e).reply_to_id.is_none())
            .collect();
        notes.truncate(limit);
        Ok(notes)
    }

    /// Long-form articles (kind 30023), most recent first.
    pub async fn get_articles(&self, limit: usize) -> Result<Vec<Event>> {
        let filter = Filter::new().kind(Kind::Custom(KIND_ARTICLE)).limit(limit);
        self.store.query(&filter).await
    }

    /// Kind-1 events that are themselves replies (carry a `reply_to`),
    /// most recent first.
    pub async fn get_replies(&self, limit: usize) -> Result<Vec<Event>> {
        let filter = Filter::new().kind(Kind::TextNote).limit(limit.saturating_mul(4).max(limit));
        let mut replies: Vec<Event> = self
            .store
            .query(&filter)
            .await?
            .into_iter()
            .filter(|e| parse_thread_info(e).reply_to_id.is_some())
            .collect();
        replies.truncate(limit);
        Ok(replies)
    }

    /// Events mentioning `owner` via a `p` tag — the same population the
    /// owner's inbox subscription (§4.M `build_inbox_filter`) pulls.
    pub async fn get_mentions(&self, owner: PublicKey, limit: usize) -> Result<Vec<Event>> {
        let filter = Filter::new().pubkey(owner).limit(limit);
        self.store.query(&filter).await
    }

    /// Resolves the thread containing `event_id`: the root event (if
    /// still stored) plus every stored event whose `e` tags reference the
    /// root, in chronological order. `None` if `event_id` itself isn't
    /// stored.
    pub async fn get_thread_by_event(&self, event_id: EventId) -> Result<Option<ThreadView>> {
        let focus_filter = Filter::new().id(event_id);
        let Some(focus) = self.store.query(&focus_filter).await?.into_iter().next() else {
            return Ok(None);
        };

        let root_id = parse_thread_info(&focus).root_event_id.unwrap_or(event_id);
        let root = if root_id == event_id {
            Some(focus)
        } else {
            let root_filter = Filter::new().id(root_id);
            self.store.query(&root_filter).await?.into_iter().next()
        };

        let children_filter = Filter::new().kind(Kind::TextNote).event(root_id);
        let mut children = self.store.query(&children_filter).await?;
        children.sort_by_key(|e| e.created_at);

        Ok(Some(ThreadView { root_id, root, focus_id: event_id, children }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::event_store::InMemoryEventStore;
    use nostr::{EventBuilder, EventId as NEventId, Keys, Tag};

    fn note(keys: &Keys, content: &str, tags: Vec<Tag>) -> Event {
        EventBuilder::new(Kind::TextNote, content).tags(tags).sign_with_keys(keys).unwrap()
    }

    #[tokio::test]
    async fn get_notes_excludes_replies() {
        let store = InMemoryEventStore::new();
        let keys = Keys::generate();
        let top_level = note(&keys, "hello", vec![]);
        let reply = note(&keys, "reply", vec![Tag::event(top_level.id)]);
        store.upsert(top_level.clone()).await.unwrap();
        store.upsert(reply).await.unwrap();

        let helper = QueryHelper::new(&store);
        let notes = helper.get_notes(10).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, top_level.id);
    }

    #[tokio::test]
    async fn get_replies_returns_only_replies() {
        let store = InMemoryEventStore::new();
        let keys = Keys::generate();
        let top_level = note(&keys, "hello", vec![]);
        let reply = note(&keys, "reply", vec![Tag::event(top_level.id)]);
        store.upsert(top_level.clone()).await.unwrap();
        store.upsert(reply.clone()).await.unwrap();

        let helper = QueryHelper::new(&store);
        let replies = helper.get_replies(10).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].id, reply.id);
    }

    #[tokio::test]
    async fn thread_by_event_resolves_root_and_orders_children() {
        let store = InMemoryEventStore::new();
        let keys = Keys::generate();
        let root = note(&keys, "root", vec![]);
        store.upsert(root.clone()).await.unwrap();

        let reply1 = note(&keys, "first reply", vec![Tag::event(root.id)]);
        store.upsert(reply1.clone()).await.unwrap();
        let reply2 = note(&keys, "second reply", vec![Tag::event(root.id)]);
        store.upsert(reply2.clone()).await.unwrap();

        let helper = QueryHelper::new(&store);
        let thread = helper.get_thread_by_event(reply2.id).await.unwrap().unwrap();
        assert_eq!(thread.root_id, root.id);
        assert_eq!(thread.root.unwrap().id, root.id);
        assert_eq!(thread.children.len(), 2);
        assert!(thread.children[0].created_at <= thread.children[1].created_at);
    }

    #[tokio::test]
    async fn thread_by_unknown_event_is_none() {
        let store = InMemoryEventStore::new();
        let helper = QueryHelper::new(&store);
        assert!(helper.get_thread_by_event(NEventId::all_zeros()).await.unwrap().is_none());
    }
}
