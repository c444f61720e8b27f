//! §4.R Aggregate Batcher — coalesces reply/reaction/zap updates into
//! periodic batch writes to the Aggregate Store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nostr::EventId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::InboxConfig;
use crate::store::aggregates::AggregateStore;

const FLUSH_INTERVAL: Duration = Duration::from_millis(200);
const CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub enum AggregateUpdate {
    Reply { target: EventId, ts: u64 },
    Reaction { target: EventId, emoji: String, ts: u64 },
    Zap { target: EventId, sats: u64, ts: u64 },
}

#[derive(Clone)]
pub struct AggregateBatcherHandle {
    sender: mpsc::Sender<AggregateUpdate>,
}

impl AggregateBatcherHandle {
    /// Enqueues a reply update, applying the reaction-char/zap-amount
    /// noise filters isn't this variant's job — callers should use
    /// [`Self::enqueue_reaction`] / [`Self::enqueue_zap`] for those, which
    /// apply `InboxConfig` filtering before this is ever reached.
    pub fn enqueue_reply(&self, target: EventId, ts: u64) {
        self.try_send(AggregateUpdate::Reply { target, ts });
    }

    pub fn enqueue_reaction(&self, target: EventId, emoji: String, ts: u64, config: &InboxConfig) {
        if !config.allowed_reaction_chars.iter().any(|allowed| allowed == &emoji) {
            return;
        }
        self.try_send(AggregateUpdate::Reaction { target, emoji, ts });
    }

    pub fn enqueue_zap(&self, target: EventId, sats: u64, ts: u64, config: &InboxConfig) {
        if sats < config.min_zap_sats {
            return;
        }
        self.try_send(AggregateUpdate::Zap { target, sats, ts });
    }

    fn try_send(&self, update: AggregateUpdate) {
        if self.sender.try_send(update).is_err() {
            warn!("aggregate batcher channel full, dropping update");
        }
    }
}

/// Spawns the batcher's flush loop. Returns a cloneable handle for
/// enqueueing updates; the loop runs until the handle (and all its
/// clones) are dropped, closing the channel.
pub fn spawn(store: Arc<dyn AggregateStore>) -> (AggregateBatcherHandle, tokio::task::JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let task = tokio::spawn(run(receiver, store));
    (AggregateBatcherHandle { sender }, task)
}

async fn run(mut receiver: mpsc::Receiver<AggregateUpdate>, store: Arc<dyn AggregateStore>) {
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
    let mut batch = PendingBatch::default();

    loop {
        tokio::select! {
            update = receiver.recv() => {
                match update {
                    Some(update) => batch.coalesce(update),
                    None => {
                        flush(&mut batch, &store).await;
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                flush(&mut batch, &store).await;
            }
        }
    }
}

#[derive(Default)]
struct PendingBatch {
    replies: HashMap<EventId, (u64, u64)>,
    reactions: HashMap<(EventId, String), (u64, u64)>,
    zaps: HashMap<EventId, (u64, u64)>,
}

impl PendingBatch {
    fn coalesce(&mut self, update: AggregateUpdate) {
        match update {
            AggregateUpdate::Reply { target, ts } => {
                let entry = self.replies.entry(target).or_insert((0, ts));
                entry.0 += 1;
                entry.1 = entry.1.max(ts);
            }
            AggregateUpdate::Reaction { target, emoji, ts } => {
                let entry = self.reactions.entry((target, emoji)).or_insert((0, ts));
                entry.0 += 1;
                entry.1 = entry.1.max(ts);
            }
            AggregateUpdate::Zap { target, sats, ts } => {
                let entry = self.zaps.entry(target).or_insert((0, ts));
                entry.0 += sats;
                entry.1 = entry.1.max(ts);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.replies.is_empty() && self.reactions.is_empty() && self.zaps.is_empty()
    }
}

async fn flush(batch: &mut PendingBatch, store: &Arc<dyn AggregateStore>) {
    if batch.is_empty() {
        return;
    }

    let replies: Vec<(String, u64, u64)> = batch
        .replies
        .drain()
        .map(|(id, (count, ts))| (id.to_hex(), count, ts))
        .collect();
    if !replies.is_empty() {
        if let Err(err) = store.batch_increment_replies(&replies).await {
            warn!(error = %err, "failed to flush reply aggregates");
        }
    }

    let reactions: Vec<(String, String, u64, u64)> = batch
        .reactions
        .drain()
        .map(|((id, emoji), (count, ts))| (id.to_hex(), emoji, count, ts))
        .collect();
    if !reactions.is_empty() {
        if let Err(err) = store.batch_increment_reactions(&reactions).await {
            warn!(error = %err, "failed to flush reaction aggregates");
        }
    }

    let zaps: Vec<(String, u64, u64)> = batch
        .zaps
        .drain()
        .map(|(id, (sats, ts))| (id.to_hex(), sats, ts))
        .collect();
    if !zaps.is_empty() {
        if let Err(err) = store.batch_add_zaps(&zaps).await {
            warn!(error = %err, "failed to flush zap aggregates");
        }
    }

    debug!(
        replies = replies.len(),
        reactions = reactions.len(),
        zaps = zaps.len(),
        "flushed aggregate batch"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::aggregates::InMemoryAggregateStore;
    use nostr::Keys;
    use std::time::Duration as StdDuration;

    fn fake_event_id() -> EventId {
        let keys = Keys::generate();
        let event = nostr::EventBuilder::new(nostr::Kind::TextNote, "x").sign_with_keys(&keys).unwrap();
        event.id
    }

    #[tokio::test]
    async fn flush_writes_coalesced_reply_counts() {
        let store = Arc::new(InMemoryAggregateStore::new());
        let (handle, task) = spawn(store.clone());
        let target = fake_event_id();

        handle.enqueue_reply(target, 100);
        handle.enqueue_reply(target, 150);
        handle.enqueue_reply(target, 200);

        tokio::time::sleep(StdDuration::from_millis(250)).await;
        let aggregate = store.get(&target.to_hex()).await.unwrap().unwrap();
        assert_eq!(aggregate.reply_count, 3);
        assert_eq!(aggregate.last_interaction_at, Some(200));

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn flush_counts_each_distinct_reaction_in_the_bag() {
        let store = Arc::new(InMemoryAggregateStore::new());
        let (handle, task) = spawn(store.clone());
        let target = fake_event_id();
        let config = InboxConfig { min_zap_sats: 0, allowed_reaction_chars: vec!["+".to_string(), "🔥".to_string()] };

        handle.enqueue_reaction(target, "+".to_string(), 10, &config);
        handle.enqueue_reaction(target, "+".to_string(), 20, &config);
        handle.enqueue_reaction(target, "🔥".to_string(), 30, &config);

        tokio::time::sleep(StdDuration::from_millis(250)).await;
        let aggregate = store.get(&target.to_hex()).await.unwrap().unwrap();
        assert_eq!(aggregate.reaction_total, 3);
        assert_eq!(aggregate.reaction_counts.get("+"), Some(&2));
        assert_eq!(aggregate.reaction_counts.get("🔥"), Some(&1));

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn noise_filters_drop_disallowed_reactions_and_small_zaps() {
        let store = Arc::new(InMemoryAggregateStore::new());
        let (handle, task) = spawn(store.clone());
        let target = fake_event_id();
        let config = InboxConfig { min_zap_sats: 1000, allowed_reaction_chars: vec!["+".to_string()] };

        handle.enqueue_reaction(target, "-".to_string(), 1, &config);
        handle.enqueue_zap(target, 10, 1, &config);

        tokio::time::sleep(StdDuration::from_millis(250)).await;
        assert!(store.get(&target.to_hex()).await.unwrap().is_none());

        drop(handle);
        task.await.unwrap();
    }
}
