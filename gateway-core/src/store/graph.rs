//! §2.F Social-Graph Store — per (root pubkey, target pubkey) {depth,
//! mutual, last-seen}.

use std::collections::HashMap;

use async_trait::async_trait;
use nostr::PublicKey;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::GraphNode;

#[async_trait]
pub trait SocialGraphStore: Send + Sync {
    async fn upsert(&self, root: PublicKey, target: PublicKey, node: GraphNode) -> Result<()>;

    async fn get(&self, root: PublicKey, target: PublicKey) -> Result<Option<GraphNode>>;

    /// All nodes rooted at `root`.
    async fn nodes_for_root(&self, root: PublicKey) -> Result<HashMap<PublicKey, GraphNode>>;

    /// Drop every node for `root` whose `last_seen` predates `keep_since`
    /// (used when a fresher kind-3 from `root` replaces the prior set).
    async fn replace_depth1_for_root(
        &self,
        root: PublicKey,
        depth1_targets: &[PublicKey],
        last_seen: nostr::Timestamp,
    ) -> Result<()>;

    async fn set_mutual(&self, root: PublicKey, target: PublicKey, mutual: bool) -> Result<()>;
}

#[derive(Default)]
pub struct InMemorySocialGraphStore {
    inner: RwLock<HashMap<PublicKey, HashMap<PublicKey, GraphNode>>>,
}

impl InMemorySocialGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SocialGraphStore for InMemorySocialGraphStore {
    async fn upsert(&self, root: PublicKey, target: PublicKey, node: GraphNode) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.entry(root).or_default().insert(target, node);
        Ok(())
    }

    async fn get(&self, root: PublicKey, target: PublicKey) -> Result<Option<GraphNode>> {
        Ok(self
            .inner
            .read()
            .await
            .get(&root)
            .and_then(|nodes| nodes.get(&target))
            .copied())
    }

    async fn nodes_for_root(&self, root: PublicKey) -> Result<HashMap<PublicKey, GraphNode>> {
        Ok(self.inner.read().await.get(&root).cloned().unwrap_or_default())
    }

    async fn replace_depth1_for_root(
        &self,
        root: PublicKey,
        depth1_targets: &[PublicKey],
        last_seen: nostr::Timestamp,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let nodes = inner.entry(root).or_default();
        // Drop prior depth-1 nodes no longer in the new list; keep
        // higher-depth nodes (FOAF graph, rebuilt incrementally).
        let new_set: std::collections::HashSet<PublicKey> = depth1_targets.iter().copied().collect();
        nodes.retain(|pk, node| node.depth != 1 || new_set.contains(pk));
        for target in depth1_targets {
            nodes.insert(
                *target,
                GraphNode {
                    depth: 1,
                    mutual: nodes.get(target).map(|n| n.mutual).unwrap_or(false),
                    last_seen,
                },
            );
        }
        Ok(())
    }

    async fn set_mutual(&self, root: PublicKey, target: PublicKey, mutual: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(node) = inner.entry(root).or_default().get_mut(&target) {
            node.mutual = mutual;
        }
        Ok(())
    }
}
