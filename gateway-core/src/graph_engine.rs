//! §4.N Graph Engine — maintains the bounded-depth social graph rooted at
//! the owner and answers "which pubkeys are in scope" for the Filter
//! Builder and Sync Engine.

use std::collections::HashSet;
use std::sync::Arc;

use nostr::{Event, PublicKey, TagKind};

use crate::config::ScopeConfig;
use crate::error::Result;
use crate::store::graph::SocialGraphStore;
use crate::types::{GraphNode, ScopeMode};

pub struct GraphEngine {
    store: Arc<dyn SocialGraphStore>,
}

impl GraphEngine {
    pub fn new(store: Arc<dyn SocialGraphStore>) -> Self {
        Self { store }
    }

    /// Applies a fresh kind-3 contact list from `event.pubkey`: if the
    /// author is `root` itself, replaces root's depth-1 set wholesale;
    /// otherwise the author's own depth under `root` plus one is recorded
    /// for any target not already known at a shallower depth (skipped
    /// entirely if the author isn't reachable from `root` yet).
    pub async fn process_contact_list(&self, event: &Event, root: PublicKey) -> Result<()> {
        let targets = p_tag_pubkeys(event);

        if event.pubkey == root {
            self.store.replace_depth1_for_root(root, &targets, event.created_at).await?;
            return Ok(());
        }

        let existing = self.store.nodes_for_root(root).await?;
        // The author's own depth under `root` must already be known
        // (established by a prior kind-3 closer to root); otherwise this
        // contact list is unreachable from root and is skipped per spec.
        let Some(author_node) = existing.get(&event.pubkey) else {
            return Ok(());
        };
        let depth = author_node.depth + 1;

        for target in targets {
            if target == root {
                continue;
            }
            // A shallower (or equal) path to `target` already exists; the
            // shortest path wins, so don't overwrite it with a deeper one.
            let already_shallower = existing.get(&target).map(|n| n.depth <= depth).unwrap_or(false);
            if already_shallower {
                continue;
            }
            self.store
                .upsert(root, target, GraphNode { depth, mutual: false, last_seen: event.created_at })
                .await?;
        }
        Ok(())
    }

    /// Marks every depth-1 node whose contact list includes `root` back as
    /// mutual (a reciprocal follow).
    pub async fn compute_mutuals(&self, root: PublicKey) -> Result<()> {
        let nodes = self.store.nodes_for_root(root).await?;
        for (target, node) in nodes {
            if node.depth != 1 {
                continue;
            }
            let reverse = self.store.nodes_for_root(target).await?;
            let is_mutual = reverse.contains_key(&root);
            if is_mutual != node.mutual {
                self.store.set_mutual(root, target, is_mutual).await?;
            }
        }
        Ok(())
    }

    /// Distance and mutual-follow status of `target` relative to `root`,
    /// for retention's `social_distance`/`author_is_mutual` predicates.
    /// Returns `(0, false)` for `root` itself, `(-1, false)` if `target`
    /// isn't reachable from `root` at all.
    pub async fn distance_and_mutual(&self, root: PublicKey, target: PublicKey) -> Result<(i32, bool)> {
        if target == root {
            return Ok((0, false));
        }
        match self.store.get(root, target).await? {
            Some(node) => Ok((node.depth as i32, node.mutual)),
            None => Ok((-1, false)),
        }
    }

    /// Resolves the configured author set in scope for `root`: start from
    /// the scope mode's base set (self / following / mutual / foaf up to
    /// `depth`), drop denylisted pubkeys, add allowlisted ones back, then
    /// cap at `max_authors`.
    pub async fn authors_in_scope(&self, root: PublicKey, scope: &ScopeConfig) -> Result<HashSet<PublicKey>> {
        let mut authors = match scope.mode {
            ScopeMode::SelfOnly => HashSet::new(),
            ScopeMode::Following => {
                self.store
                    .nodes_for_root(root)
                    .await?
                    .into_iter()
                    .filter(|(_, node)| node.depth == 1)
                    .map(|(pk, _)| pk)
                    .collect()
            }
            ScopeMode::Mutual => {
                self.store
                    .nodes_for_root(root)
                    .await?
                    .into_iter()
                    .filter(|(_, node)| node.depth == 1 && node.mutual)
                    .map(|(pk, _)| pk)
                    .collect()
            }
            ScopeMode::Foaf => {
                self.store
                    .nodes_for_root(root)
                    .await?
                    .into_iter()
                    .filter(|(_, node)| node.depth <= scope.depth.max(1))
                    .map(|(pk, _)| pk)
                    .collect()
            }
        };
        authors.insert(root);

        for denied in &scope.denylist_pubkeys {
            authors.remove(denied);
        }
        for allowed in &scope.allowlist_pubkeys {
            authors.insert(*allowed);
        }

        if authors.len() > scope.max_authors {
            // Root and explicitly allowlisted pubkeys must survive the
            // cap; only the remaining (arbitrary HashSet-ordered) authors
            // are truncated to fill out the budget.
            let mut must_keep: HashSet<PublicKey> = HashSet::from([root]);
            must_keep.extend(scope.allowlist_pubkeys.iter().copied());
            must_keep.retain(|pk| authors.contains(pk));

            let remaining_budget = scope.max_authors.saturating_sub(must_keep.len());
            let rest: HashSet<PublicKey> = authors
                .into_iter()
                .filter(|pk| !must_keep.contains(pk))
                .take(remaining_budget)
                .collect();

            authors = must_keep.into_iter().chain(rest).collect();
        }

        Ok(authors)
    }
}

fn p_tag_pubkeys(event: &Event) -> Vec<PublicKey> {
    event
        .tags
        .iter()
        .filter(|t| t.kind() == TagKind::p())
        .filter_map(|t| t.content())
        .filter_map(|hex| PublicKey::from_hex(hex).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::graph::InMemorySocialGraphStore;
    use nostr::Timestamp;

    fn scope(mode: ScopeMode) -> ScopeConfig {
        ScopeConfig {
            mode,
            depth: 2,
            max_authors: 500,
            include_direct_mentions: true,
            include_threads_of_mine: true,
            allowlist_pubkeys: Vec::new(),
            denylist_pubkeys: Vec::new(),
        }
    }

    #[tokio::test]
    async fn self_only_scope_is_just_root() {
        let store = Arc::new(InMemorySocialGraphStore::new());
        let engine = GraphEngine::new(store);
        let root = nostr::Keys::generate().public_key();
        let authors = engine.authors_in_scope(root, &scope(ScopeMode::SelfOnly)).await.unwrap();
        assert_eq!(authors, HashSet::from([root]));
    }

    #[tokio::test]
    async fn following_scope_includes_depth1_only() {
        let store = Arc::new(InMemorySocialGraphStore::new());
        let root = nostr::Keys::generate().public_key();
        let depth1 = nostr::Keys::generate().public_key();
        let depth2 = nostr::Keys::generate().public_key();
        store
            .upsert(root, depth1, GraphNode { depth: 1, mutual: false, last_seen: Timestamp::now() })
            .await
            .unwrap();
        store
            .upsert(root, depth2, GraphNode { depth: 2, mutual: false, last_seen: Timestamp::now() })
            .await
            .unwrap();

        let engine = GraphEngine::new(store);
        let authors = engine.authors_in_scope(root, &scope(ScopeMode::Following)).await.unwrap();
        assert!(authors.contains(&root));
        assert!(authors.contains(&depth1));
        assert!(!authors.contains(&depth2));
    }

    #[tokio::test]
    async fn mutual_scope_excludes_one_way_follows() {
        let store = Arc::new(InMemorySocialGraphStore::new());
        let root = nostr::Keys::generate().public_key();
        let mutual_friend = nostr::Keys::generate().public_key();
        let one_way = nostr::Keys::generate().public_key();
        store
            .upsert(root, mutual_friend, GraphNode { depth: 1, mutual: true, last_seen: Timestamp::now() })
            .await
            .unwrap();
        store
            .upsert(root, one_way, GraphNode { depth: 1, mutual: false, last_seen: Timestamp::now() })
            .await
            .unwrap();

        let engine = GraphEngine::new(store);
        let authors = engine.authors_in_scope(root, &scope(ScopeMode::Mutual)).await.unwrap();
        assert!(authors.contains(&mutual_friend));
        assert!(!authors.contains(&one_way));
    }

    #[tokio::test]
    async fn denylist_wins_over_following_but_allowlist_restores() {
        let store = Arc::new(InMemorySocialGraphStore::new());
        let root = nostr::Keys::generate().public_key();
        let blocked = nostr::Keys::generate().public_key();
        store
            .upsert(root, blocked, GraphNode { depth: 1, mutual: false, last_seen: Timestamp::now() })
            .await
            .unwrap();

        let engine = GraphEngine::new(store);
        let mut cfg = scope(ScopeMode::Following);
        cfg.denylist_pubkeys = vec![blocked];
        let authors = engine.authors_in_scope(root, &cfg).await.unwrap();
        assert!(!authors.contains(&blocked));

        cfg.allowlist_pubkeys = vec![blocked];
        let authors = engine.authors_in_scope(root, &cfg).await.unwrap();
        assert!(authors.contains(&blocked));
    }

    #[tokio::test]
    async fn max_authors_cap_always_keeps_root_and_allowlisted() {
        let store = Arc::new(InMemorySocialGraphStore::new());
        let root = nostr::Keys::generate().public_key();
        let allowlisted = nostr::Keys::generate().public_key();
        for _ in 0..20 {
            let follow = nostr::Keys::generate().public_key();
            store
                .upsert(root, follow, GraphNode { depth: 1, mutual: false, last_seen: Timestamp::now() })
                .await
                .unwrap();
        }
        store
            .upsert(root, allowlisted, GraphNode { depth: 1, mutual: false, last_seen: Timestamp::now() })
            .await
            .unwrap();

        let engine = GraphEngine::new(store);
        let mut cfg = scope(ScopeMode::Following);
        cfg.max_authors = 3;
        cfg.allowlist_pubkeys = vec![allowlisted];
        let authors = engine.authors_in_scope(root, &cfg).await.unwrap();

        assert!(authors.contains(&root));
        assert!(authors.contains(&allowlisted));
        assert_eq!(authors.len(), 3);
    }

    fn contact_list_event(author: &nostr::Keys, targets: &[PublicKey]) -> Event {
        let tags: Vec<nostr::Tag> = targets.iter().map(|pk| nostr::Tag::public_key(*pk)).collect();
        nostr::EventBuilder::new(nostr::Kind::ContactList, "").tags(tags).sign_with_keys(author).unwrap()
    }

    #[tokio::test]
    async fn contact_list_depth_follows_the_authors_own_depth() {
        let store = Arc::new(InMemorySocialGraphStore::new());
        let engine = GraphEngine::new(store.clone());
        let root_keys = nostr::Keys::generate();
        let root = root_keys.public_key();
        let a_keys = nostr::Keys::generate();
        let a = a_keys.public_key();
        let c_keys = nostr::Keys::generate();
        let c = c_keys.public_key();
        let b = nostr::Keys::generate().public_key();
        let d = nostr::Keys::generate().public_key();

        // O follows A directly (depth 1).
        engine.process_contact_list(&contact_list_event(&root_keys, &[a]), root).await.unwrap();
        // A follows B and C; both land at depth 2 (A's depth + 1).
        engine.process_contact_list(&contact_list_event(&a_keys, &[b, c]), root).await.unwrap();
        // C follows D; D lands at depth 3 (C's depth + 1), not 2.
        engine.process_contact_list(&contact_list_event(&c_keys, &[d]), root).await.unwrap();

        assert_eq!(store.get(root, a).await.unwrap().unwrap().depth, 1);
        assert_eq!(store.get(root, b).await.unwrap().unwrap().depth, 2);
        assert_eq!(store.get(root, c).await.unwrap().unwrap().depth, 2);
        assert_eq!(store.get(root, d).await.unwrap().unwrap().depth, 3);
    }

    #[tokio::test]
    async fn contact_list_from_unreachable_author_is_skipped() {
        let store = Arc::new(InMemorySocialGraphStore::new());
        let engine = GraphEngine::new(store.clone());
        let root = nostr::Keys::generate().public_key();
        let stranger_keys = nostr::Keys::generate();
        let target = nostr::Keys::generate().public_key();

        // `stranger` has no known depth under `root`; their contact list
        // is unreachable and must be ignored, not assigned a bogus depth.
        engine.process_contact_list(&contact_list_event(&stranger_keys, &[target]), root).await.unwrap();
        assert!(store.get(root, target).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn distance_and_mutual_reports_self_unknown_and_known() {
        let store = Arc::new(InMemorySocialGraphStore::new());
        let root = nostr::Keys::generate().public_key();
        let friend = nostr::Keys::generate().public_key();
        let stranger = nostr::Keys::generate().public_key();
        store
            .upsert(root, friend, GraphNode { depth: 1, mutual: true, last_seen: Timestamp::now() })
            .await
            .unwrap();

        let engine = GraphEngine::new(store);
        assert_eq!(engine.distance_and_mutual(root, root).await.unwrap(), (0, false));
        assert_eq!(engine.distance_and_mutual(root, friend).await.unwrap(), (1, true));
        assert_eq!(engine.distance_and_mutual(root, stranger).await.unwrap(), (-1, false));
    }

    #[tokio::test]
    async fn compute_mutuals_flips_reciprocal_follows() {
        let store = Arc::new(InMemorySocialGraphStore::new());
        let root = nostr::Keys::generate().public_key();
        let friend = nostr::Keys::generate().public_key();
        store
            .upsert(root, friend, GraphNode { depth: 1, mutual: false, last_seen: Timestamp::now() })
            .await
            .unwrap();
        store
            .upsert(friend, root, GraphNode { depth: 1, mutual: false, last_seen: Timestamp::now() })
            .await
            .unwrap();

        let engine = GraphEngine::new(store);
        engine.compute_mutuals(root).await.unwrap();
        let node = engine.store.get(root, friend).await.unwrap().unwrap();
        assert!(node.mutual);
    }
}
