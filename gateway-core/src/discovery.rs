//! §4.K Discovery — bootstraps relay hints for the owner from seed relays,
//! fans out hint discovery for the rest of the author set, and answers
//! inbox/outbox relay lookups for the Filter Builder and Sync Engine.

use std::sync::Arc;
use std::time::Duration;

use nostr::{Filter, Kind, PublicKey, RelayUrl};
use nostr_sdk::Client;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::parse::parse_relay_hints;
use crate::store::relay_hints::RelayHintStore;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Discovery {
    client: Client,
    hints: Arc<dyn RelayHintStore>,
    seeds: Vec<String>,
}

impl Discovery {
    pub fn new(client: Client, hints: Arc<dyn RelayHintStore>, seeds: Vec<String>) -> Self {
        Self { client, hints, seeds }
    }

    /// Fetches the owner's kind-10002 from the configured seed relays and
    /// upserts the resulting hints. A no-op (not an error) if no 10002 is
    /// found; fails only if no seed relays are configured.
    pub async fn bootstrap_from_seeds(&self, owner: PublicKey) -> Result<()> {
        if self.seeds.is_empty() {
            return Err(GatewayError::NoSeedRelays);
        }

        let filter = Filter::new().author(owner).kind(Kind::RelayList).limit(1);
        let events = self.client.fetch_events(filter, FETCH_TIMEOUT).await?;

        let Some(event) = events.into_iter().next() else {
            debug!(pubkey = %owner, "no relay-list event found during bootstrap");
            return Ok(());
        };

        let hints = parse_relay_hints(&event);
        self.hints.replace_for_pubkey(&owner, hints).await?;
        Ok(())
    }

    /// Batched kind-10002 fetch for a set of pubkeys. Best-effort: a
    /// single pubkey's parse or fetch failure is logged and skipped, never
    /// propagated.
    pub async fn discover_hints_for(&self, pubkeys: &[PublicKey]) {
        if pubkeys.is_empty() {
            return;
        }
        let filter = Filter::new().authors(pubkeys.iter().copied()).kind(Kind::RelayList);
        match self.client.fetch_events(filter, FETCH_TIMEOUT).await {
            Ok(events) => {
                for event in events {
                    let pubkey = event.pubkey;
                    let hints = parse_relay_hints(&event);
                    if let Err(err) = self.hints.replace_for_pubkey(&pubkey, hints).await {
                        warn!(error = %err, pubkey = %pubkey, "failed to persist relay hints");
                    }
                }
            }
            Err(err) => warn!(error = %err, "relay hint discovery fetch failed"),
        }
    }

    /// Write relays for `pubkey` — where they publish, so where to read
    /// their posts from. Falls back to read relays if none are known.
    pub async fn get_outbox_relays(&self, pubkey: PublicKey) -> Result<Vec<RelayUrl>> {
        let hints = self.hints.hints_for(&pubkey).await?;
        let write: Vec<RelayUrl> = hints
            .iter()
            .filter(|h| h.can_write)
            .filter_map(|h| RelayUrl::parse(&h.relay_url).ok())
            .collect();
        if !write.is_empty() {
            return Ok(write);
        }
        Ok(hints.iter().filter(|h| h.can_read).filter_map(|h| RelayUrl::parse(&h.relay_url).ok()).collect())
    }

    /// Read relays for `pubkey` — where they ingest mentions, so where to
    /// find replies/reactions directed at them. Falls back to write relays.
    pub async fn get_inbox_relays(&self, pubkey: PublicKey) -> Result<Vec<RelayUrl>> {
        let hints = self.hints.hints_for(&pubkey).await?;
        let read: Vec<RelayUrl> = hints
            .iter()
            .filter(|h| h.can_read)
            .filter_map(|h| RelayUrl::parse(&h.relay_url).ok())
            .collect();
        if !read.is_empty() {
            return Ok(read);
        }
        Ok(hints.iter().filter(|h| h.can_write).filter_map(|h| RelayUrl::parse(&h.relay_url).ok()).collect())
    }

    /// Re-bootstraps the owner's hints if the oldest known hint predates
    /// `max_age_secs`.
    pub async fn refresh_if_stale(&self, owner: PublicKey, max_age_secs: i64) -> Result<()> {
        let oldest = self.hints.oldest_freshness(&owner).await?;
        let now = nostr::Timestamp::now().as_u64() as i64;
        let stale = match oldest {
            Some(freshness) => now - freshness > max_age_secs,
            None => true,
        };
        if stale {
            self.bootstrap_from_seeds(owner).await?;
        }
        Ok(())
    }
}
