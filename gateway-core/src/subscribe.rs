//! §4.P Subscription Client — per-relay long-lived filter subscription,
//! the fallback path when reconciliation (§4.O) is unsupported or fails.
//! Streams events into the engine's ingress channel until cancellation or
//! a relay close that exhausts the backoff schedule.

use std::time::Duration;

use nostr::{Event, Filter, RelayUrl};
use nostr_sdk::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

pub struct SubscriptionClient {
    client: Client,
    backoff: Vec<Duration>,
}

impl SubscriptionClient {
    pub fn new(client: Client, backoff: Vec<Duration>) -> Self {
        Self { client, backoff }
    }

    /// Runs a long-lived subscription against `relay_url`, forwarding every
    /// received event to `ingress`. Reconnects with the configured backoff
    /// schedule (holding at the last step once exhausted) until
    /// `cancellation` fires.
    pub async fn run(
        &self,
        relay_url: RelayUrl,
        filters: Vec<Filter>,
        ingress: mpsc::Sender<(RelayUrl, Event)>,
        cancellation: CancellationToken,
    ) {
        let mut attempt = 0usize;

        while !cancellation.is_cancelled() {
            match self.subscribe_once(&relay_url, filters.clone(), &ingress, &cancellation).await {
                Ok(()) => {
                    // Clean close (cancellation or relay closed the sub);
                    // `subscribe_once` only returns Ok after cancellation.
                    return;
                }
                Err(err) => {
                    warn!(relay = %relay_url, error = %err, "subscription dropped, backing off");
                    let delay = self.backoff.get(attempt).copied().unwrap_or_else(|| {
                        self.backoff.last().copied().unwrap_or(Duration::from_secs(5))
                    });
                    attempt = (attempt + 1).min(self.backoff.len().saturating_sub(1));
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancellation.cancelled() => return,
                    }
                }
            }
        }
    }

    async fn subscribe_once(
        &self,
        relay_url: &RelayUrl,
        filters: Vec<Filter>,
        ingress: &mpsc::Sender<(RelayUrl, Event)>,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let relays = self.client.relays().await;
        let relay = relays
            .get(relay_url)
            .ok_or_else(|| GatewayError::Relay(format!("relay {relay_url} not in pool")))?;

        let mut notifications = relay.notifications();
        let sub_id = relay
            .subscribe(filters, SubscribeOptions::default())
            .await
            .map_err(|err| GatewayError::Relay(err.to_string()))?;

        debug!(relay = %relay_url, subscription = %sub_id, "subscribed");

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => return Ok(()),
                notification = notifications.recv() => {
                    match notification {
                        Ok(RelayNotification::Event { subscription_id, event }) => {
                            if subscription_id == sub_id
                                && ingress.send((relay_url.clone(), *event)).await.is_err()
                            {
                                // Ingress channel closed, engine is shutting down.
                                return Ok(());
                            }
                        }
                        Ok(RelayNotification::RelayStatus { status: RelayStatus::Terminated }) => {
                            return Err(GatewayError::Relay(format!("{relay_url} connection terminated")));
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(relay = %relay_url, skipped, "notification receiver lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            return Err(GatewayError::Relay(format!("{relay_url} notification channel closed")));
                        }
                    }
                }
            }
        }
    }
}
