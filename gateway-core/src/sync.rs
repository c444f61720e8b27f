//! §4.U Sync Engine — orchestrates Discovery (K) and the Graph Engine (N)
//! to find authors and relays, hands each relay to the Reconciliation
//! Client (O) with Subscription Client (P) fallback, and drives received
//! events through Dedup (Q) → Event Store (A) → dispatch: kind-3 to the
//! Graph Engine, kind-10002 to Relay Hints, interaction kinds to the
//! Aggregate Batcher (R), every kind to the retention-evaluator hook and
//! external event handlers.
//!
//! No store is locked directly in this module (§5: "no locks required in
//! the engine code itself") — `RwLock`/`Mutex` here guard only the
//! engine's own bookkeeping (handler list, retention hook, task handles),
//! never a store's internals.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use nostr::{Event, Filter, PublicKey, RelayUrl};
use nostr_sdk::prelude::*;
use tokio::sync::{mpsc, Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::{self, AggregateBatcherHandle};
use crate::capability::CapabilityProbe;
use crate::config::SyncConfig;
use crate::dedup::DedupCache;
use crate::discovery::Discovery;
use crate::error::{GatewayError, Result};
use crate::event::{KIND_CONTACT_LIST, KIND_METADATA, KIND_REACTION, KIND_RELAY_LIST, KIND_TEXT_NOTE, KIND_ZAP_RECEIPT};
use crate::filters;
use crate::graph_engine::GraphEngine;
use crate::parse::{parse_reaction, parse_relay_hints, parse_thread_info, parse_zap};
use crate::reconcile::ReconciliationClient;
use crate::retention_manager::RetentionManager;
use crate::store::aggregates::AggregateStore;
use crate::store::capability_cache::RelayCapabilityCache;
use crate::store::cursor::CursorStore;
use crate::store::event_store::EventStore;
use crate::store::relay_hints::RelayHintStore;
use crate::subscribe::SubscriptionClient;
use crate::types::{ConnectionStats, RelayInfo};

/// Kinds always queried without `since` (replaceable / parameterized-
/// replaceable — §4.M) regardless of which content kinds are enabled.
const ALWAYS_REPLACEABLE_KINDS: [u16; 3] = [KIND_METADATA, KIND_CONTACT_LIST, KIND_RELAY_LIST];

/// Per-relay reconciliation/subscription attempts are bounded to this
/// duration, per tick (§5: "30 s timeout per relay per tick for both
/// reconciliation and subscription").
const PER_RELAY_TICK_TIMEOUT: Duration = Duration::from_secs(30);

/// Sentinel cursor "kind" for the owner's inbox mention subscription,
/// which isn't keyed to any single content kind.
const INBOX_CURSOR_KIND: u16 = u16::MAX;

const REPLACEABLES_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

const INITIAL_TICK_INTERVAL: Duration = Duration::from_secs(10);
const FAST_TICK_INTERVAL: Duration = Duration::from_secs(5);
const SLOW_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Handler invoked for every event the engine ingests, after dispatch and
/// retention evaluation (§6: `add_event_handler(fn)`).
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Dependencies the Sync Engine is constructed with. Stores know nothing
/// of the engine (dependency injection, §9 "Cyclic references" note); the
/// engine is the only writer to all of them except the event store, which
/// protocol servers also read from.
pub struct SyncEngineDeps {
    pub owner: PublicKey,
    pub client: Client,
    pub config: SyncConfig,
    pub event_store: Arc<dyn EventStore>,
    pub relay_hints: Arc<dyn RelayHintStore>,
    pub capability_cache: Arc<dyn RelayCapabilityCache>,
    pub cursors: Arc<dyn CursorStore>,
    pub aggregates: Arc<dyn AggregateStore>,
    pub graph: Arc<GraphEngine>,
    pub capability_probe: Arc<CapabilityProbe>,
}

pub struct SyncEngine {
    owner: PublicKey,
    config: SyncConfig,
    client: Client,
    event_store: Arc<dyn EventStore>,
    relay_hints: Arc<dyn RelayHintStore>,
    cursors: Arc<dyn CursorStore>,
    aggregates: Arc<dyn AggregateStore>,
    graph: Arc<GraphEngine>,
    discovery: Discovery,
    reconcile: ReconciliationClient,
    subscribe: SubscriptionClient,
    capability_probe: Arc<CapabilityProbe>,
    dedup: Arc<DedupCache>,
    retention_manager: RwLock<Option<Arc<RetentionManager>>>,
    handlers: RwLock<Vec<EventHandler>>,
    cancellation: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(deps: SyncEngineDeps) -> Arc<Self> {
        let backoff = deps.config.relays.policy.backoff.clone();
        Arc::new(Self {
            owner: deps.owner,
            reconcile: ReconciliationClient::new(deps.client.clone(), deps.capability_cache.clone()),
            subscribe: SubscriptionClient::new(deps.client.clone(), backoff),
            discovery: Discovery::new(deps.client.clone(), deps.relay_hints.clone(), deps.config.relays.seeds.clone()),
            capability_probe: deps.capability_probe,
            client: deps.client,
            config: deps.config,
            event_store: deps.event_store,
            relay_hints: deps.relay_hints,
            cursors: deps.cursors,
            aggregates: deps.aggregates,
            graph: deps.graph,
            dedup: Arc::new(DedupCache::new()),
            retention_manager: RwLock::new(None),
            handlers: RwLock::new(Vec::new()),
            cancellation: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Installs the retention manager (§4.U: "If a retention-evaluator
    /// hook is installed, invoke it"). Must be called before
    /// [`Self::start`] so its pruner/re-evaluator tasks get spawned and
    /// every event from the first tick onward is evaluated.
    pub async fn set_retention_evaluator(&self, manager: Arc<RetentionManager>) {
        *self.retention_manager.write().await = Some(manager);
    }

    /// Registers an external event handler, invoked for every event after
    /// dispatch and retention evaluation.
    pub async fn add_event_handler(&self, handler: EventHandler) {
        self.handlers.write().await.push(handler);
    }

    /// Runs the §4.U startup sequence and launches every background task.
    /// Returns once all tasks are spawned; the engine then runs until
    /// [`Self::stop`] is called.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        info!(owner = %self.owner, "starting sync engine");

        // 1. Discovery.bootstrap_from_seeds(owner). A missing identity or
        // empty seed list is fatal; any other bootstrap failure (no 10002
        // found, network error already logged by Discovery) is not.
        match self.discovery.bootstrap_from_seeds(self.owner).await {
            Ok(()) => {}
            Err(GatewayError::NoSeedRelays) => return Err(GatewayError::NoSeedRelays),
            Err(err) => warn!(error = %err, "owner hint bootstrap failed, continuing with seeds only"),
        }

        // 2. Fetch owner's kind-3 from seeds; Graph Engine processes it.
        let contact_filter = Filter::new().author(self.owner).kind(nostr::Kind::ContactList).limit(1);
        match self.client.fetch_events(contact_filter, Duration::from_secs(10)).await {
            Ok(events) => {
                if let Some(event) = events.into_iter().next() {
                    self.graph.process_contact_list(&event, self.owner).await?;
                    self.graph.compute_mutuals(self.owner).await?;
                }
            }
            Err(err) => warn!(error = %err, "owner contact-list fetch failed at startup"),
        }

        // 3. authors_in_scope, then fan out hint discovery for them.
        let authors = self.graph.authors_in_scope(self.owner, &self.config.sync.scope).await?;
        let authors_vec: Vec<PublicKey> = authors.into_iter().collect();
        let search_relays = self.outbox_or_seed_relays(self.owner).await;
        self.ensure_relays(&search_relays).await;
        self.discovery.discover_hints_for(&authors_vec).await;

        // 4. Launch background tasks.
        let mut tasks = Vec::new();

        let (aggregate_handle, aggregate_task) = aggregator::spawn(self.aggregates.clone());
        tasks.push(aggregate_task);

        let workers = self.config.sync.performance.workers.max(1);
        let (ingress_tx, ingress_rx) = mpsc::channel(5000);
        let ingress_rx = Arc::new(Mutex::new(ingress_rx));
        for worker_id in 0..workers {
            let engine = self.clone();
            let rx = ingress_rx.clone();
            let handle = aggregate_handle.clone();
            tasks.push(tokio::spawn(async move {
                engine.run_event_worker(worker_id, rx, handle).await;
            }));
        }

        {
            let engine = self.clone();
            let tx = ingress_tx.clone();
            tasks.push(tokio::spawn(async move { engine.run_sync_loop(tx).await }));
        }
        {
            let engine = self.clone();
            let tx = ingress_tx;
            tasks.push(tokio::spawn(async move { engine.run_replaceables_refresh(tx).await }));
        }

        if let Some(manager) = self.retention_manager.read().await.clone() {
            if self.config.sync.retention.prune_on_start {
                if let Err(err) = manager.run_prune_once().await {
                    warn!(error = %err, "startup retention prune failed");
                }
            }
            tasks.push(crate::retention_manager::spawn_pruner(manager.clone(), self.cancellation.clone()));
            tasks.push(crate::retention_manager::spawn_reevaluator(manager.clone(), self.cancellation.clone()));
        }

        *self.tasks.lock().await = tasks;
        Ok(())
    }

    /// Cancels the root context and waits for every background task to
    /// drain. Dropping `ingress_tx`/`aggregate_handle` inside the spawned
    /// tasks closes their channels, which is what lets workers and the
    /// batcher observe `None` and flush/return.
    pub async fn stop(&self) {
        self.cancellation.cancel();
        let handles = std::mem::take(&mut *self.tasks.lock().await);
        for handle in handles {
            let _ = handle.await;
        }
        info!("sync engine stopped");
    }

    // ─── Main sync loop ──────────────────────────────────────────

    async fn run_sync_loop(self: Arc<Self>, ingress: mpsc::Sender<(RelayUrl, Event)>) {
        let mut interval = INITIAL_TICK_INTERVAL;
        let mut ticker = tokio::time::interval(interval);
        let mut last_dedup_len = self.dedup.len().await;

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => return,
                _ = ticker.tick() => {}
            }

            self.run_one_tick(&ingress).await;

            let dedup_len = self.dedup.len().await;
            let delta = dedup_len.saturating_sub(last_dedup_len);
            last_dedup_len = dedup_len;

            let next = match delta {
                0 => SLOW_TICK_INTERVAL,
                1..=49 => INITIAL_TICK_INTERVAL,
                _ => FAST_TICK_INTERVAL,
            };
            if next != interval {
                debug!(delta, old = ?interval, new = ?next, "adapting sync tick interval");
                interval = next;
                ticker = tokio::time::interval(interval);
                ticker.reset();
            }
        }
    }

    async fn run_one_tick(self: &Arc<Self>, ingress: &mpsc::Sender<(RelayUrl, Event)>) {
        let authors = match self.graph.authors_in_scope(self.owner, &self.config.sync.scope).await {
            Ok(authors) => authors,
            Err(err) => {
                warn!(error = %err, "failed to compute author scope, skipping tick");
                return;
            }
        };
        let authors_vec: Vec<PublicKey> = authors.iter().copied().collect();

        let mut outbox_relays: HashSet<String> = HashSet::new();
        for author in &authors_vec {
            match self.discovery.get_outbox_relays(*author).await {
                Ok(relays) => outbox_relays.extend(relays.into_iter().map(|r| r.to_string())),
                Err(err) => warn!(%author, error = %err, "outbox relay lookup failed"),
            }
        }
        // Seeds always stay in the active set as a backup, even once
        // outbox relays are known.
        outbox_relays.extend(self.config.relays.seeds.iter().cloned());

        let kinds = self.sync_kinds();
        let semaphore = Arc::new(Semaphore::new(self.config.relays.policy.max_concurrent_subs.max(1)));
        let mut joins = Vec::new();

        for relay_str in outbox_relays {
            let Ok(relay_url) = RelayUrl::parse(&relay_str) else { continue };
            self.ensure_relays(std::slice::from_ref(&relay_url)).await;
            let engine = self.clone();
            let authors_vec = authors_vec.clone();
            let kinds = kinds.clone();
            let ingress = ingress.clone();
            let semaphore = semaphore.clone();
            joins.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else { return };
                engine.sync_one_relay(relay_url, authors_vec, kinds, ingress).await;
            }));
        }

        if self.config.sync.inbox_sync_enabled {
            match self.discovery.get_inbox_relays(self.owner).await {
                Ok(inbox_relays) => {
                    for relay_url in inbox_relays {
                        self.ensure_relays(std::slice::from_ref(&relay_url)).await;
                        let engine = self.clone();
                        let ingress = ingress.clone();
                        let semaphore = semaphore.clone();
                        joins.push(tokio::spawn(async move {
                            let Ok(_permit) = semaphore.acquire_owned().await else { return };
                            engine.sync_inbox_relay(relay_url, ingress).await;
                        }));
                    }
                }
                Err(err) => warn!(error = %err, "owner inbox relay lookup failed"),
            }
        }

        for join in joins {
            let _ = join.await;
        }
    }

    /// Content kinds always synchronized: the replaceable kinds plus the
    /// configured kind set (§4.M: "Replaceable... go into a single filter
    /// without since... Remaining kinds go into a filter with since").
    fn sync_kinds(&self) -> Vec<u16> {
        let mut kinds: Vec<u16> = ALWAYS_REPLACEABLE_KINDS.to_vec();
        kinds.extend(self.config.sync.kinds.enabled_kinds());
        kinds
    }

    async fn sync_one_relay(
        self: Arc<Self>,
        relay_url: RelayUrl,
        authors: Vec<PublicKey>,
        kinds: Vec<u16>,
        ingress: mpsc::Sender<(RelayUrl, Event)>,
    ) {
        let since = self.min_regular_cursor(&relay_url, &kinds).await;

        let reconciliation_filter = filters::build_reconciliation_filter(&kinds, &authors);
        let reconcile_result =
            tokio::time::timeout(PER_RELAY_TICK_TIMEOUT, self.reconcile.attempt(&relay_url, reconciliation_filter.clone()))
                .await;

        let reconciled = match reconcile_result {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => false,
            Ok(Err(err)) => {
                warn!(relay = %relay_url, error = %err, "reconciliation attempt failed, falling back to subscription");
                false
            }
            Err(_) => {
                warn!(relay = %relay_url, "reconciliation attempt timed out, falling back to subscription");
                false
            }
        };

        if reconciled {
            self.ingest_reconciled(&relay_url, reconciliation_filter, &ingress).await;
            return;
        }

        let sub_filters = filters::build_sync_filters(
            &kinds,
            &authors,
            since,
            self.config.sync.scope.max_authors,
        );
        let _ = tokio::time::timeout(
            PER_RELAY_TICK_TIMEOUT,
            self.subscribe.run(relay_url, sub_filters, ingress, CancellationToken::new()),
        )
        .await;
    }

    async fn sync_inbox_relay(self: Arc<Self>, relay_url: RelayUrl, ingress: mpsc::Sender<(RelayUrl, Event)>) {
        let since = self.cursors.get(relay_url.as_str(), INBOX_CURSOR_KIND).await.ok().flatten().map(|c| c.since).unwrap_or(0);
        let filter = filters::build_inbox_filter(self.owner, &self.config.sync.kinds.enabled_kinds(), since);
        let _ = tokio::time::timeout(
            PER_RELAY_TICK_TIMEOUT,
            self.subscribe.run(relay_url, vec![filter], ingress, CancellationToken::new()),
        )
        .await;
    }

    /// Reconciliation pulls missing events straight into the relay pool's
    /// local database (nostr-sdk's own `sync()` machinery); the engine
    /// still needs every one of those events through its own dedup/store/
    /// dispatch pipeline, so it re-queries the same filter against the
    /// client's local database (no further relay round-trip) and feeds
    /// the results into the ingress channel exactly like a subscription
    /// would.
    async fn ingest_reconciled(&self, relay_url: &RelayUrl, filter: Filter, ingress: &mpsc::Sender<(RelayUrl, Event)>) {
        match self.client.database().query(filter).await {
            Ok(events) => {
                for event in events {
                    if ingress.send((relay_url.clone(), event)).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => warn!(relay = %relay_url, error = %err, "failed to read reconciled events from local database"),
        }
    }

    async fn min_regular_cursor(&self, relay_url: &RelayUrl, kinds: &[u16]) -> u64 {
        let mut min: Option<u64> = None;
        for &kind in kinds {
            if ALWAYS_REPLACEABLE_KINDS.contains(&kind) {
                continue;
            }
            let since = self
                .cursors
                .get(relay_url.as_str(), kind)
                .await
                .ok()
                .flatten()
                .map(|c| c.since)
                .unwrap_or(0);
            min = Some(min.map_or(since, |m: u64| m.min(since)));
        }
        min.unwrap_or(0)
    }

    async fn outbox_or_seed_relays(&self, pubkey: PublicKey) -> Vec<RelayUrl> {
        match self.discovery.get_outbox_relays(pubkey).await {
            Ok(relays) if !relays.is_empty() => relays,
            _ => self.config.relays.seeds.iter().filter_map(|s| RelayUrl::parse(s).ok()).collect(),
        }
    }

    async fn ensure_relays(&self, urls: &[RelayUrl]) {
        let known = self.client.relays().await;
        for url in urls {
            if known.contains_key(url) {
                continue;
            }
            if let Err(err) = self.client.add_relay(url.clone()).await {
                warn!(relay = %url, error = %err, "failed to add relay to pool");
                continue;
            }
            let _ = self.client.connect_relay(url.clone()).await;

            // Eager NIP-11 probe so the reconciliation client's first
            // attempt against a brand-new relay already has a capability
            // cache entry to consult, rather than discovering support (or
            // its absence) only via a failed NEG-OPEN handshake.
            let probe = self.capability_probe.clone();
            let url_str = url.to_string();
            tokio::spawn(async move {
                if let Err(err) = probe.get_capabilities(&url_str).await {
                    debug!(relay = %url_str, error = %err, "capability probe failed");
                }
            });
        }
    }

    // ─── Replaceables refresh ────────────────────────────────────

    /// Hourly refresh of the always-replaceable kinds (profiles, contact
    /// lists, relay hints, articles) for the current author set, so that
    /// profile/relay-list changes are picked up promptly even between
    /// regular ticks.
    async fn run_replaceables_refresh(self: Arc<Self>, ingress: mpsc::Sender<(RelayUrl, Event)>) {
        let mut ticker = tokio::time::interval(REPLACEABLES_REFRESH_INTERVAL);
        ticker.tick().await; // skip the immediate first tick; startup already hydrated these
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => return,
                _ = ticker.tick() => {}
            }

            if let Err(err) = self.discovery.refresh_if_stale(self.owner, REPLACEABLES_REFRESH_INTERVAL.as_secs() as i64 * 24).await {
                warn!(error = %err, "replaceables refresh: owner hint refresh failed");
            }

            let authors = match self.graph.authors_in_scope(self.owner, &self.config.sync.scope).await {
                Ok(authors) => authors,
                Err(err) => {
                    warn!(error = %err, "replaceables refresh: failed to compute author scope");
                    continue;
                }
            };
            let authors_vec: Vec<PublicKey> = authors.into_iter().collect();
            self.discovery.discover_hints_for(&authors_vec).await;

            let seeds: Vec<RelayUrl> = self.config.relays.seeds.iter().filter_map(|s| RelayUrl::parse(s).ok()).collect();
            self.ensure_relays(&seeds).await;
            let filter = filters::build_sync_filters(&ALWAYS_REPLACEABLE_KINDS, &authors_vec, 0, self.config.sync.scope.max_authors)
                .into_iter()
                .next();
            if let Some(filter) = filter {
                for relay_url in &seeds {
                    self.ingest_reconciled(relay_url, filter.clone(), &ingress).await;
                }
            }
        }
    }

    // ─── Event workers ───────────────────────────────────────────

    async fn run_event_worker(
        self: Arc<Self>,
        worker_id: usize,
        ingress: Arc<Mutex<mpsc::Receiver<(RelayUrl, Event)>>>,
        aggregate_handle: AggregateBatcherHandle,
    ) {
        debug!(worker_id, "event worker started");
        loop {
            let next = {
                let mut rx = ingress.lock().await;
                rx.recv().await
            };
            let Some((relay_url, event)) = next else {
                debug!(worker_id, "ingress channel closed, worker draining");
                return;
            };
            self.process_event(&relay_url, event, &aggregate_handle).await;
        }
    }

    async fn process_event(&self, relay_url: &RelayUrl, event: Event, aggregate_handle: &AggregateBatcherHandle) {
        match self.dedup.is_duplicate(event.id, self.event_store.as_ref()).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "dedup lookup failed, storing anyway");
            }
        }

        let stored = match self.event_store.upsert(event.clone()).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "event store upsert failed");
                return;
            }
        };
        if !stored {
            // Duplicate or superseded by a fresher replaceable event;
            // nothing downstream needs re-dispatching.
            return;
        }

        let kind = event.kind.as_u16();
        if !ALWAYS_REPLACEABLE_KINDS.contains(&kind) {
            if let Err(err) = self.cursors.advance(relay_url.as_str(), kind, event.created_at.as_u64()).await {
                warn!(relay = %relay_url, kind, error = %err, "cursor advance failed");
            }
        }

        match kind {
            KIND_CONTACT_LIST => {
                if let Err(err) = self.graph.process_contact_list(&event, self.owner).await {
                    warn!(event_id = %event.id, error = %err, "contact-list processing failed");
                } else if let Err(err) = self.graph.compute_mutuals(self.owner).await {
                    warn!(error = %err, "mutual computation failed");
                }
            }
            KIND_RELAY_LIST => {
                let hints = parse_relay_hints(&event);
                if let Err(err) = self.relay_hints.replace_for_pubkey(&event.pubkey, hints).await {
                    warn!(pubkey = %event.pubkey, error = %err, "relay hint upsert failed");
                }
            }
            KIND_TEXT_NOTE => {
                if let Some(target) = parse_thread_info(&event).reply_to_id {
                    aggregate_handle.enqueue_reply(target, event.created_at.as_u64());
                }
            }
            KIND_REACTION => {
                if let Some(reaction) = parse_reaction(&event) {
                    aggregate_handle.enqueue_reaction(
                        reaction.target_event_id,
                        reaction.content,
                        reaction.created_at,
                        &self.config.inbox,
                    );
                }
            }
            KIND_ZAP_RECEIPT => {
                if let Some(zap) = parse_zap(&event) {
                    aggregate_handle.enqueue_zap(zap.target_event_id, zap.sats, zap.created_at, &self.config.inbox);
                }
            }
            _ => {}
        }

        if let Some(manager) = self.retention_manager.read().await.clone() {
            if let Err(err) = manager.evaluate_and_store(&event).await {
                warn!(event_id = %event.id, error = %err, "retention evaluation failed");
            }
        }

        for handler in self.handlers.read().await.iter() {
            handler(&event);
        }
    }

    // ─── Diagnostics ─────────────────────────────────────────────

    pub async fn connection_stats(&self) -> ConnectionStats {
        let relays = self.client.relays().await;
        let connected = relays.values().filter(|r| r.status() == nostr_sdk::RelayStatus::Connected).count();
        ConnectionStats {
            connected_relays: connected,
            total_relays: relays.len(),
            pending_subscriptions: 0,
        }
    }

    pub async fn relay_list(&self) -> Vec<RelayInfo> {
        let relays = self.client.relays().await;
        relays
            .iter()
            .map(|(url, relay)| {
                let status = relay.status();
                RelayInfo {
                    url: url.to_string(),
                    status: format!("{status:?}"),
                    connected: status == nostr_sdk::RelayStatus::Connected,
                }
            })
            .collect()
    }

    /// Assembles a full diagnostics snapshot (§6): connection/relay state,
    /// cursor positions, storage size, per-kind event counts, aggregate
    /// count, and retention stats. The engine is the only thing holding
    /// every store handle this needs, so it's the natural place to build
    /// one rather than exposing each store to callers individually.
    pub async fn diagnostics(&self) -> Result<crate::diagnostics::GatewayDiagnostics> {
        let connection = self.connection_stats().await;
        let relays = self.relay_list().await;

        let cursors = self
            .cursors
            .list_all()
            .await?
            .into_iter()
            .map(|(relay_url, kind, cursor)| crate::diagnostics::CursorPosition {
                relay_url,
                kind,
                since: cursor.since,
            })
            .collect();

        let storage_size_bytes = self.event_store.database_size_bytes().await?;
        let events_by_kind = self.event_store.count_by_kind().await?;
        let aggregate_count = self.aggregates.count().await?;

        let retention = match self.retention_manager.read().await.clone() {
            Some(manager) => manager.stats().await?,
            None => None,
        };

        Ok(crate::diagnostics::GatewayDiagnostics {
            connection,
            relays,
            cursors,
            storage_size_bytes,
            events_by_kind,
            aggregate_count,
            retention,
        })
    }
}
