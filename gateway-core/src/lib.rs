//! # Gateway Core — personal Nostr gateway synchronization engine
//!
//! Connects to a dynamically discovered mesh of Nostr relays on behalf of
//! a single owner identity, pulls the owner's content plus a bounded
//! neighborhood of related activity (replies, reactions, zaps, contacts),
//! maintains derived aggregates, and applies rule-based retention. Built
//! on **rust-nostr** (`nostr`/`nostr-sdk`) for protocol types and relay
//! I/O.
//!
//! ## Architecture
//!
//! ```text
//! Discovery(K) ──hydrates──> RelayHints(B)
//! GraphEngine(N) ──hydrates──> SocialGraph(F)
//! SyncEngine(U)
//!   ├─ asks N for authors, B for outbox relays, M for filters
//!   ├─ per relay: Reconciliation(O) then Subscription(P) on fallback
//!   └─ received events -> Dedup(Q) -> EventStore(A) -> dispatch:
//!        kind 3    -> GraphEngine(N)
//!        kind 10002-> HintParser(H) -> RelayHints(B)
//!        1/7/9735  -> AggregateBatcher(R) -> AggregateStore(E)
//!        all kinds -> RetentionEngine(S) -> RetentionManager(T)
//! ```
//!
//! Modules are ordered leaf-first: stores and parsers have no
//! dependencies on the engine; the engine depends on all of them.

pub mod config;
pub mod dedup;
pub mod error;
pub mod event;
pub mod parse;
pub mod store;
pub mod types;

pub mod aggregator;
pub mod capability;
pub mod diagnostics;
pub mod discovery;
pub mod filters;
pub mod graph_engine;
pub mod query;
pub mod reconcile;
pub mod relay;
pub mod retention_engine;
pub mod retention_manager;
pub mod subscribe;
pub mod sync;

pub use config::SyncConfig;
pub use diagnostics::GatewayDiagnostics;
pub use error::{GatewayError, Result};
pub use query::QueryHelper;
pub use sync::SyncEngine;
pub use types::*;
