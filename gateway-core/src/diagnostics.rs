//! §6 Diagnostics — read-only snapshot of sync health, consumed by the
//! protocol servers and operators: per-relay connection state, cursor
//! positions, storage size, aggregate/event counts, and retention stats.
//! Assembled by [`crate::sync::SyncEngine::diagnostics`], which is the
//! only thing that holds every store handle needed to build one.

use std::collections::HashMap;

use crate::types::{ConnectionStats, RelayInfo};

/// One (relay, kind) cursor's current position.
#[derive(Debug, Clone)]
pub struct CursorPosition {
    pub relay_url: String,
    pub kind: u16,
    pub since: u64,
}

/// Retention-metadata-store summary. `None` when advanced retention is
/// disabled (simple keep-days mode tracks no per-event metadata).
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionStats {
    pub tracked_non_protected: u64,
    pub tracked_protected: u64,
}

#[derive(Debug, Clone)]
pub struct GatewayDiagnostics {
    pub connection: ConnectionStats,
    pub relays: Vec<RelayInfo>,
    pub cursors: Vec<CursorPosition>,
    pub storage_size_bytes: u64,
    pub events_by_kind: HashMap<u16, i64>,
    pub aggregate_count: u64,
    pub retention: Option<RetentionStats>,
}
