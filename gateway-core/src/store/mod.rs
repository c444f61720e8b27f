//! Persistence traits consumed by the engine and its components.
//!
//! Each store is an opaque, independently-owned collection (§3 of the
//! design: "each store exclusively owns its records"). The in-memory
//! implementations here make the crate buildable and testable standalone;
//! a real deployment backs these traits with a durable database.

pub mod aggregates;
pub mod capability_cache;
pub mod cursor;
pub mod event_store;
pub mod graph;
pub mod relay_hints;
pub mod retention;

pub use aggregates::{AggregateStore, InMemoryAggregateStore};
pub use capability_cache::{InMemoryRelayCapabilityCache, RelayCapabilityCache};
pub use cursor::{CursorStore, InMemoryCursorStore};
pub use event_store::{EventStore, InMemoryEventStore};
pub use graph::{InMemorySocialGraphStore, SocialGraphStore};
pub use relay_hints::{InMemoryRelayHintStore, RelayHintStore};
pub use retention::{InMemoryRetentionMetadataStore, RetentionMetadataStore};
