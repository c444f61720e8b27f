//! §2.H–J — pure, I/O-free event parsers. Each takes a borrowed
//! `nostr::Event` (or raw string) and returns a derived value; none of
//! them touch a store.

pub mod hints;
pub mod interactions;
pub mod thread;

pub use hints::parse_relay_hints;
pub use interactions::{parse_reaction, parse_zap, parse_zap_amount};
pub use thread::parse_thread_info;
