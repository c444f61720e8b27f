//! §2.H Hint Parser — kind-10002 relay-list events into `RelayHint` records.

use nostr::{Event, TagKind};

use crate::types::RelayHint;

/// Parses a kind-10002 event's `r` tags into relay hints. An `r` tag with
/// no third element grants both read and write; `"read"`/`"write"` narrow
/// it to one direction, per NIP-65.
pub fn parse_relay_hints(event: &Event) -> Vec<RelayHint> {
    event
        .tags
        .iter()
        .filter(|tag| tag.kind() == TagKind::r())
        .filter_map(|tag| {
            let values = tag.as_vec();
            let url = values.get(1)?.trim();
            if url.is_empty() {
                return None;
            }
            let (can_read, can_write) = match values.get(2).map(|s| s.as_str()) {
                Some("read") => (true, false),
                Some("write") => (false, true),
                _ => (true, true),
            };
            Some(RelayHint {
                pubkey: event.pubkey,
                relay_url: url.to_string(),
                can_read,
                can_write,
                freshness: event.created_at.as_u64() as i64,
                last_seen_event_id: Some(event.id),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::{EventBuilder, Keys, Kind, Tag};

    fn make_event(tags: Vec<Tag>) -> Event {
        let keys = Keys::generate();
        EventBuilder::new(Kind::RelayList, "")
            .tags(tags)
            .sign_with_keys(&keys)
            .unwrap()
    }

    #[test]
    fn untagged_r_is_both_directions() {
        let event = make_event(vec![Tag::custom(TagKind::r(), vec!["wss://relay.example".to_string()])]);
        let hints = parse_relay_hints(&event);
        assert_eq!(hints.len(), 1);
        assert!(hints[0].can_read && hints[0].can_write);
        assert_eq!(hints[0].relay_url, "wss://relay.example");
    }

    #[test]
    fn marked_read_and_write_are_split() {
        let event = make_event(vec![
            Tag::custom(TagKind::r(), vec!["wss://read.example".to_string(), "read".to_string()]),
            Tag::custom(TagKind::r(), vec!["wss://write.example".to_string(), "write".to_string()]),
        ]);
        let hints = parse_relay_hints(&event);
        assert_eq!(hints.len(), 2);
        let read = hints.iter().find(|h| h.relay_url == "wss://read.example").unwrap();
        assert!(read.can_read && !read.can_write);
        let write = hints.iter().find(|h| h.relay_url == "wss://write.example").unwrap();
        assert!(!write.can_read && write.can_write);
    }

    #[test]
    fn non_r_tags_are_ignored() {
        let event = make_event(vec![Tag::identifier("something")]);
        assert!(parse_relay_hints(&event).is_empty());
    }
}
