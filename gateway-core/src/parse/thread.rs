//! §2.I Thread Parser — NIP-10 `{root, replyTo, mentions}` extraction.

use nostr::{Event, EventId, TagKind};

use crate::types::ThreadInfo;

/// Extracts thread info from an event's `e` tags.
///
/// Prefers the NIP-10 marked format (`root`/`reply`/`mention` as any
/// element after the event id). Falls back to positional interpretation
/// when no tag carries a recognized marker: one `e` tag is both root and
/// reply; two are `[root, reply]`; more than two are
/// `[root, ...mentions, reply]`.
pub fn parse_thread_info(event: &Event) -> ThreadInfo {
    let e_tags: Vec<&[String]> = event
        .tags
        .iter()
        .filter(|t| t.kind() == TagKind::e())
        .map(|t| t.as_vec())
        .collect();

    if e_tags.is_empty() {
        return ThreadInfo::default();
    }

    let ids: Vec<(EventId, Option<&str>)> = e_tags
        .iter()
        .filter_map(|values| {
            let id = values.get(1)?;
            let id = EventId::from_hex(id).ok()?;
            let marker = values.iter().skip(2).map(|s| s.as_str()).find(|s| {
                matches!(*s, "root" | "reply" | "mention")
            });
            Some((id, marker))
        })
        .collect();

    if ids.is_empty() {
        return ThreadInfo::default();
    }

    let has_markers = ids.iter().any(|(_, m)| m.is_some());
    if has_markers {
        let root = ids.iter().find(|(_, m)| *m == Some("root")).map(|(id, _)| *id);
        let reply = ids.iter().find(|(_, m)| *m == Some("reply")).map(|(id, _)| *id);
        let mentions = ids
            .iter()
            .filter(|(_, m)| *m == Some("mention"))
            .map(|(id, _)| *id)
            .collect();
        return ThreadInfo {
            root_event_id: root,
            reply_to_id: reply,
            mentioned_ids: mentions,
        };
    }

    // Positional fallback.
    let plain: Vec<EventId> = ids.into_iter().map(|(id, _)| id).collect();
    match plain.len() {
        1 => ThreadInfo {
            root_event_id: Some(plain[0]),
            reply_to_id: Some(plain[0]),
            mentioned_ids: vec![],
        },
        2 => ThreadInfo {
            root_event_id: Some(plain[0]),
            reply_to_id: Some(plain[1]),
            mentioned_ids: vec![],
        },
        _ => ThreadInfo {
            root_event_id: Some(plain[0]),
            reply_to_id: plain.last().copied(),
            mentioned_ids: plain[1..plain.len() - 1].to_vec(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::{EventBuilder, Keys, Kind, Tag};

    fn make_event(tags: Vec<Tag>) -> Event {
        let keys = Keys::generate();
        EventBuilder::new(Kind::TextNote, "hi")
            .tags(tags)
            .sign_with_keys(&keys)
            .unwrap()
    }

    fn fake_id(byte: u8) -> EventId {
        EventId::from_slice(&[byte; 32]).unwrap()
    }

    #[test]
    fn no_e_tags_is_empty() {
        let event = make_event(vec![]);
        assert_eq!(parse_thread_info(&event), ThreadInfo::default());
    }

    #[test]
    fn single_positional_tag_is_root_and_reply() {
        let id = fake_id(1);
        let event = make_event(vec![Tag::event(id)]);
        let info = parse_thread_info(&event);
        assert_eq!(info.root_event_id, Some(id));
        assert_eq!(info.reply_to_id, Some(id));
        assert!(info.mentioned_ids.is_empty());
    }

    #[test]
    fn two_positional_tags_are_root_then_reply() {
        let root = fake_id(1);
        let reply = fake_id(2);
        let event = make_event(vec![Tag::event(root), Tag::event(reply)]);
        let info = parse_thread_info(&event);
        assert_eq!(info.root_event_id, Some(root));
        assert_eq!(info.reply_to_id, Some(reply));
        assert!(info.mentioned_ids.is_empty());
    }

    #[test]
    fn n_positional_tags_are_root_mentions_reply() {
        let root = fake_id(1);
        let mention = fake_id(2);
        let reply = fake_id(3);
        let event = make_event(vec![Tag::event(root), Tag::event(mention), Tag::event(reply)]);
        let info = parse_thread_info(&event);
        assert_eq!(info.root_event_id, Some(root));
        assert_eq!(info.reply_to_id, Some(reply));
        assert_eq!(info.mentioned_ids, vec![mention]);
    }

    #[test]
    fn marked_tags_take_priority_over_position() {
        let reply = fake_id(1);
        let root = fake_id(2);
        let mention = fake_id(3);
        let event = make_event(vec![
            Tag::custom(TagKind::e(), vec![reply.to_hex(), "".to_string(), "reply".to_string()]),
            Tag::custom(TagKind::e(), vec![root.to_hex(), "".to_string(), "root".to_string()]),
            Tag::custom(TagKind::e(), vec![mention.to_hex(), "".to_string(), "mention".to_string()]),
        ]);
        let info = parse_thread_info(&event);
        assert_eq!(info.root_event_id, Some(root));
        assert_eq!(info.reply_to_id, Some(reply));
        assert_eq!(info.mentioned_ids, vec![mention]);
    }
}
