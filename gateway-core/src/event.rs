//! §3 Event kinds of interest — thin, named wrappers over the raw `u16`
//! kind numbers the rest of the crate dispatches on. `nostr::Kind` remains
//! the canonical representation; these constants exist so dispatch code
//! reads by name instead of by magic number.

pub const KIND_METADATA: u16 = 0;
pub const KIND_TEXT_NOTE: u16 = 1;
pub const KIND_CONTACT_LIST: u16 = 3;
pub const KIND_REPOST: u16 = 6;
pub const KIND_REACTION: u16 = 7;
pub const KIND_ZAP_RECEIPT: u16 = 9735;
pub const KIND_RELAY_LIST: u16 = 10002;
pub const KIND_ARTICLE: u16 = 30023;

/// Kinds that are fully replaceable (dominance keyed on `(pubkey, kind)`),
/// mirrored from [`crate::store::event_store::is_replaceable_kind`] for
/// callers that only have the raw kind number on hand.
pub fn is_replaceable(kind: u16) -> bool {
    matches!(kind, KIND_METADATA | KIND_CONTACT_LIST | KIND_RELAY_LIST) || (10000..20000).contains(&kind)
}

/// Kinds that are parameterized-replaceable (dominance keyed on
/// `(pubkey, kind, d-tag)`), e.g. [`KIND_ARTICLE`].
pub fn is_parameterized_replaceable(kind: u16) -> bool {
    (30000..40000).contains(&kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaceable_kinds_match_the_named_constants() {
        assert!(is_replaceable(KIND_METADATA));
        assert!(is_replaceable(KIND_CONTACT_LIST));
        assert!(is_replaceable(KIND_RELAY_LIST));
        assert!(!is_replaceable(KIND_TEXT_NOTE));
    }

    #[test]
    fn articles_are_parameterized_replaceable() {
        assert!(is_parameterized_replaceable(KIND_ARTICLE));
        assert!(!is_parameterized_replaceable(KIND_TEXT_NOTE));
    }
}
