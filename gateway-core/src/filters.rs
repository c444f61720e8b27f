//! §4.M Filter Builder — converts sync config + author set + cursors into
//! wire-level subscription filters, splitting replaceable vs. regular
//! kinds so replaceable kinds always fetch freshest (no `since`).

use nostr::{Filter, Kind, PublicKey, Timestamp};

use crate::store::event_store::{is_parameterized_replaceable_kind, is_replaceable_kind};

/// Splits `kinds` into (replaceable-or-parameterized-replaceable,
/// regular) and builds one filter per group: the replaceable group never
/// carries `since` (must always return freshest); the regular group
/// carries `since` when `since > 0`.
pub fn build_sync_filters(
    kinds: &[u16],
    authors: &[PublicKey],
    since: u64,
    max_authors: usize,
) -> Vec<Filter> {
    let authors = cap_authors(authors, max_authors);
    let (replaceable, regular): (Vec<u16>, Vec<u16>) = kinds.iter().copied().partition(|&k| {
        is_replaceable_kind(Kind::Custom(k)) || is_parameterized_replaceable_kind(Kind::Custom(k))
    });

    let mut filters = Vec::new();
    if !replaceable.is_empty() {
        let mut f = Filter::new().kinds(replaceable.into_iter().map(Kind::Custom));
        if !authors.is_empty() {
            f = f.authors(authors.iter().copied());
        }
        filters.push(f);
    }
    if !regular.is_empty() {
        let mut f = Filter::new().kinds(regular.into_iter().map(Kind::Custom));
        if !authors.is_empty() {
            f = f.authors(authors.iter().copied());
        }
        if since > 0 {
            f = f.since(Timestamp::from(since));
        }
        filters.push(f);
    }
    filters
}

/// Filter for events mentioning `owner` (`#p` tag).
pub fn build_mention_filter(owner: PublicKey) -> Filter {
    Filter::new().pubkey(owner)
}

/// A complete-set filter for reconciliation: union of kinds, no `since` —
/// the reconciliation algorithm computes the diff itself.
pub fn build_reconciliation_filter(kinds: &[u16], authors: &[PublicKey]) -> Filter {
    let mut f = Filter::new().kinds(kinds.iter().copied().map(Kind::Custom));
    if !authors.is_empty() {
        f = f.authors(authors.iter().copied());
    }
    f
}

/// Inbox filter: notes/reposts/reactions/zaps mentioning `owner`,
/// intersected with the enabled kind set.
pub fn build_inbox_filter(owner: PublicKey, enabled_kinds: &[u16], since: u64) -> Filter {
    const INBOX_KINDS: [u16; 4] = [1, 6, 7, 9735];
    let kinds: Vec<u16> = INBOX_KINDS.iter().copied().filter(|k| enabled_kinds.contains(k)).collect();
    let mut f = Filter::new().kinds(kinds.into_iter().map(Kind::Custom)).pubkey(owner);
    if since > 0 {
        f = f.since(Timestamp::from(since));
    }
    f
}

fn cap_authors(authors: &[PublicKey], max_authors: usize) -> Vec<PublicKey> {
    authors.iter().take(max_authors).copied().collect()
}

/// Normalizes a configured author string into a `PublicKey`: accepts hex
/// or bech32 (`npub1...`), plus the aliases `"owner"`/`"self"` which
/// expand to the owner's key.
pub fn normalize_author(raw: &str, owner: PublicKey) -> Option<PublicKey> {
    match raw {
        "owner" | "self" => Some(owner),
        other => PublicKey::parse(other).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::Keys;

    #[test]
    fn replaceable_and_regular_kinds_split_into_separate_filters() {
        let keys = Keys::generate();
        let filters = build_sync_filters(&[0, 1, 7], &[keys.public_key()], 0, 100);
        assert_eq!(filters.len(), 2);
    }

    #[test]
    fn regular_filter_only_carries_since_when_positive() {
        let keys = Keys::generate();
        let filters = build_sync_filters(&[1], &[keys.public_key()], 0, 100);
        assert_eq!(filters.len(), 1);
        assert!(filters[0].since.is_none());

        let filters = build_sync_filters(&[1], &[keys.public_key()], 1000, 100);
        assert!(filters[0].since.is_some());
    }

    #[test]
    fn max_authors_cap_truncates() {
        let keys: Vec<PublicKey> = (0..5).map(|_| Keys::generate().public_key()).collect();
        let capped = cap_authors(&keys, 2);
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn owner_and_self_aliases_resolve_to_owner() {
        let owner = Keys::generate().public_key();
        assert_eq!(normalize_author("owner", owner), Some(owner));
        assert_eq!(normalize_author("self", owner), Some(owner));
    }

    #[test]
    fn hex_pubkey_normalizes() {
        let owner = Keys::generate().public_key();
        assert_eq!(normalize_author(&owner.to_hex(), Keys::generate().public_key()), Some(owner));
    }
}
