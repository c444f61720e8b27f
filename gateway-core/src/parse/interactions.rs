//! §2.J Zap/Reaction Parsers — kind-7 reaction content and kind-9735 zap
//! receipt bolt11 invoice amounts.

use nostr::{Event, EventId, TagKind};

use crate::types::{ReactionInfo, ZapInfo};

fn target_event_id(event: &Event) -> Option<EventId> {
    event
        .tags
        .iter()
        .filter(|t| t.kind() == TagKind::e())
        .last()
        .and_then(|t| t.content())
        .and_then(|id| EventId::from_hex(id).ok())
}

/// Parses a kind-7 reaction event. `None` if it carries no `e` tag to
/// react to (malformed, per spec: skip the record, keep the event).
pub fn parse_reaction(event: &Event) -> Option<ReactionInfo> {
    let target_event_id = target_event_id(event)?;
    Some(ReactionInfo {
        target_event_id,
        content: event.content.clone(),
        created_at: event.created_at.as_u64(),
    })
}

/// Parses a kind-9735 zap receipt: target event from its `e` tag, amount
/// from the embedded `bolt11` tag.
pub fn parse_zap(event: &Event) -> Option<ZapInfo> {
    let target_event_id = target_event_id(event)?;
    let bolt11 = event
        .tags
        .iter()
        .find(|t| t.kind() == TagKind::Bolt11)
        .and_then(|t| t.content())?;
    let sats = parse_zap_amount(bolt11)?;
    Some(ZapInfo {
        target_event_id,
        sats,
        created_at: event.created_at.as_u64(),
    })
}

/// Parses satoshi amount from a bolt11 invoice's `lnbc<digits><multiplier>`
/// prefix. Does not validate the invoice itself — a regex over the
/// amount-multiplier prefix only. Multiplier table: `m` = x100_000,
/// `u` = x100, `n` = /10, `p` = /10_000, none = x100_000_000 (bitcoin
/// amount expressed directly in BTC, no multiplier suffix).
pub fn parse_zap_amount(bolt11: &str) -> Option<u64> {
    let rest = bolt11.strip_prefix("lnbc")?;
    let digit_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digit_end == 0 {
        return None;
    }
    let amount: u128 = rest[..digit_end].parse().ok()?;
    let multiplier_char = rest[digit_end..].chars().next();

    let (numerator, denominator): (u128, u128) = match multiplier_char {
        Some('m') => (100_000, 1),
        Some('u') => (100, 1),
        Some('n') => (1, 10),
        Some('p') => (1, 10_000),
        _ => (100_000_000, 1),
    };

    let sats = amount.checked_mul(numerator)? / denominator;
    u64::try_from(sats).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milli_multiplier() {
        // 10 millibitcoin = 1_000_000 sats.
        assert_eq!(parse_zap_amount("lnbc10m1p..."), Some(1_000_000));
    }

    #[test]
    fn micro_multiplier() {
        assert_eq!(parse_zap_amount("lnbc2500u1p..."), Some(250_000));
    }

    #[test]
    fn nano_multiplier() {
        assert_eq!(parse_zap_amount("lnbc10n1p..."), Some(1));
    }

    #[test]
    fn pico_multiplier() {
        assert_eq!(parse_zap_amount("lnbc100000p1p..."), Some(10));
    }

    #[test]
    fn no_multiplier_is_whole_bitcoin_units() {
        // The char after the amount digits must not be m/u/n/p, or it's
        // read as a multiplier rather than falling through to the
        // no-multiplier (whole-BTC) branch.
        assert_eq!(parse_zap_amount("lnbc1xyz..."), Some(100_000_000));
    }

    #[test]
    fn malformed_prefix_is_none() {
        assert_eq!(parse_zap_amount("notaninvoice"), None);
        assert_eq!(parse_zap_amount("lnbc"), None);
    }
}
