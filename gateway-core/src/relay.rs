//! Relay URL validation.
//!
//! Grounded on the teacher's `isValidRelayUrl()`/`filterValidRelays()` port:
//! a relay must be a secure WebSocket URL, and `.onion`/localhost hosts are
//! excluded unless explicitly allowed.

/// Validate a relay URL: must be `wss://`, excludes `.onion` (unreachable
/// without Tor) and `localhost`/`127.0.0.1` unless `allow_localhost`.
pub fn is_valid_relay_url(url: &str, allow_localhost: bool) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };

    if parsed.scheme() != "wss" {
        return false;
    }

    match parsed.host_str() {
        Some(host) if host.ends_with(".onion") => false,
        Some(host) if (host == "localhost" || host == "127.0.0.1") && !allow_localhost => false,
        Some(_) => true,
        None => false,
    }
}

/// Filter a list of relay URLs down to valid ones, falling back to the
/// configured seed relays if every candidate is invalid.
pub fn filter_valid_relays(relays: &[String], seeds: &[String]) -> Vec<String> {
    let valid: Vec<String> = relays
        .iter()
        .filter(|r| is_valid_relay_url(r, false))
        .cloned()
        .collect();

    if valid.is_empty() {
        seeds.to_vec()
    } else {
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_wss() {
        assert!(is_valid_relay_url("wss://relay.damus.io", false));
    }

    #[test]
    fn invalid_plain_ws() {
        assert!(!is_valid_relay_url("ws://relay.damus.io", false));
    }

    #[test]
    fn invalid_onion() {
        assert!(!is_valid_relay_url("wss://somerelay.onion", false));
    }

    #[test]
    fn localhost_blocked_by_default() {
        assert!(!is_valid_relay_url("wss://localhost", false));
    }

    #[test]
    fn localhost_allowed_when_requested() {
        assert!(is_valid_relay_url("wss://localhost", true));
    }

    #[test]
    fn falls_back_to_seeds_when_all_invalid() {
        let seeds = vec!["wss://relay.damus.io".to_string()];
        let result = filter_valid_relays(&["ws://bad".to_string()], &seeds);
        assert_eq!(result, seeds);
    }
}
