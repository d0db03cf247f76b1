//! Relay URL normalization for configured relay lists.
//!
//! Prevents the same relay appearing twice in a plan because of trailing
//! slashes or case differences, which would make the reconciliation engine
//! double-count a relay's holdings.
//!
//! # Normalization Rules
//!
//! - Require a websocket scheme (wss:// or ws://)
//! - Parse with nostr-sdk's `RelayUrl` (lowercases scheme and host)
//! - Remove trailing slashes
//!
//! Unlike a crawler, a publisher connects only to operator-chosen relays,
//! so there is no blocklist here: localhost and private addresses are
//! legitimate targets for self-hosted relays.

use nostr_sdk::RelayUrl;

/// Result of URL normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeResult {
    /// URL is valid and normalized.
    Ok(String),
    /// URL is syntactically invalid.
    Invalid(String),
}

impl NormalizeResult {
    /// Returns the normalized URL if valid.
    pub fn ok(self) -> Option<String> {
        match self {
            Self::Ok(url) => Some(url),
            Self::Invalid(_) => None,
        }
    }
}

/// Normalize a relay URL.
pub fn normalize_relay_url(url: &str) -> NormalizeResult {
    let url = url.trim();

    if !url.starts_with("wss://") && !url.starts_with("ws://") {
        return NormalizeResult::Invalid("URL must start with wss:// or ws://".to_string());
    }

    let parsed = match RelayUrl::parse(url) {
        Ok(u) => u,
        Err(e) => return NormalizeResult::Invalid(format!("invalid relay URL: {e}")),
    };

    let mut normalized = parsed.to_string();
    while normalized.ends_with('/') {
        normalized.pop();
    }

    NormalizeResult::Ok(normalized)
}

/// Normalize a list of relay URLs, dropping invalid entries with a warning
/// and de-duplicating. The result is sorted, which keeps every downstream
/// map iteration (and therefore every plan) deterministic.
pub fn normalize_relay_list(urls: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        match normalize_relay_url(url) {
            NormalizeResult::Ok(norm) => {
                if !out.contains(&norm) {
                    out.push(norm);
                }
            }
            NormalizeResult::Invalid(reason) => {
                tracing::warn!("Skipping relay URL {}: {}", url, reason);
            }
        }
    }
    out.sort();
    out
}
