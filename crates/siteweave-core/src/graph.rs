//! Pure extraction functions over content graph events.
//!
//! Relay data is untrusted: every function here treats malformed or partial
//! events as "contributes nothing" rather than erroring. A site-index with
//! unparseable JSON declares no manifests; an entrypoint with a mangled
//! coordinate points nowhere. Strict parse failures are only surfaced by
//! the internal helpers, never past this module's public surface.

use std::collections::BTreeMap;

use nostr::{Event, EventId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::{INDEX_KEY_LEN, KIND_SITE_ASSET, KIND_SITE_ENTRYPOINT, KIND_SITE_INDEX, KIND_SITE_MANIFEST};

/// Graph layer of a content event, ordered bottom-up.
///
/// Publication order follows this ordering so a relay never references an
/// id it does not also hold: assets first, entrypoint last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GraphLayer {
    /// Leaf file content.
    Asset = 1,
    /// Per-route asset bundle.
    Manifest = 2,
    /// Route table for one version.
    SiteIndex = 3,
    /// "Current site" pointer.
    Entrypoint = 4,
}

impl GraphLayer {
    /// Map an event kind number to its graph layer, if it is one of ours.
    pub fn of_kind(kind: u16) -> Option<Self> {
        match kind {
            KIND_SITE_ASSET => Some(Self::Asset),
            KIND_SITE_MANIFEST => Some(Self::Manifest),
            KIND_SITE_INDEX => Some(Self::SiteIndex),
            KIND_SITE_ENTRYPOINT => Some(Self::Entrypoint),
            _ => None,
        }
    }

    /// Layer of an event, if it belongs to the content graph.
    pub fn of_event(event: &Event) -> Option<Self> {
        Self::of_kind(event.kind.as_u16())
    }
}

/// Parsed site-index JSON content.
///
/// Unknown fields are ignored; missing fields default, so a partially
/// valid index still contributes whatever it declares.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexContent {
    /// Human-readable version label. Display only; the addressable key is
    /// the version's identity.
    #[serde(default)]
    pub version: Option<String>,
    /// Route path -> manifest event id (hex).
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
}

impl IndexContent {
    /// Parse from a site-index's JSON content, defaulting on failure.
    pub fn from_json(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_default()
    }
}

/// Asset event ids referenced by a manifest's `e` tags.
///
/// Returns an empty list for non-manifest events, missing tags, or
/// malformed ids.
pub fn referenced_assets(event: &Event) -> Vec<EventId> {
    if event.kind.as_u16() != KIND_SITE_MANIFEST {
        return Vec::new();
    }
    event
        .tags
        .iter()
        .filter_map(|tag| {
            let slice = tag.as_slice();
            if slice.first().map(String::as_str) == Some("e") {
                slice.get(1).and_then(|id| EventId::from_hex(id).ok())
            } else {
                None
            }
        })
        .collect()
}

/// Manifest event ids declared by a site-index's `routes` map.
///
/// Malformed JSON contributes no references; individual non-hex route
/// values are skipped. Route order (BTreeMap) keeps the result
/// deterministic.
pub fn referenced_manifests(event: &Event) -> Vec<EventId> {
    if event.kind.as_u16() != KIND_SITE_INDEX {
        return Vec::new();
    }
    IndexContent::from_json(&event.content)
        .routes
        .values()
        .filter_map(|id| EventId::from_hex(id).ok())
        .collect()
}

/// The addressable key (`d` tag) of a site-index event.
pub fn index_key_of(event: &Event) -> Option<&str> {
    if event.kind.as_u16() != KIND_SITE_INDEX {
        return None;
    }
    event.tags.identifier()
}

/// The site-index key targeted by an entrypoint's `a` tag.
///
/// The coordinate must name the site-index kind and the entrypoint's own
/// author; a pointer into someone else's namespace contributes nothing.
pub fn entrypoint_target_key(event: &Event) -> Option<String> {
    if event.kind.as_u16() != KIND_SITE_ENTRYPOINT {
        return None;
    }
    event.tags.iter().find_map(|tag| {
        let slice = tag.as_slice();
        if slice.first().map(String::as_str) != Some("a") {
            return None;
        }
        let (kind, pubkey, key) = parse_coordinate(slice.get(1)?).ok()?;
        if kind == KIND_SITE_INDEX && pubkey == event.pubkey.to_hex() {
            Some(key)
        } else {
            None
        }
    })
}

/// Version label of a site-index event.
///
/// Falls back to `unversioned-<addressable key>` when the content declares
/// no version, so distinct contentless-version indexes are never merged
/// under one label.
pub fn version_label_of(event: &Event) -> String {
    let parsed = IndexContent::from_json(&event.content);
    match parsed.version {
        Some(v) if !v.is_empty() => v,
        _ => {
            let key = index_key_of(event).unwrap_or("");
            if key.is_empty() {
                format!("unversioned-{}", &event.id.to_hex()[..INDEX_KEY_LEN])
            } else {
                format!("unversioned-{key}")
            }
        }
    }
}

/// Derive the addressable key for a site-index's JSON content: the first
/// [`INDEX_KEY_LEN`] hex characters of its SHA-256.
///
/// Distinct contents yield distinct keys, which is how version history
/// survives on relays that keep only the latest write per key.
pub fn derive_index_key(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)[..INDEX_KEY_LEN].to_string()
}

/// Strict `kind:pubkey:key` coordinate parse.
fn parse_coordinate(value: &str) -> Result<(u16, String, String)> {
    let mut parts = value.splitn(3, ':');
    let (kind, pubkey, key) = match (parts.next(), parts.next(), parts.next()) {
        (Some(k), Some(p), Some(d)) => (k, p, d),
        _ => {
            return Err(Error::InvalidCoordinate {
                value: value.to_string(),
                reason: "expected three colon-separated fields",
            });
        }
    };
    let kind: u16 = kind.parse().map_err(|_| Error::InvalidCoordinate {
        value: value.to_string(),
        reason: "kind is not an integer",
    })?;
    if pubkey.len() != 64 || !pubkey.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidCoordinate {
            value: value.to_string(),
            reason: "pubkey is not 64 hex characters",
        });
    }
    if key.is_empty() {
        return Err(Error::InvalidCoordinate {
            value: value.to_string(),
            reason: "empty addressable key",
        });
    }
    Ok((kind, pubkey.to_lowercase(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::{EventBuilder, Keys, Kind, Tag};

    fn manifest(keys: &Keys, route: &str, assets: &[EventId]) -> Event {
        EventBuilder::new(Kind::from(KIND_SITE_MANIFEST), route)
            .tags(assets.iter().copied().map(Tag::event))
            .sign_with_keys(keys)
            .unwrap()
    }

    fn site_index(keys: &Keys, content: &str) -> Event {
        EventBuilder::new(Kind::from(KIND_SITE_INDEX), content)
            .tags([Tag::identifier(derive_index_key(content))])
            .sign_with_keys(keys)
            .unwrap()
    }

    fn entrypoint(keys: &Keys, coord: &str) -> Event {
        EventBuilder::new(Kind::from(KIND_SITE_ENTRYPOINT), "")
            .tags([Tag::parse(["a", coord]).unwrap()])
            .sign_with_keys(keys)
            .unwrap()
    }

    fn some_id(byte: u8) -> EventId {
        EventId::from_byte_array([byte; 32])
    }

    #[test]
    fn layer_ordering_is_bottom_up() {
        assert!(GraphLayer::Asset < GraphLayer::Manifest);
        assert!(GraphLayer::Manifest < GraphLayer::SiteIndex);
        assert!(GraphLayer::SiteIndex < GraphLayer::Entrypoint);
    }

    #[test]
    fn layer_of_foreign_kind_is_none() {
        assert_eq!(GraphLayer::of_kind(1), None);
        assert_eq!(GraphLayer::of_kind(KIND_SITE_ASSET), Some(GraphLayer::Asset));
    }

    #[test]
    fn referenced_assets_extracts_e_tags() {
        let keys = Keys::generate();
        let ids = [some_id(1), some_id(2)];
        let event = manifest(&keys, "/index.html", &ids);
        assert_eq!(referenced_assets(&event), ids.to_vec());
    }

    #[test]
    fn referenced_assets_empty_for_non_manifest() {
        let keys = Keys::generate();
        let event = site_index(&keys, "{}");
        assert!(referenced_assets(&event).is_empty());
    }

    #[test]
    fn referenced_manifests_from_routes() {
        let keys = Keys::generate();
        let m1 = some_id(7);
        let content = format!(
            r#"{{"version":"1.0.0","routes":{{"/index.html":"{}"}}}}"#,
            m1.to_hex()
        );
        let event = site_index(&keys, &content);
        assert_eq!(referenced_manifests(&event), vec![m1]);
    }

    #[test]
    fn referenced_manifests_malformed_content_contributes_nothing() {
        let keys = Keys::generate();
        for content in ["not json", "", "[1,2,3]", r#"{"routes":"nope"}"#] {
            let event = site_index(&keys, content);
            assert!(
                referenced_manifests(&event).is_empty(),
                "content {content:?} should contribute nothing"
            );
        }
    }

    #[test]
    fn referenced_manifests_skips_non_hex_route_values() {
        let keys = Keys::generate();
        let m1 = some_id(9);
        let content = format!(
            r#"{{"routes":{{"/a":"garbage","/b":"{}"}}}}"#,
            m1.to_hex()
        );
        let event = site_index(&keys, &content);
        assert_eq!(referenced_manifests(&event), vec![m1]);
    }

    #[test]
    fn entrypoint_target_key_parses_own_coordinate() {
        let keys = Keys::generate();
        let coord = format!("{}:{}:abcd1234abcd1234", KIND_SITE_INDEX, keys.public_key().to_hex());
        let event = entrypoint(&keys, &coord);
        assert_eq!(
            entrypoint_target_key(&event).as_deref(),
            Some("abcd1234abcd1234")
        );
    }

    #[test]
    fn entrypoint_target_key_rejects_foreign_pubkey() {
        let keys = Keys::generate();
        let other = Keys::generate();
        let coord = format!("{}:{}:abcd1234abcd1234", KIND_SITE_INDEX, other.public_key().to_hex());
        let event = entrypoint(&keys, &coord);
        assert_eq!(entrypoint_target_key(&event), None);
    }

    #[test]
    fn entrypoint_target_key_rejects_wrong_kind() {
        let keys = Keys::generate();
        let coord = format!("30023:{}:abcd1234abcd1234", keys.public_key().to_hex());
        let event = entrypoint(&keys, &coord);
        assert_eq!(entrypoint_target_key(&event), None);
    }

    #[test]
    fn entrypoint_target_key_malformed_coordinate_is_none() {
        let keys = Keys::generate();
        for coord in ["31064:short:key", "nonsense", "31064:zz"] {
            let event = entrypoint(&keys, coord);
            assert_eq!(entrypoint_target_key(&event), None, "coord {coord:?}");
        }
    }

    #[test]
    fn version_label_prefers_declared_version() {
        let keys = Keys::generate();
        let event = site_index(&keys, r#"{"version":"2.1.0","routes":{}}"#);
        assert_eq!(version_label_of(&event), "2.1.0");
    }

    #[test]
    fn version_label_fallback_uses_addressable_key() {
        let keys = Keys::generate();
        let content = r#"{"routes":{}}"#;
        let event = site_index(&keys, content);
        let expected = format!("unversioned-{}", derive_index_key(content));
        assert_eq!(version_label_of(&event), expected);
    }

    #[test]
    fn version_label_distinct_for_distinct_contentless_versions() {
        let keys = Keys::generate();
        let a = site_index(&keys, r#"{"routes":{"/a":"x"}}"#);
        let b = site_index(&keys, r#"{"routes":{"/b":"x"}}"#);
        assert_ne!(version_label_of(&a), version_label_of(&b));
    }

    #[test]
    fn derive_index_key_is_stable_and_truncated() {
        let key = derive_index_key(r#"{"version":"1.0.0"}"#);
        assert_eq!(key.len(), INDEX_KEY_LEN);
        assert_eq!(key, derive_index_key(r#"{"version":"1.0.0"}"#));
        assert_ne!(key, derive_index_key(r#"{"version":"1.0.1"}"#));
    }

    #[test]
    fn parse_coordinate_strict_errors() {
        assert!(parse_coordinate("31064:abc").is_err());
        assert!(parse_coordinate("x:y:z").is_err());
        let pk = "a".repeat(64);
        assert!(parse_coordinate(&format!("31064:{pk}:")).is_err());
        let parsed = parse_coordinate(&format!("31064:{pk}:deadbeef")).unwrap();
        assert_eq!(parsed, (31064, pk, "deadbeef".to_string()));
    }
}
