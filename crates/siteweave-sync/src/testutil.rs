//! Shared event fabrication helpers for tests.

use std::collections::BTreeMap;

use nostr::{Event, EventBuilder, EventId, Keys, Kind, Tag, Timestamp};
use sha2::{Digest, Sha256};
use siteweave_core::{
    IndexContent, KIND_SITE_ASSET, KIND_SITE_ENTRYPOINT, KIND_SITE_INDEX, KIND_SITE_MANIFEST,
    derive_index_key,
};

/// An asset event whose bytes are `seed`.
pub(crate) fn asset(keys: &Keys, seed: &str) -> Event {
    let hash = hex::encode(Sha256::digest(seed.as_bytes()));
    EventBuilder::new(Kind::from(KIND_SITE_ASSET), seed)
        .tags([Tag::parse(["x", &hash]).unwrap()])
        .sign_with_keys(keys)
        .unwrap()
}

/// A manifest event for `route` referencing the given asset events.
pub(crate) fn manifest(keys: &Keys, route: &str, assets: &[&Event]) -> Event {
    EventBuilder::new(Kind::from(KIND_SITE_MANIFEST), route)
        .tags(assets.iter().map(|a| Tag::event(a.id)))
        .sign_with_keys(keys)
        .unwrap()
}

/// A site-index for `version` mapping routes to manifest ids, with a
/// controlled `created_at` so tests can order versions.
pub(crate) fn site_index(
    keys: &Keys,
    version: &str,
    routes: &[(&str, EventId)],
    created_at: u64,
) -> Event {
    let content = IndexContent {
        version: Some(version.to_string()),
        routes: routes
            .iter()
            .map(|(route, id)| (route.to_string(), id.to_hex()))
            .collect::<BTreeMap<_, _>>(),
    };
    let content = serde_json::to_string(&content).unwrap();
    EventBuilder::new(Kind::from(KIND_SITE_INDEX), &content)
        .tags([Tag::identifier(derive_index_key(&content))])
        .custom_created_at(Timestamp::from(created_at))
        .sign_with_keys(keys)
        .unwrap()
}

/// An entrypoint pointing at `index`'s addressable key.
pub(crate) fn entrypoint(keys: &Keys, index: &Event, created_at: u64) -> Event {
    let key = index.tags.identifier().expect("index has a d tag");
    let coord = format!("{}:{}:{}", KIND_SITE_INDEX, keys.public_key().to_hex(), key);
    EventBuilder::new(Kind::from(KIND_SITE_ENTRYPOINT), "")
        .tags([Tag::parse(["a", &coord]).unwrap()])
        .custom_created_at(Timestamp::from(created_at))
        .sign_with_keys(keys)
        .unwrap()
}

/// A complete single-manifest version: assets, one manifest at `/index.html`,
/// and the site-index. Returned bottom-up.
pub(crate) struct Version {
    pub assets: Vec<Event>,
    pub manifest: Event,
    pub index: Event,
}

impl Version {
    /// Every event of the version, bottom-up.
    pub(crate) fn all(&self) -> Vec<Event> {
        let mut out = self.assets.clone();
        out.push(self.manifest.clone());
        out.push(self.index.clone());
        out
    }

    /// The addressable key of the version's site-index.
    pub(crate) fn key(&self) -> String {
        self.index.tags.identifier().unwrap().to_string()
    }
}

/// Build a complete version with `n_assets` distinct assets.
pub(crate) fn version(keys: &Keys, label: &str, n_assets: usize, created_at: u64) -> Version {
    let assets: Vec<Event> = (0..n_assets)
        .map(|i| asset(keys, &format!("{label}-asset-{i}")))
        .collect();
    let refs: Vec<&Event> = assets.iter().collect();
    let manifest = manifest(keys, "/index.html", &refs);
    let index = site_index(keys, label, &[("/index.html", manifest.id)], created_at);
    Version {
        assets,
        manifest,
        index,
    }
}
