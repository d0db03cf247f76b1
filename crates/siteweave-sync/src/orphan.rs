//! Single-relay orphan detection.
//!
//! Works over one relay's events in isolation, with no cross-relay
//! knowledge. An event is live when it is reachable from a root on this
//! relay: every present site index is a root, and so is the newest
//! entrypoint. Everything else of ours is an orphan:
//!
//! - entrypoints other than the newest (stale pointers),
//! - manifests referenced by no present site index,
//! - assets referenced by no live manifest.
//!
//! A manifest whose index is absent from this relay counts as orphaned
//! even if some other relay still needs it; the cleanup tool is explicit
//! about operating per relay and shows the operator what it found.

use std::collections::{BTreeSet, HashMap, HashSet};

use nostr::{Event, EventId};
use siteweave_core::{GraphLayer, referenced_assets, referenced_manifests, version_label_of};

/// What a relay holds beyond the reachable graph.
#[derive(Debug, Clone, Default)]
pub struct OrphanReport {
    /// Entrypoint events superseded by a newer one.
    pub stale_entrypoints: Vec<Event>,
    /// Manifests no present site index references.
    pub orphaned_manifests: Vec<Event>,
    /// Assets no live manifest references.
    pub orphaned_assets: Vec<Event>,
    /// Labels of the versions whose indexes anchor the live graph.
    pub live_versions: Vec<String>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.stale_entrypoints.is_empty()
            && self.orphaned_manifests.is_empty()
            && self.orphaned_assets.is_empty()
    }

    /// All orphan ids, for building a deletion plan.
    pub fn orphan_ids(&self) -> BTreeSet<EventId> {
        self.stale_entrypoints
            .iter()
            .chain(&self.orphaned_manifests)
            .chain(&self.orphaned_assets)
            .map(|e| e.id)
            .collect()
    }

    pub fn total(&self) -> usize {
        self.stale_entrypoints.len() + self.orphaned_manifests.len() + self.orphaned_assets.len()
    }
}

/// Partition one relay's events into live and orphaned.
pub fn detect_orphans(events: &[Event]) -> OrphanReport {
    let mut report = OrphanReport::default();
    let mut entrypoints: Vec<&Event> = Vec::new();
    let mut indexes: Vec<&Event> = Vec::new();
    let mut manifests: HashMap<EventId, &Event> = HashMap::new();
    let mut assets: Vec<&Event> = Vec::new();
    let mut seen: HashSet<EventId> = HashSet::new();

    for event in events {
        if !seen.insert(event.id) {
            continue;
        }
        match GraphLayer::of_event(event) {
            Some(GraphLayer::Entrypoint) => entrypoints.push(event),
            Some(GraphLayer::SiteIndex) => indexes.push(event),
            Some(GraphLayer::Manifest) => {
                manifests.insert(event.id, event);
            }
            Some(GraphLayer::Asset) => assets.push(event),
            None => {}
        }
    }

    // Newest entrypoint survives; older copies are stale pointers.
    entrypoints.sort_by_key(|e| (e.created_at, e.id));
    if let Some((_newest, stale)) = entrypoints.split_last() {
        report.stale_entrypoints = stale.iter().map(|e| (*e).clone()).collect();
    }

    // Every present index roots its manifests.
    let mut live_manifests: HashSet<EventId> = HashSet::new();
    for index in &indexes {
        report.live_versions.push(version_label_of(index));
        live_manifests.extend(referenced_manifests(index));
    }
    report.live_versions.sort();
    report.live_versions.dedup();

    let mut live_assets: HashSet<EventId> = HashSet::new();
    for (id, manifest) in &manifests {
        if live_manifests.contains(id) {
            live_assets.extend(referenced_assets(manifest));
        } else {
            report.orphaned_manifests.push((*manifest).clone());
        }
    }
    report.orphaned_manifests.sort_by_key(|e| e.id);

    report.orphaned_assets = assets
        .into_iter()
        .filter(|e| !live_assets.contains(&e.id))
        .cloned()
        .collect();
    report.orphaned_assets.sort_by_key(|e| e.id);

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use nostr::Keys;

    #[test]
    fn fully_referenced_relay_has_no_orphans() {
        let keys = Keys::generate();
        let v = testutil::version(&keys, "1.0.0", 3, 100);
        let ep = testutil::entrypoint(&keys, &v.index, 200);
        let mut events = v.all();
        events.push(ep);

        let report = detect_orphans(&events);
        assert!(report.is_empty());
        assert_eq!(report.live_versions, vec!["1.0.0"]);
    }

    #[test]
    fn stale_entrypoints_flagged_newest_kept() {
        let keys = Keys::generate();
        let v1 = testutil::version(&keys, "1.0.0", 1, 100);
        let v2 = testutil::version(&keys, "2.0.0", 1, 200);
        let old = testutil::entrypoint(&keys, &v1.index, 300);
        let newest = testutil::entrypoint(&keys, &v2.index, 400);
        let mut events = v1.all();
        events.extend(v2.all());
        events.push(old.clone());
        events.push(newest);

        let report = detect_orphans(&events);
        assert_eq!(report.stale_entrypoints.len(), 1);
        assert_eq!(report.stale_entrypoints[0].id, old.id);
        assert!(report.orphaned_manifests.is_empty());
    }

    #[test]
    fn unreferenced_manifest_and_its_assets_are_orphaned() {
        let keys = Keys::generate();
        let live = testutil::version(&keys, "2.0.0", 1, 200);
        // Leftover manifest whose index was deleted, plus its asset.
        let leftover_asset = testutil::asset(&keys, "leftover");
        let leftover_manifest = testutil::manifest(&keys, "/old.html", &[&leftover_asset]);

        let mut events = live.all();
        events.push(leftover_asset.clone());
        events.push(leftover_manifest.clone());

        let report = detect_orphans(&events);
        assert_eq!(report.orphaned_manifests.len(), 1);
        assert_eq!(report.orphaned_manifests[0].id, leftover_manifest.id);
        assert_eq!(report.orphaned_assets.len(), 1);
        assert_eq!(report.orphaned_assets[0].id, leftover_asset.id);
    }

    #[test]
    fn asset_shared_with_live_manifest_survives() {
        let keys = Keys::generate();
        let shared = testutil::asset(&keys, "shared");
        let live_manifest = testutil::manifest(&keys, "/index.html", &[&shared]);
        let live_index =
            testutil::site_index(&keys, "1.0.0", &[("/index.html", live_manifest.id)], 100);
        let dead_manifest = testutil::manifest(&keys, "/dead.html", &[&shared]);

        let report = detect_orphans(&[shared, live_manifest, live_index, dead_manifest.clone()]);
        assert_eq!(report.orphaned_manifests.len(), 1);
        assert_eq!(report.orphaned_manifests[0].id, dead_manifest.id);
        assert!(report.orphaned_assets.is_empty());
    }

    #[test]
    fn index_without_entrypoint_still_roots_its_version() {
        // Presence of the index is what keeps a version live on a relay,
        // not whether the entrypoint targets it.
        let keys = Keys::generate();
        let v1 = testutil::version(&keys, "1.0.0", 1, 100);
        let v2 = testutil::version(&keys, "2.0.0", 1, 200);
        let ep = testutil::entrypoint(&keys, &v2.index, 300);
        let mut events = v1.all();
        events.extend(v2.all());
        events.push(ep);

        let report = detect_orphans(&events);
        assert!(report.is_empty());
        assert_eq!(report.live_versions, vec!["1.0.0", "2.0.0"]);
    }
}
