//! Graph analyzer: reconstructs the content graph from per-relay snapshots.
//!
//! Consumes the raw per-relay event sets and produces three things:
//! the entrypoint analysis (the globally intended "current site" pointer),
//! the version table (keyed by addressable key — the content-derived
//! identity; the free-text version string is only a label), and the
//! per-(version, relay) completeness records.
//!
//! Completeness is evaluated strictly bottom-up per relay: a manifest is
//! "present" only if the exact referenced event id exists on that relay.
//! A differently-hashed manifest for the same route never satisfies a
//! reference — content addressing means any edit produces a new id, so
//! stale references are detected, not papered over.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use nostr::{Event, EventId};
use siteweave_core::{
    GraphLayer, entrypoint_target_key, index_key_of, referenced_assets, referenced_manifests,
    version_label_of,
};

use crate::snapshot::RelaySnapshot;

/// The globally intended "current site" pointer.
#[derive(Debug, Clone, Default)]
pub struct EntrypointAnalysis {
    /// The newest entrypoint event across all relays, by `(created_at, id)`
    /// with id as the deterministic tie-break. `None` when no relay holds
    /// any entrypoint — flagged, not an error.
    pub current: Option<Event>,
    /// The site-index key the current entrypoint targets.
    pub target_key: Option<String>,
    /// Entrypoint events present per relay (live plus any queryable history).
    pub per_relay: BTreeMap<String, Vec<Event>>,
}

impl EntrypointAnalysis {
    /// Ids of entrypoint events on `relay` other than the current one.
    pub fn stale_ids_on(&self, relay: &str) -> Vec<EventId> {
        let current_id = self.current.as_ref().map(|e| e.id);
        self.per_relay
            .get(relay)
            .map(|events| {
                events
                    .iter()
                    .map(|e| e.id)
                    .filter(|id| Some(*id) != current_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `relay` already holds the current entrypoint event.
    pub fn relay_has_current(&self, relay: &str) -> bool {
        match &self.current {
            Some(current) => self
                .per_relay
                .get(relay)
                .is_some_and(|events| events.iter().any(|e| e.id == current.id)),
            None => true,
        }
    }
}

/// One version of the site, identified by its addressable key.
#[derive(Debug, Clone)]
pub struct VersionRecord {
    /// The addressable key (identity).
    pub key: String,
    /// Display label from the index content, or the disambiguating fallback.
    pub label: String,
    /// Canonical index event for the key (newest occurrence).
    pub index_event: Event,
    /// Union of manifest ids declared by the key's occurrences.
    pub manifests: BTreeSet<EventId>,
    /// Transitive asset ids, when every declared manifest's content is
    /// known on at least one relay. `None` means the version is
    /// unresolvable: some manifest exists nowhere, so the full closure is
    /// unknowable and the version can never be complete anywhere.
    pub assets: Option<BTreeSet<EventId>>,
    /// Per-relay site-index occurrence (relay -> index event id).
    pub relays_with_index: BTreeMap<String, EventId>,
}

/// Presence of one version on one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completeness {
    /// The site-index for the version's key exists on the relay.
    pub has_index: bool,
    /// Declared manifest ids absent from the relay.
    pub missing_manifests: BTreeSet<EventId>,
    /// Required asset ids absent from the relay (over the known closure).
    pub missing_assets: BTreeSet<EventId>,
    /// Whether the version's full closure is knowable at all.
    pub resolvable: bool,
}

impl Completeness {
    /// True iff 100% of the version's transitive closure is present.
    pub fn is_complete(&self) -> bool {
        self.resolvable
            && self.has_index
            && self.missing_manifests.is_empty()
            && self.missing_assets.is_empty()
    }

    /// True iff the relay holds any part of the version at all.
    /// Distinguishes partial presence from total absence.
    pub fn holds_any(&self, record: &VersionRecord) -> bool {
        if self.has_index {
            return true;
        }
        if self.missing_manifests.len() < record.manifests.len() {
            return true;
        }
        if let Some(assets) = &record.assets {
            if self.missing_assets.len() < assets.len() {
                return true;
            }
        }
        false
    }
}

/// Full analyzer output.
#[derive(Debug, Clone, Default)]
pub struct GraphAnalysis {
    /// Entrypoint analysis.
    pub entrypoint: EntrypointAnalysis,
    /// Version table, keyed by addressable key.
    pub versions: BTreeMap<String, VersionRecord>,
    /// Completeness per version key, per relay.
    pub completeness: BTreeMap<String, BTreeMap<String, Completeness>>,
    /// Every manifest event seen anywhere, by id.
    pub manifest_events: HashMap<EventId, Event>,
    /// Every asset event seen anywhere, by id.
    pub asset_events: HashMap<EventId, Event>,
    /// All event ids held per relay.
    pub relay_ids: BTreeMap<String, HashSet<EventId>>,
}

impl GraphAnalysis {
    /// Relays on which `key` is complete, in deterministic (sorted) order.
    pub fn complete_relays(&self, key: &str) -> Vec<&str> {
        self.completeness
            .get(key)
            .map(|per_relay| {
                per_relay
                    .iter()
                    .filter(|(_, c)| c.is_complete())
                    .map(|(relay, _)| relay.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Analyze per-relay snapshots into the version table, completeness
/// records, and entrypoint analysis. Pure; malformed events contribute
/// nothing.
pub fn analyze(snapshot: &RelaySnapshot) -> GraphAnalysis {
    let mut analysis = GraphAnalysis::default();
    // key -> occurrences (relay, index event)
    let mut index_occurrences: BTreeMap<String, Vec<(String, Event)>> = BTreeMap::new();

    // Pass 1: registries and per-relay id sets.
    for (relay, events) in &snapshot.events {
        let ids = analysis.relay_ids.entry(relay.clone()).or_default();
        for event in events {
            ids.insert(event.id);
            match GraphLayer::of_event(event) {
                Some(GraphLayer::Asset) => {
                    analysis.asset_events.entry(event.id).or_insert_with(|| event.clone());
                }
                Some(GraphLayer::Manifest) => {
                    analysis
                        .manifest_events
                        .entry(event.id)
                        .or_insert_with(|| event.clone());
                }
                Some(GraphLayer::SiteIndex) => {
                    if let Some(key) = index_key_of(event) {
                        index_occurrences
                            .entry(key.to_string())
                            .or_default()
                            .push((relay.clone(), event.clone()));
                    }
                }
                Some(GraphLayer::Entrypoint) => {
                    analysis
                        .entrypoint
                        .per_relay
                        .entry(relay.clone())
                        .or_default()
                        .push(event.clone());
                }
                None => {}
            }
        }
    }

    // Pass 2: entrypoint — globally newest by (created_at, id).
    analysis.entrypoint.current = analysis
        .entrypoint
        .per_relay
        .values()
        .flatten()
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        })
        .cloned();
    analysis.entrypoint.target_key = analysis
        .entrypoint
        .current
        .as_ref()
        .and_then(entrypoint_target_key);
    if analysis.entrypoint.current.is_none() {
        tracing::info!("no entrypoint found on any relay");
    }

    // Pass 3: version table.
    for (key, occurrences) in index_occurrences {
        let canonical = occurrences
            .iter()
            .map(|(_, e)| e)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned()
            .expect("occurrence list is never empty");

        let mut manifests: BTreeSet<EventId> = BTreeSet::new();
        for (_, event) in &occurrences {
            manifests.extend(referenced_manifests(event));
        }

        // Transitive closure from the global manifest registry. A declared
        // manifest that exists on no relay makes the closure unknowable.
        let mut assets: BTreeSet<EventId> = BTreeSet::new();
        let mut resolvable = true;
        for manifest_id in &manifests {
            match analysis.manifest_events.get(manifest_id) {
                Some(manifest) => assets.extend(referenced_assets(manifest)),
                None => resolvable = false,
            }
        }

        let relays_with_index: BTreeMap<String, EventId> = occurrences
            .iter()
            .map(|(relay, event)| (relay.clone(), event.id))
            .collect();

        let label = version_label_of(&canonical);
        analysis.versions.insert(
            key.clone(),
            VersionRecord {
                key,
                label,
                index_event: canonical,
                manifests,
                assets: resolvable.then_some(assets),
                relays_with_index,
            },
        );
    }

    // Pass 4: completeness per (version, relay).
    let empty = HashSet::new();
    for record in analysis.versions.values() {
        let per_relay = analysis
            .completeness
            .entry(record.key.clone())
            .or_default();
        for relay in snapshot.events.keys() {
            let held = analysis.relay_ids.get(relay).unwrap_or(&empty);
            let missing_manifests: BTreeSet<EventId> = record
                .manifests
                .iter()
                .filter(|id| !held.contains(id))
                .copied()
                .collect();
            // Over the known closure even when unresolvable: still useful
            // for diffing and for orphan deletion sets.
            let known_assets: BTreeSet<EventId> = match &record.assets {
                Some(assets) => assets.clone(),
                None => record
                    .manifests
                    .iter()
                    .filter_map(|id| analysis.manifest_events.get(id))
                    .flat_map(referenced_assets)
                    .collect(),
            };
            let missing_assets: BTreeSet<EventId> = known_assets
                .iter()
                .filter(|id| !held.contains(id))
                .copied()
                .collect();
            per_relay.insert(
                relay.clone(),
                Completeness {
                    has_index: record.relays_with_index.contains_key(relay),
                    missing_manifests,
                    missing_assets,
                    resolvable: record.assets.is_some(),
                },
            );
        }
    }

    tracing::debug!(
        versions = analysis.versions.len(),
        manifests = analysis.manifest_events.len(),
        assets = analysis.asset_events.len(),
        "graph analysis complete"
    );

    analysis
}
