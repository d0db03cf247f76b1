//! Plan builder: per-relay deletion + publication plans.
//!
//! Combines the analyzer output and source selection into a repair plan
//! for every relay. Policy:
//!
//! - Orphaned versions (no complete custodian) are deleted wherever they
//!   partially or fully exist, and never published anywhere. Manifests and
//!   assets are only deleted when no sourced version also requires them.
//! - Sourced versions are diffed per relay: only the missing pieces are
//!   published, never items already present.
//! - Entrypoint repair converges every relay on the exact globally-newest
//!   signed entrypoint event (same id everywhere), deleting stale copies.
//! - The version targeted by the intended-current entrypoint is exempt
//!   from orphan deletion: deleting the operator's current site to satisfy
//!   the orphan rule would be destructive. It is reported undeliverable.
//!
//! The builder is pure and deterministic: identical analyzer input yields
//! an identical plan, with publish lists sorted by `(layer, id)`.

use std::collections::{BTreeMap, BTreeSet};

use nostr::{Event, EventId};
use serde::Serialize;
use siteweave_core::GraphLayer;

use crate::analyzer::{GraphAnalysis, VersionRecord};
use crate::select::SourceMap;

/// Repair plan for one relay.
#[derive(Debug, Clone, Default)]
pub struct RelayPlan {
    /// Relay URL.
    pub relay: String,
    /// Event ids to request deletion for (one tombstone covers all).
    pub delete_ids: BTreeSet<EventId>,
    /// Events to publish, sorted bottom-up by `(layer, id)`.
    pub publish: Vec<Event>,
}

impl RelayPlan {
    /// A relay with nothing to delete and nothing to publish is already
    /// consistent and must not be touched during execution.
    pub fn is_noop(&self) -> bool {
        self.delete_ids.is_empty() && self.publish.is_empty()
    }
}

/// The full multi-relay repair plan.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Per-relay plans, keyed by relay URL.
    pub relays: BTreeMap<String, RelayPlan>,
    /// Version keys that are intended-current but complete nowhere.
    /// Left untouched; reported to the operator.
    pub undeliverable: Vec<String>,
}

impl SyncPlan {
    /// True when every relay is already consistent.
    pub fn is_empty(&self) -> bool {
        self.relays.values().all(RelayPlan::is_noop)
    }

    /// Structured, presentation-neutral summary.
    pub fn summary(&self) -> PlanSummary {
        let relays: Vec<RelayPlanSummary> = self
            .relays
            .values()
            .map(|plan| RelayPlanSummary {
                relay: plan.relay.clone(),
                deletions: plan.delete_ids.len(),
                publications: plan.publish.len(),
                already_consistent: plan.is_noop(),
            })
            .collect();
        PlanSummary {
            total_deletions: relays.iter().map(|r| r.deletions).sum(),
            total_publications: relays.iter().map(|r| r.publications).sum(),
            relays_consistent: relays.iter().filter(|r| r.already_consistent).count(),
            undeliverable: self.undeliverable.clone(),
            relays,
        }
    }
}

/// Per-relay summary line, suitable for any presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct RelayPlanSummary {
    /// Relay URL.
    pub relay: String,
    /// Number of event ids scheduled for deletion.
    pub deletions: usize,
    /// Number of events scheduled for publication.
    pub publications: usize,
    /// Nothing to do on this relay.
    pub already_consistent: bool,
}

/// Global plan summary.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    /// One entry per relay.
    pub relays: Vec<RelayPlanSummary>,
    /// Total deletions across relays.
    pub total_deletions: usize,
    /// Total publications across relays.
    pub total_publications: usize,
    /// Number of relays already consistent.
    pub relays_consistent: usize,
    /// Version keys intended-current but complete nowhere.
    pub undeliverable: Vec<String>,
}

/// Build the per-relay repair plan from analysis + source selection.
pub fn build_plan(analysis: &GraphAnalysis, sources: &SourceMap) -> SyncPlan {
    let mut plan = SyncPlan::default();
    // Publish accumulation keyed by id for cross-version dedupe.
    let mut publish: BTreeMap<String, BTreeMap<EventId, Event>> = BTreeMap::new();
    for relay in analysis.relay_ids.keys() {
        plan.relays.insert(
            relay.clone(),
            RelayPlan {
                relay: relay.clone(),
                ..Default::default()
            },
        );
        publish.insert(relay.clone(), BTreeMap::new());
    }

    // The intended-current version is protected from orphan deletion.
    let protected_key = match &analysis.entrypoint.target_key {
        Some(key) if !sources.contains_key(key) => {
            tracing::warn!(
                key = %key,
                "intended-current version is complete on no relay; leaving it untouched"
            );
            plan.undeliverable.push(key.clone());
            Some(key.clone())
        }
        _ => None,
    };

    // Ids required by any sourced or protected version; never deleted.
    let mut live_manifests: BTreeSet<EventId> = BTreeSet::new();
    let mut live_assets: BTreeSet<EventId> = BTreeSet::new();
    for (key, record) in &analysis.versions {
        if sources.contains_key(key) || Some(key) == protected_key.as_ref() {
            live_manifests.extend(&record.manifests);
            live_assets.extend(known_assets(analysis, record));
        }
    }

    for (key, record) in &analysis.versions {
        match sources.get(key) {
            Some(_) => {
                // Sourced: publish exactly what each relay is missing.
                for (relay, completeness) in &analysis.completeness[key] {
                    if completeness.is_complete() {
                        continue;
                    }
                    let target = publish.get_mut(relay).expect("relay plan exists");
                    if !completeness.has_index {
                        target.insert(record.index_event.id, record.index_event.clone());
                    }
                    for id in &completeness.missing_manifests {
                        if let Some(event) = analysis.manifest_events.get(id) {
                            target.insert(*id, event.clone());
                        }
                    }
                    for id in &completeness.missing_assets {
                        if let Some(event) = analysis.asset_events.get(id) {
                            target.insert(*id, event.clone());
                        }
                    }
                }
            }
            None => {
                if Some(key) == protected_key.as_ref() {
                    continue;
                }
                schedule_orphan_deletion(analysis, record, &live_manifests, &live_assets, &mut plan);
            }
        }
    }

    schedule_entrypoint_repair(analysis, sources, &protected_key, &mut plan, &mut publish);

    // Materialize publish lists in (layer, id) order: a manifest is never
    // sent before its assets, the entrypoint always last.
    for (relay, events) in publish {
        let relay_plan = plan.relays.get_mut(&relay).expect("relay plan exists");
        let mut events: Vec<Event> = events.into_values().collect();
        events.sort_by_key(|e| {
            (
                GraphLayer::of_event(e).unwrap_or(GraphLayer::Entrypoint),
                e.id,
            )
        });
        relay_plan.publish = events;
    }

    plan
}

/// Delete an orphaned version wherever any part of it exists, sparing
/// manifests and assets that a live version also requires.
fn schedule_orphan_deletion(
    analysis: &GraphAnalysis,
    record: &VersionRecord,
    live_manifests: &BTreeSet<EventId>,
    live_assets: &BTreeSet<EventId>,
    plan: &mut SyncPlan,
) {
    let owned_manifests: BTreeSet<EventId> = record
        .manifests
        .difference(live_manifests)
        .copied()
        .collect();
    let owned_assets: BTreeSet<EventId> = known_assets(analysis, record)
        .difference(live_assets)
        .copied()
        .collect();

    for (relay, held) in &analysis.relay_ids {
        let relay_plan = plan.relays.get_mut(relay).expect("relay plan exists");
        if let Some(index_id) = record.relays_with_index.get(relay) {
            relay_plan.delete_ids.insert(*index_id);
        }
        for id in owned_manifests.iter().chain(&owned_assets) {
            if held.contains(id) {
                relay_plan.delete_ids.insert(*id);
            }
        }
    }

    // Name the relays holding fragments so the operator can see where the
    // incomplete copies live before confirming.
    let holding: Vec<&str> = analysis.completeness[&record.key]
        .iter()
        .filter(|(_, completeness)| completeness.holds_any(record))
        .map(|(relay, _)| relay.as_str())
        .collect();
    tracing::info!(
        version = %record.label,
        key = %record.key,
        relays = ?holding,
        "orphaned version scheduled for deletion"
    );
}

/// Converge every relay on the exact globally-newest entrypoint event.
fn schedule_entrypoint_repair(
    analysis: &GraphAnalysis,
    sources: &SourceMap,
    protected_key: &Option<String>,
    plan: &mut SyncPlan,
    publish: &mut BTreeMap<String, BTreeMap<EventId, Event>>,
) {
    let Some(current) = &analysis.entrypoint.current else {
        return;
    };
    let Some(target_key) = &analysis.entrypoint.target_key else {
        tracing::warn!("current entrypoint has no parseable target; skipping entrypoint repair");
        return;
    };
    // Only publish a pointer whose target is complete on at least one
    // relay. A protected (undeliverable) target also blocks repair.
    if protected_key.as_ref() == Some(target_key) || !sources.contains_key(target_key) {
        return;
    }

    for relay in analysis.relay_ids.keys() {
        let relay_plan = plan.relays.get_mut(relay).expect("relay plan exists");
        for stale in analysis.entrypoint.stale_ids_on(relay) {
            relay_plan.delete_ids.insert(stale);
        }
        if !analysis.entrypoint.relay_has_current(relay) {
            // The same signed payload everywhere: identical id on every
            // relay, so the pointer converges rather than forking.
            publish
                .get_mut(relay)
                .expect("relay plan exists")
                .insert(current.id, current.clone());
        }
    }
}

/// A version's transitive asset closure over globally-known manifests.
fn known_assets(analysis: &GraphAnalysis, record: &VersionRecord) -> BTreeSet<EventId> {
    match &record.assets {
        Some(assets) => assets.clone(),
        None => record
            .manifests
            .iter()
            .filter_map(|id| analysis.manifest_events.get(id))
            .flat_map(siteweave_core::referenced_assets)
            .collect(),
    }
}
