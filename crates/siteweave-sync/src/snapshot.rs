//! Initial per-relay event snapshot.
//!
//! Queries every configured relay for the author's content graph events.
//! The queries are read-only and independent, so they fan out concurrently;
//! each is bounded by the store's query timeout. An unreachable relay
//! contributes an empty set and is flagged — for this run it simply holds
//! zero events, and every version will show as missing on it.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use nostr_sdk::prelude::*;
use siteweave_core::{
    KIND_SITE_ASSET, KIND_SITE_ENTRYPOINT, KIND_SITE_INDEX, KIND_SITE_MANIFEST,
};

use crate::store::RelayEventStore;

/// Per-relay event sets from the initial query.
///
/// Each list is deduplicated within that relay's response only; cross-relay
/// reasoning is the analyzer's job.
#[derive(Debug, Clone, Default)]
pub struct RelaySnapshot {
    /// Events per relay URL. Unreachable relays map to an empty list.
    pub events: BTreeMap<String, Vec<Event>>,
    /// Relays that could not be reached or queried this run.
    pub unreachable: BTreeSet<String>,
}

impl RelaySnapshot {
    /// Filter matching every content graph kind authored by `author`.
    pub fn graph_filter(author: PublicKey) -> Filter {
        Filter::new().author(author).kinds([
            Kind::from(KIND_SITE_ASSET),
            Kind::from(KIND_SITE_MANIFEST),
            Kind::from(KIND_SITE_INDEX),
            Kind::from(KIND_SITE_ENTRYPOINT),
        ])
    }

    /// Total events across all relays (duplicates across relays counted).
    pub fn total_events(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }
}

/// Query all relays concurrently for the author's graph events.
///
/// Events from foreign authors or non-graph kinds are discarded at this
/// boundary, so everything downstream operates on validated data.
pub async fn fetch_snapshot<S: RelayEventStore>(
    store: &S,
    relays: &[String],
    author: PublicKey,
) -> RelaySnapshot {
    let filter = RelaySnapshot::graph_filter(author);

    let queries = relays.iter().map(|relay| {
        let filter = filter.clone();
        async move {
            let result = async {
                store.connect(relay).await?;
                store.query(relay, filter).await
            }
            .await;
            (relay.clone(), result)
        }
    });

    let results = futures::future::join_all(queries).await;

    let mut snapshot = RelaySnapshot::default();
    for (relay, result) in results {
        match result {
            Ok(events) => {
                let mut seen: HashSet<EventId> = HashSet::with_capacity(events.len());
                let events: Vec<Event> = events
                    .into_iter()
                    .filter(|e| {
                        e.pubkey == author
                            && siteweave_core::GraphLayer::of_event(e).is_some()
                            && seen.insert(e.id)
                    })
                    .collect();
                tracing::debug!("Relay {} returned {} graph events", relay, events.len());
                snapshot.events.insert(relay, events);
            }
            Err(e) => {
                tracing::warn!(
                    "Relay {} unreachable, treating as empty for this run: {}",
                    relay,
                    e
                );
                snapshot.unreachable.insert(relay.clone());
                snapshot.events.insert(relay, Vec::new());
            }
        }
    }

    tracing::info!(
        relays = snapshot.events.len(),
        unreachable = snapshot.unreachable.len(),
        events = snapshot.total_events(),
        "snapshot complete"
    );

    snapshot
}
