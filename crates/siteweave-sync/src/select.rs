//! Source selector: one authoritative custodian relay per version.
//!
//! A version may only be copied from a relay holding 100% of its
//! transitive closure. Cross-relay stitching from partial fragments is
//! deliberately not attempted: the simple, auditable policy is to require
//! one full custodian. A version with no complete custodian anywhere is an
//! orphan — a deletion candidate everywhere, never a sync target.

use std::collections::BTreeMap;

use crate::analyzer::GraphAnalysis;

/// Map of version key -> source relay URL.
pub type SourceMap = BTreeMap<String, String>;

/// Pick a source relay for every version that has at least one complete
/// custodian: the lexicographically smallest complete relay URL, so plans
/// are reproducible across runs and processes.
pub fn select_sources(analysis: &GraphAnalysis) -> SourceMap {
    let mut sources = SourceMap::new();
    for (key, record) in &analysis.versions {
        // complete_relays iterates a BTreeMap, so first == smallest URL.
        match analysis.complete_relays(key).first() {
            Some(relay) => {
                sources.insert(key.clone(), relay.to_string());
            }
            None => {
                tracing::warn!(
                    version = %record.label,
                    key = %key,
                    "no relay holds a complete copy; version is orphaned"
                );
            }
        }
    }
    sources
}
