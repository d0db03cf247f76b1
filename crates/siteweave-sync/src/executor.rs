//! Plan executor: applies per-relay deltas over the event store.
//!
//! Each relay's delta runs as an independent unit: connect, request
//! deletions, then publish bottom-up. A relay that cannot be reached has
//! its whole delta counted as failed; a publish rejection fails that one
//! event and execution continues. Deletion always happens before
//! publication on a relay, so a window where both an old and a new
//! entrypoint are live never opens in the opposite order.

use nostr::{EventBuilder, EventId, Keys, Kind, Tag};

use crate::error::{Error, Result};
use crate::plan::{RelayPlan, SyncPlan};
use crate::retry::RetryPolicy;
use crate::store::RelayEventStore;

/// Lifecycle of one relay's delta during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRepairState {
    /// No work scheduled; the relay was not contacted.
    Skipped,
    /// Whole delta applied.
    Done,
    /// Connection never established; nothing was applied.
    ConnectionFailed,
    /// Connected, but some operations were rejected.
    Partial,
}

/// Outcome of one relay's delta.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    /// Relay URL.
    pub relay: String,
    /// Final state of the delta.
    pub state: RelayRepairState,
    /// Deletion requests acknowledged (ids covered by the tombstone).
    pub deleted: usize,
    /// Events accepted.
    pub published: usize,
    /// Operations that failed, with the ids involved.
    pub failed: Vec<EventId>,
}

/// Aggregate statistics over a full plan execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    /// Deletion requests acknowledged across relays.
    pub total_deleted: usize,
    /// Events accepted across relays.
    pub total_published: usize,
    /// Operations that failed across relays.
    pub total_failed: usize,
    /// Relays whose delta applied fully.
    pub relays_repaired: usize,
    /// Relays with an empty delta.
    pub relays_consistent: usize,
    /// Relays that could not be reached or finished partially.
    pub relays_failed: usize,
}

impl ExecutionStats {
    /// True when every scheduled operation was applied.
    pub fn fully_applied(&self) -> bool {
        self.total_failed == 0 && self.relays_failed == 0
    }
}

/// Applies a [`SyncPlan`] through a [`RelayEventStore`].
pub struct PlanExecutor<S> {
    store: S,
    keys: Keys,
    retry: RetryPolicy,
}

impl<S: RelayEventStore> PlanExecutor<S> {
    pub fn new(store: S, keys: Keys, retry: RetryPolicy) -> Self {
        Self { store, keys, retry }
    }

    /// Run every relay delta in the plan. Always returns outcomes for all
    /// relays; per-relay failures are recorded, not propagated.
    pub async fn execute(&self, plan: &SyncPlan) -> (ExecutionStats, Vec<RelayOutcome>) {
        let mut stats = ExecutionStats::default();
        let mut outcomes = Vec::with_capacity(plan.relays.len());

        for (relay, relay_plan) in &plan.relays {
            if relay_plan.is_noop() {
                stats.relays_consistent += 1;
                outcomes.push(RelayOutcome {
                    relay: relay.clone(),
                    state: RelayRepairState::Skipped,
                    deleted: 0,
                    published: 0,
                    failed: Vec::new(),
                });
                continue;
            }
            let outcome = self.apply_relay(relay_plan).await;
            stats.total_deleted += outcome.deleted;
            stats.total_published += outcome.published;
            stats.total_failed += outcome.failed.len();
            match outcome.state {
                RelayRepairState::Done => stats.relays_repaired += 1,
                RelayRepairState::Skipped => stats.relays_consistent += 1,
                _ => stats.relays_failed += 1,
            }
            outcomes.push(outcome);
        }

        metrics::counter!("siteweave_events_published").increment(stats.total_published as u64);
        metrics::counter!("siteweave_events_deleted").increment(stats.total_deleted as u64);
        metrics::counter!("siteweave_operations_failed").increment(stats.total_failed as u64);
        (stats, outcomes)
    }

    async fn apply_relay(&self, plan: &RelayPlan) -> RelayOutcome {
        let relay = plan.relay.as_str();
        let mut outcome = RelayOutcome {
            relay: plan.relay.clone(),
            state: RelayRepairState::Done,
            deleted: 0,
            published: 0,
            failed: Vec::new(),
        };

        tracing::info!(
            relay = %relay,
            deletions = plan.delete_ids.len(),
            publications = plan.publish.len(),
            "applying relay delta"
        );

        if let Err(error) = self
            .retry
            .run("connect", || self.store.connect(relay))
            .await
        {
            tracing::warn!(relay = %relay, %error, "connection failed; delta not applied");
            outcome.state = RelayRepairState::ConnectionFailed;
            outcome.failed.extend(&plan.delete_ids);
            outcome.failed.extend(plan.publish.iter().map(|e| e.id));
            return outcome;
        }

        // Deletions first. One tombstone covers every id on this relay.
        if !plan.delete_ids.is_empty() {
            match self.delete_batch(relay, &plan.delete_ids).await {
                Ok(()) => outcome.deleted = plan.delete_ids.len(),
                Err(error) => {
                    tracing::warn!(relay = %relay, %error, "deletion request rejected");
                    outcome.failed.extend(&plan.delete_ids);
                }
            }
        }

        // Then publications, already bottom-up in the plan.
        for event in &plan.publish {
            let result = self
                .retry
                .run("publish", || self.store.publish(relay, event))
                .await;
            match result {
                Ok(()) => {
                    tracing::debug!(relay = %relay, id = %event.id, kind = %event.kind, "published");
                    outcome.published += 1;
                }
                Err(error) => {
                    tracing::warn!(relay = %relay, id = %event.id, %error, "publish rejected");
                    outcome.failed.push(event.id);
                }
            }
        }

        if !outcome.failed.is_empty() {
            outcome.state = RelayRepairState::Partial;
        }
        outcome
    }

    /// Sign and send a single deletion event covering `ids`.
    async fn delete_batch(
        &self,
        relay: &str,
        ids: &std::collections::BTreeSet<EventId>,
    ) -> Result<()> {
        let tombstone = EventBuilder::new(Kind::EventDeletion, "")
            .tags(ids.iter().map(|id| Tag::event(*id)))
            .sign_with_keys(&self.keys)?;
        self.retry
            .run("delete", || self.store.publish(relay, &tombstone))
            .await
    }
}

/// Formats outcomes as a stable text table for logs and terminals.
pub fn render_outcomes(outcomes: &[RelayOutcome]) -> String {
    let mut lines = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let state = match outcome.state {
            RelayRepairState::Skipped => "consistent",
            RelayRepairState::Done => "repaired",
            RelayRepairState::ConnectionFailed => "unreachable",
            RelayRepairState::Partial => "partial",
        };
        lines.push(format!(
            "{:<12} {} (deleted {}, published {}, failed {})",
            state,
            outcome.relay,
            outcome.deleted,
            outcome.published,
            outcome.failed.len()
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RelayPlan;
    use crate::testutil;
    use async_trait::async_trait;
    use nostr::{Event, Filter};
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records operations in order; fails relays and events on request.
    #[derive(Default)]
    struct MemoryStore {
        log: Mutex<Vec<String>>,
        unreachable: BTreeSet<String>,
        reject_ids: BTreeSet<EventId>,
    }

    impl MemoryStore {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RelayEventStore for MemoryStore {
        async fn connect(&self, relay: &str) -> Result<()> {
            if self.unreachable.contains(relay) {
                return Err(Error::RelayUnreachable {
                    relay: relay.to_string(),
                    reason: "refused".to_string(),
                });
            }
            self.log.lock().unwrap().push(format!("connect {relay}"));
            Ok(())
        }

        async fn query(&self, _relay: &str, _filter: Filter) -> Result<Vec<Event>> {
            Ok(Vec::new())
        }

        async fn publish(&self, relay: &str, event: &Event) -> Result<()> {
            if self.reject_ids.contains(&event.id) {
                return Err(Error::Rejected {
                    relay: relay.to_string(),
                    id: event.id.to_hex(),
                    reason: "blocked".to_string(),
                });
            }
            let op = if event.kind == Kind::EventDeletion {
                format!("delete {relay} ({} ids)", event.tags.len())
            } else {
                format!("publish {relay} {}", event.id)
            };
            self.log.lock().unwrap().push(op);
            Ok(())
        }

        async fn disconnect(&self) {}
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        }
    }

    fn plan_with(relay: &str, delete: Vec<EventId>, publish: Vec<Event>) -> SyncPlan {
        let mut plan = SyncPlan::default();
        plan.relays.insert(
            relay.to_string(),
            RelayPlan {
                relay: relay.to_string(),
                delete_ids: delete.into_iter().collect(),
                publish,
            },
        );
        plan
    }

    #[tokio::test]
    async fn deletions_run_before_publications() {
        let keys = Keys::generate();
        let v = testutil::version(&keys, "1.0.0", 1, 100);
        let stale = testutil::entrypoint(&keys, &v.index, 50);
        let plan = plan_with("wss://a.example", vec![stale.id], v.all());

        let store = MemoryStore::default();
        let executor = PlanExecutor::new(store, keys, fast_retry());
        let (stats, outcomes) = executor.execute(&plan).await;

        assert!(stats.fully_applied());
        assert_eq!(stats.total_deleted, 1);
        assert_eq!(stats.total_published, 3);
        assert_eq!(outcomes[0].state, RelayRepairState::Done);

        let log = executor.store.log();
        assert_eq!(log[0], "connect wss://a.example");
        assert!(log[1].starts_with("delete "), "deletion must precede publication: {log:?}");
        assert!(log[2..].iter().all(|op| op.starts_with("publish ")));
    }

    #[tokio::test]
    async fn noop_relays_are_not_contacted() {
        let keys = Keys::generate();
        let mut plan = SyncPlan::default();
        plan.relays.insert(
            "wss://a.example".to_string(),
            RelayPlan {
                relay: "wss://a.example".to_string(),
                ..Default::default()
            },
        );

        let store = MemoryStore::default();
        let executor = PlanExecutor::new(store, keys, fast_retry());
        let (stats, outcomes) = executor.execute(&plan).await;

        assert_eq!(stats.relays_consistent, 1);
        assert_eq!(outcomes[0].state, RelayRepairState::Skipped);
        assert!(executor.store.log().is_empty());
    }

    #[tokio::test]
    async fn unreachable_relay_fails_whole_delta() {
        let keys = Keys::generate();
        let v = testutil::version(&keys, "1.0.0", 2, 100);
        let plan = plan_with("wss://down.example", vec![], v.all());

        let store = MemoryStore {
            unreachable: ["wss://down.example".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let executor = PlanExecutor::new(store, keys, fast_retry());
        let (stats, outcomes) = executor.execute(&plan).await;

        assert_eq!(stats.relays_failed, 1);
        assert_eq!(stats.total_failed, 4);
        assert_eq!(outcomes[0].state, RelayRepairState::ConnectionFailed);
        assert_eq!(stats.total_published, 0);
    }

    #[tokio::test]
    async fn rejected_event_fails_alone() {
        let keys = Keys::generate();
        let v = testutil::version(&keys, "1.0.0", 2, 100);
        let rejected = v.assets[0].id;
        let plan = plan_with("wss://a.example", vec![], v.all());

        let store = MemoryStore {
            reject_ids: [rejected].into_iter().collect(),
            ..Default::default()
        };
        let executor = PlanExecutor::new(store, keys, fast_retry());
        let (stats, outcomes) = executor.execute(&plan).await;

        assert_eq!(stats.total_published, 3);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(outcomes[0].state, RelayRepairState::Partial);
        assert_eq!(outcomes[0].failed, vec![rejected]);
    }
}
