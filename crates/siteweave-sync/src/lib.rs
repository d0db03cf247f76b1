//! Multi-relay reconciliation engine for siteweave content graphs.
//!
//! Relays are independently operated, unreliable, and offer no
//! transactional guarantees: they may silently drop, reorder, or fail to
//! persist writes. This crate repairs a site's four-layer content graph
//! (assets → manifests → site-index → entrypoint) across an arbitrary set
//! of such relays using only content-addressed ids and best-effort queries.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐
//! │   snapshot   │  concurrent per-relay query of all graph events
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │   analyzer   │  entrypoint analysis, version table, completeness
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │    select    │  one complete custodian relay per version
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │     plan     │  per-relay {delete, publish}, orphan policy
//! └──────┬───────┘
//!        ▼  confirmation gate
//! ┌──────────────┐
//! │   executor   │  deletions first, then layer-ordered publications
//! └──────────────┘
//! ```
//!
//! Every stage up to the executor is pure and independently testable; the
//! executor is generic over [`store::RelayEventStore`] so it runs against
//! an in-memory store in tests.

pub mod analyzer;
pub mod config;
pub mod confirm;
pub mod error;
pub mod executor;
pub mod orphan;
pub mod plan;
pub mod relay_url;
pub mod retry;
pub mod select;
pub mod snapshot;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};

pub use analyzer::{Completeness, EntrypointAnalysis, GraphAnalysis, VersionRecord, analyze};
pub use config::SyncConfig;
pub use confirm::{AutoConfirm, ConfirmationGate, TypedPhraseGate};
pub use executor::{ExecutionStats, PlanExecutor, RelayOutcome, RelayRepairState};
pub use orphan::{OrphanReport, detect_orphans};
pub use plan::{PlanSummary, RelayPlan, RelayPlanSummary, SyncPlan, build_plan};
pub use retry::RetryPolicy;
pub use select::select_sources;
pub use snapshot::{RelaySnapshot, fetch_snapshot};
pub use store::{NostrStore, RelayEventStore};
