//! Relay orphan cleanup utility.
//!
//! Scans each configured relay for events of ours that nothing references
//! anymore and requests their deletion:
//!
//! 1. Entrypoints superseded by a newer one
//! 2. Manifests no present site index references
//! 3. Assets no live manifest references
//!
//! Each relay is judged in isolation; a manifest another relay still needs
//! is an orphan here if this relay's indexes do not reference it.
//!
//! # Usage
//!
//! ```bash
//! export SITEWEAVE_SECRET_KEY=<hex or nsec>
//! export SITEWEAVE_RELAYS=wss://a.example,wss://b.example
//!
//! # Dry run (show what would be deleted, don't modify)
//! orphan-cleanup --dry-run
//!
//! # Actually request deletions (prompts for a typed phrase)
//! orphan-cleanup
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use siteweave_core::GraphLayer;
use siteweave_sync::confirm::{ConfirmationGate, TypedPhraseGate};
use siteweave_sync::executor::render_outcomes;
use siteweave_sync::plan::{RelayPlan, SyncPlan};
use siteweave_sync::store::RelayEventStore;
use siteweave_sync::{
    NostrStore, OrphanReport, PlanExecutor, RetryPolicy, SyncConfig, detect_orphans,
};
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

/// Confirmation phrase for orphan deletion.
const CONFIRM_PHRASE: &str = "delete orphans";

/// Relay orphan cleanup utility.
#[derive(Parser, Debug)]
#[command(name = "orphan-cleanup")]
#[command(about = "Delete unreferenced site events from each relay")]
#[command(version)]
struct Args {
    /// Relay URLs (comma-separated, overrides SITEWEAVE_RELAYS)
    #[arg(long, value_delimiter = ',')]
    relays: Option<Vec<String>>,

    /// Dry run - show what would be deleted without making changes
    #[arg(long)]
    dry_run: bool,

    /// Verbose output - list every orphaned event
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap())
                .add_directive("siteweave_sync=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let mut config = SyncConfig::from_env().context("loading configuration")?;
    if let Some(relays) = &args.relays {
        config = config.with_relays(relays);
    }
    config.validate().context("validating configuration")?;

    println!("Relay Orphan Cleanup");
    println!("====================");
    println!("Site:    {}", config.keys.public_key().to_hex());
    println!("Relays:  {}", config.relays.len());
    println!("Dry run: {}", args.dry_run);
    println!();

    let store = NostrStore::new(
        config.keys.clone(),
        config.query_timeout,
        config.connect_timeout,
    );

    // Per-relay scan; each relay is judged against its own contents only.
    println!("Scanning relays...");
    let snapshot = siteweave_sync::fetch_snapshot(&store, &config.relays, config.keys.public_key()).await;
    for relay in &snapshot.unreachable {
        println!("  Unreachable (skipped): {relay}");
    }

    let reports: BTreeMap<&String, OrphanReport> = snapshot
        .events
        .iter()
        .filter(|(relay, _)| !snapshot.unreachable.contains(*relay))
        .map(|(relay, events)| (relay, detect_orphans(events)))
        .collect();

    let total_orphans: usize = reports.values().map(OrphanReport::total).sum();

    println!();
    println!("Summary");
    println!("-------");
    for (relay, report) in &reports {
        println!(
            "  {} : {} stale entrypoints, {} orphaned manifests, {} orphaned assets (live versions: {})",
            relay,
            report.stale_entrypoints.len(),
            report.orphaned_manifests.len(),
            report.orphaned_assets.len(),
            if report.live_versions.is_empty() {
                "none".to_string()
            } else {
                report.live_versions.join(", ")
            }
        );
        if args.verbose {
            for event in report
                .stale_entrypoints
                .iter()
                .chain(&report.orphaned_manifests)
                .chain(&report.orphaned_assets)
            {
                let layer = GraphLayer::of_event(event)
                    .map(|l| format!("{l:?}"))
                    .unwrap_or_else(|| "unknown".to_string());
                println!("    - {} ({layer}, created {})", event.id, event.created_at);
            }
        }
    }
    println!("  total: {total_orphans} orphaned events");
    println!();

    if total_orphans == 0 {
        println!("Nothing to clean up.");
        store.disconnect().await;
        return Ok(());
    }

    if args.dry_run {
        println!("Dry run - no changes made.");
        store.disconnect().await;
        return Ok(());
    }

    // Deletion-only plan, one relay delta per scanned relay.
    let mut plan = SyncPlan::default();
    for (relay, report) in &reports {
        if report.is_empty() {
            continue;
        }
        plan.relays.insert(
            (*relay).clone(),
            RelayPlan {
                relay: (*relay).clone(),
                delete_ids: report.orphan_ids(),
                publish: Vec::new(),
            },
        );
    }
    let summary = plan.summary();

    // Deletions only ever run behind the interactive gate; --dry-run is
    // the one way to skip it, and it never executes.
    let confirmed = TypedPhraseGate::new(CONFIRM_PHRASE).confirm(&summary);
    if !confirmed {
        println!("Aborted - no changes made.");
        store.disconnect().await;
        std::process::exit(2);
    }

    let retry = RetryPolicy {
        max_attempts: config.max_attempts,
        base_delay: config.retry_base_delay,
    };
    let executor = PlanExecutor::new(store, config.keys.clone(), retry);
    let (stats, outcomes) = executor.execute(&plan).await;

    println!();
    println!("{}", render_outcomes(&outcomes));
    println!();
    println!("Done: {} deletions requested, {} failed", stats.total_deleted, stats.total_failed);

    if !stats.fully_applied() {
        std::process::exit(1);
    }
    Ok(())
}
