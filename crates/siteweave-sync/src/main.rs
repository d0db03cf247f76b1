//! Siteweave multi-relay reconciliation tool.
//!
//! Queries every configured relay for the site's content graph, diagnoses
//! divergence (missing pieces, orphaned versions, stale entrypoints),
//! builds a per-relay repair plan, and applies it after confirmation.
//!
//! # Usage
//!
//! ```bash
//! export SITEWEAVE_SECRET_KEY=<hex or nsec>
//! export SITEWEAVE_RELAYS=wss://a.example,wss://b.example
//!
//! # Show the repair plan without touching anything
//! siteweave-sync --dry-run
//!
//! # Apply it (prompts for a typed confirmation phrase)
//! siteweave-sync
//!
//! # Machine-readable plan summary
//! siteweave-sync --dry-run --json
//! ```
//!
//! Exit code is non-zero when the run aborts or any scheduled operation
//! fails, so the tool composes with deploy scripts.

use anyhow::{Context, Result};
use clap::Parser;
use siteweave_sync::confirm::{ConfirmationGate, TypedPhraseGate};
use siteweave_sync::executor::render_outcomes;
use siteweave_sync::store::RelayEventStore;
use siteweave_sync::{
    NostrStore, PlanExecutor, RetryPolicy, SyncConfig, analyze, build_plan, fetch_snapshot,
    select_sources,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Confirmation phrase for applying a repair plan.
const CONFIRM_PHRASE: &str = "repair relays";

/// Siteweave multi-relay reconciliation tool.
#[derive(Parser, Debug)]
#[command(name = "siteweave-sync")]
#[command(about = "Reconcile a site's content graph across Nostr relays")]
#[command(version)]
struct Args {
    /// Relay URLs (comma-separated, overrides SITEWEAVE_RELAYS)
    #[arg(long, value_delimiter = ',')]
    relays: Option<Vec<String>>,

    /// Show the plan without applying anything
    #[arg(long)]
    dry_run: bool,

    /// Print the plan summary as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Per-relay query timeout in seconds
    #[arg(long)]
    query_timeout: Option<u64>,

    /// Per-relay connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Attempts per network operation
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required when both ring and aws-lc-rs are present)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
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
    if let Some(secs) = args.query_timeout {
        config.query_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.connect_timeout {
        config.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(attempts) = args.max_attempts {
        config.max_attempts = attempts;
    }
    config.validate().context("validating configuration")?;

    tracing::info!("Configuration:");
    tracing::info!("  Site: {}", config.keys.public_key().to_hex());
    for relay in &config.relays {
        tracing::info!("  Relay: {}", relay);
    }

    let store = NostrStore::new(
        config.keys.clone(),
        config.query_timeout,
        config.connect_timeout,
    );

    // Snapshot and diagnose.
    tracing::info!("Querying {} relays...", config.relays.len());
    let snapshot = fetch_snapshot(&store, &config.relays, config.keys.public_key()).await;
    for relay in &snapshot.unreachable {
        tracing::warn!("  Unreachable this run: {}", relay);
    }
    tracing::info!(
        "Snapshot: {} events across {} relays",
        snapshot.total_events(),
        snapshot.events.len()
    );

    let analysis = analyze(&snapshot);
    let sources = select_sources(&analysis);
    let plan = build_plan(&analysis, &sources);
    let summary = plan.summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!("Repair plan");
        println!("-----------");
        for relay in &summary.relays {
            if relay.already_consistent {
                println!("  {} : consistent", relay.relay);
            } else {
                println!(
                    "  {} : delete {}, publish {}",
                    relay.relay, relay.deletions, relay.publications
                );
            }
        }
        for key in &summary.undeliverable {
            println!("  ! intended-current version {key} is complete nowhere; left untouched");
        }
        println!(
            "  total: {} deletions, {} publications, {} relays already consistent",
            summary.total_deletions, summary.total_publications, summary.relays_consistent
        );
        println!();
    }

    if args.dry_run {
        println!("Dry run - no changes made.");
        store.disconnect().await;
        return Ok(());
    }

    if plan.is_empty() {
        tracing::info!("All relays consistent; nothing to do");
        store.disconnect().await;
        return Ok(());
    }

    // Execution always stands behind the interactive gate; the only way
    // to skip it is --dry-run, which never executes.
    let confirmed = TypedPhraseGate::new(CONFIRM_PHRASE).confirm(&summary);
    if !confirmed {
        println!("Aborted - no changes made.");
        store.disconnect().await;
        std::process::exit(2);
    }

    // Apply.
    let retry = RetryPolicy {
        max_attempts: config.max_attempts,
        base_delay: config.retry_base_delay,
    };
    let executor = PlanExecutor::new(store, config.keys.clone(), retry);
    let (stats, outcomes) = executor.execute(&plan).await;

    println!();
    println!("{}", render_outcomes(&outcomes));
    println!();
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("RUN COMPLETE");
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("Events published:     {}", stats.total_published);
    tracing::info!("Deletions requested:  {}", stats.total_deleted);
    tracing::info!("Operations failed:    {}", stats.total_failed);
    tracing::info!("Relays repaired:      {}", stats.relays_repaired);
    tracing::info!("Relays consistent:    {}", stats.relays_consistent);
    tracing::info!("Relays failed:        {}", stats.relays_failed);

    if !stats.fully_applied() {
        std::process::exit(1);
    }
    Ok(())
}
