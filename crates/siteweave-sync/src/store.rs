//! Relay event store adapter.
//!
//! The engine only needs two verbs against a relay — query and publish —
//! plus a connect/close lifecycle around them. [`RelayEventStore`] is that
//! seam; [`NostrStore`] is the production implementation over a single
//! `nostr_sdk::Client`, targeting one relay per call so results and
//! failures are attributable.
//!
//! Every operation is bounded: a relay that sends nothing still answers
//! within the timeout (with an empty list or an error), and whatever
//! arrived before a timeout is that relay's final answer for the run.

use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::prelude::*;

use crate::error::{Error, Result};

/// Abstract store of events on a single relay.
///
/// Deletion is not a separate verb: a NIP-09 tombstone is published like
/// any other event.
#[async_trait]
pub trait RelayEventStore: Send + Sync {
    /// Ensure a connection to `relay` is established.
    async fn connect(&self, relay: &str) -> Result<()>;

    /// Fetch all events matching `filter` from `relay`.
    async fn query(&self, relay: &str, filter: Filter) -> Result<Vec<Event>>;

    /// Publish one event to `relay`.
    async fn publish(&self, relay: &str, event: &Event) -> Result<()>;

    /// Close all connections.
    async fn disconnect(&self);
}

/// Production store over a `nostr_sdk::Client`.
pub struct NostrStore {
    client: Client,
    query_timeout: Duration,
    connect_timeout: Duration,
}

impl NostrStore {
    /// Create a store signing NIP-42 auth challenges with `keys`.
    pub fn new(keys: Keys, query_timeout: Duration, connect_timeout: Duration) -> Self {
        let client = Client::builder().signer(keys).build();
        client.automatic_authentication(true);
        Self {
            client,
            query_timeout,
            connect_timeout,
        }
    }
}

#[async_trait]
impl RelayEventStore for NostrStore {
    async fn connect(&self, relay: &str) -> Result<()> {
        self.client.add_relay(relay).await?;
        self.client.connect_relay(relay).await?;

        // connect_relay returns before the socket is actually up; poll the
        // real status until connected or the deadline passes.
        let deadline = tokio::time::Instant::now() + self.connect_timeout;
        loop {
            let status = self.client.relay(relay).await?.status();
            if status == RelayStatus::Connected {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::RelayUnreachable {
                    relay: relay.to_string(),
                    reason: format!("not connected after {:?} (status: {status:?})", self.connect_timeout),
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn query(&self, relay: &str, filter: Filter) -> Result<Vec<Event>> {
        let events = self
            .client
            .fetch_events_from([relay], filter, self.query_timeout)
            .await?;
        Ok(events.into_iter().collect())
    }

    async fn publish(&self, relay: &str, event: &Event) -> Result<()> {
        let output = self.client.send_event_to([relay], event).await?;
        if output.success.is_empty() {
            let reason = output
                .failed
                .values()
                .next()
                .cloned()
                .unwrap_or_else(|| "no acknowledgement".to_string());
            return Err(Error::Rejected {
                relay: relay.to_string(),
                id: event.id.to_hex(),
                reason,
            });
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.client.disconnect().await;
    }
}
