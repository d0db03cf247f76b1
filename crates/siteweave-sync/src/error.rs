//! Error types for the reconciliation engine.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during reconciliation.
///
/// Network and per-event errors are caught and aggregated into execution
/// stats; only configuration and input-validation errors abort a run
/// before any relay is touched.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (missing key, empty relay list, bad URL).
    /// Always fatal before any network activity.
    #[error("configuration error: {0}")]
    Config(String),

    /// Nostr key parsing error.
    #[error("key error: {0}")]
    Key(#[from] nostr::key::Error),

    /// Event signing/building error.
    #[error("signer error: {0}")]
    Signer(#[from] nostr::event::builder::Error),

    /// Nostr SDK client error.
    #[error("relay client error: {0}")]
    Client(#[from] nostr_sdk::client::Error),

    /// A relay could not be reached within the connect timeout.
    #[error("relay {relay} unreachable: {reason}")]
    RelayUnreachable {
        /// The relay URL.
        relay: String,
        /// Description of the failure.
        reason: String,
    },

    /// A relay accepted the connection but rejected a specific event.
    #[error("relay {relay} rejected event {id}: {reason}")]
    Rejected {
        /// The relay URL.
        relay: String,
        /// The rejected event id (hex).
        id: String,
        /// The relay's reason, if it gave one.
        reason: String,
    },
}
