//! Reconciliation configuration loaded from environment variables.
//!
//! Everything the engine needs (identity key, relay list, timeout and
//! retry knobs) is gathered here once at process start and threaded through
//! function parameters; nothing downstream reads ambient process state.

use std::time::Duration;

use nostr::Keys;

use crate::error::{Error, Result};
use crate::relay_url::normalize_relay_list;

/// Engine configuration.
///
/// The private key never leaves this struct except to sign tombstones; it
/// is deliberately excluded from the `Debug` output.
#[derive(Clone)]
pub struct SyncConfig {
    /// Signing identity. The public key is the site's namespace.
    pub keys: Keys,

    /// Normalized, de-duplicated, sorted relay URLs.
    pub relays: Vec<String>,

    /// Bound on each per-relay snapshot query.
    pub query_timeout: Duration,

    /// Bound on establishing a connection to one relay.
    pub connect_timeout: Duration,

    /// Maximum attempts per publish/connect operation.
    pub max_attempts: u32,

    /// Base delay for exponential backoff between attempts.
    pub retry_base_delay: Duration,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("pubkey", &self.keys.public_key().to_hex())
            .field("relays", &self.relays)
            .field("query_timeout", &self.query_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `SITEWEAVE_SECRET_KEY`: signing key (hex or nsec)
    ///
    /// Optional:
    /// - `SITEWEAVE_RELAYS`: comma-separated relay URLs
    /// - `SITEWEAVE_QUERY_TIMEOUT_SECS`: per-relay query bound (default: 15)
    /// - `SITEWEAVE_CONNECT_TIMEOUT_SECS`: per-relay connect bound (default: 10)
    /// - `SITEWEAVE_MAX_ATTEMPTS`: attempts per network operation (default: 3)
    ///
    /// The relay list may still be empty after loading; [`Self::validate`]
    /// rejects that, after any CLI override has been applied.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("SITEWEAVE_SECRET_KEY")
            .map_err(|_| Error::Config("SITEWEAVE_SECRET_KEY is not set".to_string()))?;
        let keys = Keys::parse(secret.trim())?;

        let relays: Vec<String> = std::env::var("SITEWEAVE_RELAYS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let relays = normalize_relay_list(&relays);

        let query_timeout = Duration::from_secs(env_u64("SITEWEAVE_QUERY_TIMEOUT_SECS", 15)?);
        let connect_timeout = Duration::from_secs(env_u64("SITEWEAVE_CONNECT_TIMEOUT_SECS", 10)?);
        let max_attempts = env_u64("SITEWEAVE_MAX_ATTEMPTS", 3)? as u32;

        let config = Self {
            keys,
            relays,
            query_timeout,
            connect_timeout,
            max_attempts,
            retry_base_delay: Duration::from_millis(500),
        };

        tracing::info!(
            pubkey = %config.keys.public_key().to_hex(),
            relays = config.relays.len(),
            query_timeout_secs = config.query_timeout.as_secs(),
            max_attempts = config.max_attempts,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Replace the relay list (CLI override), re-normalizing.
    pub fn with_relays(mut self, relays: &[String]) -> Self {
        self.relays = normalize_relay_list(relays);
        self
    }

    /// Validate that the configuration can drive a meaningful run.
    ///
    /// An empty relay list is fatal here rather than downstream, where it
    /// could be misread as "everything orphaned".
    pub fn validate(&self) -> Result<()> {
        if self.relays.is_empty() {
            return Err(Error::Config(
                "no relays configured (set SITEWEAVE_RELAYS or pass --relays)".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} is not a number: {v:?}"))),
        Err(_) => Ok(default),
    }
}
