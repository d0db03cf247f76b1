//! Core types and the pure content graph model for siteweave.
//!
//! siteweave publishes a static website as a four-layer graph of signed
//! Nostr events. This crate defines the wire protocol constants and the
//! pure extraction functions every higher layer (analyzer, plan builder,
//! orphan detector) reuses. Nothing here performs I/O.
//!
//! # The content graph
//!
//! ```text
//! entrypoint (11064, replaceable)     "current site" pointer, one per author
//!     │ a-tag: 31064:<pubkey>:<key>
//!     ▼
//! site-index (31064, addressable)     route table for one version
//!     │ routes map: route -> manifest event id
//!     ▼
//! manifest (1066, regular)            per-route bundle of asset refs
//!     │ e-tags: asset event ids
//!     ▼
//! asset (1064, regular)               leaf file content, content-hashed
//! ```
//!
//! Assets and manifests are immutable and content-addressed: any edit
//! produces a new event id, so stale references are detected rather than
//! papered over. Site-indexes accumulate (one addressable key per version);
//! the entrypoint is replaceable and only its newest instance is live.

mod error;
pub mod graph;

// ═══════════════════════════════════════════════════════════════════════════
// Protocol constants
// ═══════════════════════════════════════════════════════════════════════════

/// Asset event kind: immutable leaf file content, identified by the
/// SHA-256 of its bytes in the `x` tag.
pub const KIND_SITE_ASSET: u16 = 1064;

/// Manifest event kind: per-route bundle referencing asset event ids via
/// `e` tags. Content is the route path.
pub const KIND_SITE_MANIFEST: u16 = 1066;

/// Site-index event kind (addressable): route table for one version.
/// The `d` tag is [`graph::derive_index_key`] of the JSON content.
pub const KIND_SITE_INDEX: u16 = 31064;

/// Entrypoint event kind (replaceable): the "current site" pointer.
/// Relays retain only the newest instance per author.
pub const KIND_SITE_ENTRYPOINT: u16 = 11064;

/// Number of hex characters in a site-index addressable key.
pub const INDEX_KEY_LEN: usize = 16;

pub use error::{Error, Result};
pub use graph::{
    GraphLayer, IndexContent, derive_index_key, entrypoint_target_key, index_key_of,
    referenced_assets, referenced_manifests, version_label_of,
};
