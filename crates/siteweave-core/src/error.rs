//! Error types for the content graph model.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when parsing content graph data.
///
/// Note that the extraction functions in [`crate::graph`] are deliberately
/// infallible ("malformed input contributes nothing"); these errors surface
/// only from the strict parsing helpers that back them.
#[derive(Error, Debug)]
pub enum Error {
    /// An `a` tag coordinate is not of the form `kind:pubkey:key`.
    #[error("invalid coordinate '{value}': {reason}")]
    InvalidCoordinate {
        /// The raw coordinate string.
        value: String,
        /// Description of what's wrong.
        reason: &'static str,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
