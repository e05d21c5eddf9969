//! Error types shared across the workspace.

use thiserror::Error;

/// Errors produced while decoding or classifying a wire frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame was not a valid envelope (bad JSON, unknown type, wrong field types).
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The envelope decoded but carries no usable destination.
    #[error("unroutable {kind} envelope: {reason}")]
    Unroutable {
        /// Wire name of the envelope kind.
        kind: &'static str,
        /// What was missing.
        reason: &'static str,
    },
}

/// Errors surfaced by storage collaborators (membership, message persistence).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced user or room does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
