//! Artifact store types

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Default artifact time-to-live: 10 minutes
pub const DEFAULT_TTL_SECS: u64 = 600;

/// Default sweep interval: 2 minutes (must stay below the TTL)
pub const DEFAULT_SWEEP_SECS: u64 = 120;

/// Default stray-file backstop interval: 1 hour
pub const DEFAULT_STRAY_SWEEP_SECS: u64 = 3600;

/// Default maximum age before a stray file is purged: 1 hour
pub const DEFAULT_STRAY_MAX_AGE_SECS: u64 = 3600;

// ============================================================================
// Artifact
// ============================================================================

/// Metadata for a stored artifact
///
/// The content itself lives on disk under the store directory, addressed by
/// the handle. An artifact is retrievable only while its age is below the
/// store TTL and it has not been deleted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Opaque, unguessable handle (UUIDv4)
    pub handle: String,

    /// File name presented to the client on download
    pub display_name: String,

    /// Media type served on download
    pub media_type: String,

    /// Content size in bytes
    pub size: u64,

    /// Creation time; expiry is `created_at + TTL`
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by the artifact store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Handle is unknown, expired, or already deleted
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Underlying persistence failure; not recoverable locally
    #[error("Artifact storage IO error: {0}")]
    Io(#[from] std::io::Error),
}
