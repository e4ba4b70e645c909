//! Ephemeral artifact storage
//!
//! Generated files are addressed by opaque handles and disappear after a
//! TTL. Nothing here survives a process restart.

pub mod cleanup;
pub mod store;
pub mod types;

pub use cleanup::TempFileGuard;
pub use store::ArtifactStore;
pub use types::{
    Artifact, StoreError, DEFAULT_STRAY_MAX_AGE_SECS, DEFAULT_STRAY_SWEEP_SECS,
    DEFAULT_SWEEP_SECS, DEFAULT_TTL_SECS,
};
