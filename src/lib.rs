//! Collate Server
//!
//! Self-hosted PDF page assembly server with ephemeral results.
//!
//! Uploads go in, a compiled document comes out: pages can be reordered,
//! rotated, copied across sources, or replaced with blanks, and the result
//! is stored under an opaque handle for a short, fixed lifetime.

pub mod artifacts;
pub mod assembly;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
