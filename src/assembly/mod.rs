//! Page-instruction assembly
//!
//! Builds new PDF documents by pulling pages from one or more uploaded
//! sources, with per-page rotation and ordering, plus synthetic blank pages,
//! then packages the result(s) as a single retrievable artifact.
//!
//! # Modules
//!
//! - `source_cache`: per-request lazy parsing and memoization of sources
//! - `compiler`: instruction list → output document(s)
//! - `packager`: document(s) → one stored artifact (PDF or ZIP)

pub mod compiler;
pub mod error;
pub mod packager;
pub mod source_cache;
pub mod types;

pub use compiler::{compile, compile_document};
pub use error::AssemblyError;
pub use packager::{OutputPackager, PDF_MEDIA_TYPE, ZIP_MEDIA_TYPE};
pub use source_cache::{SourceDocument, SourceDocumentCache};
pub use types::{
    AssemblyPlan, OutputBundle, OutputMode, PageInstruction, DEFAULT_MAX_TOTAL_PAGES,
};
