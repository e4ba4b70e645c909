//! Assembly error types

use thiserror::Error;

/// Errors raised while compiling a page-instruction plan
///
/// Any of these aborts the whole compile; partial output is discarded and
/// nothing reaches the artifact store.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The instruction list was empty
    #[error("Instruction list is empty")]
    EmptyPlan,

    /// An instruction referenced a source index with no backing bytes
    #[error("No source document registered for index {0}")]
    UnknownSource(usize),

    /// A referenced source could not be parsed
    #[error("Failed to load source {index}: {reason}")]
    SourceLoad { index: usize, reason: String },

    /// An instruction requested a page outside the source document
    #[error(
        "Page {page_index} is out of range for source {source_index} ({page_count} pages)"
    )]
    PageOutOfRange {
        source_index: usize,
        page_index: usize,
        page_count: usize,
    },

    /// The plan exceeds the configured maximum total page count
    #[error("Plan requests {requested} pages, maximum is {max}")]
    TooManyPages { requested: usize, max: usize },

    /// The plan produced a document with no pages
    #[error("Plan produced a document with no pages")]
    ZeroPages,

    /// Low-level PDF manipulation failure
    #[error("PDF error: {0}")]
    Pdf(String),
}

impl From<lopdf::Error> for AssemblyError {
    fn from(err: lopdf::Error) -> Self {
        AssemblyError::Pdf(err.to_string())
    }
}
