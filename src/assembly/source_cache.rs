//! Per-request source document cache
//!
//! Lazily parses the byte buffers registered for one assembly request and
//! memoizes the results, so a document cited by several instructions is
//! parsed once. The cache lives for exactly one request; nothing is shared
//! across requests.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use lopdf::{Document, ObjectId};

use super::error::AssemblyError;

/// A parsed source document plus its page list in document order
pub struct SourceDocument {
    pub document: Document,
    pub page_ids: Vec<ObjectId>,
}

impl SourceDocument {
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }
}

/// Lazy, memoizing cache of parsed sources keyed by caller-supplied index
///
/// Indices come from multipart field names and may be sparse. A parse
/// failure is reported but never cached, so nothing stale masks a retry.
#[derive(Default)]
pub struct SourceDocumentCache {
    sources: HashMap<usize, Vec<u8>>,
    loaded: HashMap<usize, SourceDocument>,
    parse_count: usize,
}

impl SourceDocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the raw bytes backing a source index.
    pub fn register(&mut self, index: usize, bytes: Vec<u8>) {
        self.sources.insert(index, bytes);
    }

    /// Fetch the parsed document for an index, parsing it on first use.
    pub fn get(&mut self, index: usize) -> Result<&SourceDocument, AssemblyError> {
        match self.loaded.entry(index) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let bytes = self
                    .sources
                    .get(&index)
                    .ok_or(AssemblyError::UnknownSource(index))?;

                let document = Document::load_mem(bytes).map_err(|e| {
                    AssemblyError::SourceLoad {
                        index,
                        reason: e.to_string(),
                    }
                })?;

                if document.is_encrypted() {
                    return Err(AssemblyError::SourceLoad {
                        index,
                        reason: "document is encrypted".to_string(),
                    });
                }

                let page_ids: Vec<ObjectId> = document.get_pages().values().copied().collect();
                if page_ids.is_empty() {
                    return Err(AssemblyError::SourceLoad {
                        index,
                        reason: "document contains no pages".to_string(),
                    });
                }

                self.parse_count += 1;
                tracing::debug!(index = index, pages = page_ids.len(), "Parsed source document");

                Ok(entry.insert(SourceDocument { document, page_ids }))
            }
        }
    }

    /// How many sources have been parsed so far this request
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }
}
