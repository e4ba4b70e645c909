//! Page assembly routes
//!
//! HTTP endpoints that compile uploaded PDFs into new documents.
//!
//! Endpoints:
//! - POST /api/v1/pages/assemble - Raw instruction-list assembly
//! - POST /api/v1/pages/merge - Concatenate uploads in order
//! - POST /api/v1/pages/split - Cut one document into segments
//! - POST /api/v1/pages/rotate - Rotate selected pages
//! - POST /api/v1/pages/delete - Remove selected pages
//!
//! Uploads are multipart: each file part becomes a source document (indexed
//! by a trailing number in its field name, or by upload position), text
//! parts carry parameters. Compilation is CPU-bound and runs off the
//! async scheduler.

use std::collections::{BTreeSet, HashMap, HashSet};

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::artifacts::Artifact;
use crate::assembly::{
    compile, compile_document, AssemblyPlan, OutputBundle, OutputMode, OutputPackager,
    PageInstruction, SourceDocumentCache,
};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the pages router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assemble", post(assemble))
        .route("/merge", post(merge))
        .route("/split", post(split))
        .route("/rotate", post(rotate))
        .route("/delete", post(delete_pages))
}

// ============================================================================
// Responses
// ============================================================================

/// Response for every assembly endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembleResponse {
    pub handle: String,
    pub file_name: String,
    pub media_type: String,
    pub size: u64,
    pub expires_at: DateTime<Utc>,
}

fn artifact_response(state: &AppState, artifact: Artifact) -> Json<AssembleResponse> {
    Json(AssembleResponse {
        expires_at: artifact.created_at + state.artifacts().ttl(),
        handle: artifact.handle,
        file_name: artifact.display_name,
        media_type: artifact.media_type,
        size: artifact.size,
    })
}

// ============================================================================
// Upload Extraction
// ============================================================================

/// The decoded multipart body of an assembly request
struct AssemblyUpload {
    /// Source bytes keyed by (possibly sparse) index
    sources: HashMap<usize, Vec<u8>>,

    /// Source indices in upload order
    order: Vec<usize>,

    /// Text fields (instructions, mode, selections, ...)
    fields: HashMap<String, String>,
}

impl AssemblyUpload {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn require_single_source(&self) -> Result<usize> {
        match self.order.as_slice() {
            [index] => Ok(*index),
            [] => Err(AppError::Validation("no file uploaded".to_string())),
            _ => Err(AppError::Validation(
                "expected exactly one file upload".to_string(),
            )),
        }
    }

    /// Display name for the output, from the `fileName` field or the first
    /// uploaded file's name.
    fn output_name(&self, fallback: &str) -> String {
        self.field("fileName")
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<AssemblyUpload> {
    let mut sources = HashMap::new();
    let mut order = Vec::new();
    let mut fields = HashMap::new();
    let mut next_index = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("failed to read upload: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        if field.file_name().is_some() {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("failed to read file data: {e}")))?;

            let index = trailing_index(&name).unwrap_or(next_index);
            next_index = next_index.max(index + 1);

            tracing::debug!(field = %name, index = index, size = data.len(), "Received source file");

            if !sources.contains_key(&index) {
                order.push(index);
            }
            sources.insert(index, data.to_vec());
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("failed to read field '{name}': {e}")))?;
            fields.insert(name, text);
        }
    }

    Ok(AssemblyUpload {
        sources,
        order,
        fields,
    })
}

/// Parse a trailing decimal index from a field name like `file_3`.
fn trailing_index(name: &str) -> Option<usize> {
    let digits: String = name
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() || digits.len() == name.len() {
        return None;
    }
    digits.parse().ok()
}

// ============================================================================
// Shared Execution
// ============================================================================

/// Run a plan builder off the async scheduler, then package the result.
async fn run_assembly<F>(state: &AppState, file_name: String, build: F) -> Result<Artifact>
where
    F: FnOnce() -> std::result::Result<OutputBundle, AppError> + Send + 'static,
{
    let bundle = tokio::task::spawn_blocking(build)
        .await
        .map_err(|e| AppError::Internal(format!("assembly task failed: {e}")))??;

    let packager = OutputPackager::new(state.artifacts().clone());
    packager.package(bundle, &file_name).await
}

fn cache_from(sources: HashMap<usize, Vec<u8>>) -> SourceDocumentCache {
    let mut cache = SourceDocumentCache::new();
    for (index, bytes) in sources {
        cache.register(index, bytes);
    }
    cache
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/pages/assemble
///
/// The raw core surface: files plus an `instructions` JSON field, optional
/// `mode` (`merge` | `separate`, default merge).
async fn assemble(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AssembleResponse>> {
    let upload = read_upload(&mut multipart).await?;

    let raw = upload
        .field("instructions")
        .ok_or_else(|| AppError::Validation("missing 'instructions' field".to_string()))?;
    let instructions: Vec<PageInstruction> = serde_json::from_str(raw)
        .map_err(|e| AppError::Validation(format!("invalid instruction list: {e}")))?;

    let mode = match upload.field("mode") {
        None => OutputMode::Merge,
        Some(value) => value.parse().map_err(AppError::Validation)?,
    };

    let file_name = upload.output_name("assembled");
    let max_pages = state.config().limits.max_total_pages;
    let sources = upload.sources;

    let artifact = run_assembly(&state, file_name, move || {
        let mut cache = cache_from(sources);
        let plan = AssemblyPlan { instructions, mode };
        Ok(compile(&plan, &mut cache, max_pages)?)
    })
    .await?;

    Ok(artifact_response(&state, artifact))
}

/// POST /api/v1/pages/merge
///
/// Concatenates every page of every upload, in upload order.
async fn merge(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AssembleResponse>> {
    let upload = read_upload(&mut multipart).await?;
    if upload.order.is_empty() {
        return Err(AppError::Validation("no files uploaded".to_string()));
    }

    let file_name = upload.output_name("merged");
    let max_pages = state.config().limits.max_total_pages;
    let order = upload.order.clone();
    let sources = upload.sources;

    let artifact = run_assembly(&state, file_name, move || {
        let mut cache = cache_from(sources);

        let mut instructions = Vec::new();
        for source_index in order {
            let page_count = cache.get(source_index)?.page_count();
            instructions.extend((0..page_count).map(|page_index| PageInstruction::Copy {
                source_index,
                page_index,
                rotation_delta: 0,
            }));
        }

        let plan = AssemblyPlan {
            instructions,
            mode: OutputMode::Merge,
        };
        Ok(compile(&plan, &mut cache, max_pages)?)
    })
    .await?;

    Ok(artifact_response(&state, artifact))
}

/// POST /api/v1/pages/split
///
/// Cuts one document after each page named in `pages` (1-based, CSV with
/// ranges). No split points yields the document unchanged as a single PDF;
/// several segments come back as one ZIP.
async fn split(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AssembleResponse>> {
    let upload = read_upload(&mut multipart).await?;
    let source_index = upload.require_single_source()?;

    let file_name = upload.output_name("split");
    let max_pages = state.config().limits.max_total_pages;
    let selection = upload.field("pages").unwrap_or("").to_string();
    let sources = upload.sources;

    let artifact = run_assembly(&state, file_name, move || {
        let mut cache = cache_from(sources);
        let page_count = cache.get(source_index)?.page_count();
        if page_count > max_pages {
            return Err(AppError::Assembly(
                crate::assembly::AssemblyError::TooManyPages {
                    requested: page_count,
                    max: max_pages,
                },
            ));
        }

        let split_after: BTreeSet<usize> = if selection.trim().is_empty() {
            BTreeSet::new()
        } else {
            parse_page_selection(&selection, page_count)
                .map_err(AppError::Validation)?
                .into_iter()
                .collect()
        };

        let mut documents = Vec::new();
        let mut segment_start = 0usize;
        for boundary in split_after.iter().copied().chain(std::iter::once(page_count - 1)) {
            if boundary < segment_start {
                continue;
            }
            let instructions: Vec<PageInstruction> = (segment_start..=boundary)
                .map(|page_index| PageInstruction::Copy {
                    source_index,
                    page_index,
                    rotation_delta: 0,
                })
                .collect();
            documents.push(compile_document(&instructions, &mut cache)?);
            segment_start = boundary + 1;
        }

        Ok(match documents.len() {
            1 => OutputBundle::Single(
                documents
                    .pop()
                    .ok_or_else(|| AppError::Internal("empty segment list".to_string()))?,
            ),
            _ => OutputBundle::Multiple(documents),
        })
    })
    .await?;

    Ok(artifact_response(&state, artifact))
}

/// POST /api/v1/pages/rotate
///
/// Adds `angle` degrees to the selected pages (`pages` defaults to all).
/// Every page of the source is emitted exactly once.
async fn rotate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AssembleResponse>> {
    let upload = read_upload(&mut multipart).await?;
    let source_index = upload.require_single_source()?;

    let angle: i64 = upload
        .field("angle")
        .ok_or_else(|| AppError::Validation("missing 'angle' field".to_string()))?
        .trim()
        .parse()
        .map_err(|_| AppError::Validation("'angle' must be an integer".to_string()))?;

    let file_name = upload.output_name("rotated");
    let max_pages = state.config().limits.max_total_pages;
    let selection = upload.field("pages").unwrap_or("all").to_string();
    let sources = upload.sources;

    let artifact = run_assembly(&state, file_name, move || {
        let mut cache = cache_from(sources);
        let page_count = cache.get(source_index)?.page_count();

        let selected: HashSet<usize> = parse_page_selection(&selection, page_count)
            .map_err(AppError::Validation)?
            .into_iter()
            .collect();

        let instructions: Vec<PageInstruction> = (0..page_count)
            .map(|page_index| PageInstruction::Copy {
                source_index,
                page_index,
                rotation_delta: if selected.contains(&page_index) { angle } else { 0 },
            })
            .collect();

        let plan = AssemblyPlan {
            instructions,
            mode: OutputMode::Merge,
        };
        Ok(compile(&plan, &mut cache, max_pages)?)
    })
    .await?;

    Ok(artifact_response(&state, artifact))
}

/// POST /api/v1/pages/delete
///
/// Emits every page of the source except those named in `pages`.
async fn delete_pages(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AssembleResponse>> {
    let upload = read_upload(&mut multipart).await?;
    let source_index = upload.require_single_source()?;

    let selection = upload
        .field("pages")
        .ok_or_else(|| AppError::Validation("missing 'pages' field".to_string()))?
        .to_string();

    let file_name = upload.output_name("trimmed");
    let max_pages = state.config().limits.max_total_pages;
    let sources = upload.sources;

    let artifact = run_assembly(&state, file_name, move || {
        let mut cache = cache_from(sources);
        let page_count = cache.get(source_index)?.page_count();

        let removed: HashSet<usize> = parse_page_selection(&selection, page_count)
            .map_err(AppError::Validation)?
            .into_iter()
            .collect();

        let instructions: Vec<PageInstruction> = (0..page_count)
            .filter(|page_index| !removed.contains(page_index))
            .map(|page_index| PageInstruction::Copy {
                source_index,
                page_index,
                rotation_delta: 0,
            })
            .collect();

        if instructions.is_empty() {
            return Err(AppError::Validation(
                "cannot delete every page of the document".to_string(),
            ));
        }

        let plan = AssemblyPlan {
            instructions,
            mode: OutputMode::Merge,
        };
        Ok(compile(&plan, &mut cache, max_pages)?)
    })
    .await?;

    Ok(artifact_response(&state, artifact))
}

// ============================================================================
// Page Selections
// ============================================================================

/// Parse a 1-based page selection like `"1,3-5,8"` (or `"all"`) into sorted,
/// deduplicated 0-based indices.
fn parse_page_selection(
    input: &str,
    page_count: usize,
) -> std::result::Result<Vec<usize>, String> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("all") {
        return Ok((0..page_count).collect());
    }

    let parse_number = |token: &str| {
        token
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid page number '{}'", token.trim()))
    };

    let mut pages = BTreeSet::new();
    for token in trimmed.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let (start, end) = match token.split_once('-') {
            Some((a, b)) => (parse_number(a)?, parse_number(b)?),
            None => {
                let page = parse_number(token)?;
                (page, page)
            }
        };

        if start == 0 || end < start || end > page_count {
            return Err(format!(
                "page selection '{token}' is out of range (document has {page_count} pages)"
            ));
        }
        for page in start..=end {
            pages.insert(page - 1);
        }
    }

    if pages.is_empty() {
        return Err("page selection is empty".to_string());
    }
    Ok(pages.into_iter().collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_pages_and_ranges() {
        assert_eq!(parse_page_selection("1,3-5,8", 10).unwrap(), vec![0, 2, 3, 4, 7]);
    }

    #[test]
    fn deduplicates_and_sorts() {
        assert_eq!(parse_page_selection("3,1-3,2", 5).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn all_selects_every_page() {
        assert_eq!(parse_page_selection("all", 3).unwrap(), vec![0, 1, 2]);
        assert_eq!(parse_page_selection(" ALL ", 2).unwrap(), vec![0, 1]);
    }

    #[test]
    fn rejects_out_of_range_selections() {
        assert!(parse_page_selection("0", 5).is_err());
        assert!(parse_page_selection("6", 5).is_err());
        assert!(parse_page_selection("4-2", 5).is_err());
        assert!(parse_page_selection("2-9", 5).is_err());
    }

    #[test]
    fn rejects_garbage_tokens() {
        assert!(parse_page_selection("one", 5).is_err());
        assert!(parse_page_selection("", 5).is_err());
        assert!(parse_page_selection(",,", 5).is_err());
    }

    #[test]
    fn trailing_index_parses_suffixed_names() {
        assert_eq!(trailing_index("file_0"), Some(0));
        assert_eq!(trailing_index("file_12"), Some(12));
        assert_eq!(trailing_index("upload3"), Some(3));
        assert_eq!(trailing_index("file"), None);
        assert_eq!(trailing_index("123"), None);
    }
}
