//! Output packaging
//!
//! Turns an [`OutputBundle`] into exactly one stored artifact: a lone
//! document becomes a PDF, several documents become one ZIP archive with an
//! entry per document. Entry names derive from the output position alone,
//! so they cannot collide.

use std::io::Write;

use lopdf::Document;

use crate::artifacts::{Artifact, ArtifactStore};
use crate::error::AppError;

use super::error::AssemblyError;
use super::types::OutputBundle;

/// Media type for single-document results
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Media type for bundled multi-document results
pub const ZIP_MEDIA_TYPE: &str = "application/zip";

/// Registers compiled output with the artifact store
pub struct OutputPackager {
    store: ArtifactStore,
}

impl OutputPackager {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Serialize and store a bundle under `file_name` (extension replaced to
    /// match the packaging). Returns the stored artifact's metadata.
    pub async fn package(
        &self,
        bundle: OutputBundle,
        file_name: &str,
    ) -> Result<Artifact, AppError> {
        let stem = file_stem(file_name);
        let count = bundle.document_count();

        match bundle {
            OutputBundle::Single(document) => {
                let bytes = serialize(document)?;
                let artifact = self
                    .store
                    .store(&bytes, &format!("{stem}.pdf"), PDF_MEDIA_TYPE)
                    .await?;
                Ok(artifact)
            }
            OutputBundle::Multiple(documents) => {
                let bytes = build_archive(documents, &stem)?;
                let artifact = self
                    .store
                    .store(&bytes, &format!("{stem}.zip"), ZIP_MEDIA_TYPE)
                    .await?;
                tracing::debug!(
                    handle = %artifact.handle,
                    entries = count,
                    "Packaged multi-document archive"
                );
                Ok(artifact)
            }
        }
    }
}

/// Write each document into a ZIP archive as `{stem}_{n}.pdf`, n starting
/// at 1 in instruction order.
fn build_archive(documents: Vec<Document>, stem: &str) -> Result<Vec<u8>, AppError> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut archive = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (position, document) in documents.into_iter().enumerate() {
            let bytes = serialize(document)?;
            archive
                .start_file(format!("{stem}_{}.pdf", position + 1), options)
                .map_err(|e| AppError::Internal(format!("archive write failed: {e}")))?;
            archive
                .write_all(&bytes)
                .map_err(|e| AppError::Internal(format!("archive write failed: {e}")))?;
        }

        archive
            .finish()
            .map_err(|e| AppError::Internal(format!("archive finish failed: {e}")))?;
    }
    Ok(cursor.into_inner())
}

fn serialize(mut document: Document) -> Result<Vec<u8>, AssemblyError> {
    let mut buffer = Vec::new();
    document
        .save_to(&mut buffer)
        .map_err(|e| AssemblyError::Pdf(e.to_string()))?;
    Ok(buffer)
}

fn file_stem(file_name: &str) -> String {
    let trimmed = file_name.trim();
    let base = if trimmed.is_empty() { "output" } else { trimmed };
    match base.rsplit_once('.') {
        Some((stem, extension))
            if !stem.is_empty()
                && (extension.eq_ignore_ascii_case("pdf")
                    || extension.eq_ignore_ascii_case("zip")) =>
        {
            stem.to_string()
        }
        _ => base.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::compiler::tests::sample_pdf;
    use crate::assembly::compiler::compile;
    use crate::assembly::source_cache::SourceDocumentCache;
    use crate::assembly::types::{AssemblyPlan, OutputMode, PageInstruction};
    use std::io::Read;
    use tempfile::TempDir;

    async fn test_store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), chrono::Duration::minutes(10))
            .await
            .unwrap();
        (dir, store)
    }

    fn bundle(mode: OutputMode, pages: usize) -> OutputBundle {
        let mut cache = SourceDocumentCache::new();
        cache.register(0, sample_pdf(&vec![612; pages]));
        let plan = AssemblyPlan {
            instructions: (0..pages)
                .map(|page_index| PageInstruction::Copy {
                    source_index: 0,
                    page_index,
                    rotation_delta: 0,
                })
                .collect(),
            mode,
        };
        compile(&plan, &mut cache, 100).unwrap()
    }

    #[tokio::test]
    async fn single_document_is_stored_as_pdf() {
        let (_dir, store) = test_store().await;
        let packager = OutputPackager::new(store.clone());

        let artifact = packager
            .package(bundle(OutputMode::Merge, 2), "organized.pdf")
            .await
            .unwrap();

        assert_eq!(artifact.display_name, "organized.pdf");
        assert_eq!(artifact.media_type, PDF_MEDIA_TYPE);

        let (_meta, bytes) = store.read(&artifact.handle).await.unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn multiple_documents_are_stored_as_one_archive() {
        let (_dir, store) = test_store().await;
        let packager = OutputPackager::new(store.clone());

        let artifact = packager
            .package(bundle(OutputMode::Separate, 3), "pages.pdf")
            .await
            .unwrap();

        assert_eq!(artifact.display_name, "pages.zip");
        assert_eq!(artifact.media_type, ZIP_MEDIA_TYPE);

        let (_meta, bytes) = store.read(&artifact.handle).await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        for position in 0..3 {
            let mut entry = archive.by_index(position).unwrap();
            assert_eq!(entry.name(), format!("pages_{}.pdf", position + 1));

            let mut entry_bytes = Vec::new();
            entry.read_to_end(&mut entry_bytes).unwrap();
            let doc = lopdf::Document::load_mem(&entry_bytes).unwrap();
            assert_eq!(doc.get_pages().len(), 1);
        }
    }

    #[test]
    fn file_stem_strips_known_extensions() {
        assert_eq!(file_stem("report.pdf"), "report");
        assert_eq!(file_stem("bundle.zip"), "bundle");
        assert_eq!(file_stem("no-extension"), "no-extension");
        assert_eq!(file_stem("  "), "output");
    }

    #[test]
    fn file_stem_ignores_extension_case() {
        assert_eq!(file_stem("Report.PDF"), "Report");
        assert_eq!(file_stem("Bundle.Zip"), "Bundle");
        assert_eq!(file_stem("archive.tar"), "archive.tar");
    }
}
