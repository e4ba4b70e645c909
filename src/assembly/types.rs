//! Assembly plan types
//!
//! Wire shape of a page instruction:
//!
//! ```json
//! [
//!   {"isBlank": true},
//!   {"fileIndex": 0, "originalIndex": 3, "rotation": 90}
//! ]
//! ```
//!
//! `fileIndex` defaults to 0, `rotation` defaults to 0 and may be any
//! integer (reduced mod 360 on output).

use lopdf::Document;
use serde::Deserialize;

// ============================================================================
// Constants
// ============================================================================

/// Default cap on total output pages per plan
pub const DEFAULT_MAX_TOTAL_PAGES: usize = 2000;

// ============================================================================
// Page Instructions
// ============================================================================

/// One step of an assembly plan
///
/// Instructions are processed strictly in list order; output page order
/// equals instruction order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawInstruction")]
pub enum PageInstruction {
    /// Insert an empty page with no source
    Blank,

    /// Copy one page from a source document, rotating it relative to its
    /// existing rotation
    Copy {
        source_index: usize,
        page_index: usize,
        rotation_delta: i64,
    },
}

/// Wire form of a page instruction, before validation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstruction {
    #[serde(default)]
    is_blank: bool,

    #[serde(default)]
    file_index: usize,

    original_index: Option<usize>,

    #[serde(default)]
    rotation: i64,
}

impl TryFrom<RawInstruction> for PageInstruction {
    type Error = String;

    fn try_from(raw: RawInstruction) -> Result<Self, Self::Error> {
        if raw.is_blank {
            return Ok(PageInstruction::Blank);
        }

        let page_index = raw
            .original_index
            .ok_or_else(|| "instruction is missing 'originalIndex'".to_string())?;

        Ok(PageInstruction::Copy {
            source_index: raw.file_index,
            page_index,
            rotation_delta: raw.rotation,
        })
    }
}

// ============================================================================
// Plans and Bundles
// ============================================================================

/// How compiled output is grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One document containing every instruction's page
    #[default]
    Merge,

    /// One single-page document per instruction
    Separate,
}

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(OutputMode::Merge),
            "separate" => Ok(OutputMode::Separate),
            other => Err(format!("unknown output mode '{other}'")),
        }
    }
}

/// A full ordered instruction sequence plus its output mode
#[derive(Debug, Clone)]
pub struct AssemblyPlan {
    pub instructions: Vec<PageInstruction>,
    pub mode: OutputMode,
}

/// The document(s) produced by compiling a plan
///
/// `Single` becomes one PDF artifact; `Multiple` becomes one ZIP artifact
/// with a named entry per document. A plan that yields exactly one document
/// is always `Single`, whatever its mode.
pub enum OutputBundle {
    Single(Document),
    Multiple(Vec<Document>),
}

impl OutputBundle {
    /// Number of documents in the bundle
    pub fn document_count(&self) -> usize {
        match self {
            OutputBundle::Single(_) => 1,
            OutputBundle::Multiple(docs) => docs.len(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_blank_instruction() {
        let parsed: PageInstruction = serde_json::from_str(r#"{"isBlank": true}"#).unwrap();
        assert_eq!(parsed, PageInstruction::Blank);
    }

    #[test]
    fn deserializes_copy_with_defaults() {
        let parsed: PageInstruction = serde_json::from_str(r#"{"originalIndex": 3}"#).unwrap();
        assert_eq!(
            parsed,
            PageInstruction::Copy {
                source_index: 0,
                page_index: 3,
                rotation_delta: 0,
            }
        );
    }

    #[test]
    fn deserializes_full_copy_instruction() {
        let parsed: PageInstruction =
            serde_json::from_str(r#"{"fileIndex": 2, "originalIndex": 0, "rotation": -90}"#)
                .unwrap();
        assert_eq!(
            parsed,
            PageInstruction::Copy {
                source_index: 2,
                page_index: 0,
                rotation_delta: -90,
            }
        );
    }

    #[test]
    fn rejects_copy_without_page_index() {
        let result: Result<PageInstruction, _> = serde_json::from_str(r#"{"fileIndex": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn document_count_matches_bundle_shape() {
        let single = OutputBundle::Single(Document::with_version("1.5"));
        assert_eq!(single.document_count(), 1);

        let multiple = OutputBundle::Multiple(vec![
            Document::with_version("1.5"),
            Document::with_version("1.5"),
            Document::with_version("1.5"),
        ]);
        assert_eq!(multiple.document_count(), 3);
    }

    #[test]
    fn parses_output_modes() {
        assert_eq!("merge".parse::<OutputMode>().unwrap(), OutputMode::Merge);
        assert_eq!(
            "separate".parse::<OutputMode>().unwrap(),
            OutputMode::Separate
        );
        assert!("zip".parse::<OutputMode>().is_err());
    }
}
