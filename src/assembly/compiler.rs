//! Page-instruction compiler
//!
//! Builds new PDF documents from an ordered instruction list. Each `Copy`
//! imports one page from a source document into the output, together with
//! every object the page transitively references, composing the requested
//! rotation with whatever rotation the page already carries. `Blank`
//! instructions synthesize an empty Letter-sized page.
//!
//! Failures abort the whole compile; callers never see partial output.

use std::collections::{HashMap, HashSet, VecDeque};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::error::AssemblyError;
use super::source_cache::SourceDocumentCache;
use super::types::{AssemblyPlan, OutputBundle, OutputMode, PageInstruction};

/// Compile a plan into one or more documents.
///
/// `merge` yields a single document with one page per instruction.
/// `separate` yields one single-page document per instruction; a plan with
/// exactly one instruction collapses to `Single` so the packager never has
/// to count.
pub fn compile(
    plan: &AssemblyPlan,
    cache: &mut SourceDocumentCache,
    max_total_pages: usize,
) -> Result<OutputBundle, AssemblyError> {
    if plan.instructions.is_empty() {
        return Err(AssemblyError::EmptyPlan);
    }
    if plan.instructions.len() > max_total_pages {
        return Err(AssemblyError::TooManyPages {
            requested: plan.instructions.len(),
            max: max_total_pages,
        });
    }

    match plan.mode {
        OutputMode::Merge => Ok(OutputBundle::Single(compile_document(
            &plan.instructions,
            cache,
        )?)),
        OutputMode::Separate if plan.instructions.len() == 1 => Ok(OutputBundle::Single(
            compile_document(&plan.instructions, cache)?,
        )),
        OutputMode::Separate => {
            let mut documents = Vec::with_capacity(plan.instructions.len());
            for instruction in &plan.instructions {
                documents.push(compile_document(std::slice::from_ref(instruction), cache)?);
            }
            Ok(OutputBundle::Multiple(documents))
        }
    }
}

/// Build one document containing one page per instruction, in order.
pub fn compile_document(
    instructions: &[PageInstruction],
    cache: &mut SourceDocumentCache,
) -> Result<Document, AssemblyError> {
    let mut dest = Document::with_version("1.5");
    let pages_id = dest.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(instructions.len());

    for instruction in instructions {
        let page_id = match instruction {
            PageInstruction::Blank => append_blank_page(&mut dest, pages_id),
            PageInstruction::Copy {
                source_index,
                page_index,
                rotation_delta,
            } => {
                let source = cache.get(*source_index)?;
                let page_count = source.page_count();
                if *page_index >= page_count {
                    return Err(AssemblyError::PageOutOfRange {
                        source_index: *source_index,
                        page_index: *page_index,
                        page_count,
                    });
                }
                let src_page_id = source.page_ids[*page_index];
                import_page(
                    &mut dest,
                    pages_id,
                    &source.document,
                    src_page_id,
                    *rotation_delta,
                )?
            }
        };
        kids.push(Object::Reference(page_id));
    }

    if kids.is_empty() {
        return Err(AssemblyError::ZeroPages);
    }

    let page_count = kids.len() as i64;
    dest.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let catalog_id = dest.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    dest.trailer.set("Root", catalog_id);

    Ok(dest)
}

// ============================================================================
// Page Import
// ============================================================================

/// Copy one page (and its object graph) from `src` into `dest`.
///
/// The page's inheritable attributes are baked onto the page itself, since
/// its original ancestors are not imported. Rotation composes additively:
/// `(existing + delta) mod 360`, never an absolute replacement.
fn import_page(
    dest: &mut Document,
    parent: ObjectId,
    src: &Document,
    src_page_id: ObjectId,
    rotation_delta: i64,
) -> Result<ObjectId, AssemblyError> {
    let mut page_dict = src.get_dictionary(src_page_id)?.clone();

    for key in [b"Resources".as_slice(), b"MediaBox".as_slice(), b"CropBox".as_slice()] {
        if !page_dict.has(key) {
            if let Some(value) = inherited_attribute(src, src_page_id, key) {
                page_dict.set(key, value);
            }
        }
    }
    if !page_dict.has(b"MediaBox") {
        page_dict.set("MediaBox", letter_media_box());
    }

    let rotation = (effective_rotation(src, src_page_id) + rotation_delta).rem_euclid(360);

    // Walk the page's object graph. Keys that point back into the source
    // page tree are skipped so the import stays bounded to the page itself.
    let mut queue = VecDeque::new();
    collect_dict_refs(&page_dict, &mut queue);

    let mut seen = HashSet::new();
    seen.insert(src_page_id);
    let mut imported = Vec::new();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        imported.push(id);
        if let Ok(object) = src.get_object(id) {
            collect_refs(object, &mut queue);
        }
    }

    let new_page_id = dest.new_object_id();
    let mut id_map = HashMap::new();
    id_map.insert(src_page_id, new_page_id);
    for id in &imported {
        id_map.insert(*id, dest.new_object_id());
    }

    for id in &imported {
        if let Ok(object) = src.get_object(*id) {
            dest.objects.insert(id_map[id], remap_object(object, &id_map));
        }
    }

    let mut new_page = remap_dictionary(&page_dict, &id_map);
    new_page.set("Parent", parent);
    if rotation != 0 {
        new_page.set("Rotate", rotation);
    } else {
        new_page.remove(b"Rotate");
    }
    dest.objects.insert(new_page_id, Object::Dictionary(new_page));

    Ok(new_page_id)
}

/// Append a synthetic blank page (US Letter, empty content stream).
fn append_blank_page(dest: &mut Document, parent: ObjectId) -> ObjectId {
    let content_id = dest.add_object(Object::Stream(Stream::new(dictionary! {}, Vec::new())));
    dest.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "MediaBox" => letter_media_box(),
        "Resources" => dictionary! {},
        "Contents" => content_id,
    })
}

fn letter_media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ])
}

// ============================================================================
// Source Inspection
// ============================================================================

/// Resolve a page's effective rotation, honoring inheritance from the page
/// tree. Missing or malformed values read as 0.
fn effective_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    let mut current = page_id;
    // Bounded walk; malformed self-referential trees terminate.
    for _ in 0..32 {
        let Ok(dict) = doc.get_dictionary(current) else {
            return 0;
        };
        if let Ok(value) = dict.get(b"Rotate") {
            let resolved = match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
            if let Some(rotation) = resolved.and_then(|o| o.as_i64().ok()) {
                return rotation;
            }
        }
        match dict.get(b"Parent").and_then(|p| p.as_reference()) {
            Ok(parent) => current = parent,
            Err(_) => return 0,
        }
    }
    0
}

/// Look up an inheritable page attribute on the ancestors of `page_id`.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc
        .get_dictionary(page_id)
        .ok()?
        .get(b"Parent")
        .and_then(|p| p.as_reference())
        .ok()?;

    for _ in 0..32 {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok()?;
    }
    None
}

// ============================================================================
// Object Graph Traversal
// ============================================================================

/// Dictionary keys that point back into the page tree; never followed.
const BACK_REFERENCE_KEYS: [&[u8]; 2] = [b"Parent", b"P"];

fn collect_refs(object: &Object, queue: &mut VecDeque<ObjectId>) {
    match object {
        Object::Reference(id) => queue.push_back(*id),
        Object::Array(items) => {
            for item in items {
                collect_refs(item, queue);
            }
        }
        Object::Dictionary(dict) => collect_dict_refs(dict, queue),
        Object::Stream(stream) => collect_dict_refs(&stream.dict, queue),
        _ => {}
    }
}

fn collect_dict_refs(dict: &Dictionary, queue: &mut VecDeque<ObjectId>) {
    for (key, value) in dict.iter() {
        if BACK_REFERENCE_KEYS.contains(&key.as_slice()) {
            continue;
        }
        collect_refs(value, queue);
    }
}

/// Rewrite references through the id map. References to objects outside the
/// imported set would dangle, so dictionary entries holding them are dropped
/// and array slots become Null.
fn remap_object(object: &Object, id_map: &HashMap<ObjectId, ObjectId>) -> Object {
    match object {
        Object::Reference(id) => id_map
            .get(id)
            .map(|new_id| Object::Reference(*new_id))
            .unwrap_or(Object::Null),
        Object::Array(items) => {
            Object::Array(items.iter().map(|item| remap_object(item, id_map)).collect())
        }
        Object::Dictionary(dict) => Object::Dictionary(remap_dictionary(dict, id_map)),
        Object::Stream(stream) => {
            let mut remapped = stream.clone();
            remapped.dict = remap_dictionary(&stream.dict, id_map);
            Object::Stream(remapped)
        }
        other => other.clone(),
    }
}

fn remap_dictionary(dict: &Dictionary, id_map: &HashMap<ObjectId, ObjectId>) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        if let Object::Reference(id) = value {
            if !id_map.contains_key(id) {
                continue;
            }
        }
        out.set(key.clone(), remap_object(value, id_map));
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a PDF with one page per entry; each entry sets the page width
    /// so tests can tell pages apart after a copy.
    pub(crate) fn sample_pdf(page_widths: &[i64]) -> Vec<u8> {
        sample_pdf_with_rotations(page_widths, &vec![0; page_widths.len()])
    }

    pub(crate) fn sample_pdf_with_rotations(page_widths: &[i64], rotations: &[i64]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();

        for (width, rotation) in page_widths.iter().zip(rotations) {
            let content_id =
                doc.add_object(Object::Stream(Stream::new(dictionary! {}, Vec::new())));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(*width),
                    Object::Integer(792),
                ]),
                "Resources" => dictionary! {},
                "Contents" => content_id,
            };
            if *rotation != 0 {
                page.set("Rotate", *rotation);
            }
            kids.push(doc.add_object(page).into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    pub(crate) fn serialize(mut doc: Document) -> Vec<u8> {
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn load_pages(bytes: &[u8]) -> (Document, Vec<ObjectId>) {
        let doc = Document::load_mem(bytes).unwrap();
        let ids = doc.get_pages().values().copied().collect();
        (doc, ids)
    }

    fn rotation_of(doc: &Document, page_id: ObjectId) -> i64 {
        doc.get_dictionary(page_id)
            .unwrap()
            .get(b"Rotate")
            .and_then(|o| o.as_i64())
            .unwrap_or(0)
    }

    fn width_of(doc: &Document, page_id: ObjectId) -> i64 {
        let media_box = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        media_box[2].as_i64().unwrap()
    }

    fn cache_with(bytes: Vec<u8>) -> SourceDocumentCache {
        let mut cache = SourceDocumentCache::new();
        cache.register(0, bytes);
        cache
    }

    fn copy(page_index: usize, rotation_delta: i64) -> PageInstruction {
        PageInstruction::Copy {
            source_index: 0,
            page_index,
            rotation_delta,
        }
    }

    fn merge_plan(instructions: Vec<PageInstruction>) -> AssemblyPlan {
        AssemblyPlan {
            instructions,
            mode: OutputMode::Merge,
        }
    }

    fn compile_single(plan: &AssemblyPlan, cache: &mut SourceDocumentCache) -> Vec<u8> {
        match compile(plan, cache, 100).unwrap() {
            OutputBundle::Single(doc) => serialize(doc),
            OutputBundle::Multiple(_) => panic!("expected a single document"),
        }
    }

    #[test]
    fn instruction_order_is_output_order() {
        let mut cache = cache_with(sample_pdf(&[101, 102, 103]));
        let plan = merge_plan(vec![PageInstruction::Blank, copy(2, 0), PageInstruction::Blank]);

        let bytes = compile_single(&plan, &mut cache);
        let (doc, pages) = load_pages(&bytes);

        assert_eq!(pages.len(), 3);
        assert_eq!(width_of(&doc, pages[0]), 612); // blank
        assert_eq!(width_of(&doc, pages[1]), 103); // copied page 2
        assert_eq!(width_of(&doc, pages[2]), 612); // blank
    }

    #[test]
    fn rotation_composes_additively_across_assemblies() {
        // 0 + 90 = 90, then 90 + 90 = 180
        let mut cache = cache_with(sample_pdf(&[612]));
        let once = compile_single(&merge_plan(vec![copy(0, 90)]), &mut cache);

        let mut cache = cache_with(once);
        let twice = compile_single(&merge_plan(vec![copy(0, 90)]), &mut cache);

        let (doc, pages) = load_pages(&twice);
        assert_eq!(rotation_of(&doc, pages[0]), 180);
    }

    #[test]
    fn rotation_wraps_past_360() {
        // (180 + 270) mod 360 = 90
        let mut cache = cache_with(sample_pdf_with_rotations(&[612], &[180]));
        let bytes = compile_single(&merge_plan(vec![copy(0, 270)]), &mut cache);

        let (doc, pages) = load_pages(&bytes);
        assert_eq!(rotation_of(&doc, pages[0]), 90);
    }

    #[test]
    fn negative_and_odd_rotations_are_mod_reduced() {
        let mut cache = cache_with(sample_pdf(&[612, 612]));
        let plan = merge_plan(vec![copy(0, -90), copy(1, 45)]);
        let bytes = compile_single(&plan, &mut cache);

        let (doc, pages) = load_pages(&bytes);
        assert_eq!(rotation_of(&doc, pages[0]), 270);
        assert_eq!(rotation_of(&doc, pages[1]), 45);
    }

    #[test]
    fn zero_net_rotation_clears_the_key() {
        let mut cache = cache_with(sample_pdf_with_rotations(&[612], &[270]));
        let bytes = compile_single(&merge_plan(vec![copy(0, 90)]), &mut cache);

        let (doc, pages) = load_pages(&bytes);
        assert_eq!(rotation_of(&doc, pages[0]), 0);
        assert!(doc.get_dictionary(pages[0]).unwrap().get(b"Rotate").is_err());
    }

    #[test]
    fn out_of_range_page_fails_the_compile() {
        let mut cache = cache_with(sample_pdf(&[612, 612, 612, 612, 612]));
        let plan = merge_plan(vec![copy(7, 0)]);

        let result = compile(&plan, &mut cache, 100);
        assert!(matches!(
            result,
            Err(AssemblyError::PageOutOfRange {
                source_index: 0,
                page_index: 7,
                page_count: 5,
            })
        ));
    }

    #[test]
    fn empty_plan_is_rejected() {
        let mut cache = SourceDocumentCache::new();
        let plan = merge_plan(vec![]);
        assert!(matches!(
            compile(&plan, &mut cache, 100),
            Err(AssemblyError::EmptyPlan)
        ));
    }

    #[test]
    fn oversized_plan_is_rejected() {
        let mut cache = cache_with(sample_pdf(&[612]));
        let plan = merge_plan(vec![copy(0, 0), copy(0, 0), copy(0, 0)]);
        assert!(matches!(
            compile(&plan, &mut cache, 2),
            Err(AssemblyError::TooManyPages {
                requested: 3,
                max: 2,
            })
        ));
    }

    #[test]
    fn unknown_source_index_is_rejected() {
        let mut cache = cache_with(sample_pdf(&[612]));
        let plan = merge_plan(vec![PageInstruction::Copy {
            source_index: 3,
            page_index: 0,
            rotation_delta: 0,
        }]);
        assert!(matches!(
            compile(&plan, &mut cache, 100),
            Err(AssemblyError::UnknownSource(3))
        ));
    }

    #[test]
    fn separate_mode_yields_one_document_per_instruction() {
        let mut cache = cache_with(sample_pdf(&[101, 102, 103]));
        let plan = AssemblyPlan {
            instructions: vec![copy(0, 0), copy(1, 0), copy(2, 0)],
            mode: OutputMode::Separate,
        };

        let bundle = compile(&plan, &mut cache, 100).unwrap();
        let OutputBundle::Multiple(docs) = bundle else {
            panic!("expected multiple documents");
        };
        assert_eq!(docs.len(), 3);

        for (doc, expected_width) in docs.into_iter().zip([101, 102, 103]) {
            let bytes = serialize(doc);
            let (loaded, pages) = load_pages(&bytes);
            assert_eq!(pages.len(), 1);
            assert_eq!(width_of(&loaded, pages[0]), expected_width);
        }
    }

    #[test]
    fn separate_mode_with_one_instruction_is_single() {
        let mut cache = cache_with(sample_pdf(&[612]));
        let plan = AssemblyPlan {
            instructions: vec![copy(0, 0)],
            mode: OutputMode::Separate,
        };
        assert!(matches!(
            compile(&plan, &mut cache, 100),
            Ok(OutputBundle::Single(_))
        ));
    }

    #[test]
    fn blank_instruction_in_separate_mode_yields_a_blank_document() {
        let mut cache = cache_with(sample_pdf(&[101]));
        let plan = AssemblyPlan {
            instructions: vec![copy(0, 0), PageInstruction::Blank],
            mode: OutputMode::Separate,
        };

        let bundle = compile(&plan, &mut cache, 100).unwrap();
        let OutputBundle::Multiple(docs) = bundle else {
            panic!("expected multiple documents");
        };
        let blank_bytes = serialize(docs.into_iter().nth(1).unwrap());
        let (doc, pages) = load_pages(&blank_bytes);
        assert_eq!(pages.len(), 1);
        assert_eq!(width_of(&doc, pages[0]), 612);
    }

    #[test]
    fn source_cited_twice_is_parsed_once() {
        let mut cache = cache_with(sample_pdf(&[612, 612]));
        let plan = merge_plan(vec![copy(0, 0), copy(1, 0)]);

        compile(&plan, &mut cache, 100).unwrap();
        assert_eq!(cache.parse_count(), 1);
    }

    #[test]
    fn copied_pages_keep_their_media_box() {
        let mut cache = cache_with(sample_pdf(&[420]));
        let bytes = compile_single(&merge_plan(vec![copy(0, 0)]), &mut cache);

        let (doc, pages) = load_pages(&bytes);
        assert_eq!(width_of(&doc, pages[0]), 420);
    }
}
