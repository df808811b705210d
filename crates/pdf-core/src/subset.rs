//! Glyph collection and font subsetting for composite fonts
//!
//! Content streams keep the original glyph IDs as CIDs. After subsetting, a
//! CIDToGIDMap translates each CID to the glyph's index in the reduced font,
//! so nothing that was already written needs to change.

use crate::{PdfError, Result};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// A subsetted font program
#[derive(Debug, Clone)]
pub struct GlyphSubset {
    /// Reduced font program
    pub data: Vec<u8>,
    /// Original glyph ID -> glyph ID in `data`
    pub mapping: BTreeMap<u16, u16>,
}

impl GlyphSubset {
    /// Six uppercase letters derived from the retained glyph set
    pub fn tag(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.mapping.hash(&mut hasher);
        let mut value = hasher.finish();
        (0..6)
            .map(|_| {
                let letter = (b'A' + (value % 26) as u8) as char;
                value /= 26;
                letter
            })
            .collect()
    }

    /// CIDToGIDMap stream content: two big-endian bytes per CID
    pub fn cid_to_gid_map(&self) -> Vec<u8> {
        let max_cid = self.mapping.keys().next_back().copied().unwrap_or(0) as usize;
        let mut map = vec![0u8; (max_cid + 1) * 2];
        for (&old, &new) in &self.mapping {
            let offset = old as usize * 2;
            map[offset..offset + 2].copy_from_slice(&new.to_be_bytes());
        }
        map
    }
}

/// Subset a TrueType program to the given glyph IDs (glyph 0 is always kept)
pub fn subset_font(ttf_data: &[u8], glyphs: &BTreeSet<u16>) -> Result<GlyphSubset> {
    let glyph_count = ttf_parser::Face::parse(ttf_data, 0)
        .map_err(|e| PdfError::FontParseError(format!("{e:?}")))?
        .number_of_glyphs();
    let glyphs: BTreeSet<u16> = glyphs
        .iter()
        .copied()
        .filter(|gid| *gid < glyph_count)
        .collect();

    let mut remapper = subsetter::GlyphRemapper::new();
    remapper.remap(0);
    for &gid in &glyphs {
        remapper.remap(gid);
    }

    let data = subsetter::subset(ttf_data, 0, &remapper)
        .map_err(|e| PdfError::FontSubsetError(format!("{e:?}")))?;

    let mapping = std::iter::once(0)
        .chain(glyphs.iter().copied())
        .filter_map(|old| remapper.get(old).map(|new| (old, new)))
        .collect();

    Ok(GlyphSubset { data, mapping })
}

/// Collect the 2-byte codes drawn with each of the `targets` font objects
///
/// Scans page content, form XObjects reachable from it (recursively) and the
/// normal appearance streams of page annotations.
pub fn collect_used_glyphs(
    doc: &Document,
    targets: &HashSet<ObjectId>,
) -> HashMap<ObjectId, BTreeSet<u16>> {
    let mut used: HashMap<ObjectId, BTreeSet<u16>> = HashMap::new();
    if targets.is_empty() {
        return used;
    }

    let mut scanner = Scanner {
        doc,
        targets,
        used: &mut used,
        visited: HashSet::new(),
    };

    for (_, page_id) in doc.get_pages() {
        let resources = inherited_resources(doc, page_id);
        if let Ok(content) = doc.get_page_content(page_id) {
            scanner.scan(&content, resources.as_ref());
        }

        let annots = doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| page.get(b"Annots").ok())
            .and_then(|obj| resolve(doc, obj).as_array().ok())
            .cloned()
            .unwrap_or_default();

        for annot in annots {
            let Ok(annot) = resolve(doc, &annot).as_dict() else {
                continue;
            };
            let Some(normal) = annot
                .get(b"AP")
                .ok()
                .and_then(|ap| resolve(doc, ap).as_dict().ok())
                .and_then(|ap| ap.get(b"N").ok())
            else {
                continue;
            };
            scanner.scan_appearance(normal);
        }
    }

    used
}

struct Scanner<'a> {
    doc: &'a Document,
    targets: &'a HashSet<ObjectId>,
    used: &'a mut HashMap<ObjectId, BTreeSet<u16>>,
    visited: HashSet<ObjectId>,
}

impl Scanner<'_> {
    /// An /AP /N entry is either a stream or a dictionary of state streams
    fn scan_appearance(&mut self, normal: &Object) {
        match normal {
            Object::Reference(id) => {
                if let Ok(Object::Stream(_)) = self.doc.get_object(*id) {
                    self.scan_form(*id, None);
                } else if let Ok(Object::Dictionary(states)) = self.doc.get_object(*id) {
                    for (_, state) in states.iter() {
                        self.scan_appearance(state);
                    }
                }
            }
            Object::Dictionary(states) => {
                for (_, state) in states.iter() {
                    self.scan_appearance(state);
                }
            }
            _ => {}
        }
    }

    fn scan_form(&mut self, id: ObjectId, parent_resources: Option<&Dictionary>) {
        if !self.visited.insert(id) {
            return;
        }
        let Ok(Object::Stream(stream)) = self.doc.get_object(id) else {
            return;
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|s| s.as_name().ok())
            .map(|s| s == b"Form")
            .unwrap_or(true);
        if !is_form {
            return;
        }
        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve(self.doc, r).as_dict().ok())
            .cloned()
            .or_else(|| parent_resources.cloned());
        let content = match stream.decompressed_content() {
            Ok(content) => content,
            Err(_) => stream.content.clone(),
        };
        self.scan(&content, resources.as_ref());
    }

    fn scan(&mut self, content: &[u8], resources: Option<&Dictionary>) {
        let Ok(content) = Content::decode(content) else {
            log::debug!("skipping undecodable content stream during glyph scan");
            return;
        };

        let mut current: Option<ObjectId> = None;
        let mut saved: Vec<Option<ObjectId>> = Vec::new();

        for op in &content.operations {
            match op.operator.as_str() {
                "q" => saved.push(current),
                "Q" => current = saved.pop().unwrap_or(current),
                "Tf" => {
                    current = op
                        .operands
                        .first()
                        .and_then(|name| name.as_name().ok())
                        .and_then(|name| self.font_ref(resources, name))
                        .filter(|id| self.targets.contains(id));
                }
                "Tj" | "'" | "\"" | "TJ" => {
                    let Some(font_id) = current else {
                        continue;
                    };
                    let mut codes = Vec::new();
                    for operand in &op.operands {
                        collect_codes(operand, &mut codes);
                    }
                    self.used.entry(font_id).or_default().extend(codes);
                }
                "Do" => {
                    let xobject = op
                        .operands
                        .first()
                        .and_then(|name| name.as_name().ok())
                        .and_then(|name| self.resource_ref(resources, b"XObject", name));
                    if let Some(id) = xobject {
                        self.scan_form(id, resources);
                    }
                }
                _ => {}
            }
        }
    }

    fn font_ref(&self, resources: Option<&Dictionary>, name: &[u8]) -> Option<ObjectId> {
        self.resource_ref(resources, b"Font", name)
    }

    fn resource_ref(
        &self,
        resources: Option<&Dictionary>,
        category: &[u8],
        name: &[u8],
    ) -> Option<ObjectId> {
        resources?
            .get(category)
            .ok()
            .and_then(|c| resolve(self.doc, c).as_dict().ok())?
            .get(name)
            .ok()?
            .as_reference()
            .ok()
    }
}

/// Extract 2-byte codes from a string operand or a TJ array
fn collect_codes(operand: &Object, codes: &mut Vec<u16>) {
    match operand {
        Object::String(bytes, _) => {
            codes.extend(
                bytes
                    .chunks(2)
                    .filter(|pair| pair.len() == 2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
            );
        }
        Object::Array(items) => {
            for item in items {
                collect_codes(item, codes);
            }
        }
        _ => {}
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Page resources, following /Parent for inherited entries
pub(crate) fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve(doc, resources).as_dict().ok().cloned();
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > 64 {
            break;
        }
    }
    None
}
