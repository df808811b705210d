//! PDF Document wrapper

use crate::font::{FontObjects, FontSource, PdfFont};
use crate::subset::{collect_used_glyphs, inherited_resources, subset_font};
use crate::{PdfError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

/// Handle to a font registered with [`PdfDocument::load_font`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontHandle(usize);

/// A segment of text with its associated font
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub text: String,
    pub font: FontHandle,
}

/// Options for writing a document
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    /// Reduce composite fonts to the glyphs drawn in the document
    pub subset_fonts: bool,
    /// Drop objects no longer reachable from the trailer
    pub prune: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            subset_fonts: true,
            prune: true,
        }
    }
}

struct RegisteredFont {
    font: PdfFont,
    object_id: ObjectId,
    resource_name: String,
}

/// PDF Document wrapper providing high-level operations
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Registered fonts, indexed by `FontHandle`
    fonts: Vec<RegisteredFont>,
    /// Font source -> handle (first registration wins)
    font_index: HashMap<FontSource, FontHandle>,
    /// Counter for font resource names (F1, F2, ...)
    next_font_resource: u32,
    /// Counter for XObject resource names (Fm1, Fm2, ...)
    next_xobject_resource: u32,
}

impl PdfDocument {
    /// Open a PDF document from a file path
    ///
    /// # Example
    /// ```ignore
    /// let doc = PdfDocument::open("form.pdf")?;
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = Document::load(path).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Open a PDF document from bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Wrap an already loaded lopdf document
    pub fn from_document(inner: Document) -> Self {
        Self {
            inner,
            fonts: Vec::new(),
            font_index: HashMap::new(),
            next_font_resource: 1,
            next_xobject_resource: 1,
        }
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Object ID of a page (1-indexed)
    pub fn page_id(&self, page: u32) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        pages
            .get(&page)
            .copied()
            .ok_or(PdfError::InvalidPage(page as usize, pages.len()))
    }

    /// Get all page object IDs in order
    pub fn get_page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().values().copied().collect()
    }

    /// Get reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    /// Get mutable reference to the underlying lopdf document
    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.inner
    }

    /// Follow a reference to the object it names
    pub fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.inner.get_object(*id).unwrap_or(object),
            _ => object,
        }
    }

    /// Resolve an object that should be a dictionary
    pub fn resolve_dict<'a>(&'a self, object: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(object) {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    /// Dictionary stored under an object ID (stream dictionaries included)
    pub fn get_dictionary(&self, id: ObjectId) -> Result<&Dictionary> {
        match self.inner.get_object(id)? {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&stream.dict),
            _ => Err(PdfError::ParseError(format!(
                "object {} {} is not a dictionary",
                id.0, id.1
            ))),
        }
    }

    /// Mutable dictionary stored under an object ID
    pub fn get_dictionary_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary> {
        match self.inner.get_object_mut(id)? {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&mut stream.dict),
            _ => Err(PdfError::ParseError(format!(
                "object {} {} is not a dictionary",
                id.0, id.1
            ))),
        }
    }

    /// Object ID of the document catalog
    pub fn catalog_id(&self) -> Result<ObjectId> {
        self.inner
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| PdfError::ParseError("trailer has no /Root reference".to_string()))
    }

    /// Add an object and return its ID
    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        self.inner.add_object(object)
    }

    // ------------------------------------------------------------------
    // Fonts
    // ------------------------------------------------------------------

    /// Register a font, returning the existing handle if the source was seen before
    ///
    /// Standard fonts get their dictionary right away. TrueType fonts get a
    /// placeholder object that is filled in by [`PdfDocument::embed_fonts`].
    pub fn load_font(&mut self, source: &FontSource) -> Result<FontHandle> {
        if let Some(handle) = self.font_index.get(source) {
            return Ok(*handle);
        }

        let font = PdfFont::load(source)?;
        let object_id = match &font {
            PdfFont::Standard(standard) => self.inner.add_object(standard.to_dictionary()),
            PdfFont::TrueType(_) => self
                .inner
                .add_object(lopdf::dictionary! { "Type" => "Font" }),
        };

        let resource_name = self.next_font_resource_name();
        log::debug!("registered font {source} as /{resource_name}");

        let handle = FontHandle(self.fonts.len());
        self.fonts.push(RegisteredFont {
            font,
            object_id,
            resource_name,
        });
        self.font_index.insert(source.clone(), handle);
        Ok(handle)
    }

    /// Pick the next "F{n}" name not already used by the form's default resources
    fn next_font_resource_name(&mut self) -> String {
        let taken = self.acroform_font_names();
        loop {
            let name = format!("F{}", self.next_font_resource);
            self.next_font_resource += 1;
            if !taken.contains(name.as_bytes()) {
                return name;
            }
        }
    }

    fn acroform_font_names(&self) -> HashSet<Vec<u8>> {
        let names = || -> Option<HashSet<Vec<u8>>> {
            let catalog = self.get_dictionary(self.catalog_id().ok()?).ok()?;
            let acroform = self.resolve_dict(catalog.get(b"AcroForm").ok()?)?;
            let dr = self.resolve_dict(acroform.get(b"DR").ok()?)?;
            let fonts = self.resolve_dict(dr.get(b"Font").ok()?)?;
            Some(fonts.iter().map(|(k, _)| k.clone()).collect())
        };
        names().unwrap_or_default()
    }

    pub fn font(&self, handle: FontHandle) -> &PdfFont {
        &self.fonts[handle.0].font
    }

    pub fn font_mut(&mut self, handle: FontHandle) -> &mut PdfFont {
        &mut self.fonts[handle.0].font
    }

    /// Resource name used for the font in content streams (e.g. "F1")
    pub fn font_resource_name(&self, handle: FontHandle) -> &str {
        &self.fonts[handle.0].resource_name
    }

    /// Object ID of the top-level font dictionary
    pub fn font_object_id(&self, handle: FontHandle) -> ObjectId {
        self.fonts[handle.0].object_id
    }

    /// Split text into runs by font
    ///
    /// Characters missing from `primary` use `fallback`; a character neither
    /// font can draw is an error. Consecutive characters with the same font
    /// form one segment.
    pub fn segment_text(
        &self,
        text: &str,
        primary: FontHandle,
        fallback: Option<FontHandle>,
    ) -> Result<Vec<TextSegment>> {
        let mut segments: Vec<TextSegment> = Vec::new();

        for c in text.chars() {
            let font_for_char = if self.font(primary).has_glyph(c) {
                primary
            } else {
                match fallback.filter(|fb| self.font(*fb).has_glyph(c)) {
                    Some(fb) => fb,
                    None => {
                        return Err(PdfError::UnsupportedGlyph {
                            ch: c,
                            font: self.font(primary).name().to_string(),
                        })
                    }
                }
            };

            match segments.last_mut() {
                Some(last) if last.font == font_for_char => last.text.push(c),
                _ => segments.push(TextSegment {
                    text: c.to_string(),
                    font: font_for_char,
                }),
            }
        }

        Ok(segments)
    }

    /// Write every registered font's objects
    ///
    /// Composite fonts are subsetted to the codes found in the document when
    /// `subset` is set. A font the subsetter rejects is embedded whole.
    pub fn embed_fonts(&mut self, subset: bool) -> Result<()> {
        let composite_ids: HashSet<ObjectId> = self
            .fonts
            .iter()
            .filter(|f| f.font.is_composite())
            .map(|f| f.object_id)
            .collect();

        let used = if subset {
            collect_used_glyphs(&self.inner, &composite_ids)
        } else {
            HashMap::new()
        };

        for index in 0..self.fonts.len() {
            let object_id = self.fonts[index].object_id;
            let objects = match &self.fonts[index].font {
                PdfFont::Standard(standard) => {
                    self.inner
                        .objects
                        .insert(object_id, Object::Dictionary(standard.to_dictionary()));
                    continue;
                }
                PdfFont::TrueType(data) => {
                    let glyph_subset = match used.get(&object_id) {
                        Some(gids) if subset && !gids.is_empty() => {
                            match subset_font(&data.ttf_data, gids) {
                                Ok(s) => {
                                    log::info!(
                                        "subset font {} to {} glyphs ({} -> {} bytes)",
                                        data.name,
                                        s.mapping.len(),
                                        data.ttf_data.len(),
                                        s.data.len()
                                    );
                                    Some(s)
                                }
                                Err(e) => {
                                    log::warn!("embedding full font {}: {e}", data.name);
                                    None
                                }
                            }
                        }
                        _ => None,
                    };
                    data.to_pdf_objects(glyph_subset.as_ref())?
                }
            };
            self.embed_font_objects(object_id, objects);
        }

        Ok(())
    }

    /// Add the font's objects and link them under the registered font ID
    fn embed_font_objects(&mut self, font_id: ObjectId, objects: FontObjects) {
        let font_file_id = self.inner.add_object(objects.font_file_stream);

        let mut font_descriptor = objects.font_descriptor;
        font_descriptor.set("FontFile2", Object::Reference(font_file_id));
        let font_descriptor_id = self.inner.add_object(font_descriptor);

        let mut font = objects.font;
        match objects.cid_font {
            Some(mut cid_font) => {
                cid_font.set("FontDescriptor", Object::Reference(font_descriptor_id));
                if let Some(map) = objects.cid_to_gid_stream {
                    let map_id = self.inner.add_object(map);
                    cid_font.set("CIDToGIDMap", Object::Reference(map_id));
                }
                let cid_font_id = self.inner.add_object(cid_font);
                font.set(
                    "DescendantFonts",
                    Object::Array(vec![Object::Reference(cid_font_id)]),
                );
            }
            None => font.set("FontDescriptor", Object::Reference(font_descriptor_id)),
        }

        if let Some(tounicode) = objects.tounicode_stream {
            let tounicode_id = self.inner.add_object(tounicode);
            font.set("ToUnicode", Object::Reference(tounicode_id));
        }

        self.inner.objects.insert(font_id, Object::Dictionary(font));
    }

    // ------------------------------------------------------------------
    // Pages
    // ------------------------------------------------------------------

    /// Resources of a page, following inheritance from parent page tree nodes
    pub fn page_resources(&self, page: u32) -> Result<Dictionary> {
        let page_id = self.page_id(page)?;
        Ok(inherited_resources(&self.inner, page_id).unwrap_or_default())
    }

    /// Allocate an XObject resource name not used by the page yet
    pub fn next_xobject_name(&mut self, page: u32) -> Result<String> {
        let resources = self.page_resources(page)?;
        let existing = resources
            .get(b"XObject")
            .ok()
            .and_then(|x| self.resolve_dict(x))
            .cloned()
            .unwrap_or_default();
        loop {
            let name = format!("Fm{}", self.next_xobject_resource);
            self.next_xobject_resource += 1;
            if !existing.has(name.as_bytes()) {
                return Ok(name);
            }
        }
    }

    /// Add an XObject to a page's Resources dictionary
    ///
    /// Inherited or indirect resources are copied into the page first.
    pub fn add_xobject_to_page_resources(
        &mut self,
        page: u32,
        resource_name: &str,
        object_id: ObjectId,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        let mut resources_dict = self.page_resources(page)?;

        let mut xobject_dict = resources_dict
            .get(b"XObject")
            .ok()
            .and_then(|x| self.resolve_dict(x))
            .cloned()
            .unwrap_or_default();
        xobject_dict.set(resource_name.as_bytes(), Object::Reference(object_id));
        resources_dict.set(b"XObject", Object::Dictionary(xobject_dict));

        let page_dict = self.get_dictionary_mut(page_id)?;
        page_dict.set(b"Resources", Object::Dictionary(resources_dict));

        Ok(())
    }

    /// Decompressed content of a page (all streams concatenated)
    pub fn page_content(&self, page: u32) -> Result<Vec<u8>> {
        let page_id = self.page_id(page)?;
        let page_dict = self.get_dictionary(page_id)?;

        let stream_bytes = |stream: &Stream| {
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone())
        };

        let content = match page_dict.get(b"Contents") {
            Ok(Object::Stream(stream)) => stream_bytes(stream),
            Ok(Object::Reference(ref_id)) => match self.inner.get_object(*ref_id) {
                Ok(Object::Stream(stream)) => stream_bytes(stream),
                Ok(Object::Array(arr)) => self.concat_streams(arr),
                _ => Vec::new(),
            },
            Ok(Object::Array(arr)) => self.concat_streams(arr),
            _ => Vec::new(),
        };

        Ok(content)
    }

    fn concat_streams(&self, parts: &[Object]) -> Vec<u8> {
        let mut combined = Vec::new();
        for part in parts {
            if let Object::Stream(stream) = self.resolve(part) {
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                combined.extend_from_slice(&data);
                // Streams may end mid-token without a separator
                combined.push(b'\n');
            }
        }
        combined
    }

    /// Isolate the existing page content in `q ... Q` and append `content`
    pub fn wrap_and_append_content(&mut self, page: u32, content: &[u8]) -> Result<()> {
        let page_id = self.page_id(page)?;
        let existing = self.page_content(page)?;

        let mut new_content = Vec::with_capacity(existing.len() + content.len() + 8);
        new_content.extend_from_slice(b"q\n");
        new_content.extend_from_slice(&existing);
        new_content.extend_from_slice(b"\nQ\n");
        new_content.extend_from_slice(content);

        let stream_id = self
            .inner
            .add_object(Stream::new(Dictionary::new(), new_content));

        let page_dict = self.get_dictionary_mut(page_id)?;
        page_dict.set(b"Contents", Object::Reference(stream_id));

        Ok(())
    }

    /// Entries of a page's /Annots array (references kept as references)
    pub fn page_annotations(&self, page: u32) -> Result<Vec<Object>> {
        let page_id = self.page_id(page)?;
        let page_dict = self.get_dictionary(page_id)?;
        Ok(match page_dict.get(b"Annots") {
            Ok(annots) => self
                .resolve(annots)
                .as_array()
                .cloned()
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        })
    }

    /// Replace a page's /Annots; an empty list removes the entry
    pub fn set_page_annotations(&mut self, page: u32, annots: Vec<Object>) -> Result<()> {
        let page_id = self.page_id(page)?;
        let page_dict = self.get_dictionary_mut(page_id)?;
        if annots.is_empty() {
            page_dict.remove(b"Annots");
        } else {
            page_dict.set(b"Annots", Object::Array(annots));
        }
        Ok(())
    }

    /// Page number (1-indexed) for every annotation referenced from a page
    pub fn annotation_pages(&self) -> HashMap<ObjectId, u32> {
        let mut map = HashMap::new();
        for (page, _) in self.inner.get_pages() {
            for annot in self.page_annotations(page).unwrap_or_default() {
                if let Object::Reference(id) = annot {
                    map.insert(id, page);
                }
            }
        }
        map
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Save the document to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P, options: &SaveOptions) -> Result<()> {
        let mut file = std::fs::File::create(path.as_ref())
            .map_err(|e| PdfError::SaveError(format!("{}: {e}", path.as_ref().display())))?;
        self.save_to(&mut file, options)
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self, options: &SaveOptions) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.save_to(&mut buffer, options)?;
        Ok(buffer)
    }

    /// Finalize fonts, prune and serialize into `sink`
    pub fn save_to<W: Write>(&mut self, sink: &mut W, options: &SaveOptions) -> Result<()> {
        self.embed_fonts(options.subset_fonts)?;

        if options.prune {
            let removed = self.inner.prune_objects();
            log::debug!("pruned {} unreachable objects", removed.len());
        }

        self.inner
            .save_to(sink)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(())
    }
}
