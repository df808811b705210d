//! Form model
//!
//! The `/AcroForm` field tree is read once into an arena: fields and widgets
//! live in flat vectors and refer to each other through [`FieldId`] and
//! [`WidgetId`]. Only terminal fields (the ones that carry a value) are kept;
//! their full names join the partial names of their ancestors with `.`.

use crate::data::FieldValue;
use crate::Result;
use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use pdf_core::geometry::number;
use pdf_core::{Align, PdfDocument, Rect};
use std::collections::{HashMap, HashSet};

/// Field flag bits (`/Ff`)
pub mod flags {
    pub const READ_ONLY: u32 = 1;
    pub const MULTILINE: u32 = 1 << 12;
    pub const PASSWORD: u32 = 1 << 13;
    pub const NO_TOGGLE_TO_OFF: u32 = 1 << 14;
    pub const RADIO: u32 = 1 << 15;
    pub const PUSHBUTTON: u32 = 1 << 16;
    pub const COMBO: u32 = 1 << 17;
    pub const MULTI_SELECT: u32 = 1 << 21;
    pub const COMB: u32 = 1 << 24;
}

/// Annotation flag: do not display or print
pub const ANNOT_HIDDEN: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    PushButton,
    Combo,
    ListBox,
    Signature,
}

impl FieldKind {
    /// Classify a field from its `/FT` name and `/Ff` flags
    pub fn classify(field_type: &[u8], ff: u32) -> Option<Self> {
        match field_type {
            b"Tx" => Some(FieldKind::Text),
            b"Btn" if ff & flags::PUSHBUTTON != 0 => Some(FieldKind::PushButton),
            b"Btn" if ff & flags::RADIO != 0 => Some(FieldKind::Radio),
            b"Btn" => Some(FieldKind::Checkbox),
            b"Ch" if ff & flags::COMBO != 0 => Some(FieldKind::Combo),
            b"Ch" => Some(FieldKind::ListBox),
            b"Sig" => Some(FieldKind::Signature),
            _ => None,
        }
    }

    /// Fields whose appearance is drawn text
    pub fn is_textual(self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::Combo | FieldKind::ListBox)
    }

    pub fn is_toggle(self) -> bool {
        matches!(self, FieldKind::Checkbox | FieldKind::Radio)
    }
}

/// Entry of a choice field's `/Opt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub export: String,
    pub display: String,
}

/// A terminal form field
#[derive(Debug, Clone)]
pub struct Field {
    /// Fully qualified name
    pub name: String,
    /// Object holding `/V`
    pub object_id: ObjectId,
    /// Other field objects with the same full name, sharing the value
    pub merged: Vec<ObjectId>,
    pub kind: FieldKind,
    /// `/Ff`, inherited
    pub flags: u32,
    pub widgets: Vec<WidgetId>,
    pub max_len: Option<usize>,
    /// `/Q`, inherited from ancestors or the form default
    pub align: Align,
    /// `/DA`, inherited from ancestors or the form default
    pub da: Option<String>,
    pub options: Vec<ChoiceOption>,
    /// Value found in the document
    pub value: Option<FieldValue>,
}

impl Field {
    /// Every object carrying this field's `/V`
    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        std::iter::once(self.object_id).chain(self.merged.iter().copied())
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn is_multiline(&self) -> bool {
        self.kind == FieldKind::Text && self.has_flag(flags::MULTILINE)
    }

    pub fn is_password(&self) -> bool {
        self.kind == FieldKind::Text && self.has_flag(flags::PASSWORD)
    }

    /// Comb cells are only laid out for plain single-line text with a `MaxLen`
    pub fn comb_cells(&self) -> Option<usize> {
        let plain = self.kind == FieldKind::Text
            && self.has_flag(flags::COMB)
            && !self.has_flag(flags::MULTILINE | flags::PASSWORD);
        match self.max_len {
            Some(cells) if plain && cells > 0 => Some(cells),
            _ => None,
        }
    }

    /// Display text for an export value of a choice field
    pub fn display_for(&self, export: &str) -> String {
        self.options
            .iter()
            .find(|o| o.export == export)
            .map(|o| o.display.clone())
            .unwrap_or_else(|| export.to_string())
    }
}

/// A widget annotation of a field
#[derive(Debug, Clone)]
pub struct Widget {
    pub object_id: ObjectId,
    pub field: FieldId,
    /// 1-indexed page, `None` when no page lists the widget
    pub page: Option<u32>,
    pub rect: Rect,
    /// Annotation flags (`/F`)
    pub annot_flags: u32,
}

impl Widget {
    pub fn is_hidden(&self) -> bool {
        self.annot_flags & ANNOT_HIDDEN != 0
    }
}

/// Terminal fields and widgets of a document's interactive form
#[derive(Debug, Clone, Default)]
pub struct Form {
    fields: Vec<Field>,
    widgets: Vec<Widget>,
    by_name: HashMap<String, FieldId>,
}

/// Attributes inherited down the field tree
#[derive(Debug, Clone, Default)]
struct Inherited {
    field_type: Option<Vec<u8>>,
    ff: Option<i64>,
    value: Option<Object>,
    da: Option<String>,
    q: Option<i64>,
    max_len: Option<i64>,
    opt: Option<Vec<Object>>,
}

impl Inherited {
    fn overlay(&self, doc: &PdfDocument, dict: &Dictionary) -> Self {
        let get = |key: &[u8]| dict.get(key).ok().map(|o| doc.resolve(o).clone());
        let mut next = self.clone();
        if let Some(Object::Name(name)) = get(b"FT") {
            next.field_type = Some(name);
        }
        if let Some(Object::Integer(ff)) = get(b"Ff") {
            next.ff = Some(ff);
        }
        if let Some(value) = get(b"V") {
            next.value = Some(value);
        }
        if let Some(Object::String(bytes, _)) = get(b"DA") {
            next.da = Some(decode_text_string(&bytes));
        }
        if let Some(Object::Integer(q)) = get(b"Q") {
            next.q = Some(q);
        }
        if let Some(Object::Integer(max_len)) = get(b"MaxLen") {
            next.max_len = Some(max_len);
        }
        if let Some(Object::Array(opt)) = get(b"Opt") {
            next.opt = Some(opt);
        }
        next
    }
}

struct Loader<'a> {
    doc: &'a PdfDocument,
    form: Form,
    visited: HashSet<ObjectId>,
    annotation_pages: HashMap<ObjectId, u32>,
    page_numbers: HashMap<ObjectId, u32>,
}

impl Form {
    /// Read the form of `doc`, `None` when the catalog has no `/AcroForm`
    pub fn load(doc: &PdfDocument) -> Result<Option<Form>> {
        let Some(acroform) = acroform(doc)? else {
            return Ok(None);
        };

        let mut root = Inherited::default();
        if let Ok(Object::String(bytes, _)) = acroform.get(b"DA").map(|o| doc.resolve(o)) {
            root.da = Some(decode_text_string(bytes));
        }
        if let Ok(Object::Integer(q)) = acroform.get(b"Q").map(|o| doc.resolve(o)) {
            root.q = Some(*q);
        }

        let fields = acroform
            .get(b"Fields")
            .ok()
            .and_then(|o| doc.resolve(o).as_array().ok())
            .cloned()
            .unwrap_or_default();

        let mut loader = Loader {
            doc,
            form: Form::default(),
            visited: HashSet::new(),
            annotation_pages: doc.annotation_pages(),
            page_numbers: doc
                .inner()
                .get_pages()
                .into_iter()
                .map(|(number, id)| (id, number))
                .collect(),
        };
        for entry in &fields {
            match entry {
                Object::Reference(id) => loader.walk(*id, "", &root),
                other => log::warn!("skipping inline field entry {other:?}"),
            }
        }

        let form = loader.form;
        log::info!(
            "form has {} fields and {} widgets",
            form.fields.len(),
            form.widgets.len()
        );
        Ok(Some(form))
    }

    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &Field)> {
        self.fields.iter().enumerate().map(|(i, f)| (FieldId(i), f))
    }

    pub fn widgets(&self) -> impl Iterator<Item = (WidgetId, &Widget)> {
        self.widgets.iter().enumerate().map(|(i, w)| (WidgetId(i), w))
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.fields[id.0]
    }

    pub fn widget(&self, id: WidgetId) -> &Widget {
        &self.widgets[id.0]
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|id| self.field(*id))
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.by_name.get(name).copied()
    }

    /// Field owning a widget
    pub fn field_of(&self, widget: WidgetId) -> &Field {
        self.field(self.widget(widget).field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }
}

impl Loader<'_> {
    fn walk(&mut self, node_id: ObjectId, parent_name: &str, inherited: &Inherited) {
        let doc = self.doc;
        if !self.visited.insert(node_id) {
            log::warn!("field tree cycle at {node_id:?}");
            return;
        }
        let Ok(dict) = doc.get_dictionary(node_id) else {
            log::warn!("field {node_id:?} is not a dictionary");
            return;
        };

        let partial = match dict.get(b"T").map(|o| doc.resolve(o)) {
            Ok(Object::String(bytes, _)) => decode_text_string(bytes),
            _ => String::new(),
        };
        let name = match (parent_name.is_empty(), partial.is_empty()) {
            (true, _) => partial,
            (false, true) => parent_name.to_string(),
            (false, false) => format!("{parent_name}.{partial}"),
        };
        let attrs = inherited.overlay(doc, dict);

        let kids: Vec<ObjectId> = dict
            .get(b"Kids")
            .ok()
            .and_then(|o| doc.resolve(o).as_array().ok())
            .map(|kids| kids.iter().filter_map(|k| k.as_reference().ok()).collect())
            .unwrap_or_default();

        // Kids without /T are this field's widgets; kids with /T are child fields
        let mut widget_ids = Vec::new();
        let mut child_fields = Vec::new();
        for kid in kids {
            match doc.get_dictionary(kid) {
                Ok(kid_dict) if kid_dict.has(b"T") => child_fields.push(kid),
                Ok(_) => widget_ids.push(kid),
                Err(_) => log::warn!("skipping kid {kid:?} of {name}"),
            }
        }
        if child_fields.is_empty() && widget_ids.is_empty() && is_widget(dict) {
            widget_ids.push(node_id);
        }

        for child in child_fields {
            self.walk(child, &name, &attrs);
        }

        let is_terminal = !widget_ids.is_empty() || (!dict.has(b"Kids") && attrs.field_type.is_some());
        if is_terminal {
            self.add_field(node_id, name, &attrs, widget_ids);
        }
    }

    fn add_field(
        &mut self,
        object_id: ObjectId,
        name: String,
        attrs: &Inherited,
        widget_ids: Vec<ObjectId>,
    ) {
        let ff = attrs.ff.unwrap_or(0) as u32;
        let Some(kind) = attrs
            .field_type
            .as_deref()
            .and_then(|ft| FieldKind::classify(ft, ff))
        else {
            log::warn!("field {name} has no usable /FT, skipped");
            return;
        };
        if let Some(&existing) = self.form.by_name.get(&name) {
            if self.form.fields[existing.0].kind != kind {
                log::warn!("field {name} is defined twice with different types");
            }
            log::debug!("merging second definition of {name}");
            let widgets = self.read_widgets(widget_ids, existing);
            let field = &mut self.form.fields[existing.0];
            field.merged.push(object_id);
            field.widgets.extend(widgets);
            return;
        }

        let id = FieldId(self.form.fields.len());
        let widgets = self.read_widgets(widget_ids, id);

        let options = attrs
            .opt
            .as_deref()
            .map(|opt| parse_options(self.doc, opt))
            .unwrap_or_default();
        let value = attrs
            .value
            .as_ref()
            .and_then(|v| read_value(self.doc, v, kind));

        log::debug!("field {name}: {kind:?}, {} widgets", widgets.len());
        self.form.by_name.insert(name.clone(), id);
        self.form.fields.push(Field {
            name,
            object_id,
            merged: Vec::new(),
            kind,
            flags: ff,
            widgets,
            max_len: attrs.max_len.filter(|n| *n > 0).map(|n| n as usize),
            align: Align::from_quadding(attrs.q.unwrap_or(0)),
            da: attrs.da.clone(),
            options,
            value,
        });
    }

    /// Add the readable widgets among `object_ids` to the arena
    fn read_widgets(&mut self, object_ids: Vec<ObjectId>, field: FieldId) -> Vec<WidgetId> {
        let mut widgets = Vec::with_capacity(object_ids.len());
        for object_id in object_ids {
            if let Some(widget) = self.read_widget(object_id, field) {
                widgets.push(WidgetId(self.form.widgets.len()));
                self.form.widgets.push(widget);
            }
        }
        widgets
    }

    fn read_widget(&self, object_id: ObjectId, field: FieldId) -> Option<Widget> {
        let dict = self.doc.get_dictionary(object_id).ok()?;
        let rect = dict
            .get(b"Rect")
            .ok()
            .and_then(|r| self.doc.resolve(r).as_array().ok())
            .and_then(|r| Rect::from_array(r));
        let Some(rect) = rect else {
            log::warn!("widget {object_id:?} has no /Rect, skipped");
            return None;
        };

        let page = self.annotation_pages.get(&object_id).copied().or_else(|| {
            dict.get(b"P")
                .ok()
                .and_then(|p| p.as_reference().ok())
                .and_then(|p| self.page_numbers.get(&p).copied())
        });
        let annot_flags = dict
            .get(b"F")
            .ok()
            .and_then(|f| self.doc.resolve(f).as_i64().ok())
            .unwrap_or(0) as u32;

        Some(Widget {
            object_id,
            field,
            page,
            rect,
            annot_flags,
        })
    }
}

fn is_widget(dict: &Dictionary) -> bool {
    match dict.get(b"Subtype") {
        Ok(Object::Name(name)) => name == b"Widget",
        _ => dict.has(b"Rect"),
    }
}

fn parse_options(doc: &PdfDocument, opt: &[Object]) -> Vec<ChoiceOption> {
    opt.iter()
        .filter_map(|entry| match doc.resolve(entry) {
            Object::String(bytes, _) => {
                let text = decode_text_string(bytes);
                Some(ChoiceOption {
                    export: text.clone(),
                    display: text,
                })
            }
            Object::Array(pair) if pair.len() == 2 => {
                match (doc.resolve(&pair[0]), doc.resolve(&pair[1])) {
                    (Object::String(export, _), Object::String(display, _)) => {
                        Some(ChoiceOption {
                            export: decode_text_string(export),
                            display: decode_text_string(display),
                        })
                    }
                    _ => None,
                }
            }
            _ => None,
        })
        .collect()
}

fn read_value(doc: &PdfDocument, value: &Object, kind: FieldKind) -> Option<FieldValue> {
    match (doc.resolve(value), kind) {
        (Object::Name(name), FieldKind::Checkbox) => Some(FieldValue::Flag(name != b"Off")),
        (Object::Name(name), _) => Some(FieldValue::Text(
            String::from_utf8_lossy(name).into_owned(),
        )),
        (Object::String(bytes, _), FieldKind::ListBox) => {
            Some(FieldValue::Selection(vec![decode_text_string(bytes)]))
        }
        (Object::String(bytes, _), _) => Some(FieldValue::Text(decode_text_string(bytes))),
        (Object::Array(items), _) => Some(FieldValue::Selection(
            items
                .iter()
                .filter_map(|item| match doc.resolve(item) {
                    Object::String(bytes, _) => Some(decode_text_string(bytes)),
                    _ => None,
                })
                .collect(),
        )),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, else PDFDocEncoding
///
/// PDFDocEncoding is read as Latin-1, which agrees with it for printable text.
pub fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|b| char::from(*b)).collect(),
    }
}

/// Encode a text string: ASCII stays as is, anything else becomes UTF-16BE
pub fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Read a numeric entry
pub(crate) fn dict_number(doc: &PdfDocument, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    dict.get(key).ok().and_then(|o| number(doc.resolve(o)))
}

/// The `/AcroForm` dictionary, if the catalog has one
pub(crate) fn acroform(doc: &PdfDocument) -> Result<Option<&Dictionary>> {
    let catalog = doc.get_dictionary(doc.catalog_id()?)?;
    Ok(catalog
        .get(b"AcroForm")
        .ok()
        .and_then(|o| doc.resolve_dict(o)))
}

/// Mutable `/AcroForm` dictionary, wherever it lives
pub(crate) fn acroform_mut(doc: &mut PdfDocument) -> Result<Option<&mut Dictionary>> {
    let catalog_id = doc.catalog_id()?;
    let reference = match doc.get_dictionary(catalog_id)?.get(b"AcroForm") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => return Ok(None),
    };
    match reference {
        Some(id) => Ok(Some(doc.get_dictionary_mut(id)?)),
        None => {
            let catalog = doc.get_dictionary_mut(catalog_id)?;
            Ok(catalog
                .get_mut(b"AcroForm")
                .ok()
                .and_then(|o| o.as_dict_mut().ok()))
        }
    }
}
