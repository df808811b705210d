//! Flattening: widget appearances become page content
//!
//! Each visible widget's normal appearance is registered as a page XObject
//! and drawn with a `cm` that maps its (Matrix-transformed) BBox onto the
//! widget rectangle. The widgets then leave `/Annots`, their fields leave the
//! field tree, and an emptied form leaves the catalog.

use crate::appearance::AppearanceGenerator;
use crate::form::{acroform, acroform_mut, Form};
use crate::style::AppearanceStyle;
use crate::Result;
use lopdf::{Dictionary, Object, ObjectId};
use pdf_core::{Matrix, PdfDocument, Rect};
use std::collections::{BTreeMap, HashSet};

/// Counts from a flatten
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenReport {
    /// Widgets drawn into page content
    pub flattened: usize,
    /// Hidden widgets removed without drawing
    pub hidden: usize,
    /// Widgets removed that had nothing to draw
    pub without_appearance: usize,
    /// Terminal field objects removed from the form
    pub fields_removed: usize,
    /// Whether `/AcroForm` was removed from the catalog
    pub form_removed: bool,
}

/// Flatten every field of `form` into its page
pub fn flatten(
    doc: &mut PdfDocument,
    form: &Form,
    style: &AppearanceStyle,
) -> Result<FlattenReport> {
    let mut report = FlattenReport::default();

    let generated = AppearanceGenerator::new(style).generate_missing(doc, form)?;
    if generated > 0 {
        log::debug!("generated {generated} missing appearances before flattening");
    }

    let mut by_page: BTreeMap<u32, Vec<ObjectId>> = BTreeMap::new();
    let mut removed: HashSet<ObjectId> = HashSet::new();
    for (_, widget) in form.widgets() {
        removed.insert(widget.object_id);
        if widget.is_hidden() {
            report.hidden += 1;
            continue;
        }
        match widget.page {
            Some(page) => by_page.entry(page).or_default().push(widget.object_id),
            None => {
                log::warn!(
                    "widget of {} is on no page, removed",
                    form.field(widget.field).name
                );
                report.without_appearance += 1;
            }
        }
    }

    for (page, widgets) in &by_page {
        let mut ops = String::new();
        for widget in widgets {
            match place_appearance(doc, *page, *widget)? {
                Some(draw) => {
                    ops.push_str(&draw);
                    report.flattened += 1;
                }
                None => report.without_appearance += 1,
            }
        }
        if !ops.is_empty() {
            doc.wrap_and_append_content(*page, ops.as_bytes())?;
        }
    }

    for page in 1..=doc.page_count() as u32 {
        let annots = doc.page_annotations(page)?;
        let before = annots.len();
        let kept: Vec<Object> = annots
            .into_iter()
            .filter(|a| !matches!(a, Object::Reference(id) if removed.contains(id)))
            .collect();
        if kept.len() != before {
            doc.set_page_annotations(page, kept)?;
        }
    }

    for (_, field) in form.fields() {
        removed.extend(field.object_ids());
        report.fields_removed += field.object_ids().count();
    }
    report.form_removed = prune_field_tree(doc, &removed)?;

    log::info!(
        "flattened {} widgets ({} hidden, {} without appearance)",
        report.flattened,
        report.hidden,
        report.without_appearance
    );
    Ok(report)
}

/// Register a widget's appearance on `page` and return the operators that draw it
fn place_appearance(
    doc: &mut PdfDocument,
    page: u32,
    widget: ObjectId,
) -> Result<Option<String>> {
    let Some(appearance) = normal_appearance(doc, widget) else {
        return Ok(None);
    };
    let rect = doc
        .get_dictionary(widget)?
        .get(b"Rect")
        .ok()
        .and_then(|r| doc.resolve(r).as_array().ok())
        .and_then(|r| Rect::from_array(r));
    let Some(rect) = rect else {
        return Ok(None);
    };

    let stream_dict = doc.get_dictionary(appearance)?;
    let bbox = stream_dict
        .get(b"BBox")
        .ok()
        .and_then(|b| doc.resolve(b).as_array().ok())
        .and_then(|b| Rect::from_array(b))
        .unwrap_or(Rect::new(0.0, 0.0, rect.width(), rect.height()));
    let matrix = stream_dict
        .get(b"Matrix")
        .ok()
        .and_then(|m| doc.resolve(m).as_array().ok())
        .and_then(|m| Matrix::from_array(m))
        .unwrap_or_default();
    if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
        return Ok(None);
    }

    // Appearances written without a subtype still have to be drawable as forms
    let stream_dict = doc.get_dictionary_mut(appearance)?;
    if !stream_dict.has(b"Subtype") {
        stream_dict.set("Type", "XObject");
        stream_dict.set("Subtype", "Form");
    }

    let placement = Matrix::rect_to_rect(&matrix.transform_rect(&bbox), &rect);
    let name = doc.next_xobject_name(page)?;
    doc.add_xobject_to_page_resources(page, &name, appearance)?;

    Ok(Some(format!("q\n{}/{name} Do\nQ\n", placement.to_cm())))
}

/// Stream object of a widget's normal appearance, picking the `/AS` state when there are several
fn normal_appearance(doc: &PdfDocument, widget: ObjectId) -> Option<ObjectId> {
    let dict = doc.get_dictionary(widget).ok()?;
    let ap = doc.resolve_dict(dict.get(b"AP").ok()?)?;
    match ap.get(b"N").ok()? {
        Object::Reference(id) => match doc.inner().get_object(*id).ok()? {
            Object::Stream(_) => Some(*id),
            Object::Dictionary(states) => selected_state(dict, states),
            _ => None,
        },
        Object::Dictionary(states) => selected_state(dict, states),
        _ => None,
    }
}

fn selected_state(widget: &Dictionary, states: &Dictionary) -> Option<ObjectId> {
    let state: Vec<u8> = match widget.get(b"AS") {
        Ok(Object::Name(name)) => name.clone(),
        _ if states.len() == 1 => states.iter().next()?.0.clone(),
        _ => return None,
    };
    states.get(&state).ok()?.as_reference().ok()
}

/// Drop removed nodes from `/AcroForm /Fields`; returns whether the form itself went away
fn prune_field_tree(doc: &mut PdfDocument, removed: &HashSet<ObjectId>) -> Result<bool> {
    let Some(form_dict) = acroform(doc)? else {
        return Ok(false);
    };
    let fields = form_dict
        .get(b"Fields")
        .ok()
        .and_then(|f| doc.resolve(f).as_array().ok())
        .cloned()
        .unwrap_or_default();

    let mut visited = HashSet::new();
    let mut kept = Vec::new();
    for entry in fields {
        match entry {
            Object::Reference(id) if keep_node(doc, id, removed, &mut visited)? => {
                kept.push(entry)
            }
            Object::Reference(_) => {}
            other => kept.push(other),
        }
    }

    if kept.is_empty() {
        let catalog_id = doc.catalog_id()?;
        doc.get_dictionary_mut(catalog_id)?.remove(b"AcroForm");
        log::debug!("form is empty, /AcroForm removed");
        return Ok(true);
    }
    log::debug!("{} top-level fields remain", kept.len());
    if let Some(form_dict) = acroform_mut(doc)? {
        form_dict.set("Fields", Object::Array(kept));
    }
    Ok(false)
}

/// Whether a field node survives, rewriting its `/Kids` to the survivors
fn keep_node(
    doc: &mut PdfDocument,
    id: ObjectId,
    removed: &HashSet<ObjectId>,
    visited: &mut HashSet<ObjectId>,
) -> Result<bool> {
    if removed.contains(&id) || !visited.insert(id) {
        return Ok(false);
    }
    let kids = match doc.get_dictionary(id) {
        Ok(dict) => match dict.get(b"Kids") {
            Ok(kids) => doc.resolve(kids).as_array().ok().cloned(),
            Err(_) => None,
        },
        Err(_) => return Ok(false),
    };
    let Some(kids) = kids else {
        return Ok(true);
    };

    let mut kept = Vec::new();
    for kid in kids {
        match kid {
            Object::Reference(kid_id) if keep_node(doc, kid_id, removed, visited)? => {
                kept.push(kid)
            }
            Object::Reference(_) => {}
            other => kept.push(other),
        }
    }
    if kept.is_empty() {
        return Ok(false);
    }
    doc.get_dictionary_mut(id)?.set("Kids", Object::Array(kept));
    Ok(true)
}
