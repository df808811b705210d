//! Field filling and appearance generation
//!
//! Values go into `/V` (and `/AS` for buttons); every affected widget then gets
//! a fresh normal appearance: a Form XObject sized to the widget, clipped to
//! its box and drawn with the font the style picks for the field.

use crate::data::{FieldValue, FieldValueMap};
use crate::form::{
    acroform, acroform_mut, decode_text_string, dict_number, encode_text_string, Field, FieldId,
    FieldKind, Form, WidgetId,
};
use crate::layout::{layout_text, DefaultAppearance, LayoutParams};
use crate::style::{AppearanceStyle, FontSpec};
use crate::Result;
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};
use pdf_core::geometry::fmt_num;
use pdf_core::{
    generate_text_operators, Align, Color, FontHandle, PdfDocument, Rect, TextRenderContext,
    TextRun,
};

/// Counts from a fill
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Fields that received a value
    pub filled: usize,
    /// Fields with no entry in the data
    pub unchanged: usize,
    /// Data entries naming no field
    pub missing: Vec<String>,
    /// Widget appearances generated
    pub regenerated: usize,
    /// Widgets whose existing appearance was kept
    pub skipped: usize,
}

/// Fonts resolved for one field
#[derive(Debug, Clone, Copy)]
struct FieldFonts {
    primary: FontHandle,
    fallback: Option<FontHandle>,
    size: Option<f32>,
}

/// Background and border from a widget's `/MK` and `/BS`
#[derive(Debug, Clone, Copy, Default)]
struct Decoration {
    background: Option<Color>,
    border: Option<Color>,
    border_width: f64,
}

impl Decoration {
    fn read(doc: &PdfDocument, widget: &Dictionary) -> Self {
        let mk = widget.get(b"MK").ok().and_then(|o| doc.resolve_dict(o));
        let color = |key: &[u8]| {
            mk.and_then(|mk| mk.get(key).ok())
                .and_then(|o| doc.resolve(o).as_array().ok())
                .and_then(|c| color_from_array(c))
        };
        let border_width = widget
            .get(b"BS")
            .ok()
            .and_then(|o| doc.resolve_dict(o))
            .and_then(|bs| dict_number(doc, bs, b"W"))
            .unwrap_or(1.0);
        Self {
            background: color(b"BG"),
            border: color(b"BC"),
            border_width,
        }
    }

    fn draw(&self, width: f64, height: f64) -> String {
        let mut ops = String::new();
        if let Some(bg) = self.background {
            ops.push_str(&bg.fill_operator());
            ops.push_str(&format!("0 0 {} {} re f\n", fmt_num(width), fmt_num(height)));
        }
        if let Some(bc) = self.border.filter(|_| self.border_width > 0.0) {
            let half = self.border_width / 2.0;
            ops.push_str(&stroke_operator(&bc));
            ops.push_str(&format!("{} w\n", fmt_num(self.border_width)));
            ops.push_str(&format!(
                "{} {} {} {} re S\n",
                fmt_num(half),
                fmt_num(half),
                fmt_num(width - self.border_width),
                fmt_num(height - self.border_width)
            ));
        }
        ops
    }
}

/// Fills values and builds widget appearances with a given style
pub struct AppearanceGenerator<'a> {
    style: &'a AppearanceStyle,
}

impl<'a> AppearanceGenerator<'a> {
    pub fn new(style: &'a AppearanceStyle) -> Self {
        Self { style }
    }

    /// Put `values` into the form and regenerate the affected appearances
    pub fn fill(
        &self,
        doc: &mut PdfDocument,
        form: &mut Form,
        values: &FieldValueMap,
    ) -> Result<FillReport> {
        let mut report = FillReport::default();

        for (name, _) in values.iter() {
            if form.field_id(name).is_none() {
                log::warn!("no field named {name:?} in the form");
                report.missing.push(name.to_string());
            }
        }

        let ids: Vec<FieldId> = form.fields().map(|(id, _)| id).collect();
        for id in ids {
            let name = form.field(id).name.clone();
            match values.get(&name) {
                Some(value) => {
                    if self.set_value(doc, form, id, value)? {
                        report.filled += 1;
                    }
                }
                None => {
                    report.unchanged += 1;
                    if !self.style.force_replace {
                        continue;
                    }
                }
            }
            self.refresh_field(doc, form, id, &mut report)?;
        }

        if report.regenerated > 0 {
            if let Some(acroform) = acroform_mut(doc)? {
                acroform.set("NeedAppearances", false);
            }
        }
        log::info!(
            "filled {} fields, regenerated {} appearances, kept {}",
            report.filled,
            report.regenerated,
            report.skipped
        );
        Ok(report)
    }

    /// Give every widget without a normal appearance one
    pub fn generate_missing(&self, doc: &mut PdfDocument, form: &Form) -> Result<usize> {
        let mut generated = 0;
        for (widget_id, widget) in form.widgets() {
            let field = form.field(widget.field);
            if has_normal_appearance(doc, widget.object_id) {
                continue;
            }
            if field.kind.is_textual() {
                self.text_appearance(doc, form, widget_id)?;
                generated += 1;
            } else if field.kind.is_toggle() {
                let index = field.widgets.iter().position(|w| *w == widget_id).unwrap_or(0);
                let on = on_state(doc, field, widget.object_id, index);
                self.toggle_appearance(doc, field, widget.object_id, &on)?;
                generated += 1;
            }
        }
        Ok(generated)
    }

    /// Write `value` into the document; `false` when the field takes no value
    fn set_value(
        &self,
        doc: &mut PdfDocument,
        form: &mut Form,
        id: FieldId,
        value: &FieldValue,
    ) -> Result<bool> {
        let field = form.field(id);
        let stored = match field.kind {
            FieldKind::Text | FieldKind::Combo => {
                let text = match value {
                    FieldValue::Selection(items) if field.kind == FieldKind::Combo => {
                        items.first().cloned().unwrap_or_default()
                    }
                    other => other.display_text(),
                };
                set_field_value(doc, field, encode_text_string(&text))?;
                FieldValue::Text(text)
            }
            FieldKind::ListBox => {
                let items = match value {
                    FieldValue::Selection(items) => items.clone(),
                    other => vec![other.display_text()],
                };
                let v = match items.as_slice() {
                    [single] => encode_text_string(single),
                    _ => Object::Array(items.iter().map(|s| encode_text_string(s)).collect()),
                };
                set_field_value(doc, field, v)?;
                FieldValue::Selection(items)
            }
            FieldKind::Checkbox | FieldKind::Radio => {
                let widgets: Vec<ObjectId> = field
                    .widgets
                    .iter()
                    .map(|w| form.widget(*w).object_id)
                    .collect();
                self.set_toggle(doc, field, &widgets, value)?
            }
            FieldKind::PushButton | FieldKind::Signature => {
                log::warn!("field {} ({:?}) takes no value", field.name, field.kind);
                return Ok(false);
            }
        };
        log::debug!("set {} = {stored:?}", form.field(id).name);
        form.field_mut(id).value = Some(stored);
        Ok(true)
    }

    /// Select the widgets of a button field matching `value`
    fn set_toggle(
        &self,
        doc: &mut PdfDocument,
        field: &Field,
        widgets: &[ObjectId],
        value: &FieldValue,
    ) -> Result<FieldValue> {
        let mut chosen: Option<String> = None;

        for (index, object_id) in widgets.iter().enumerate() {
            let on = on_state(doc, field, *object_id, index);
            let wanted = match value {
                FieldValue::Flag(flag) => *flag,
                FieldValue::Text(text) => {
                    text == &on || (field.kind == FieldKind::Checkbox && is_truthy(text))
                }
                FieldValue::Selection(items) => items.contains(&on),
            };
            // A radio group has at most one selected widget
            let active = wanted && (field.kind == FieldKind::Checkbox || chosen.is_none());
            if active && chosen.is_none() {
                chosen = Some(on.clone());
            }
            let state = if active { on.as_str() } else { "Off" };
            doc.get_dictionary_mut(*object_id)?
                .set("AS", Object::Name(state.as_bytes().to_vec()));
        }

        let state = chosen.clone().unwrap_or_else(|| "Off".to_string());
        set_field_value(doc, field, Object::Name(state.as_bytes().to_vec()))?;

        Ok(match field.kind {
            FieldKind::Checkbox => FieldValue::Flag(chosen.is_some()),
            _ => FieldValue::Text(state),
        })
    }

    /// Regenerate the appearances of one field's widgets
    fn refresh_field(
        &self,
        doc: &mut PdfDocument,
        form: &Form,
        id: FieldId,
        report: &mut FillReport,
    ) -> Result<()> {
        let field = form.field(id);
        for (index, widget_id) in field.widgets.iter().enumerate() {
            let object_id = form.widget(*widget_id).object_id;
            match field.kind {
                kind if kind.is_textual() => {
                    if has_normal_appearance(doc, object_id) && self.style.keeps_existing() {
                        report.skipped += 1;
                        continue;
                    }
                    self.text_appearance(doc, form, *widget_id)?;
                    report.regenerated += 1;
                }
                kind if kind.is_toggle() => {
                    let on = on_state(doc, field, object_id, index);
                    if appearance_states(doc, object_id).contains(&on) {
                        report.skipped += 1;
                        continue;
                    }
                    self.toggle_appearance(doc, field, object_id, &on)?;
                    report.regenerated += 1;
                }
                _ => report.skipped += 1,
            }
        }
        Ok(())
    }

    /// Resolve and register the fonts for a field
    fn field_fonts(
        &self,
        doc: &mut PdfDocument,
        field: &Field,
        da: &DefaultAppearance,
    ) -> Result<FieldFonts> {
        let spec: &FontSpec = self.style.font_for(&field.name);
        let primary = doc.load_font(&spec.source)?;
        let fallback = if spec.source == self.style.fallback.source {
            None
        } else {
            Some(doc.load_font(&self.style.fallback.source)?)
        };
        let size = spec
            .fixed_size()
            .or_else(|| (da.size > 0.0).then_some(da.size));
        log::debug!("field {} uses {}", field.name, spec.label());
        Ok(FieldFonts {
            primary,
            fallback,
            size,
        })
    }

    /// Build the normal appearance of a text, combo or list widget
    pub fn text_appearance(
        &self,
        doc: &mut PdfDocument,
        form: &Form,
        widget_id: WidgetId,
    ) -> Result<()> {
        let widget = form.widget(widget_id);
        let field = form.field_of(widget_id);
        let width = widget.rect.width();
        let height = widget.rect.height();
        if width <= 0.0 || height <= 0.0 {
            log::warn!("widget of {} has an empty /Rect, skipped", field.name);
            return Ok(());
        }

        let widget_dict = doc.get_dictionary(widget.object_id)?.clone();
        let da = match widget_dict.get(b"DA").map(|o| doc.resolve(o)) {
            Ok(Object::String(bytes, _)) => {
                DefaultAppearance::parse(&decode_text_string(bytes))
            }
            _ => field
                .da
                .as_deref()
                .map(DefaultAppearance::parse)
                .unwrap_or_default(),
        };
        let decoration = Decoration::read(doc, &widget_dict);
        let fonts = self.field_fonts(doc, field, &da)?;
        let text = display_text(field);

        // Fail on characters neither font can draw before laying anything out.
        // Line breaks and other controls are layout, not glyphs.
        doc.segment_text(&drawable(&text), fonts.primary, fonts.fallback)?;

        let params = LayoutParams {
            width,
            height,
            font_size: fonts.size,
            multiline: field.is_multiline() || field.kind == FieldKind::ListBox,
            comb: field.comb_cells(),
            align: field.align,
            ascent: doc.font(fonts.primary).ascender(),
            descent: doc.font(fonts.primary).descender(),
        };
        let layout = {
            let doc = &*doc;
            layout_text(&text, &params, |t, size| {
                measure(doc, fonts.primary, fonts.fallback, t, size)
            })
        };

        let mut content = decoration.draw(width, height);
        content.push_str("/Tx BMC\nq\n");
        content.push_str(&format!(
            "1 1 {} {} re W n\n",
            fmt_num(width - 2.0),
            fmt_num(height - 2.0)
        ));
        let mut content = content.into_bytes();

        let mut used = vec![fonts.primary];
        let ctx = TextRenderContext {
            font_size: layout.font_size,
            text_width: 0.0,
            color: da.color,
        };
        for line in &layout.lines {
            let segments = doc.segment_text(&drawable(&line.text), fonts.primary, fonts.fallback)?;
            let mut runs = Vec::with_capacity(segments.len());
            for segment in segments {
                doc.font_mut(segment.font).add_chars(&segment.text);
                if !used.contains(&segment.font) {
                    used.push(segment.font);
                }
                runs.push(TextRun {
                    font_name: doc.font_resource_name(segment.font).to_string(),
                    encoded: doc.font(segment.font).encode(&segment.text),
                });
            }
            content.extend(generate_text_operators(&runs, line.x, line.y, Align::Left, &ctx));
        }
        content.extend_from_slice(b"Q\nEMC\n");

        let mut font_resources = Dictionary::new();
        for handle in &used {
            font_resources.set(
                doc.font_resource_name(*handle).as_bytes(),
                Object::Reference(doc.font_object_id(*handle)),
            );
        }
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => Rect::new(0.0, 0.0, width, height).to_object(),
                "Resources" => dictionary! { "Font" => font_resources },
            },
            content,
        );
        let appearance_id = doc.add_object(stream);

        let resource_name = doc.font_resource_name(fonts.primary).to_string();
        let widget_dict = doc.get_dictionary_mut(widget.object_id)?;
        widget_dict.set("AP", dictionary! { "N" => appearance_id });
        widget_dict.set(
            "DA",
            Object::string_literal(da.to_da_string(&resource_name, fonts.size.unwrap_or(0.0))),
        );

        for handle in used {
            let name = doc.font_resource_name(handle).to_string();
            let font_id = doc.font_object_id(handle);
            add_default_resource_font(doc, &name, font_id)?;
        }
        log::debug!(
            "appearance for {} at {}pt, {} lines",
            field.name,
            fmt_num(layout.font_size as f64),
            layout.lines.len()
        );
        Ok(())
    }

    /// Build on and off appearances for a check box or radio widget
    fn toggle_appearance(
        &self,
        doc: &mut PdfDocument,
        field: &Field,
        object_id: ObjectId,
        on: &str,
    ) -> Result<()> {
        let widget_dict = doc.get_dictionary(object_id)?.clone();
        let Some(rect) = widget_dict
            .get(b"Rect")
            .ok()
            .and_then(|r| doc.resolve(r).as_array().ok())
            .and_then(|r| Rect::from_array(r))
        else {
            return Ok(());
        };
        let (width, height) = (rect.width(), rect.height());
        let decoration = Decoration::read(doc, &widget_dict);
        let color = field
            .da
            .as_deref()
            .map(|da| DefaultAppearance::parse(da).color)
            .unwrap_or_default();

        let off = decoration.draw(width, height);
        let mut on_content = off.clone();
        if field.kind == FieldKind::Radio {
            on_content.push_str(&radio_dot(width, height, &color));
        } else {
            on_content.push_str(&check_mark(width, height, &color));
        }

        let form_stream = |content: String| {
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => Rect::new(0.0, 0.0, width, height).to_object(),
                },
                content.into_bytes(),
            )
        };
        let on_id = doc.add_object(form_stream(on_content));
        let off_id = doc.add_object(form_stream(off));

        let mut states = Dictionary::new();
        states.set(on.as_bytes(), Object::Reference(on_id));
        states.set("Off", Object::Reference(off_id));
        let widget = doc.get_dictionary_mut(object_id)?;
        widget.set("AP", dictionary! { "N" => states });
        if !widget.has(b"AS") {
            widget.set("AS", "Off");
        }
        log::debug!("generated /{on} appearance for {}", field.name);
        Ok(())
    }
}

/// Write `/V` into the field and every same-named field merged into it
fn set_field_value(doc: &mut PdfDocument, field: &Field, value: Object) -> Result<()> {
    for object_id in field.object_ids() {
        doc.get_dictionary_mut(object_id)?.set("V", value.clone());
    }
    Ok(())
}

/// Fill `values` into `form` using `style`
pub fn fill(
    doc: &mut PdfDocument,
    form: &mut Form,
    values: &FieldValueMap,
    style: &AppearanceStyle,
) -> Result<FillReport> {
    AppearanceGenerator::new(style).fill(doc, form, values)
}

/// Text to draw for a field's current value
fn display_text(field: &Field) -> String {
    let text = match (&field.value, field.kind) {
        (None, _) => String::new(),
        (Some(FieldValue::Text(export)), FieldKind::Combo | FieldKind::ListBox) => {
            field.display_for(export)
        }
        (Some(FieldValue::Selection(items)), FieldKind::Combo) => items
            .first()
            .map(|s| field.display_for(s))
            .unwrap_or_default(),
        (Some(FieldValue::Selection(items)), FieldKind::ListBox) => items
            .iter()
            .map(|s| field.display_for(s))
            .collect::<Vec<_>>()
            .join("\n"),
        (Some(value), _) => value.display_text(),
    };
    if field.is_password() {
        "*".repeat(text.chars().count())
    } else {
        text
    }
}

/// `text` without control characters
fn drawable(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}

/// Width of `text` in points, each character measured in the font that draws it
fn measure(
    doc: &PdfDocument,
    primary: FontHandle,
    fallback: Option<FontHandle>,
    text: &str,
    size: f32,
) -> f64 {
    let mut buf = [0u8; 4];
    text.chars()
        .map(|c| {
            let handle = match fallback {
                Some(fb) if !doc.font(primary).has_glyph(c) => fb,
                _ => primary,
            };
            doc.font(handle).text_width_points(c.encode_utf8(&mut buf), size) as f64
        })
        .sum()
}

fn is_truthy(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1" | "x"
    )
}

/// Whether a widget has a normal appearance
pub(crate) fn has_normal_appearance(doc: &PdfDocument, widget: ObjectId) -> bool {
    doc.get_dictionary(widget)
        .ok()
        .and_then(|d| d.get(b"AP").ok())
        .and_then(|ap| doc.resolve_dict(ap))
        .map(|ap| ap.has(b"N"))
        .unwrap_or(false)
}

/// State names of a widget's normal appearance dictionary
fn appearance_states(doc: &PdfDocument, widget: ObjectId) -> Vec<String> {
    let normal = doc
        .get_dictionary(widget)
        .ok()
        .and_then(|d| d.get(b"AP").ok())
        .and_then(|ap| doc.resolve_dict(ap))
        .and_then(|ap| ap.get(b"N").ok())
        .map(|n| doc.resolve(n));
    match normal {
        Some(Object::Dictionary(states)) => states
            .iter()
            .map(|(k, _)| String::from_utf8_lossy(k).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

/// On-state name of a button widget
///
/// Taken from its appearance states, else `/Opt` for radios, else `Yes`.
fn on_state(doc: &PdfDocument, field: &Field, widget: ObjectId, index: usize) -> String {
    if let Some(state) = appearance_states(doc, widget)
        .into_iter()
        .find(|s| s != "Off")
    {
        return state;
    }
    match field.kind {
        FieldKind::Radio => field
            .options
            .get(index)
            .map(|o| o.export.clone())
            .unwrap_or_else(|| index.to_string()),
        _ => "Yes".to_string(),
    }
}

/// Add a font to `/AcroForm /DR /Font`
fn add_default_resource_font(doc: &mut PdfDocument, name: &str, font_id: ObjectId) -> Result<()> {
    let Some(form_dict) = acroform(doc)? else {
        return Ok(());
    };
    let mut dr = form_dict
        .get(b"DR")
        .ok()
        .and_then(|o| doc.resolve_dict(o))
        .cloned()
        .unwrap_or_default();
    let mut fonts = dr
        .get(b"Font")
        .ok()
        .and_then(|o| doc.resolve_dict(o))
        .cloned()
        .unwrap_or_default();
    if matches!(fonts.get(name.as_bytes()), Ok(Object::Reference(id)) if *id == font_id) {
        return Ok(());
    }
    fonts.set(name.as_bytes(), Object::Reference(font_id));
    dr.set("Font", fonts);
    if let Some(form_dict) = acroform_mut(doc)? {
        form_dict.set("DR", dr);
    }
    Ok(())
}

fn color_from_array(components: &[Object]) -> Option<Color> {
    let nums: Vec<f32> = components
        .iter()
        .filter_map(pdf_core::geometry::number)
        .map(|n| n as f32)
        .collect();
    match nums.as_slice() {
        [gray] => Some(Color::gray(*gray)),
        [r, g, b] => Some(Color::rgb(*r, *g, *b)),
        [c, m, y, k] => Some(Color::from_cmyk(*c, *m, *y, *k)),
        _ => None,
    }
}

fn stroke_operator(color: &Color) -> String {
    format!(
        "{} {} {} RG\n",
        fmt_num(color.r as f64),
        fmt_num(color.g as f64),
        fmt_num(color.b as f64)
    )
}

fn check_mark(width: f64, height: f64, color: &Color) -> String {
    let margin = width.min(height) * 0.2;
    format!(
        "q\n{}{} w\n{} {} m {} {} l {} {} l S\nQ\n",
        stroke_operator(color),
        fmt_num(width.min(height) * 0.1),
        fmt_num(margin),
        fmt_num(height * 0.5),
        fmt_num(width * 0.4),
        fmt_num(margin),
        fmt_num(width - margin),
        fmt_num(height - margin)
    )
}

fn radio_dot(width: f64, height: f64, color: &Color) -> String {
    let (cx, cy) = (width / 2.0, height / 2.0);
    let r = ((width.min(height) / 2.0) - 1.0).max(0.5) * 0.5;
    // Four Bezier quarter arcs
    let k = 0.552_284_7 * r;
    format!(
        "q\n{}{} {} m {} {} {} {} {} {} c {} {} {} {} {} {} c {} {} {} {} {} {} c {} {} {} {} {} {} c f\nQ\n",
        color.fill_operator(),
        fmt_num(cx + r), fmt_num(cy),
        fmt_num(cx + r), fmt_num(cy + k), fmt_num(cx + k), fmt_num(cy + r), fmt_num(cx), fmt_num(cy + r),
        fmt_num(cx - k), fmt_num(cy + r), fmt_num(cx - r), fmt_num(cy + k), fmt_num(cx - r), fmt_num(cy),
        fmt_num(cx - r), fmt_num(cy - k), fmt_num(cx - k), fmt_num(cy - r), fmt_num(cx), fmt_num(cy - r),
        fmt_num(cx + k), fmt_num(cy - r), fmt_num(cx + r), fmt_num(cy - k), fmt_num(cx + r), fmt_num(cy),
    )
}
