//! Fill and flatten tests against a small generated form

mod common;

use acroform::{
    fill_and_flatten, load_field_values, AppearanceStyle, FieldValue, FieldValueMap, FontSpec,
    FormDocument, FormError, PipelineOptions,
};
use common::{appearance, deref, resource_fonts, ttf, widget};
use common::{choice_form, duplicate_form, sample_form};
use common::{AGREE, CITY, COUNTRIES, COUNTRY, DUP, EMAIL, NAME, NOTES};
use lopdf::{Document, Object};
use pretty_assertions::assert_eq;

const EMAIL_CHARS: &str = "abcdefghijklmnopqrstuvwxyz.";

fn values(entries: &[(&str, &str)]) -> FieldValueMap {
    entries
        .iter()
        .map(|(name, value)| (*name, FieldValue::Text(value.to_string())))
        .collect()
}

fn reload(bytes: &[u8]) -> Document {
    Document::load_mem(bytes).unwrap()
}

fn text_value(doc: &Document, name: &str) -> String {
    match widget(doc, name).get(b"V").unwrap() {
        Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
        other => panic!("unexpected /V {other:?}"),
    }
}

fn stream_text(stream: &lopdf::Stream) -> String {
    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    String::from_utf8_lossy(&content).into_owned()
}

fn page_dict(doc: &Document) -> &lopdf::Dictionary {
    let page_id = *doc.get_pages().get(&1).unwrap();
    doc.get_dictionary(page_id).unwrap()
}

/// Every Form XObject registered on page 1
fn page_xobjects(doc: &Document) -> Vec<&lopdf::Stream> {
    let resources = deref(doc, page_dict(doc).get(b"Resources").unwrap())
        .as_dict()
        .unwrap();
    let Ok(xobjects) = resources.get(b"XObject") else {
        return Vec::new();
    };
    deref(doc, xobjects)
        .as_dict()
        .unwrap()
        .iter()
        .map(|(_, x)| deref(doc, x).as_stream().unwrap())
        .collect()
}

#[test]
fn test_fill_sets_named_fields_only() {
    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    let report = form
        .fill(&values(&[(EMAIL, "jane@mail.io")]), &AppearanceStyle::default())
        .unwrap();

    assert_eq!(report.filled, 1);
    assert_eq!(report.unchanged, 5);
    assert_eq!(report.regenerated, 1);
    assert!(report.missing.is_empty());

    let out = reload(&form.to_bytes(false).unwrap());
    assert_eq!(text_value(&out, EMAIL), "jane@mail.io");
    assert_eq!(text_value(&out, NAME), "old name");
    assert!(widget(&out, EMAIL).has(b"AP"));
    assert!(stream_text(appearance(&out, widget(&out, NAME))).contains("(old name) Tj"));
}

#[test]
fn test_unknown_names_are_reported() {
    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    let report = form
        .fill(
            &values(&[("nope", "x"), (NAME, "Jane")]),
            &AppearanceStyle::default(),
        )
        .unwrap();
    assert_eq!(report.missing, vec!["nope".to_string()]);
    assert_eq!(report.filled, 1);
}

#[test]
fn test_field_fonts_follow_style() {
    let chars: Vec<char> = EMAIL_CHARS.chars().collect();
    let font = common::font_file("EmailFont", &chars);
    let style = AppearanceStyle::new(FontSpec::standard("Helvetica-Oblique"))
        .with_field_font(EMAIL, FontSpec::truetype(font.path()))
        .force_replace(true);

    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    form.fill(&values(&[(NAME, "Jane Roe"), (EMAIL, "jane@mail.io")]), &style)
        .unwrap();
    let out = reload(&form.to_bytes(true).unwrap());

    // '@' is missing from the field font and drawn with the fallback
    let email_ap = appearance(&out, widget(&out, EMAIL));
    let mut email_fonts: Vec<String> = resource_fonts(&out, &email_ap.dict)
        .into_iter()
        .map(|(_, base)| base)
        .collect();
    email_fonts.sort();
    assert_eq!(email_fonts, vec!["EmailFont", "Helvetica-Oblique"]);

    let name_ap = appearance(&out, widget(&out, NAME));
    let name_fonts = resource_fonts(&out, &name_ap.dict);
    assert_eq!(name_fonts.len(), 1);
    assert_eq!(name_fonts[0].1, "Helvetica-Oblique");

    let da = match widget(&out, NAME).get(b"DA").unwrap() {
        Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
        other => panic!("unexpected /DA {other:?}"),
    };
    assert!(da.starts_with(&format!("/{} ", name_fonts[0].0)));

    let catalog = out.catalog().unwrap();
    let acroform = deref(&out, catalog.get(b"AcroForm").unwrap()).as_dict().unwrap();
    let dr = deref(&out, acroform.get(b"DR").unwrap()).as_dict().unwrap();
    let dr_fonts: Vec<String> = resource_fonts(&out, dr).into_iter().map(|(_, b)| b).collect();
    assert!(dr_fonts.contains(&"EmailFont".to_string()));
    assert!(dr_fonts.contains(&"Helvetica-Oblique".to_string()));
    assert!(dr_fonts.contains(&"Helvetica".to_string()));
}

#[test]
fn test_unsupported_glyph_is_an_error() {
    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    let result = form.fill(&values(&[(EMAIL, "日本")]), &AppearanceStyle::default());
    assert!(matches!(
        result,
        Err(FormError::UnsupportedGlyph { ch: '日', .. })
    ));
}

#[test]
fn test_refill_keeps_existing_appearances() {
    let style = AppearanceStyle::default();
    let data = values(&[(EMAIL, "jane@mail.io")]);

    let mut first = FormDocument::from_bytes(&sample_form()).unwrap();
    let report = first.fill(&data, &style).unwrap();
    assert_eq!(report.regenerated, 1);
    let once = first.to_bytes(false).unwrap();

    let mut second = FormDocument::from_bytes(&once).unwrap();
    let report = second.fill(&data, &style).unwrap();
    assert_eq!(report.regenerated, 0);
    assert_eq!(report.skipped, 1);

    let a = reload(&once);
    let b = reload(&second.to_bytes(false).unwrap());
    assert_eq!(text_value(&a, EMAIL), text_value(&b, EMAIL));
    assert_eq!(
        stream_text(appearance(&a, widget(&a, EMAIL))),
        stream_text(appearance(&b, widget(&b, EMAIL)))
    );
}

#[test]
fn test_checkbox_selects_on_state() {
    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    let mut data = FieldValueMap::new();
    data.insert(AGREE, FieldValue::Flag(true));
    let report = form.fill(&data, &AppearanceStyle::default()).unwrap();
    assert_eq!(report.filled, 1);
    // The form already draws /Yes
    assert_eq!(report.regenerated, 0);

    let out = reload(&form.to_bytes(false).unwrap());
    let agree = widget(&out, AGREE);
    assert_eq!(agree.get(b"V").unwrap().as_name().unwrap(), b"Yes");
    assert_eq!(agree.get(b"AS").unwrap().as_name().unwrap(), b"Yes");
}

#[test]
fn test_flatten_removes_form() {
    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    let mut data = values(&[(EMAIL, "jane@mail.io")]);
    data.insert(AGREE, FieldValue::Flag(true));
    form.fill(&data, &AppearanceStyle::default()).unwrap();

    let report = form.flatten(&AppearanceStyle::default()).unwrap();
    assert_eq!(report.flattened, 5);
    assert_eq!(report.hidden, 1);
    assert_eq!(report.fields_removed, 6);
    assert!(report.form_removed);
    assert!(form.form().is_none());

    let out = reload(&form.to_bytes(true).unwrap());
    assert!(!out.catalog().unwrap().has(b"AcroForm"));
    assert!(!page_dict(&out).has(b"Annots"));
    for object in out.objects.values() {
        if let Ok(dict) = object.as_dict() {
            assert!(!matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Widget"));
            assert!(!dict.has(b"FT"));
        }
    }

    assert_eq!(page_xobjects(&out).len(), 5);
    let page_id = *out.get_pages().get(&1).unwrap();
    let content = String::from_utf8_lossy(&out.get_page_content(page_id).unwrap()).into_owned();
    assert_eq!(content.matches(" Do").count(), 5);
    assert!(content.contains("(Sample form) Tj"));

    // The selected check box state is what gets drawn
    assert!(page_xobjects(&out)
        .iter()
        .any(|x| stream_text(x).contains("0 g 2 2 8 8 re f")));
    // Hidden widgets leave nothing behind
    let secret = pdf_core::hex_string(b"secret");
    assert!(!page_xobjects(&out)
        .iter()
        .any(|x| stream_text(x).contains(&secret)));
}

#[test]
fn test_flatten_keeps_font_resources() {
    let chars: Vec<char> = EMAIL_CHARS.chars().collect();
    let font = common::font_file("EmailFont", &chars);
    let style = AppearanceStyle::new(FontSpec::standard("Helvetica-Oblique"))
        .with_field_font(EMAIL, FontSpec::truetype(font.path()));

    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    form.fill(&values(&[(EMAIL, "jane@mail.io")]), &style).unwrap();
    form.flatten(&style).unwrap();
    let out = reload(&form.to_bytes(true).unwrap());

    let email = page_xobjects(&out)
        .into_iter()
        .find(|x| {
            resource_fonts(&out, &x.dict)
                .iter()
                .any(|(_, base)| base == "EmailFont")
        })
        .expect("no flattened appearance uses the field font");
    let text = stream_text(email);
    for (name, _) in resource_fonts(&out, &email.dict) {
        assert!(text.contains(&format!("/{name} ")), "/{name} not used in {text}");
    }
}

#[test]
fn test_composite_field_font_is_subset() {
    let chars: Vec<char> = "ABCDEFGHIJ".chars().collect();
    let font = common::font_file("CityFont", &chars);
    let style = AppearanceStyle::default().with_field_font(CITY, FontSpec::composite(font.path()));

    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    form.fill(&values(&[(CITY, "BAD")]), &style).unwrap();
    form.flatten(&style).unwrap();
    let out = reload(&form.to_bytes(true).unwrap());

    let city = page_xobjects(&out)
        .into_iter()
        .find(|x| {
            resource_fonts(&out, &x.dict)
                .iter()
                .any(|(_, base)| base.ends_with("+CityFont"))
        })
        .expect("no subset composite font on the page");
    let fonts = deref(&out, city.dict.get(b"Resources").unwrap())
        .as_dict()
        .unwrap()
        .get(b"Font")
        .unwrap();
    let type0 = deref(&out, fonts)
        .as_dict()
        .unwrap()
        .iter()
        .map(|(_, f)| deref(&out, f).as_dict().unwrap())
        .find(|f| f.get(b"Subtype").unwrap().as_name().unwrap() == b"Type0")
        .unwrap();

    let descendants = deref(&out, type0.get(b"DescendantFonts").unwrap())
        .as_array()
        .unwrap();
    let cid_font = deref(&out, &descendants[0]).as_dict().unwrap();
    let descriptor = deref(&out, cid_font.get(b"FontDescriptor").unwrap())
        .as_dict()
        .unwrap();
    let program = deref(&out, descriptor.get(b"FontFile2").unwrap())
        .as_stream()
        .unwrap()
        .decompressed_content()
        .unwrap();
    let face = ttf_parser::Face::parse(&program, 0).unwrap();
    assert!(face.number_of_glyphs() < chars.len() as u16 + 1);

    let map = deref(&out, cid_font.get(b"CIDToGIDMap").unwrap())
        .as_stream()
        .unwrap()
        .decompressed_content()
        .unwrap();
    for c in "BAD".chars() {
        let cid = ttf::glyph_id(&chars, c).unwrap() as usize;
        let gid = u16::from_be_bytes([map[cid * 2], map[cid * 2 + 1]]);
        let bbox = face
            .glyph_bounding_box(ttf_parser::GlyphId(gid))
            .unwrap_or_else(|| panic!("glyph for {c:?} missing after subsetting"));
        assert_eq!(bbox.width() as u16, ttf::glyph_width(cid as u16));
    }
}

#[test]
fn test_fill_and_flatten_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample_form.pdf");
    let data = dir.path().join("formdata.json");
    let output = dir.path().join("output.pdf");
    std::fs::write(&input, sample_form()).unwrap();
    std::fs::write(
        &data,
        r#"{"name1": "Jane Roe", "email4": "jane@mail.io", "address5": {"city": "Seoul"}, "agree": true}"#,
    )
    .unwrap();

    let values = load_field_values(&data).unwrap();
    let style = AppearanceStyle::new(FontSpec::standard("Helvetica-Oblique")).force_replace(true);
    let report = fill_and_flatten(&input, &output, &values, &style, &PipelineOptions::default())
        .unwrap();
    assert_eq!(report.filled, 4);
    assert!(report.missing.is_empty());

    let out = Document::load(&output).unwrap();
    assert!(!out.catalog().unwrap().has(b"AcroForm"));
    let texts: Vec<String> = page_xobjects(&out).into_iter().map(stream_text).collect();
    let seoul = format!("{} Tj", pdf_core::hex_string(b"Seoul"));
    assert!(texts.iter().any(|t| t.contains(&seoul)));
}

#[test]
fn test_fill_without_flatten_keeps_form() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    std::fs::write(&input, sample_form()).unwrap();

    let options = PipelineOptions {
        flatten: false,
        subset_fonts: false,
    };
    fill_and_flatten(
        &input,
        &output,
        &values(&[(EMAIL, "jane@mail.io")]),
        &AppearanceStyle::default(),
        &options,
    )
    .unwrap();

    let out = Document::load(&output).unwrap();
    assert!(out.catalog().unwrap().has(b"AcroForm"));
    assert_eq!(text_value(&out, EMAIL), "jane@mail.io");
}

#[test]
fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = fill_and_flatten(
        dir.path().join("absent.pdf"),
        dir.path().join("out.pdf"),
        &FieldValueMap::new(),
        &AppearanceStyle::default(),
        &PipelineOptions::default(),
    );
    assert!(matches!(result, Err(FormError::InputNotFound(_))));
}

/// Hex-encoded show-text operator for a line drawn in a standard font
fn shown(text: &str) -> String {
    format!("{} Tj", pdf_core::hex_string(text.as_bytes()))
}

#[test]
fn test_multiline_value_keeps_line_breaks() {
    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    let report = form
        .fill(&values(&[(NOTES, "line one\nline two")]), &AppearanceStyle::default())
        .unwrap();
    assert_eq!(report.filled, 1);

    let out = reload(&form.to_bytes(false).unwrap());
    assert_eq!(text_value(&out, NOTES), "line one\nline two");
    let notes = stream_text(appearance(&out, widget(&out, NOTES)));
    assert_eq!(notes.matches(" Tj").count(), 2);
    assert!(notes.contains(&shown("line one")));
    assert!(notes.contains(&shown("line two")));
}

#[test]
fn test_single_line_field_joins_line_breaks() {
    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    form.fill(&values(&[(EMAIL, "a\nb")]), &AppearanceStyle::default())
        .unwrap();

    let out = reload(&form.to_bytes(false).unwrap());
    let email = stream_text(appearance(&out, widget(&out, EMAIL)));
    assert!(email.contains(&shown("a b")));
}

#[test]
fn test_list_box_selection() {
    let mut form = FormDocument::from_bytes(&choice_form()).unwrap();
    let mut data = FieldValueMap::new();
    data.insert(
        COUNTRIES,
        FieldValue::Selection(vec!["kr".to_string(), "jp".to_string()]),
    );
    let report = form.fill(&data, &AppearanceStyle::default()).unwrap();
    assert_eq!(report.filled, 1);

    let out = reload(&form.to_bytes(false).unwrap());
    let countries = widget(&out, COUNTRIES);
    let selected: Vec<&[u8]> = countries
        .get(b"V")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(selected, vec![b"kr".as_slice(), b"jp".as_slice()]);

    // Options are drawn by display name, one per line
    let drawn = stream_text(appearance(&out, countries));
    assert!(drawn.contains(&shown("Korea")));
    assert!(drawn.contains(&shown("Japan")));
    assert!(!drawn.contains(&shown("kr")));
}

#[test]
fn test_combo_box_shows_display_name() {
    let mut form = FormDocument::from_bytes(&choice_form()).unwrap();
    form.fill(&values(&[(COUNTRY, "jp")]), &AppearanceStyle::default())
        .unwrap();

    let out = reload(&form.to_bytes(false).unwrap());
    assert_eq!(text_value(&out, COUNTRY), "jp");
    let drawn = stream_text(appearance(&out, widget(&out, COUNTRY)));
    assert!(drawn.contains(&shown("Japan")));
}

#[test]
fn test_force_replace_redraws_unfilled_fields() {
    let style = AppearanceStyle::default().force_replace(true);
    let mut form = FormDocument::from_bytes(&sample_form()).unwrap();
    let report = form
        .fill(&values(&[(EMAIL, "jane@mail.io")]), &style)
        .unwrap();
    assert_eq!(report.filled, 1);
    assert!(report.regenerated > 1);

    let out = reload(&form.to_bytes(false).unwrap());
    assert_eq!(text_value(&out, NAME), "old name");
    let name = stream_text(appearance(&out, widget(&out, NAME)));
    assert!(!name.contains("(old name) Tj"));
    assert!(name.contains(&shown("old name")));
}

#[test]
fn test_same_name_fields_flatten_together() {
    let mut form = FormDocument::from_bytes(&duplicate_form()).unwrap();
    let report = form
        .fill(&values(&[(DUP, "both")]), &AppearanceStyle::default())
        .unwrap();
    assert_eq!(report.filled, 1);
    assert_eq!(report.regenerated, 2);

    let filled = reload(&form.to_bytes(false).unwrap());
    let dups: Vec<&lopdf::Dictionary> = filled
        .objects
        .values()
        .filter_map(|o| o.as_dict().ok())
        .filter(|d| matches!(d.get(b"T"), Ok(Object::String(t, _)) if t == DUP.as_bytes()))
        .collect();
    assert_eq!(dups.len(), 2);
    for dup in dups {
        assert!(matches!(dup.get(b"V"), Ok(Object::String(v, _)) if v == b"both"));
    }

    let report = form.flatten(&AppearanceStyle::default()).unwrap();
    assert_eq!(report.flattened, 2);
    assert_eq!(report.fields_removed, 2);
    assert!(report.form_removed);

    let out = reload(&form.to_bytes(true).unwrap());
    assert!(!out.catalog().unwrap().has(b"AcroForm"));
    assert!(!page_dict(&out).has(b"Annots"));
    let drawn: Vec<String> = page_xobjects(&out).into_iter().map(stream_text).collect();
    assert_eq!(drawn.len(), 2);
    assert!(drawn.iter().all(|t| t.contains(&shown("both"))));
}
