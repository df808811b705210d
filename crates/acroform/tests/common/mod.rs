//! Shared helpers for acroform integration tests

#![allow(dead_code)]

#[path = "../../../pdf-core/tests/common/ttf.rs"]
pub mod ttf;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use tempfile::NamedTempFile;

/// Field names of [`sample_form`]
pub const NAME: &str = "name1";
pub const EMAIL: &str = "email4";
pub const CITY: &str = "address5[city]";
pub const NOTES: &str = "notes";
pub const AGREE: &str = "agree";
pub const HIDDEN: &str = "hidden1";

/// Field names of [`choice_form`] and [`duplicate_form`]
pub const COUNTRIES: &str = "countries";
pub const COUNTRY: &str = "country";
pub const DUP: &str = "dup";

/// One-page form:
///
/// - `name1`: text, value "old name", has an appearance
/// - `email4`: text, no appearance
/// - `address5[city]`: text, centred, no appearance
/// - `notes`: multiline text
/// - `agree`: check box with `/Yes` and `/Off` appearances
/// - `hidden1`: hidden text widget
pub fn sample_form() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    let helv = add_helvetica(&mut doc);

    let name_ap = form_xobject(&mut doc, 200, 20, b"/Tx BMC BT /Helv 12 Tf 2 5 Td (old name) Tj ET EMC", helv);
    let name1 = doc.add_object(text_widget(page_id, NAME, [50, 700, 250, 720], 0, Some("old name"), Some(name_ap)));
    let email4 = doc.add_object(text_widget(page_id, EMAIL, [50, 660, 250, 680], 0, None, None));
    let mut city_dict = text_widget(page_id, CITY, [50, 620, 250, 640], 0, None, None);
    city_dict.set("Q", 1);
    let city = doc.add_object(city_dict);
    let notes = doc.add_object(text_widget(page_id, NOTES, [50, 500, 250, 600], 1 << 12, None, None));
    let mut hidden_dict = text_widget(page_id, HIDDEN, [300, 700, 400, 720], 0, Some("secret"), None);
    hidden_dict.set("F", 2);
    let hidden = doc.add_object(hidden_dict);

    let yes = form_xobject(&mut doc, 12, 12, b"0 g 2 2 8 8 re f", helv);
    let off = form_xobject(&mut doc, 12, 12, b"", helv);
    let agree = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "T" => Object::string_literal(AGREE),
        "Rect" => vec![50.into(), 470.into(), 62.into(), 482.into()],
        "P" => page_id,
        "V" => "Off",
        "AS" => "Off",
        "AP" => dictionary! { "N" => dictionary! { "Yes" => yes, "Off" => off } },
    });

    let widgets = vec![name1, email4, city, notes, agree, hidden];
    finish(doc, pages_id, page_id, helv, &widgets)
}

/// Choice fields with `/Opt` pairs:
///
/// - `countries`: multi-select list box
/// - `country`: combo box
pub fn choice_form() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    let helv = add_helvetica(&mut doc);

    let options = || {
        vec![
            Object::Array(vec![Object::string_literal("kr"), Object::string_literal("Korea")]),
            Object::Array(vec![Object::string_literal("jp"), Object::string_literal("Japan")]),
        ]
    };
    let countries = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Ch",
        "T" => Object::string_literal(COUNTRIES),
        "Ff" => 1 << 21,
        "Opt" => options(),
        "Rect" => vec![50.into(), 600.into(), 250.into(), 700.into()],
        "P" => page_id,
    });
    let country = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Ch",
        "T" => Object::string_literal(COUNTRY),
        "Ff" => 1 << 17,
        "Opt" => options(),
        "Rect" => vec![50.into(), 560.into(), 250.into(), 580.into()],
        "P" => page_id,
    });
    finish(doc, pages_id, page_id, helv, &[countries, country])
}

/// Two separate text field objects both named `dup`
pub fn duplicate_form() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    let helv = add_helvetica(&mut doc);

    let first = doc.add_object(text_widget(page_id, DUP, [50, 700, 250, 720], 0, None, None));
    let second = doc.add_object(text_widget(page_id, DUP, [50, 600, 250, 620], 0, None, None));
    finish(doc, pages_id, page_id, helv, &[first, second])
}

fn add_helvetica(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Page tree, page and form around `widgets`, saved to bytes
fn finish(
    mut doc: Document,
    pages_id: ObjectId,
    page_id: ObjectId,
    helv: ObjectId,
    widgets: &[ObjectId],
) -> Vec<u8> {
    let content = doc.add_object(Stream::new(
        Dictionary::new(),
        b"BT /Helv 10 Tf 50 750 Td (Sample form) Tj ET".to_vec(),
    ));
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "Helv" => helv } },
            "Contents" => content,
            "Annots" => references(widgets),
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let acroform = doc.add_object(dictionary! {
        "Fields" => references(widgets),
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
        "DR" => dictionary! { "Font" => dictionary! { "Helv" => helv } },
    });
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform,
    });
    doc.trailer.set("Root", catalog);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn references(ids: &[ObjectId]) -> Vec<Object> {
    ids.iter().map(|id| Object::Reference(*id)).collect()
}

fn text_widget(
    page: ObjectId,
    name: &str,
    rect: [i64; 4],
    flags: i64,
    value: Option<&str>,
    appearance: Option<ObjectId>,
) -> Dictionary {
    let mut dict = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal(name),
        "Ff" => flags,
        "Rect" => rect.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
        "P" => page,
    };
    if let Some(value) = value {
        dict.set("V", Object::string_literal(value));
    }
    if let Some(appearance) = appearance {
        dict.set("AP", dictionary! { "N" => appearance });
    }
    dict
}

fn form_xobject(doc: &mut Document, width: i64, height: i64, content: &[u8], font: ObjectId) -> ObjectId {
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "Helv" => font } },
        },
        content.to_vec(),
    ))
}

/// Write a synthetic font to a temporary file
pub fn font_file(name: &str, chars: &[char]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&ttf::build_font(name, chars)).unwrap();
    file.flush().unwrap();
    file
}

/// Follow a reference
pub fn deref<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap(),
        _ => object,
    }
}

/// Widget dictionary of a field in the sample form, by `/T`
pub fn widget<'a>(doc: &'a Document, name: &str) -> &'a Dictionary {
    doc.objects
        .values()
        .filter_map(|o| o.as_dict().ok())
        .find(|d| matches!(d.get(b"T"), Ok(Object::String(t, _)) if t == name.as_bytes()))
        .unwrap_or_else(|| panic!("no widget named {name}"))
}

/// Normal appearance stream of a widget (single-state appearances only)
pub fn appearance<'a>(doc: &'a Document, widget: &'a Dictionary) -> &'a Stream {
    let ap = deref(doc, widget.get(b"AP").unwrap()).as_dict().unwrap();
    deref(doc, ap.get(b"N").unwrap()).as_stream().unwrap()
}

/// `BaseFont` of every font in a resource dictionary's `/Font`, keyed by resource name
pub fn resource_fonts(doc: &Document, resources: &Dictionary) -> Vec<(String, String)> {
    let fonts = match resources.get(b"Font") {
        Ok(fonts) => deref(doc, fonts).as_dict().unwrap(),
        Err(_) => return Vec::new(),
    };
    fonts
        .iter()
        .map(|(name, font)| {
            let font = deref(doc, font).as_dict().unwrap();
            let base = font
                .get(b"BaseFont")
                .ok()
                .and_then(|b| b.as_name_str().ok())
                .unwrap_or("")
                .to_string();
            (String::from_utf8_lossy(name).into_owned(), base)
        })
        .collect()
}
