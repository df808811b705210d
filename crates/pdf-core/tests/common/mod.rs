//! Shared helpers for pdf-core integration tests

#![allow(dead_code)]

pub mod ttf;

use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a minimal valid PDF with the given number of pages
pub fn create_test_pdf_with_pages(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for _ in 0..page_count {
        let contents_id = doc.add_object(Stream::new(dictionary! {}, vec![]));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.28.into(), 841.89.into()],
            "Resources" => dictionary! {},
            "Contents" => contents_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_count as i64,
            "Kids" => page_ids.into_iter().map(Object::from).collect::<Vec<_>>(),
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

/// Create a minimal one-page PDF
pub fn create_test_pdf() -> Vec<u8> {
    create_test_pdf_with_pages(1)
}

/// Write a synthetic font to a temporary file
pub fn font_file(name: &str, chars: &[char]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&ttf::build_font(name, chars)).unwrap();
    file.flush().unwrap();
    file
}
