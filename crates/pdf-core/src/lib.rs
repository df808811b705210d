//! PDF Core - Low-level PDF manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving PDF documents
//! - Registering standard and TrueType fonts (simple or composite embedding)
//! - Generating text operators for appearance streams
//! - Editing page content, resources and annotations
//! - Subsetting composite fonts to the glyphs actually drawn
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{FontSource, PdfDocument, SaveOptions};
//!
//! let mut doc = PdfDocument::open("form.pdf")?;
//! let font = doc.load_font(&FontSource::Composite("fonts/NotoSansJP.ttf".into()))?;
//! doc.font_mut(font).add_chars("こんにちは");
//! doc.save("output.pdf", &SaveOptions::default())?;
//! ```

mod document;
mod font;
pub mod geometry;
mod standard;
mod subset;
mod text;

pub use document::{FontHandle, PdfDocument, SaveOptions, TextSegment};
pub use font::{winansi_char, winansi_code, FontData, FontEncoding, FontSource, PdfFont};
pub use geometry::{Matrix, Rect};
pub use standard::StandardFont;
pub use subset::{collect_used_glyphs, subset_font, GlyphSubset};
pub use text::{
    calculate_x_offset, generate_text_operators, hex_string, wrap_text, Color,
    TextRenderContext, TextRun,
};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Font subset error: {0}")]
    FontSubsetError(String),

    #[error("Character {ch:?} is not available in font {font}")]
    UnsupportedGlyph { ch: char, font: String },

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Text alignment options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Alignment from a form field quadding value (`/Q`)
    pub fn from_quadding(q: i64) -> Self {
        match q {
            1 => Align::Center,
            2 => Align::Right,
            _ => Align::Left,
        }
    }
}
