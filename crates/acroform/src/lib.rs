//! AcroForm - fill, appearance generation and flattening
//!
//! This crate provides:
//! - Field data loading from JSON (flat, nested or name/value arrays)
//! - A form model over the document's `/AcroForm` field tree
//! - Per-field font resolution (fallback + field-name overrides)
//! - Appearance stream generation for text, choice and button fields
//! - Flattening of widget appearances into static page content
//!
//! # Example
//!
//! ```ignore
//! use acroform::{AppearanceStyle, FontSpec, FormDocument, load_field_values};
//!
//! let values = load_field_values("formdata.json")?;
//! let style = AppearanceStyle::new(FontSpec::standard("Helvetica-Oblique"))
//!     .with_field_font("email4", FontSpec::truetype("./DoHyeon-Regular.ttf"))
//!     .force_replace(true);
//!
//! let mut doc = FormDocument::open("sample_form.pdf")?;
//! doc.fill(&values, &style)?;
//! doc.flatten(&style)?;
//! doc.save("output.pdf", true)?;
//! ```

mod appearance;
pub mod data;
mod flatten;
pub mod form;
pub mod layout;
mod pipeline;
pub mod style;

pub use appearance::{fill, AppearanceGenerator, FillReport};
pub use data::{load_field_values, parse_field_values, FieldValue, FieldValueMap};
pub use flatten::{flatten, FlattenReport};
pub use form::{Field, FieldId, FieldKind, Form, Widget, WidgetId};
pub use pipeline::{fill_and_flatten, FormDocument, PipelineOptions};
pub use style::{load_style, parse_style, AppearanceStyle, FontSpec, StyleConfig};

use pdf_core::PdfError;
use thiserror::Error;

/// Errors that can occur while filling and flattening a form
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Input not found: {0}")]
    InputNotFound(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Failed to load font: {0}")]
    FontLoad(String),

    #[error("Character {ch:?} is not available in font {font} or the fallback font")]
    UnsupportedGlyph { ch: char, font: String },

    #[error("Failed to write output: {0}")]
    Write(String),
}

impl From<PdfError> for FormError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::UnsupportedGlyph { ch, font } => FormError::UnsupportedGlyph { ch, font },
            PdfError::FontNotFound(_)
            | PdfError::FontParseError(_)
            | PdfError::FontSubsetError(_) => FormError::FontLoad(err.to_string()),
            PdfError::SaveError(_) | PdfError::IoError(_) => FormError::Write(err.to_string()),
            PdfError::OpenError(_)
            | PdfError::InvalidPage(..)
            | PdfError::ParseError(_)
            | PdfError::LopdfError(_) => FormError::MalformedInput(err.to_string()),
        }
    }
}

/// Result type for form operations
pub type Result<T> = std::result::Result<T, FormError>;
