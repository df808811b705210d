//! Load, fill, flatten, write

use crate::appearance::{fill, FillReport};
use crate::data::FieldValueMap;
use crate::flatten::{flatten, FlattenReport};
use crate::form::Form;
use crate::style::{AppearanceStyle, StyleConfig};
use crate::{FormError, Result};
use pdf_core::{PdfDocument, SaveOptions};
use std::io::Write;
use std::path::Path;

/// Stage switches for [`fill_and_flatten`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub flatten: bool,
    pub subset_fonts: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            flatten: true,
            subset_fonts: true,
        }
    }
}

impl PipelineOptions {
    /// Take the switches a style file sets
    pub fn apply_config(&mut self, config: &StyleConfig) {
        if let Some(flatten) = config.flatten {
            self.flatten = flatten;
        }
        if let Some(subset) = config.subset_fonts {
            self.subset_fonts = subset;
        }
    }
}

/// A PDF and its interactive form
pub struct FormDocument {
    doc: PdfDocument,
    form: Option<Form>,
}

impl FormDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FormError::InputNotFound(path.display().to_string()));
        }
        Self::from_document(PdfDocument::open(path)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_document(PdfDocument::open_from_bytes(data)?)
    }

    pub fn from_document(doc: PdfDocument) -> Result<Self> {
        let form = Form::load(&doc)?;
        if form.is_none() {
            log::warn!("document has no interactive form");
        }
        Ok(Self { doc, form })
    }

    /// The form, `None` when the document has none (or after flattening)
    pub fn form(&self) -> Option<&Form> {
        self.form.as_ref()
    }

    pub fn document(&self) -> &PdfDocument {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut PdfDocument {
        &mut self.doc
    }

    pub fn fill(
        &mut self,
        values: &FieldValueMap,
        style: &AppearanceStyle,
    ) -> Result<FillReport> {
        match self.form.as_mut() {
            Some(form) => fill(&mut self.doc, form, values, style),
            None => Ok(FillReport {
                missing: values.iter().map(|(name, _)| name.to_string()).collect(),
                ..FillReport::default()
            }),
        }
    }

    /// Flatten the form; the document has no form afterwards
    pub fn flatten(&mut self, style: &AppearanceStyle) -> Result<FlattenReport> {
        match self.form.take() {
            Some(form) => flatten(&mut self.doc, &form, style),
            None => Ok(FlattenReport::default()),
        }
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P, subset_fonts: bool) -> Result<()> {
        self.doc.save(path, &save_options(subset_fonts))?;
        Ok(())
    }

    pub fn write<W: Write>(&mut self, sink: &mut W, subset_fonts: bool) -> Result<()> {
        self.doc.save_to(sink, &save_options(subset_fonts))?;
        Ok(())
    }

    pub fn to_bytes(&mut self, subset_fonts: bool) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer, subset_fonts)?;
        Ok(buffer)
    }
}

fn save_options(subset_fonts: bool) -> SaveOptions {
    SaveOptions {
        subset_fonts,
        ..SaveOptions::default()
    }
}

/// Fill `input` with `values`, optionally flatten, and write `output`
pub fn fill_and_flatten<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    values: &FieldValueMap,
    style: &AppearanceStyle,
    options: &PipelineOptions,
) -> Result<FillReport> {
    let mut doc = FormDocument::open(input)?;
    let report = doc.fill(values, style)?;
    if options.flatten {
        let flattened = doc.flatten(style)?;
        log::info!(
            "removed {} fields, drew {} widgets",
            flattened.fields_removed,
            flattened.flattened
        );
    }
    doc.save(output, options.subset_fonts)?;
    Ok(report)
}
