//! Built-in (standard 14) fonts
//!
//! Standard fonts are referenced by name and never embedded. Only the families
//! whose metrics are bundled here can be measured; glyph coverage is printable
//! ASCII (codes 32..=126 in WinAnsiEncoding).

use crate::{PdfError, Result};
use lopdf::{dictionary, Dictionary};

const FIRST_CHAR: u32 = 32;
const LAST_CHAR: u32 = 126;

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

/// Metrics family of a standard font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metrics {
    Helvetica,
    HelveticaBold,
    TimesRoman,
    Courier,
}

/// A standard font with bundled metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardFont {
    base_font: &'static str,
    metrics: Metrics,
}

impl StandardFont {
    /// Standard font names accepted by [`StandardFont::from_name`]
    pub const SUPPORTED: [&'static str; 9] = [
        "Helvetica",
        "Helvetica-Oblique",
        "Helvetica-Bold",
        "Helvetica-BoldOblique",
        "Times-Roman",
        "Courier",
        "Courier-Oblique",
        "Courier-Bold",
        "Courier-BoldOblique",
    ];

    /// Look up a standard font by its PostScript name
    pub fn from_name(name: &str) -> Result<Self> {
        let metrics = match name {
            "Helvetica" | "Helvetica-Oblique" => Metrics::Helvetica,
            "Helvetica-Bold" | "Helvetica-BoldOblique" => Metrics::HelveticaBold,
            "Times-Roman" => Metrics::TimesRoman,
            "Courier" | "Courier-Oblique" | "Courier-Bold" | "Courier-BoldOblique" => {
                Metrics::Courier
            }
            _ => {
                return Err(PdfError::FontParseError(format!(
                    "no metrics bundled for standard font '{name}'"
                )))
            }
        };
        let base_font = Self::SUPPORTED
            .iter()
            .find(|candidate| **candidate == name)
            .copied()
            .unwrap_or("Helvetica");
        Ok(Self { base_font, metrics })
    }

    /// Check whether a name refers to one of the bundled standard fonts
    pub fn is_standard_name(name: &str) -> bool {
        Self::SUPPORTED.contains(&name)
    }

    pub fn base_font(&self) -> &'static str {
        self.base_font
    }

    /// Advance width in 1/1000 em, `None` if the glyph is not covered
    pub fn glyph_advance(&self, c: char) -> Option<u16> {
        let code = c as u32;
        if !(FIRST_CHAR..=LAST_CHAR).contains(&code) {
            return None;
        }
        let index = (code - FIRST_CHAR) as usize;
        Some(match self.metrics {
            Metrics::Helvetica => HELVETICA_WIDTHS[index],
            Metrics::HelveticaBold => HELVETICA_BOLD_WIDTHS[index],
            Metrics::TimesRoman => TIMES_ROMAN_WIDTHS[index],
            Metrics::Courier => 600,
        })
    }

    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_advance(c).is_some()
    }

    pub fn ascender(&self) -> i16 {
        match self.metrics {
            Metrics::Helvetica | Metrics::HelveticaBold => 718,
            Metrics::TimesRoman => 683,
            Metrics::Courier => 629,
        }
    }

    pub fn descender(&self) -> i16 {
        match self.metrics {
            Metrics::Helvetica | Metrics::HelveticaBold => -207,
            Metrics::TimesRoman => -217,
            Metrics::Courier => -157,
        }
    }

    /// Encode text as single-byte WinAnsi codes
    pub fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| if self.has_glyph(c) { c as u8 } else { b'?' })
            .collect()
    }

    /// Font resource dictionary (not embedded)
    pub fn to_dictionary(&self) -> Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => self.base_font,
            "Encoding" => "WinAnsiEncoding",
        }
    }
}
