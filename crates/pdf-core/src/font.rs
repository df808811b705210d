//! Font handling for PDF documents

use crate::standard::StandardFont;
use crate::subset::GlyphSubset;
use crate::{PdfError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Object, Stream};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

/// Where a font program comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FontSource {
    /// Built-in standard font, referenced by name and never embedded
    Standard(String),
    /// TrueType file embedded as a simple font with WinAnsi 1-byte codes
    TrueType(PathBuf),
    /// TrueType file embedded as a Type0/CIDFontType2 font with 2-byte glyph IDs
    Composite(PathBuf),
}

impl std::fmt::Display for FontSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontSource::Standard(name) => write!(f, "std:{name}"),
            FontSource::TrueType(path) => write!(f, "ttf:{}", path.display()),
            FontSource::Composite(path) => write!(f, "cid:{}", path.display()),
        }
    }
}

/// How text is encoded for an embedded TrueType font
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontEncoding {
    /// One byte per character, WinAnsiEncoding
    Simple,
    /// Two bytes per glyph, Identity-H (glyph ID used as CID)
    #[default]
    Composite,
}

/// Font data structure for embedded fonts
#[derive(Debug, Clone)]
pub struct FontData {
    /// Font name (used as BaseFont)
    pub name: String,
    /// Raw TTF data
    pub ttf_data: Vec<u8>,
    /// Encoding used in content streams
    pub encoding: FontEncoding,
    /// Characters used (for widths, ToUnicode and subsetting)
    pub used_chars: BTreeSet<char>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    bbox: [i16; 4],
    italic: bool,
    monospaced: bool,
}

/// PDF objects generated for font embedding
///
/// References between the objects are placeholders until the document
/// assigns object IDs.
pub struct FontObjects {
    /// Top-level font dictionary (Type0 or TrueType)
    pub font: Dictionary,
    /// CIDFontType2 dictionary (composite fonts only)
    pub cid_font: Option<Dictionary>,
    /// Font descriptor dictionary
    pub font_descriptor: Dictionary,
    /// Font file stream (TTF data, possibly subsetted)
    pub font_file_stream: Stream,
    /// ToUnicode CMap stream (composite fonts only)
    pub tounicode_stream: Option<Stream>,
    /// CIDToGIDMap stream (subsetted composite fonts only)
    pub cid_to_gid_stream: Option<Stream>,
}

#[rustfmt::skip]
const WINANSI_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'), (0x82, '\u{201A}'), (0x83, '\u{0192}'), (0x84, '\u{201E}'),
    (0x85, '\u{2026}'), (0x86, '\u{2020}'), (0x87, '\u{2021}'), (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'), (0x8A, '\u{0160}'), (0x8B, '\u{2039}'), (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'), (0x91, '\u{2018}'), (0x92, '\u{2019}'), (0x93, '\u{201C}'),
    (0x94, '\u{201D}'), (0x95, '\u{2022}'), (0x96, '\u{2013}'), (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'), (0x99, '\u{2122}'), (0x9A, '\u{0161}'), (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'), (0x9E, '\u{017E}'), (0x9F, '\u{0178}'),
];

/// WinAnsiEncoding code for a character
pub fn winansi_code(c: char) -> Option<u8> {
    let code = c as u32;
    if (0x20..=0x7E).contains(&code) || (0xA0..=0xFF).contains(&code) {
        return Some(code as u8);
    }
    WINANSI_HIGH
        .iter()
        .find(|(_, ch)| *ch == c)
        .map(|(byte, _)| *byte)
}

/// Character for a WinAnsiEncoding code
pub fn winansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        _ => WINANSI_HIGH
            .iter()
            .find(|(byte, _)| *byte == code)
            .map(|(_, ch)| *ch),
    }
}

impl FontData {
    /// Create font data from TTF bytes
    ///
    /// # Arguments
    /// * `name` - Font name override; the PostScript name is used when `None`
    /// * `ttf_data` - TrueType font file bytes
    /// * `encoding` - Content stream encoding
    pub fn from_ttf(name: Option<&str>, ttf_data: &[u8], encoding: FontEncoding) -> Result<Self> {
        let face = ttf_parser::Face::parse(ttf_data, 0)
            .map_err(|e| PdfError::FontParseError(format!("{e:?}")))?;

        let postscript_name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string());
        let name = sanitize_font_name(
            name.map(str::to_string)
                .or(postscript_name)
                .as_deref()
                .unwrap_or("EmbeddedFont"),
        );

        let bbox = face.global_bounding_box();

        Ok(Self {
            name,
            ttf_data: ttf_data.to_vec(),
            encoding,
            used_chars: BTreeSet::new(),
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            cap_height: face.capital_height().unwrap_or(face.ascender()),
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            italic: face.is_italic(),
            monospaced: face.is_monospaced(),
        })
    }

    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.ttf_data, 0).ok()
    }

    /// Add characters to the used set
    pub fn add_chars(&mut self, text: &str) {
        for c in text.chars() {
            self.used_chars.insert(c);
        }
    }

    /// Get glyph ID for a character (`None` for unmapped characters)
    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.face()
            .and_then(|face| face.glyph_index(c))
            .map(|id| id.0)
            .filter(|id| *id != 0)
    }

    /// Check if font can render the given character with its encoding
    pub fn has_glyph(&self, c: char) -> bool {
        match self.encoding {
            FontEncoding::Simple => winansi_code(c).is_some() && self.glyph_id(c).is_some(),
            FontEncoding::Composite => self.glyph_id(c).is_some(),
        }
    }

    /// Get glyph advance width in font units
    pub fn glyph_advance(&self, c: char) -> Option<u16> {
        self.face().and_then(|face| {
            let glyph_id = face.glyph_index(c)?;
            face.glyph_hor_advance(glyph_id)
        })
    }

    /// Get font units per em
    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Get font ascender in font units
    pub fn ascender(&self) -> i16 {
        self.ascender
    }

    /// Get font descender in font units
    pub fn descender(&self) -> i16 {
        self.descender
    }

    /// Scale a value in font units to PDF glyph space (1/1000 em)
    fn to_glyph_space(&self, value: f32) -> f32 {
        value * 1000.0 / self.units_per_em.max(1) as f32
    }

    /// Calculate text width in font units
    pub fn text_width(&self, text: &str) -> u32 {
        let Some(face) = self.face() else {
            return 0;
        };
        text.chars()
            .filter_map(|c| face.glyph_index(c).and_then(|g| face.glyph_hor_advance(g)))
            .map(|w| w as u32)
            .sum()
    }

    /// Calculate text width in points for a given font size
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        let width = self.text_width(text);
        let units_per_em = self.units_per_em.max(1) as f32;
        (width as f32 / units_per_em) * font_size
    }

    /// Encode text as content stream bytes
    ///
    /// Simple fonts produce one WinAnsi byte per character, composite fonts two
    /// big-endian bytes per glyph ID. Unmapped characters become `?` or GID 0.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self.encoding {
            FontEncoding::Simple => text
                .chars()
                .map(|c| winansi_code(c).unwrap_or(b'?'))
                .collect(),
            FontEncoding::Composite => {
                let face = self.face();
                let mut out = Vec::with_capacity(text.len() * 2);
                for c in text.chars() {
                    let gid = face
                        .as_ref()
                        .and_then(|f| f.glyph_index(c))
                        .map(|g| g.0)
                        .unwrap_or(0);
                    out.extend_from_slice(&gid.to_be_bytes());
                }
                out
            }
        }
    }

    /// Generate all PDF objects needed to embed this font
    ///
    /// When `subset` is given, the font program is replaced by the subsetted
    /// one and a CIDToGIDMap keeps the original glyph IDs valid as CIDs.
    pub fn to_pdf_objects(&self, subset: Option<&GlyphSubset>) -> Result<FontObjects> {
        let base_font = match subset {
            Some(s) => format!("{}+{}", s.tag(), self.name),
            None => self.name.clone(),
        };
        let font_name = Object::Name(base_font.clone().into_bytes());

        let program = subset.map(|s| s.data.as_slice()).unwrap_or(&self.ttf_data);
        let font_file_stream = compressed_stream(
            dictionary! { "Length1" => program.len() as i64 },
            program,
        )?;

        let scale = |v: i16| self.to_glyph_space(v as f32).round() as i64;
        let flags = match self.encoding {
            FontEncoding::Simple => 32, // Nonsymbolic
            FontEncoding::Composite => 4,
        } | if self.italic { 64 } else { 0 }
            | if self.monospaced { 1 } else { 0 };

        let font_descriptor = dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => font_name.clone(),
            "Flags" => flags,
            "FontBBox" => vec![
                scale(self.bbox[0]).into(),
                scale(self.bbox[1]).into(),
                scale(self.bbox[2]).into(),
                scale(self.bbox[3]).into(),
            ],
            "ItalicAngle" => if self.italic { -12 } else { 0 },
            "Ascent" => scale(self.ascender),
            "Descent" => scale(self.descender),
            "CapHeight" => scale(self.cap_height),
            "StemV" => 80,
            "FontFile2" => Object::Reference((0, 0)),
        };

        match self.encoding {
            FontEncoding::Simple => {
                let font = dictionary! {
                    "Type" => "Font",
                    "Subtype" => "TrueType",
                    "BaseFont" => font_name,
                    "FirstChar" => 32,
                    "LastChar" => 255,
                    "Widths" => self.generate_simple_widths(),
                    "Encoding" => "WinAnsiEncoding",
                    "FontDescriptor" => Object::Reference((0, 0)),
                };
                Ok(FontObjects {
                    font,
                    cid_font: None,
                    font_descriptor,
                    font_file_stream,
                    tounicode_stream: None,
                    cid_to_gid_stream: None,
                })
            }
            FontEncoding::Composite => {
                let tounicode_content = self.generate_tounicode_cmap();
                let tounicode_stream = Stream::new(
                    dictionary! { "Type" => "CMap" },
                    tounicode_content.into_bytes(),
                );

                let cid_system_info = dictionary! {
                    "Registry" => Object::string_literal("Adobe"),
                    "Ordering" => Object::string_literal("Identity"),
                    "Supplement" => 0,
                };

                let (cid_to_gid, cid_to_gid_stream) = match subset {
                    Some(s) => (
                        Object::Reference((0, 0)),
                        Some(compressed_stream(Dictionary::new(), &s.cid_to_gid_map())?),
                    ),
                    None => (Object::Name(b"Identity".to_vec()), None),
                };

                let cid_font = dictionary! {
                    "Type" => "Font",
                    "Subtype" => "CIDFontType2",
                    "BaseFont" => font_name.clone(),
                    "CIDSystemInfo" => cid_system_info,
                    "FontDescriptor" => Object::Reference((0, 0)),
                    "W" => self.generate_widths_array(),
                    "DW" => 1000,
                    "CIDToGIDMap" => cid_to_gid,
                };

                let font = dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type0",
                    "BaseFont" => font_name,
                    "Encoding" => "Identity-H",
                    "DescendantFonts" => vec![Object::Reference((0, 0))],
                    "ToUnicode" => Object::Reference((0, 0)),
                };

                Ok(FontObjects {
                    font,
                    cid_font: Some(cid_font),
                    font_descriptor,
                    font_file_stream,
                    tounicode_stream: Some(tounicode_stream),
                    cid_to_gid_stream,
                })
            }
        }
    }

    /// Generate /Widths for codes 32..=255 (simple fonts)
    fn generate_simple_widths(&self) -> Vec<Object> {
        (32u8..=255)
            .map(|code| {
                let width = winansi_char(code)
                    .filter(|c| self.glyph_id(*c).is_some())
                    .and_then(|c| self.glyph_advance(c))
                    .map(|w| self.to_glyph_space(w as f32).round() as i64)
                    .unwrap_or(0);
                Object::Integer(width)
            })
            .collect()
    }

    /// Generate /W array for glyph widths (composite fonts)
    fn generate_widths_array(&self) -> Vec<Object> {
        let mut widths = Vec::new();
        let face = match self.face() {
            Some(f) => f,
            None => return widths,
        };

        let mut gids: Vec<u16> = self
            .used_chars
            .iter()
            .filter_map(|&c| self.glyph_id(c))
            .collect();
        gids.sort();
        gids.dedup();

        // Individual mapping format: [gid1 [width1] gid2 [width2] ...]
        for gid in gids {
            let advance = face
                .glyph_hor_advance(ttf_parser::GlyphId(gid))
                .map(|w| self.to_glyph_space(w as f32).round() as i64)
                .unwrap_or(1000);
            widths.push((gid as i64).into());
            widths.push(vec![advance.into()].into());
        }

        widths
    }

    /// Generate ToUnicode CMap stream content
    fn generate_tounicode_cmap(&self) -> String {
        let mut cmap = String::new();

        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
        cmap.push_str("/CMapType 2 def\n");

        cmap.push_str("1 begincodespacerange\n");
        cmap.push_str("<0000> <FFFF>\n");
        cmap.push_str("endcodespacerange\n");

        let mapped: Vec<(u16, char)> = self
            .used_chars
            .iter()
            .filter_map(|&c| self.glyph_id(c).map(|gid| (gid, c)))
            .collect();

        // bfchar sections are limited to 100 entries
        for chunk in mapped.chunks(100) {
            cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
            for (gid, c) in chunk {
                let mut units = [0u16; 2];
                let hex: String = c
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|u| format!("{u:04X}"))
                    .collect();
                cmap.push_str(&format!("<{gid:04X}> <{hex}>\n"));
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\n");
        cmap.push_str("end\n");

        cmap
    }
}

/// A font usable in appearance streams
///
/// Dispatches measuring and glyph encoding over the supported font kinds.
#[derive(Debug, Clone)]
pub enum PdfFont {
    Standard(StandardFont),
    TrueType(FontData),
}

impl PdfFont {
    /// Load a font from its source
    pub fn load(source: &FontSource) -> Result<Self> {
        match source {
            FontSource::Standard(name) => Ok(PdfFont::Standard(StandardFont::from_name(name)?)),
            FontSource::TrueType(path) | FontSource::Composite(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    PdfError::FontParseError(format!(
                        "failed to read font {}: {e}",
                        path.display()
                    ))
                })?;
                let encoding = if matches!(source, FontSource::Composite(_)) {
                    FontEncoding::Composite
                } else {
                    FontEncoding::Simple
                };
                let font = FontData::from_ttf(None, &data, encoding).map_err(|e| {
                    PdfError::FontParseError(format!("{}: {e}", path.display()))
                })?;
                Ok(PdfFont::TrueType(font))
            }
        }
    }

    /// BaseFont name
    pub fn name(&self) -> &str {
        match self {
            PdfFont::Standard(font) => font.base_font(),
            PdfFont::TrueType(font) => &font.name,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, PdfFont::TrueType(f) if f.encoding == FontEncoding::Composite)
    }

    pub fn has_glyph(&self, c: char) -> bool {
        match self {
            PdfFont::Standard(font) => font.has_glyph(c),
            PdfFont::TrueType(font) => font.has_glyph(c),
        }
    }

    /// Measure text in points
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        match self {
            PdfFont::Standard(font) => {
                let units: u32 = text
                    .chars()
                    .filter_map(|c| font.glyph_advance(c))
                    .map(u32::from)
                    .sum();
                units as f32 / 1000.0 * font_size
            }
            PdfFont::TrueType(font) => font.text_width_points(text, font_size),
        }
    }

    /// Ascender in 1/1000 em
    pub fn ascender(&self) -> f32 {
        match self {
            PdfFont::Standard(font) => font.ascender() as f32,
            PdfFont::TrueType(font) => font.to_glyph_space(font.ascender() as f32),
        }
    }

    /// Descender in 1/1000 em (negative)
    pub fn descender(&self) -> f32 {
        match self {
            PdfFont::Standard(font) => font.descender() as f32,
            PdfFont::TrueType(font) => font.to_glyph_space(font.descender() as f32),
        }
    }

    /// Encode text into the string operand bytes for `Tj`
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            PdfFont::Standard(font) => font.encode(text),
            PdfFont::TrueType(font) => font.encode(text),
        }
    }

    /// Track characters drawn with this font
    pub fn add_chars(&mut self, text: &str) {
        if let PdfFont::TrueType(font) = self {
            font.add_chars(text);
        }
    }
}

/// Build a Flate-compressed stream
pub(crate) fn compressed_stream(mut dict: Dictionary, data: &[u8]) -> Result<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    Ok(Stream::new(dict, compressed))
}

/// Keep only characters allowed in a PDF name without escaping
fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}
