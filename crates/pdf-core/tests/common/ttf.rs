//! Minimal TrueType font builder for tests
//!
//! Glyph `n` (1-based, in ascending code point order of the requested
//! characters) is a rectangle `100 + 10 * n` units wide with an advance of
//! `200 + 10 * n`. Glyph 0 is a 100 unit wide `.notdef` box. Units per em is
//! 1000, ascender 800, descender -200.

#![allow(dead_code)]

pub const UNITS_PER_EM: u16 = 1000;

/// Build a font covering `chars`
pub fn build_font(postscript_name: &str, chars: &[char]) -> Vec<u8> {
    let mut chars = chars.to_vec();
    chars.sort();
    chars.dedup();
    let num_glyphs = chars.len() as u16 + 1;

    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    let mut hmtx = Vec::new();
    for gid in 0..num_glyphs {
        loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());
        let width = glyph_width(gid);
        glyf.extend_from_slice(&rectangle_glyph(50, width, 700));
        hmtx.extend_from_slice(&advance(gid).to_be_bytes());
        hmtx.extend_from_slice(&50i16.to_be_bytes());
    }
    loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());

    let max_width = glyph_width(num_glyphs - 1);

    let mut head = Vec::new();
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // version
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // fontRevision
    head.extend_from_slice(&0u32.to_be_bytes()); // checkSumAdjustment
    head.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes()); // magic
    head.extend_from_slice(&0u16.to_be_bytes()); // flags
    head.extend_from_slice(&UNITS_PER_EM.to_be_bytes());
    head.extend_from_slice(&[0u8; 16]); // created, modified
    head.extend_from_slice(&50i16.to_be_bytes()); // xMin
    head.extend_from_slice(&(-200i16).to_be_bytes()); // yMin
    head.extend_from_slice(&(50 + max_width as i16).to_be_bytes()); // xMax
    head.extend_from_slice(&800i16.to_be_bytes()); // yMax
    head.extend_from_slice(&0u16.to_be_bytes()); // macStyle
    head.extend_from_slice(&8u16.to_be_bytes()); // lowestRecPPEM
    head.extend_from_slice(&2i16.to_be_bytes()); // fontDirectionHint
    head.extend_from_slice(&1i16.to_be_bytes()); // indexToLocFormat (long)
    head.extend_from_slice(&0i16.to_be_bytes()); // glyphDataFormat

    let mut hhea = Vec::new();
    hhea.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    hhea.extend_from_slice(&800i16.to_be_bytes()); // ascender
    hhea.extend_from_slice(&(-200i16).to_be_bytes()); // descender
    hhea.extend_from_slice(&0i16.to_be_bytes()); // lineGap
    hhea.extend_from_slice(&advance(num_glyphs - 1).to_be_bytes()); // advanceWidthMax
    hhea.extend_from_slice(&50i16.to_be_bytes()); // minLeftSideBearing
    hhea.extend_from_slice(&50i16.to_be_bytes()); // minRightSideBearing
    hhea.extend_from_slice(&(50 + max_width as i16).to_be_bytes()); // xMaxExtent
    hhea.extend_from_slice(&1i16.to_be_bytes()); // caretSlopeRise
    hhea.extend_from_slice(&0i16.to_be_bytes()); // caretSlopeRun
    hhea.extend_from_slice(&0i16.to_be_bytes()); // caretOffset
    hhea.extend_from_slice(&[0u8; 8]); // reserved
    hhea.extend_from_slice(&0i16.to_be_bytes()); // metricDataFormat
    hhea.extend_from_slice(&num_glyphs.to_be_bytes()); // numberOfHMetrics

    let mut maxp = Vec::new();
    maxp.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    maxp.extend_from_slice(&num_glyphs.to_be_bytes());
    for value in [4u16, 1, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0] {
        maxp.extend_from_slice(&value.to_be_bytes());
    }

    let mut cmap = Vec::new();
    cmap.extend_from_slice(&0u16.to_be_bytes()); // version
    cmap.extend_from_slice(&1u16.to_be_bytes()); // numTables
    cmap.extend_from_slice(&3u16.to_be_bytes()); // platform: Windows
    cmap.extend_from_slice(&10u16.to_be_bytes()); // encoding: Unicode full
    cmap.extend_from_slice(&12u32.to_be_bytes()); // subtable offset
    cmap.extend_from_slice(&12u16.to_be_bytes()); // format
    cmap.extend_from_slice(&0u16.to_be_bytes()); // reserved
    cmap.extend_from_slice(&(16 + 12 * chars.len() as u32).to_be_bytes());
    cmap.extend_from_slice(&0u32.to_be_bytes()); // language
    cmap.extend_from_slice(&(chars.len() as u32).to_be_bytes());
    for (index, c) in chars.iter().enumerate() {
        cmap.extend_from_slice(&(*c as u32).to_be_bytes());
        cmap.extend_from_slice(&(*c as u32).to_be_bytes());
        cmap.extend_from_slice(&(index as u32 + 1).to_be_bytes());
    }

    let mut post = Vec::new();
    post.extend_from_slice(&0x0003_0000u32.to_be_bytes());
    post.extend_from_slice(&0u32.to_be_bytes()); // italicAngle
    post.extend_from_slice(&(-100i16).to_be_bytes()); // underlinePosition
    post.extend_from_slice(&50i16.to_be_bytes()); // underlineThickness
    post.extend_from_slice(&[0u8; 20]); // isFixedPitch, memory hints

    let name_utf16: Vec<u8> = postscript_name
        .encode_utf16()
        .flat_map(|u| u.to_be_bytes())
        .collect();
    let mut name = Vec::new();
    name.extend_from_slice(&0u16.to_be_bytes()); // format
    name.extend_from_slice(&1u16.to_be_bytes()); // count
    name.extend_from_slice(&18u16.to_be_bytes()); // stringOffset
    name.extend_from_slice(&3u16.to_be_bytes()); // platform
    name.extend_from_slice(&1u16.to_be_bytes()); // encoding
    name.extend_from_slice(&0x0409u16.to_be_bytes()); // language
    name.extend_from_slice(&6u16.to_be_bytes()); // PostScript name
    name.extend_from_slice(&(name_utf16.len() as u16).to_be_bytes());
    name.extend_from_slice(&0u16.to_be_bytes());
    name.extend_from_slice(&name_utf16);

    assemble(vec![
        (*b"cmap", cmap),
        (*b"glyf", glyf),
        (*b"head", head),
        (*b"hhea", hhea),
        (*b"hmtx", hmtx),
        (*b"loca", loca),
        (*b"maxp", maxp),
        (*b"name", name),
        (*b"post", post),
    ])
}

/// Outline width of a glyph in font units
pub fn glyph_width(gid: u16) -> u16 {
    100 + 10 * gid
}

/// Advance width of a glyph in font units
pub fn advance(gid: u16) -> u16 {
    200 + 10 * gid
}

/// Glyph ID assigned to `c` by [`build_font`]
pub fn glyph_id(chars: &[char], c: char) -> Option<u16> {
    let mut chars = chars.to_vec();
    chars.sort();
    chars.dedup();
    chars.iter().position(|x| *x == c).map(|i| i as u16 + 1)
}

fn rectangle_glyph(x: i16, width: u16, height: i16) -> Vec<u8> {
    let width = width as i16;
    let mut glyph = Vec::new();
    glyph.extend_from_slice(&1i16.to_be_bytes()); // numberOfContours
    glyph.extend_from_slice(&x.to_be_bytes());
    glyph.extend_from_slice(&0i16.to_be_bytes());
    glyph.extend_from_slice(&(x + width).to_be_bytes());
    glyph.extend_from_slice(&height.to_be_bytes());
    glyph.extend_from_slice(&3u16.to_be_bytes()); // endPtsOfContours
    glyph.extend_from_slice(&0u16.to_be_bytes()); // instructionLength
    glyph.extend_from_slice(&[0x01; 4]); // on-curve, 16-bit deltas
    for dx in [x, width, 0, -width] {
        glyph.extend_from_slice(&dx.to_be_bytes());
    }
    for dy in [0, 0, height, 0] {
        glyph.extend_from_slice(&dy.to_be_bytes());
    }
    while glyph.len() % 4 != 0 {
        glyph.push(0);
    }
    glyph
}

fn assemble(tables: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    let num_tables = tables.len() as u16;
    let mut entry_selector = 0u16;
    while (1u16 << (entry_selector + 1)) <= num_tables {
        entry_selector += 1;
    }
    let search_range = (1u16 << entry_selector) * 16;

    let mut font = Vec::new();
    font.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    font.extend_from_slice(&num_tables.to_be_bytes());
    font.extend_from_slice(&search_range.to_be_bytes());
    font.extend_from_slice(&entry_selector.to_be_bytes());
    font.extend_from_slice(&(num_tables * 16 - search_range).to_be_bytes());

    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(tag);
        font.extend_from_slice(&checksum(data).to_be_bytes());
        font.extend_from_slice(&(offset as u32).to_be_bytes());
        font.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    font.extend_from_slice(&body);
    font
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}
