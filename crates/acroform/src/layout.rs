//! Text placement inside a widget
//!
//! Everything here works in the appearance's own space: `(0, 0)` is the
//! lower-left corner of the bounding box. Widths come from a measuring
//! callback so the same code serves standard and embedded fonts.

use lopdf::content::Content;
use lopdf::Object;
use pdf_core::geometry::{fmt_num, number};
use pdf_core::{calculate_x_offset, Align, Color};

/// Inset from the widget border
pub const MARGIN: f64 = 2.0;
/// Largest size picked by auto-sizing
pub const AUTO_SIZE_MAX: f32 = 12.0;
/// Smallest size picked by auto-sizing
pub const AUTO_SIZE_MIN: f32 = 4.0;

const AUTO_SIZE_STEP: f32 = 0.5;

/// Parsed `/DA` string
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultAppearance {
    /// Font resource name from `Tf`
    pub font: Option<String>,
    /// Size from `Tf`, `0` for auto
    pub size: f32,
    pub color: Color,
}

impl Default for DefaultAppearance {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            color: Color::black(),
        }
    }
}

impl DefaultAppearance {
    /// Parse a `/DA` string; unreadable parts keep their defaults
    pub fn parse(da: &str) -> Self {
        let mut parsed = Self::default();
        let Ok(content) = Content::decode(da.as_bytes()) else {
            log::warn!("unreadable /DA {da:?}");
            return parsed;
        };

        for op in content.operations {
            let nums: Vec<f32> = op
                .operands
                .iter()
                .filter_map(number)
                .map(|n| n as f32)
                .collect();
            match (op.operator.as_str(), nums.as_slice()) {
                ("Tf", [size]) => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        parsed.font = Some(String::from_utf8_lossy(name).into_owned());
                    }
                    parsed.size = size.max(0.0);
                }
                ("g", [gray]) => parsed.color = Color::gray(*gray),
                ("rg", [r, g, b]) => parsed.color = Color::rgb(*r, *g, *b),
                ("k", [c, m, y, k]) => parsed.color = Color::from_cmyk(*c, *m, *y, *k),
                _ => {}
            }
        }
        parsed
    }

    /// `/DA` string naming `font` at `size`
    pub fn to_da_string(&self, font: &str, size: f32) -> String {
        format!(
            "/{font} {} Tf {}",
            fmt_num(size as f64),
            self.color.fill_operator().trim_end()
        )
    }
}

/// What to lay out and where
#[derive(Debug, Clone, Copy)]
pub struct LayoutParams {
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
    /// Fixed size, `None` to auto-size
    pub font_size: Option<f32>,
    pub multiline: bool,
    /// Number of comb cells
    pub comb: Option<usize>,
    pub align: Align,
    /// Font ascender in 1/1000 em
    pub ascent: f32,
    /// Font descender in 1/1000 em (negative)
    pub descent: f32,
}

impl LayoutParams {
    fn inner_width(&self) -> f64 {
        (self.width - 2.0 * MARGIN).max(0.0)
    }

    fn inner_height(&self) -> f64 {
        (self.height - 2.0 * MARGIN).max(0.0)
    }

    /// Height of a line of text per point of font size
    fn em_height(&self) -> f64 {
        let h = (self.ascent - self.descent) as f64 / 1000.0;
        if h > 0.0 {
            h
        } else {
            1.0
        }
    }

    /// Baseline that centres one line vertically
    fn centered_baseline(&self, size: f32) -> f64 {
        let size = size as f64;
        (self.height - self.em_height() * size) / 2.0 - self.descent as f64 / 1000.0 * size
    }
}

/// A piece of text at its start position
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedLine {
    pub text: String,
    pub x: f64,
    /// Baseline
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub font_size: f32,
    pub lines: Vec<PositionedLine>,
}

/// Lay out `text`; `measure(text, size)` returns a width in points
pub fn layout_text<F>(text: &str, params: &LayoutParams, measure: F) -> TextLayout
where
    F: Fn(&str, f32) -> f64,
{
    if let Some(cells) = params.comb {
        return layout_comb(text, cells, params, &measure);
    }
    if params.multiline {
        return layout_multiline(text, params, &measure);
    }
    layout_single_line(text, params, &measure)
}

fn layout_single_line<F>(text: &str, params: &LayoutParams, measure: &F) -> TextLayout
where
    F: Fn(&str, f32) -> f64,
{
    // Line breaks make no sense on a single line
    let text: String = text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }).collect();
    let inner_w = params.inner_width();

    let size = match params.font_size {
        Some(size) => size,
        None => {
            let by_height = (params.inner_height() / params.em_height()) as f32;
            let mut size = by_height.min(AUTO_SIZE_MAX);
            let width = measure(&text, size);
            if width > inner_w && width > 0.0 {
                size = (size as f64 * inner_w / width) as f32;
            }
            size.max(AUTO_SIZE_MIN)
        }
    };

    let text = truncate_to_width(&text, inner_w, |t| measure(t, size));
    let lines = if text.is_empty() {
        Vec::new()
    } else {
        let width = measure(&text, size);
        vec![PositionedLine {
            x: MARGIN + calculate_x_offset(width, inner_w, params.align),
            y: params.centered_baseline(size),
            text,
        }]
    };

    TextLayout {
        font_size: size,
        lines,
    }
}

fn layout_multiline<F>(text: &str, params: &LayoutParams, measure: &F) -> TextLayout
where
    F: Fn(&str, f32) -> f64,
{
    let inner_w = params.inner_width();
    let inner_h = params.inner_height();
    let wrap = |size: f32| pdf_core::wrap_text(text, inner_w, |t| measure(t, size));

    let (size, wrapped) = match params.font_size {
        Some(size) => (size, wrap(size)),
        None => {
            let mut size = AUTO_SIZE_MAX;
            loop {
                let lines = wrap(size);
                let needed = lines.len() as f64 * params.em_height() * size as f64;
                if needed <= inner_h || size <= AUTO_SIZE_MIN {
                    break (size, lines);
                }
                size = (size - AUTO_SIZE_STEP).max(AUTO_SIZE_MIN);
            }
        }
    };

    let line_height = params.em_height() * size as f64;
    let ascent = params.ascent as f64 / 1000.0 * size as f64;
    let descent = params.descent as f64 / 1000.0 * size as f64;

    let mut lines = Vec::new();
    let mut y = params.height - MARGIN - ascent;
    for line in wrapped {
        // The first line is always drawn; later ones only while they fit
        if !lines.is_empty() && y + descent < MARGIN - 1e-6 {
            log::debug!("dropping overflowing line {line:?}");
            break;
        }
        if !line.is_empty() {
            let width = measure(&line, size);
            lines.push(PositionedLine {
                x: MARGIN + calculate_x_offset(width, inner_w, params.align),
                y,
                text: line,
            });
        } else if lines.is_empty() {
            lines.push(PositionedLine {
                text: line,
                x: MARGIN,
                y,
            });
        }
        y -= line_height;
    }
    lines.retain(|l| !l.text.is_empty());

    TextLayout {
        font_size: size,
        lines,
    }
}

fn layout_comb<F>(text: &str, cells: usize, params: &LayoutParams, measure: &F) -> TextLayout
where
    F: Fn(&str, f32) -> f64,
{
    let cell_w = params.width / cells as f64;
    let chars: Vec<char> = text.chars().filter(|c| !c.is_control()).take(cells).collect();

    let size = match params.font_size {
        Some(size) => size,
        None => {
            let mut size = ((params.inner_height() / params.em_height()) as f32).min(AUTO_SIZE_MAX);
            let widest = chars
                .iter()
                .map(|c| measure(&c.to_string(), size))
                .fold(0.0, f64::max);
            if widest > cell_w && widest > 0.0 {
                size = (size as f64 * cell_w / widest) as f32;
            }
            size.max(AUTO_SIZE_MIN)
        }
    };

    let y = params.centered_baseline(size);
    let lines = chars
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let text = c.to_string();
            let width = measure(&text, size);
            PositionedLine {
                x: i as f64 * cell_w + (cell_w - width) / 2.0,
                y,
                text,
            }
        })
        .collect();

    TextLayout {
        font_size: size,
        lines,
    }
}

/// Longest prefix of `text` no wider than `max_width`
fn truncate_to_width<F>(text: &str, max_width: f64, measure: F) -> String
where
    F: Fn(&str) -> f64,
{
    if measure(text) <= max_width {
        return text.to_string();
    }
    let mut kept = String::new();
    for c in text.chars() {
        kept.push(c);
        if measure(&kept) > max_width {
            kept.pop();
            break;
        }
    }
    log::debug!("truncated {text:?} to {kept:?}");
    kept
}
