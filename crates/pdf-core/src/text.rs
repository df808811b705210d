//! Text rendering utilities

use crate::geometry::fmt_num;
use crate::Align;

/// RGB Color (values 0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new RGB color (values 0.0 - 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create color from RGB values (0-255)
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Gray level as RGB
    pub fn gray(level: f32) -> Self {
        Self::rgb(level, level, level)
    }

    /// Naive CMYK to RGB conversion
    pub fn from_cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        Self::rgb(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )
    }

    /// Black color
    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }

    /// Red color
    pub fn red() -> Self {
        Self::rgb(1.0, 0.0, 0.0)
    }

    /// Non-stroking color operator (`r g b rg`)
    pub fn fill_operator(&self) -> String {
        format!(
            "{} {} {} rg\n",
            fmt_num(self.r as f64),
            fmt_num(self.g as f64),
            fmt_num(self.b as f64)
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// A piece of a line drawn with a single font
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// PDF font resource name (e.g., "F1")
    pub font_name: String,
    /// Encoded string operand bytes
    pub encoded: Vec<u8>,
}

/// Context for rendering text
pub struct TextRenderContext {
    /// Font size in points
    pub font_size: f32,
    /// Text width in points (for alignment)
    pub text_width: f64,
    /// Text color (RGB)
    pub color: Color,
}

/// Calculate X offset for text alignment
///
/// # Arguments
/// * `text_width` - Width of text in points
/// * `container_width` - Available width for alignment
/// * `align` - Desired alignment
pub fn calculate_x_offset(text_width: f64, container_width: f64, align: Align) -> f64 {
    match align {
        Align::Left => 0.0,
        Align::Center => (container_width - text_width) / 2.0,
        Align::Right => container_width - text_width,
    }
}

/// Hex string operand (`<...>`)
pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 2);
    out.push('<');
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out.push('>');
    out
}

/// Generate PDF operators for one line of text
///
/// Emits BT, color, then `Tf`/`Tj` per run (switching fonts mid-line when the
/// runs differ), and ET. `x` is the anchor point for `align`.
///
/// # Arguments
/// * `runs` - Font runs making up the line
/// * `x` - X coordinate in points
/// * `y` - Baseline Y coordinate in points
/// * `align` - Text alignment relative to `x`
/// * `ctx` - Text rendering context
pub fn generate_text_operators(
    runs: &[TextRun],
    x: f64,
    y: f64,
    align: Align,
    ctx: &TextRenderContext,
) -> Vec<u8> {
    let mut ops = String::new();

    let x_offset = match align {
        Align::Left => 0.0,
        Align::Center => -ctx.text_width / 2.0,
        Align::Right => -ctx.text_width,
    };

    ops.push_str("BT\n");
    ops.push_str(&ctx.color.fill_operator());

    let mut current_font: Option<&str> = None;
    let mut positioned = false;
    for run in runs {
        if current_font != Some(run.font_name.as_str()) {
            ops.push_str(&format!(
                "/{} {} Tf\n",
                run.font_name,
                fmt_num(ctx.font_size as f64)
            ));
            current_font = Some(run.font_name.as_str());
        }
        if !positioned {
            ops.push_str(&format!("{} {} Td\n", fmt_num(x + x_offset), fmt_num(y)));
            positioned = true;
        }
        ops.push_str(&format!("{} Tj\n", hex_string(&run.encoded)));
    }

    ops.push_str("ET\n");

    ops.into_bytes()
}

/// Split text into lines that fit `max_width`
///
/// Explicit line breaks (`\n`, `\r\n`, `\r`) are kept. Words are separated by
/// spaces; a word wider than the line is broken between characters.
///
/// # Arguments
/// * `text` - Text to split
/// * `max_width` - Maximum line width (same unit as `measure`)
/// * `measure` - Width of a string
pub fn wrap_text<F>(text: &str, max_width: f64, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f64,
{
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = Vec::new();

    for paragraph in normalized.split('\n') {
        let mut current_line = String::new();

        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };

            if measure(&candidate) <= max_width {
                current_line = candidate;
                continue;
            }

            if !current_line.is_empty() {
                lines.push(std::mem::take(&mut current_line));
            }

            if measure(word) <= max_width {
                current_line = word.to_string();
            } else {
                for c in word.chars() {
                    let mut next = current_line.clone();
                    next.push(c);
                    if !current_line.is_empty() && measure(&next) > max_width {
                        lines.push(std::mem::take(&mut current_line));
                        current_line.push(c);
                    } else {
                        current_line = next;
                    }
                }
            }
        }

        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}
