//! Rectangles and affine transforms in PDF user space

use lopdf::Object;

/// Axis-aligned rectangle, normalized so that `x1 <= x2` and `y1 <= y2`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Parse a `[llx lly urx ury]` array (integers or reals)
    pub fn from_array(values: &[Object]) -> Option<Self> {
        if values.len() != 4 {
            return None;
        }
        let mut nums = [0.0f64; 4];
        for (slot, value) in nums.iter_mut().zip(values) {
            *slot = number(value)?;
        }
        Some(Self::new(nums[0], nums[1], nums[2], nums[3]))
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.x1 as f32),
            Object::Real(self.y1 as f32),
            Object::Real(self.x2 as f32),
            Object::Real(self.y2 as f32),
        ])
    }
}

/// 2D affine matrix `[a b c d e f]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn from_array(values: &[Object]) -> Option<Self> {
        if values.len() != 6 {
            return None;
        }
        let mut nums = [0.0f64; 6];
        for (slot, value) in nums.iter_mut().zip(values) {
            *slot = number(value)?;
        }
        Some(Self {
            a: nums[0],
            b: nums[1],
            c: nums[2],
            d: nums[3],
            e: nums[4],
            f: nums[5],
        })
    }

    /// Apply `self` first, then `other`
    pub fn then(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box of the transformed corners of `rect`
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.x1, rect.y1),
            self.transform_point(rect.x2, rect.y1),
            self.transform_point(rect.x2, rect.y2),
            self.transform_point(rect.x1, rect.y2),
        ];
        let (mut x1, mut y1) = corners[0];
        let (mut x2, mut y2) = corners[0];
        for (x, y) in &corners[1..] {
            x1 = x1.min(*x);
            y1 = y1.min(*y);
            x2 = x2.max(*x);
            y2 = y2.max(*y);
        }
        Rect { x1, y1, x2, y2 }
    }

    /// Matrix mapping `from` onto `to` with independent x/y scale
    pub fn rect_to_rect(from: &Rect, to: &Rect) -> Self {
        let sx = if from.width().abs() > f64::EPSILON {
            to.width() / from.width()
        } else {
            1.0
        };
        let sy = if from.height().abs() > f64::EPSILON {
            to.height() / from.height()
        } else {
            1.0
        };
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            e: to.x1 - from.x1 * sx,
            f: to.y1 - from.y1 * sy,
        }
    }

    /// Format as a `cm` operator line
    pub fn to_cm(&self) -> String {
        format!(
            "{} {} {} {} {} {} cm\n",
            fmt_num(self.a),
            fmt_num(self.b),
            fmt_num(self.c),
            fmt_num(self.d),
            fmt_num(self.e),
            fmt_num(self.f)
        )
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Read an integer or real PDF number
pub fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Format a number for content streams: at most 4 decimals, no trailing zeros
pub fn fmt_num(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        let s = format!("{rounded:.4}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
