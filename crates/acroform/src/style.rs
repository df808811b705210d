//! Appearance style: which font draws which field
//!
//! A [`FontSpec`] can be written as a short string:
//!
//! | spec                     | meaning                                   |
//! |--------------------------|-------------------------------------------|
//! | `Helvetica-Oblique`      | standard font (bare known standard name)  |
//! | `std:Courier@10`         | standard font, fixed 10pt                 |
//! | `./DoHyeon-Regular.ttf`  | TrueType file, simple WinAnsi embedding   |
//! | `cid:./mplus.ttf`        | TrueType file, composite (CID) embedding  |
//!
//! A size of `0` (or no `@size`) means auto-size.

use crate::{FormError, Result};
use pdf_core::{FontSource, StandardFont};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A font program plus the size to draw with
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub source: FontSource,
    /// Logical name, for logs only
    pub name: Option<String>,
    /// Point size, `0.0` for auto-size
    pub size: f32,
}

impl FontSpec {
    pub fn new(source: FontSource) -> Self {
        Self {
            source,
            name: None,
            size: 0.0,
        }
    }

    pub fn standard(name: &str) -> Self {
        Self::new(FontSource::Standard(name.to_string()))
    }

    pub fn truetype<P: Into<PathBuf>>(path: P) -> Self {
        Self::new(FontSource::TrueType(path.into()))
    }

    pub fn composite<P: Into<PathBuf>>(path: P) -> Self {
        Self::new(FontSource::Composite(path.into()))
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Fixed size, if any
    pub fn fixed_size(&self) -> Option<f32> {
        (self.size > 0.0).then_some(self.size)
    }

    /// Resolve a relative font path against `base`
    pub fn relative_to(mut self, base: &Path) -> Self {
        self.source = match self.source {
            FontSource::TrueType(path) if path.is_relative() => {
                FontSource::TrueType(base.join(path))
            }
            FontSource::Composite(path) if path.is_relative() => {
                FontSource::Composite(base.join(path))
            }
            other => other,
        };
        self
    }

    /// Label used in logs
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.source.to_string(),
        }
    }
}

impl FromStr for FontSpec {
    type Err = FormError;

    /// Parse `[std:|ttf:|cid:]<name-or-path>[@size]`
    fn from_str(spec: &str) -> Result<Self> {
        let spec = spec.trim();

        // The text after the last `@` is a size only when it parses as a number
        let (body, size) = match spec
            .rsplit_once('@')
            .and_then(|(body, size)| Some((body, size.trim().parse::<f32>().ok()?)))
        {
            Some((_, size)) if size < 0.0 || size.is_nan() => {
                return Err(FormError::MalformedInput(format!(
                    "invalid font size in '{spec}'"
                )))
            }
            Some((body, size)) => (body, size),
            None => (spec, 0.0),
        };

        let source = if let Some(name) = body.strip_prefix("std:") {
            FontSource::Standard(name.to_string())
        } else if let Some(path) = body.strip_prefix("ttf:") {
            FontSource::TrueType(PathBuf::from(path))
        } else if let Some(path) = body.strip_prefix("cid:") {
            FontSource::Composite(PathBuf::from(path))
        } else if StandardFont::is_standard_name(body) {
            FontSource::Standard(body.to_string())
        } else {
            FontSource::TrueType(PathBuf::from(body))
        };

        let empty = match &source {
            FontSource::Standard(name) => name.is_empty(),
            FontSource::TrueType(path) | FontSource::Composite(path) => {
                path.as_os_str().is_empty()
            }
        };
        if empty {
            return Err(FormError::MalformedInput(format!(
                "empty font spec '{spec}'"
            )));
        }

        Ok(Self::new(source).with_size(size))
    }
}

/// Fonts and regeneration policy for a fill
#[derive(Debug, Clone, PartialEq)]
pub struct AppearanceStyle {
    /// Font for every field without an override
    pub fallback: FontSpec,
    /// Field full name -> font
    pub field_fallbacks: BTreeMap<String, FontSpec>,
    /// Keep existing appearances
    pub only_if_missing: bool,
    /// Regenerate even when an appearance exists (wins over `only_if_missing`)
    pub force_replace: bool,
}

impl Default for AppearanceStyle {
    fn default() -> Self {
        Self::new(FontSpec::standard("Helvetica"))
    }
}

impl AppearanceStyle {
    pub fn new(fallback: FontSpec) -> Self {
        Self {
            fallback,
            field_fallbacks: BTreeMap::new(),
            only_if_missing: true,
            force_replace: false,
        }
    }

    /// Use `font` for the field named `field` (full name)
    pub fn with_field_font(mut self, field: &str, font: FontSpec) -> Self {
        self.field_fallbacks.insert(field.to_string(), font);
        self
    }

    pub fn only_if_missing(mut self, value: bool) -> Self {
        self.only_if_missing = value;
        self
    }

    pub fn force_replace(mut self, value: bool) -> Self {
        self.force_replace = value;
        self
    }

    /// Font for a field: its override, else the fallback
    pub fn font_for(&self, field: &str) -> &FontSpec {
        self.field_fallbacks.get(field).unwrap_or(&self.fallback)
    }

    /// Whether a widget that already has an appearance is left alone
    pub fn keeps_existing(&self) -> bool {
        self.only_if_missing && !self.force_replace
    }
}

/// Font entry in a style file: a spec string or an object
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FontConfig {
    Spec(String),
    Detailed(FontDetail),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FontDetail {
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default, rename = "truetype", alias = "trueType")]
    pub truetype: Option<PathBuf>,
    #[serde(default)]
    pub composite: Option<PathBuf>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: f32,
}

impl FontConfig {
    pub fn to_spec(&self) -> Result<FontSpec> {
        match self {
            FontConfig::Spec(spec) => spec.parse(),
            FontConfig::Detailed(detail) => {
                let source = match (&detail.standard, &detail.truetype, &detail.composite) {
                    (Some(name), None, None) => FontSource::Standard(name.clone()),
                    (None, Some(path), None) => FontSource::TrueType(path.clone()),
                    (None, None, Some(path)) => FontSource::Composite(path.clone()),
                    _ => {
                        return Err(FormError::MalformedInput(
                            "font needs exactly one of standard, truetype, composite"
                                .to_string(),
                        ))
                    }
                };
                let mut spec = FontSpec::new(source).with_size(detail.size);
                spec.name = detail.name.clone();
                Ok(spec)
            }
        }
    }
}

/// Style configuration file
///
/// ```json
/// {
///   "fallback": "Helvetica-Oblique",
///   "fieldFallbacks": {
///     "email4": "./DoHyeon-Regular.ttf",
///     "address5[city]": {"composite": "./rounded-mplus-1p-regular.ttf", "size": 10}
///   },
///   "onlyIfMissing": true,
///   "regenerateTextFields": true
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StyleConfig {
    #[serde(default)]
    pub fallback: Option<FontConfig>,
    #[serde(default)]
    pub field_fallbacks: BTreeMap<String, FontConfig>,
    #[serde(default)]
    pub only_if_missing: Option<bool>,
    #[serde(default, alias = "regenerateTextFields")]
    pub force_replace: Option<bool>,
    #[serde(default)]
    pub subset_fonts: Option<bool>,
    #[serde(default)]
    pub flatten: Option<bool>,
    /// Directory relative font paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl StyleConfig {
    /// Overlay this configuration onto `style`
    pub fn apply(&self, style: &mut AppearanceStyle) -> Result<()> {
        let resolve = |spec: FontSpec| match &self.base_dir {
            Some(base) => spec.relative_to(base),
            None => spec,
        };

        if let Some(fallback) = &self.fallback {
            style.fallback = resolve(fallback.to_spec()?);
        }
        for (field, font) in &self.field_fallbacks {
            style
                .field_fallbacks
                .insert(field.clone(), resolve(font.to_spec()?));
        }
        if let Some(value) = self.only_if_missing {
            style.only_if_missing = value;
        }
        if let Some(value) = self.force_replace {
            style.force_replace = value;
        }
        Ok(())
    }

    /// Build a style from this configuration alone
    pub fn to_style(&self) -> Result<AppearanceStyle> {
        let mut style = AppearanceStyle::default();
        self.apply(&mut style)?;
        Ok(style)
    }
}

/// Parse a style configuration from a JSON string
pub fn parse_style(json: &str) -> Result<StyleConfig> {
    serde_json::from_str(json).map_err(|e| FormError::MalformedInput(e.to_string()))
}

/// Load a style configuration file; relative font paths resolve against its directory
pub fn load_style<P: AsRef<Path>>(path: P) -> Result<StyleConfig> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FormError::InputNotFound(path.display().to_string()),
        _ => FormError::MalformedInput(format!("{}: {e}", path.display())),
    })?;
    let mut config = parse_style(&json)?;
    config.base_dir = path.parent().map(Path::to_path_buf);
    Ok(config)
}
