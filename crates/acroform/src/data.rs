//! Field data loading
//!
//! Two JSON layouts are accepted:
//!
//! ```json
//! {"name1": "Jane", "address5": {"city": "Seoul"}, "agree": true}
//! ```
//!
//! ```json
//! [{"name": "name1", "value": "Jane"}, {"name": "address5[city]", "value": "Seoul"}]
//! ```
//!
//! Nested objects become bracketed field names (`address5[city]`).

use crate::{FormError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// A value to put into a form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Text (also used for numbers and export values)
    Text(String),
    /// Checkbox state
    Flag(bool),
    /// Selected options of a list box or multi-select combo box
    Selection(Vec<String>),
}

impl FieldValue {
    /// Text shown in a text-like widget
    pub fn display_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Flag(b) => b.to_string(),
            FieldValue::Selection(items) => items.join(", "),
        }
    }
}

/// Field full name -> value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValueMap {
    values: BTreeMap<String, FieldValue>,
}

impl FieldValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for FieldValueMap {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Load field values from a JSON file
pub fn load_field_values<P: AsRef<Path>>(path: P) -> Result<FieldValueMap> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FormError::InputNotFound(path.display().to_string()),
        _ => FormError::MalformedInput(format!("{}: {e}", path.display())),
    })?;
    parse_field_values(&json)
}

/// Parse field values from a JSON string
pub fn parse_field_values(json: &str) -> Result<FieldValueMap> {
    let root: Value =
        serde_json::from_str(json).map_err(|e| FormError::MalformedInput(e.to_string()))?;

    let mut map = FieldValueMap::new();
    match root {
        Value::Object(entries) => {
            for (key, value) in entries {
                collect(&key, value, &mut map)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                let Value::Object(mut entry) = item else {
                    return Err(FormError::MalformedInput(
                        "field list entries must be objects".to_string(),
                    ));
                };
                let name = match entry.remove("name") {
                    Some(Value::String(name)) => name,
                    _ => {
                        return Err(FormError::MalformedInput(
                            "field list entry without a \"name\" string".to_string(),
                        ))
                    }
                };
                let value = entry.remove("value").unwrap_or(Value::Null);
                collect(&name, value, &mut map)?;
            }
        }
        _ => {
            return Err(FormError::MalformedInput(
                "field data must be a JSON object or array".to_string(),
            ))
        }
    }

    log::debug!("loaded {} field values", map.len());
    Ok(map)
}

fn collect(name: &str, value: Value, map: &mut FieldValueMap) -> Result<()> {
    match value {
        Value::Object(children) => {
            for (child, value) in children {
                collect(&format!("{name}[{child}]"), value, map)?;
            }
        }
        other => {
            map.insert(name, scalar(name, other)?);
        }
    }
    Ok(())
}

fn scalar(name: &str, value: Value) -> Result<FieldValue> {
    Ok(match value {
        Value::Null => FieldValue::Text(String::new()),
        Value::Bool(b) => FieldValue::Flag(b),
        Value::Number(n) => FieldValue::Text(n.to_string()),
        Value::String(s) => FieldValue::Text(s),
        Value::Array(items) => FieldValue::Selection(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    Value::Number(n) => Ok(n.to_string()),
                    _ => Err(FormError::MalformedInput(format!(
                        "field {name}: selections must be strings or numbers"
                    ))),
                })
                .collect::<Result<_>>()?,
        ),
        Value::Object(_) => {
            return Err(FormError::MalformedInput(format!(
                "field {name}: unexpected nested object"
            )))
        }
    })
}
