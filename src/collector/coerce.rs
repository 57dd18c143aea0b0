//! Field type coercion.
//!
//! Controller responses carry a per-call `header.fields` list declaring the
//! data type of each property. Values are converted to a canonical
//! [`FieldValue`] using that declaration, or a name-based guess when the
//! declaration is missing. Conversion never fails: a value that cannot be
//! converted is stored as it came.

use std::collections::HashMap;

use serde_json::Value;

use crate::storage::FieldValue;

/// Separator of the parenthetical annotation some string values carry, e.g. `"5 (ok)"`.
const ANNOTATION_SEPARATOR: &str = " (";

/// Field-name marker for averaged statistics that lack a declaration.
const AVG_MARKER: &str = "_avg";

/// Field-name marker for OMP peer counters that lack a declaration.
const OMP_PEERS_MARKER: &str = "ompPeers";

/// Declared data type of a response property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// Numeric value encoded as a string, possibly annotated.
    NumberStr,
    Double,
    /// Integer value.
    Number,
    /// Anything else (`string`, `date`, `array`, ...).
    Other(String),
}

impl DataType {
    /// Names are case-sensitive; unknown names are kept as `Other`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "numberStr" => Self::NumberStr,
            "double" => Self::Double,
            "number" => Self::Number,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NumberStr => "numberStr",
            Self::Double => "double",
            Self::Number => "number",
            Self::Other(s) => s,
        }
    }
}

/// Declared field types for one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTypeMap {
    types: HashMap<String, DataType>,
}

impl FieldTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `header.fields` from a response body.
    ///
    /// Malformed entries are ignored; a missing header yields an empty map.
    /// When a property is declared twice the last declaration wins.
    pub fn from_response(response: &Value) -> Self {
        let Some(fields) = response.pointer("/header/fields").and_then(Value::as_array) else {
            return Self::default();
        };

        fields
            .iter()
            .filter_map(|entry| {
                let property = entry.get("property")?.as_str()?;
                let data_type = entry.get("dataType")?.as_str()?;
                Some((property.to_string(), DataType::parse(data_type)))
            })
            .collect()
    }

    pub fn insert(&mut self, property: impl Into<String>, data_type: DataType) {
        self.types.insert(property.into(), data_type);
    }

    pub fn get(&self, property: &str) -> Option<&DataType> {
        self.types.get(property)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, DataType)> for FieldTypeMap {
    fn from_iter<I: IntoIterator<Item = (S, DataType)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (property, data_type) in iter {
            map.insert(property, data_type);
        }
        map
    }
}

/// Coerce a raw field value to its canonical form.
///
/// See the module docs for the rules; this never fails.
pub fn coerce(field_name: &str, raw: &Value, types: &FieldTypeMap) -> FieldValue {
    let converted = match types.get(field_name) {
        Some(DataType::NumberStr) => to_float(&strip_annotation(raw)).map(FieldValue::Float),
        Some(DataType::Double) => to_float(raw).map(FieldValue::Float),
        Some(DataType::Number) => to_integer(raw).map(FieldValue::Integer),
        Some(DataType::Other(_)) => to_float(raw).map(FieldValue::Float),
        None if field_name.contains(AVG_MARKER) => to_float(raw).map(FieldValue::Float),
        None if field_name.contains(OMP_PEERS_MARKER) => {
            to_integer(&strip_annotation(raw)).map(FieldValue::Integer)
        }
        None => return passthrough(raw),
    };

    converted.unwrap_or_else(|| {
        tracing::trace!(
            field = field_name,
            declared = types.get(field_name).map(DataType::as_str),
            "Field conversion failed, storing raw value"
        );
        passthrough(raw)
    })
}

/// Drop a trailing `" (...)"` annotation from a textual value.
fn strip_annotation(raw: &Value) -> Value {
    match raw {
        Value::String(s) => match s.split_once(ANNOTATION_SEPARATOR) {
            Some((head, _)) => Value::String(head.to_string()),
            None => raw.clone(),
        },
        _ => raw.clone(),
    }
}

fn to_float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn to_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Store a value unchanged, keeping JSON's own type where it has one.
fn passthrough(raw: &Value) -> FieldValue {
    match raw {
        Value::String(s) => FieldValue::Text(s.clone()),
        Value::Bool(b) => FieldValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        other => FieldValue::Text(other.to_string()),
    }
}
