//! Core data types for the storage layer.
//!
//! - [`Point`]: one normalized time-series record ready for the sink
//! - [`FieldValue`]: canonical value of a stored field
//! - [`Origin`]: controller identity stamped on every point as `host`/`region`

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag key carrying the controller address.
pub const HOST_TAG: &str = "host";

/// Tag key carrying the controller description.
pub const REGION_TAG: &str = "region";

/// Indexed dimensions of a point.
pub type Tags = BTreeMap<String, String>;

/// Stored values of a point.
pub type Fields = BTreeMap<String, FieldValue>;

/// Canonical field value after type coercion.
///
/// `Boolean` only appears when a JSON boolean is passed through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Text(String),
    Boolean(bool),
}

impl FieldValue {
    /// Returns the value as `f64` if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the value as text if it was passed through as a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// Identity of the controller a point was collected from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Controller address, stored as the `host` tag.
    pub host: String,
    /// Controller description, stored as the `region` tag.
    pub region: String,
}

impl Origin {
    pub fn new(host: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            region: region.into(),
        }
    }

    /// Base tag set every point starts from.
    pub fn base_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert(HOST_TAG.to_string(), self.host.clone());
        tags.insert(REGION_TAG.to_string(), self.region.clone());
        tags
    }
}

/// A normalized time-series record.
///
/// Points are only built through [`Point::new`], which refuses an empty field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Destination measurement (the definition's `series_name`).
    pub measurement: String,
    pub tags: Tags,
    pub timestamp: DateTime<Utc>,
    pub fields: Fields,
}

impl Point {
    /// Build a point, returning `None` when `fields` is empty.
    pub fn new(
        measurement: impl Into<String>,
        tags: Tags,
        timestamp: DateTime<Utc>,
        fields: Fields,
    ) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        Some(Self {
            measurement: measurement.into(),
            tags,
            timestamp,
            fields,
        })
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}
