//! Shared entry-to-point assembly.
//!
//! Every query shape funnels its raw entries through [`PointAssembler`]; the
//! shapes differ only in their [`TimestampSource`] and [`TagRule`].

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::collector::CollectorError;
use crate::collector::coerce::{FieldTypeMap, coerce};
use crate::config::MeasurementDefinition;
use crate::storage::{Fields, Origin, Point};

/// The controller's marker for "no value".
pub const NO_VALUE: &str = "--";

/// What to do when a configured tag is absent from an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingTag {
    /// Leave the tag out.
    Omit,
    /// Store the tag as [`NO_VALUE`].
    Placeholder,
    /// Fail the whole measurement.
    Fail,
}

/// Tag handling of one query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRule {
    pub on_missing: MissingTag,
    /// Store `tag-name` as `tag_name`.
    pub normalize_names: bool,
}

impl TagRule {
    pub const fn new(on_missing: MissingTag, normalize_names: bool) -> Self {
        Self {
            on_missing,
            normalize_names,
        }
    }

    fn tag_name(&self, name: &str) -> String {
        if self.normalize_names {
            name.replace('-', "_")
        } else {
            name.to_string()
        }
    }
}

/// Where an entry's timestamp comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    /// Wall-clock time when the response arrived.
    CollectionTime,
    /// Epoch milliseconds stored in the named entry property.
    EpochMillis(&'static str),
}

impl TimestampSource {
    fn resolve(
        &self,
        entry: &Value,
        collected_at: DateTime<Utc>,
        endpoint: &str,
    ) -> Result<DateTime<Utc>, CollectorError> {
        let field = match self {
            Self::CollectionTime => return Ok(collected_at),
            Self::EpochMillis(field) => *field,
        };

        let millis = match entry.get(field) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            CollectorError::format(endpoint, format!("entry has no numeric '{field}'"))
        })?;

        Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
            CollectorError::format(endpoint, format!("'{field}' out of range: {millis}"))
        })
    }
}

fn tag_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_no_value(value: &Value) -> bool {
    value.is_null() || value.as_str() == Some(NO_VALUE)
}

/// Turns raw entries of one response into points.
#[derive(Debug, Clone, Copy)]
pub struct PointAssembler<'a> {
    pub definition: &'a MeasurementDefinition,
    pub origin: &'a Origin,
    pub field_types: &'a FieldTypeMap,
    pub tag_rule: TagRule,
    pub timestamp: TimestampSource,
    pub collected_at: DateTime<Utc>,
    pub endpoint: &'a str,
}

impl PointAssembler<'_> {
    /// Build the point for one entry.
    ///
    /// Returns `Ok(None)` when no configured field carries a value.
    pub fn assemble_point(&self, entry: &Value) -> Result<Option<Point>, CollectorError> {
        let Some(object) = entry.as_object() else {
            return Err(CollectorError::format(self.endpoint, "entry is not an object"));
        };

        let mut tags = self.origin.base_tags();
        for name in &self.definition.tags {
            match object.get(name) {
                Some(value) => {
                    if let Some(value) = tag_value(value) {
                        tags.insert(self.tag_rule.tag_name(name), value);
                    } else if self.tag_rule.on_missing == MissingTag::Placeholder {
                        tags.insert(self.tag_rule.tag_name(name), NO_VALUE.to_string());
                    }
                }
                None => match self.tag_rule.on_missing {
                    MissingTag::Omit => {}
                    MissingTag::Placeholder => {
                        tags.insert(self.tag_rule.tag_name(name), NO_VALUE.to_string());
                    }
                    MissingTag::Fail => {
                        return Err(CollectorError::MissingTag {
                            endpoint: self.endpoint.to_string(),
                            tag: name.clone(),
                        });
                    }
                },
            }
        }

        let mut fields = Fields::new();
        for name in &self.definition.fields {
            if let Some(raw) = object.get(name).filter(|v| !is_no_value(v)) {
                fields.insert(name.clone(), coerce(name, raw, self.field_types));
            }
        }
        if fields.is_empty() {
            return Ok(None);
        }

        let timestamp = self
            .timestamp
            .resolve(entry, self.collected_at, self.endpoint)?;
        Ok(Point::new(
            &self.definition.series_name,
            tags,
            timestamp,
            fields,
        ))
    }

    /// Assemble every entry, dropping those without fields.
    pub fn assemble_all(&self, entries: &[Value]) -> Result<Vec<Point>, CollectorError> {
        let mut points = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(point) = self.assemble_point(entry)? {
                points.push(point);
            }
        }
        Ok(points)
    }
}
