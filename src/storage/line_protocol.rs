//! InfluxDB line protocol encoding.
//!
//! `measurement[,tag=value...] field=value[,field=value...] timestamp_ms`

use std::fmt::Write as _;

use crate::storage::StorageError;
use crate::storage::types::{FieldValue, Point};

fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

/// Backslash and newline are escaped everywhere, ahead of the position-specific characters.
fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn encode_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Float(v) if v.is_finite() => Some(format!("{v}")),
        // Line protocol has no representation for NaN/inf.
        FieldValue::Float(_) => None,
        FieldValue::Integer(v) => Some(format!("{v}i")),
        FieldValue::Boolean(b) => Some(b.to_string()),
        FieldValue::Text(s) => {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            Some(format!("\"{escaped}\""))
        }
    }
}

/// Encode one point as a single line with millisecond precision.
///
/// # Errors
/// Returns `StorageError::Encode` if no field survives encoding or a tag
/// value is empty.
pub fn encode_point(point: &Point) -> Result<String, StorageError> {
    let mut line = escape_measurement(&point.measurement);

    for (key, value) in &point.tags {
        // Influx rejects empty tag values; drop them like the client libraries do.
        if value.is_empty() {
            continue;
        }
        let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
    }

    let fields: Vec<String> = point
        .fields
        .iter()
        .filter_map(|(key, value)| {
            encode_value(value).map(|v| format!("{}={}", escape_key(key), v))
        })
        .collect();

    if fields.is_empty() {
        return Err(StorageError::Encode(format!(
            "point for '{}' has no encodable fields",
            point.measurement
        )));
    }

    let _ = write!(
        line,
        " {} {}",
        fields.join(","),
        point.timestamp.timestamp_millis()
    );
    Ok(line)
}

/// Encode a batch, skipping points that cannot be encoded.
///
/// Returns the newline-separated body and the number of lines in it.
pub fn encode_batch(points: &[Point]) -> (String, usize) {
    let mut body = String::new();
    let mut count = 0;
    for point in points {
        match encode_point(point) {
            Ok(line) => {
                if count > 0 {
                    body.push('\n');
                }
                body.push_str(&line);
                count += 1;
            }
            Err(e) => {
                tracing::warn!(measurement = %point.measurement, error = %e, "Dropping point");
            }
        }
    }
    (body, count)
}
