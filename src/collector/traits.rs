//! Core collector traits and types.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::client::{ClientError, RestClient};
use crate::collector::assemble::{TagRule, TimestampSource};
use crate::collector::coerce::FieldTypeMap;
use crate::config::MeasurementDefinition;
use crate::storage::Origin;

/// Errors that can occur while collecting one measurement.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The controller request failed.
    #[error(transparent)]
    Api(#[from] ClientError),

    /// A configured tag was absent from an entry under the strict tag policy.
    #[error("configured tag '{tag}' missing from an entry of '{endpoint}'")]
    MissingTag { endpoint: String, tag: String },

    /// The response did not have the expected shape.
    #[error("unexpected response from '{endpoint}': {reason}")]
    ResponseFormat { endpoint: String, reason: String },
}

impl CollectorError {
    pub(crate) fn format(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::ResponseFormat {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}

/// Resources lent to an executor for one due group.
#[derive(Clone, Copy)]
pub struct CollectContext<'a> {
    pub client: &'a dyn RestClient,
    pub origin: &'a Origin,
    /// Tick instant, truncated to whole seconds.
    pub now: DateTime<Utc>,
}

impl std::fmt::Debug for CollectContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectContext")
            .field("origin", &self.origin)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// Entries returned by a query together with their declared field types.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// Endpoint the entries came from, for error context.
    pub endpoint: String,
    pub entries: Vec<Value>,
    pub field_types: FieldTypeMap,
}

impl RawResponse {
    /// Split a response body into its `data` entries and `header.fields` types.
    ///
    /// # Errors
    /// Returns `CollectorError::ResponseFormat` if `data` is missing or not an array.
    pub fn from_body(endpoint: &str, mut body: Value) -> Result<Self, CollectorError> {
        let field_types = FieldTypeMap::from_response(&body);
        let entries = match body.get_mut("data").map(Value::take) {
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(CollectorError::format(endpoint, "'data' is not an array")),
            None => return Err(CollectorError::format(endpoint, "missing 'data'")),
        };
        Ok(Self {
            endpoint: endpoint.to_string(),
            entries,
            field_types,
        })
    }
}

/// One query shape: how to fetch raw entries and how to read them.
///
/// Implementations only build requests; turning entries into points is shared
/// by all of them.
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Issue the request(s) for `definition` and return the raw entries.
    async fn fetch(
        &self,
        definition: &MeasurementDefinition,
        ctx: &CollectContext<'_>,
    ) -> Result<RawResponse, CollectorError>;

    /// Where each entry's timestamp comes from.
    fn timestamp_source(&self) -> TimestampSource;

    /// How configured tags are read from entries.
    fn tag_rule(&self) -> TagRule;
}
