//! Bulk statistics GET with a date range in the query string.

use chrono::{DateTime, Utc};

use crate::collector::aggregate::{QUERY_TIME_FORMAT, window_bounds};
use crate::collector::assemble::{MissingTag, TagRule, TimestampSource};
use crate::collector::{CollectContext, CollectorError, QueryExecutor, RawResponse};
use crate::config::MeasurementDefinition;

/// Append `startDate`/`endDate`/`timeZone` to `endpoint`.
pub fn range_url(endpoint: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{endpoint}{separator}startDate={}&endDate={}&timeZone=UTC",
        start.format(QUERY_TIME_FORMAT),
        end.format(QUERY_TIME_FORMAT),
    )
}

/// `data/device/statistics/*` style endpoints.
///
/// Configured tags are mandatory: an entry missing one fails the measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkExecutor;

#[async_trait::async_trait]
impl QueryExecutor for BulkExecutor {
    async fn fetch(
        &self,
        definition: &MeasurementDefinition,
        ctx: &CollectContext<'_>,
    ) -> Result<RawResponse, CollectorError> {
        let (start, end) = window_bounds(definition, ctx.now);
        let url = range_url(&definition.url_endpoint, start, end);
        let body = ctx.client.get(&url).await?;
        RawResponse::from_body(&url, body)
    }

    fn timestamp_source(&self) -> TimestampSource {
        TimestampSource::EpochMillis("entry_time")
    }

    fn tag_rule(&self) -> TagRule {
        TagRule::new(MissingTag::Fail, true)
    }
}
