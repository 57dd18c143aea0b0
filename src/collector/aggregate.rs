//! Range query POSTed against an aggregation endpoint.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{Value, json};

use crate::collector::assemble::{MissingTag, TagRule, TimestampSource};
use crate::collector::{CollectContext, CollectorError, QueryExecutor, RawResponse};
use crate::config::MeasurementDefinition;

/// Format of the range bounds in the query body.
pub const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Start and end of the look-back window ending at `now`.
pub(crate) fn window_bounds(
    definition: &MeasurementDefinition,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let window = ChronoDuration::from_std(definition.window()).unwrap_or(ChronoDuration::zero());
    (now - window, now)
}

/// Build the `entry_time between start and end` query body.
pub fn query_body(start: DateTime<Utc>, end: DateTime<Utc>) -> Value {
    json!({
        "query": {
            "condition": "AND",
            "rules": [{
                "field": "entry_time",
                "type": "date",
                "operator": "between",
                "value": [
                    format!("{} UTC", start.format(QUERY_TIME_FORMAT)),
                    format!("{} UTC", end.format(QUERY_TIME_FORMAT)),
                ],
            }],
        }
    })
}

/// Statistics endpoints that accept a query body, e.g. `statistics/interface/aggregation`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateExecutor;

#[async_trait::async_trait]
impl QueryExecutor for AggregateExecutor {
    async fn fetch(
        &self,
        definition: &MeasurementDefinition,
        ctx: &CollectContext<'_>,
    ) -> Result<RawResponse, CollectorError> {
        let endpoint = definition.url_endpoint.as_str();
        let (start, end) = window_bounds(definition, ctx.now);
        let body = ctx.client.post(endpoint, &query_body(start, end)).await?;
        RawResponse::from_body(endpoint, body)
    }

    fn timestamp_source(&self) -> TimestampSource {
        TimestampSource::EpochMillis("entry_time")
    }

    fn tag_rule(&self) -> TagRule {
        TagRule::new(MissingTag::Placeholder, false)
    }
}
