//! Plain GET of the configured endpoint.

use crate::collector::assemble::{MissingTag, TagRule, TimestampSource};
use crate::collector::{CollectContext, CollectorError, QueryExecutor, RawResponse};
use crate::config::MeasurementDefinition;

/// Current-state listings such as `device` or `system/device/vedges`.
///
/// Entries carry no timestamp of their own, so points are stamped with the
/// time the response arrived.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleExecutor;

#[async_trait::async_trait]
impl QueryExecutor for SimpleExecutor {
    async fn fetch(
        &self,
        definition: &MeasurementDefinition,
        ctx: &CollectContext<'_>,
    ) -> Result<RawResponse, CollectorError> {
        let endpoint = definition.url_endpoint.as_str();
        let body = ctx.client.get(endpoint).await?;
        RawResponse::from_body(endpoint, body)
    }

    fn timestamp_source(&self) -> TimestampSource {
        TimestampSource::CollectionTime
    }

    fn tag_rule(&self) -> TagRule {
        TagRule::new(MissingTag::Omit, true)
    }
}
