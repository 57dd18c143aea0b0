//! Per-device real-time queries.

use crate::collector::assemble::{MissingTag, TagRule, TimestampSource};
use crate::collector::{CollectContext, CollectorError, QueryExecutor, RawResponse};
use crate::config::MeasurementDefinition;

/// Path of the real-time query for one device.
pub fn device_url(endpoint: &str, device_id: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}deviceId={device_id}")
}

/// `device/*` real-time endpoints, polled once per configured device.
///
/// A device whose response has no `data` is skipped; a failed request fails
/// the whole measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeExecutor;

#[async_trait::async_trait]
impl QueryExecutor for RealTimeExecutor {
    async fn fetch(
        &self,
        definition: &MeasurementDefinition,
        ctx: &CollectContext<'_>,
    ) -> Result<RawResponse, CollectorError> {
        let mut combined = RawResponse {
            endpoint: definition.url_endpoint.clone(),
            ..RawResponse::default()
        };
        let mut typed = false;

        for device_id in &definition.device_ids {
            let url = device_url(&definition.url_endpoint, device_id);
            let body = ctx.client.get(&url).await?;

            if body.get("data").is_none() {
                tracing::info!(
                    measurement = %definition.name,
                    device = %device_id,
                    "Real-time response carries no data, skipping device"
                );
                continue;
            }

            let response = RawResponse::from_body(&url, body)?;
            if !typed {
                combined.field_types = response.field_types;
                typed = true;
            }
            combined.entries.extend(response.entries);
        }

        Ok(combined)
    }

    fn timestamp_source(&self) -> TimestampSource {
        TimestampSource::EpochMillis("lastupdated")
    }

    fn tag_rule(&self) -> TagRule {
        TagRule::new(MissingTag::Omit, true)
    }
}
