//! Collector Layer
//!
//! Turns measurement definitions into points.
//!
//! # Architecture
//!
//! - [`QueryExecutor`]: one query shape (how to fetch, where timestamps come
//!   from, how tags are read); one implementation per [`QueryType`]
//! - [`PointAssembler`]: shared entry → point conversion with type coercion
//! - [`Scheduler`]: fires due interval groups and writes their batches
//!
//! # Example
//!
//! ```rust,no_run
//! use vmanage_stats::collector::{CollectContext, execute};
//! use vmanage_stats::config::{MeasurementDefinition, QueryType};
//! use vmanage_stats::storage::Origin;
//! use vmanage_stats::RestClient;
//!
//! # async fn demo(client: &dyn RestClient) -> Result<(), Box<dyn std::error::Error>> {
//! let origin = Origin::new("10.0.0.1", "emea");
//! let ctx = CollectContext { client, origin: &origin, now: chrono::Utc::now() };
//! let definition = MeasurementDefinition::new("devices", "device", 60, QueryType::Simple, "device")
//!     .with_tags(["host-name"])
//!     .with_fields(["uptime"]);
//! let points = execute(&definition, &ctx).await?;
//! # Ok(())
//! # }
//! ```

mod aggregate;
mod assemble;
mod bulk;
pub mod coerce;
mod realtime;
mod scheduler;
mod simple;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

use chrono::Utc;

use crate::config::{MeasurementDefinition, QueryType};
use crate::storage::Point;

pub use aggregate::{AggregateExecutor, QUERY_TIME_FORMAT, query_body};
pub use assemble::{MissingTag, NO_VALUE, PointAssembler, TagRule, TimestampSource};
pub use bulk::{BulkExecutor, range_url};
pub use coerce::{DataType, FieldTypeMap, coerce};
pub use realtime::{RealTimeExecutor, device_url};
pub use scheduler::{GroupReport, Scheduler, TickReport, is_due, partition};
pub use simple::SimpleExecutor;
pub use traits::{CollectContext, CollectorError, QueryExecutor, RawResponse};

/// Strategy implementing `query_type`.
pub fn executor_for(query_type: QueryType) -> &'static dyn QueryExecutor {
    match query_type {
        QueryType::Simple => &SimpleExecutor,
        QueryType::Aggregate => &AggregateExecutor,
        QueryType::Bulk => &BulkExecutor,
        QueryType::RealTime => &RealTimeExecutor,
    }
}

/// Collect one measurement.
///
/// # Errors
/// Any request, response-shape or strict-tag failure; the caller decides
/// whether to skip the measurement.
pub async fn execute(
    definition: &MeasurementDefinition,
    ctx: &CollectContext<'_>,
) -> Result<Vec<Point>, CollectorError> {
    let executor = executor_for(definition.query_type);
    let raw = executor.fetch(definition, ctx).await?;
    let collected_at = Utc::now();

    let assembler = PointAssembler {
        definition,
        origin: ctx.origin,
        field_types: &raw.field_types,
        tag_rule: executor.tag_rule(),
        timestamp: executor.timestamp_source(),
        collected_at,
        endpoint: &raw.endpoint,
    };
    assembler.assemble_all(&raw.entries)
}
