//! Storage Layer
//!
//! Time-series sink abstraction and its InfluxDB implementation:
//!
//! - [`TimeSeriesSink`]: capability the scheduler writes batches through
//! - [`InfluxSink`]: InfluxDB 1.x HTTP sink (line protocol, millisecond precision)
//! - [`Point`] / [`FieldValue`]: normalized records handed to the sink

mod error;
mod influx;
pub mod line_protocol;
mod sink;
mod types;

pub use error::StorageError;
pub use influx::InfluxSink;
pub use sink::TimeSeriesSink;
pub use types::{FieldValue, Fields, HOST_TAG, Origin, Point, REGION_TAG, Tags};
