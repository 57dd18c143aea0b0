//! vManage Stats - Aligned-Interval Statistics Collector
//!
//! This crate polls a Cisco vManage controller's REST API and writes the
//! results to InfluxDB. It can be used as a library, or run as a standalone
//! binary with the `vmanage-stats` executable.
//!
//! # Architecture
//!
//! - **Config**: YAML application settings plus a measurements file that is
//!   re-read on every tick
//! - **Client**: authenticated vManage session (form login, XSRF token, tenant)
//! - **Collector**: four query shapes sharing one point-assembly pipeline, and
//!   a scheduler firing interval groups on exact second boundaries
//! - **Storage**: time-series sink abstraction with an InfluxDB line-protocol
//!   implementation
//! - **Driver**: the 1 Hz loop tying it together
//!
//! # Example
//!
//! ```rust,no_run
//! use vmanage_stats::{
//!     AppConfig, Driver, InfluxSink, MeasurementsConfig, Scheduler, VManageClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("configs/config.yaml")?;
//!     let measurements = MeasurementsConfig::load(&config.measurements_path)?;
//!
//!     let origin = config.controller.origin();
//!     let controller = VManageClient::new(config.controller);
//!     let sink = InfluxSink::new(config.sink);
//!     let scheduler = Scheduler::new(controller, sink, origin);
//!
//!     Driver::new(scheduler, &config.measurements_path, measurements.into_definitions())
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod collector;
pub mod config;
pub mod driver;
pub mod storage;

pub use client::{ClientError, Controller, RestClient, VManageClient};
pub use collector::{
    CollectContext, CollectorError, DataType, FieldTypeMap, QueryExecutor, Scheduler, TickReport,
    coerce, execute, executor_for,
};
pub use config::{
    AppConfig, ConfigError, ControllerConfig, MeasurementDefinition, MeasurementsConfig,
    QueryType, SinkConfig,
};
pub use driver::Driver;
pub use storage::{FieldValue, InfluxSink, Origin, Point, StorageError, TimeSeriesSink};
