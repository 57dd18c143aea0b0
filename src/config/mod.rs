//! Configuration module.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Controller settings (address, credentials, tenant, timeout)
//! - Sink settings (address, port, database, credentials)
//! - Measurement definitions (hot-reloaded every tick)

mod app;
mod measurement;
mod validation;

pub use app::{AppConfig, ControllerConfig, SinkConfig};
pub use measurement::{MeasurementDefinition, MeasurementsConfig, QueryType};
pub use validation::{ConfigError, expand_env_vars, parse_duration, validate_address};

// Re-export constants
pub use app::{
    DEFAULT_CONTROLLER_TIMEOUT, DEFAULT_SINK_PORT, DEFAULT_SINK_TIMEOUT, DEFAULT_STARTUP_DELAY,
};
