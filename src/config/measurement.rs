//! Measurement definitions.
//!
//! The measurements file is re-read on every driver tick, so everything here
//! is cheap to parse and validated up front: an unknown `query_type` is a
//! parse error, never a mid-tick surprise.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use super::validation::ConfigError;

fn default_active() -> bool {
    true
}

/// Shape of the controller query used to collect a measurement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QueryType {
    /// Single GET, stamped with collection time.
    #[serde(alias = "SimpleAPICall", alias = "Simple")]
    Simple,
    /// POST with an `entry_time` range query.
    #[serde(alias = "AggregateAPICall", alias = "Aggregate")]
    Aggregate,
    /// GET with `startDate`/`endDate` parameters.
    #[serde(alias = "BulkAPICall", alias = "Bulk")]
    Bulk,
    /// One GET per device id.
    #[serde(alias = "RealTimeAPICall", alias = "RealTime", alias = "real_time")]
    RealTime,
}

/// A single configured measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementDefinition {
    /// Key of this definition in the measurements file.
    #[serde(skip)]
    pub name: String,
    /// Destination series name.
    pub series_name: String,
    /// Collection interval in seconds.
    pub collect_interval: u64,
    pub query_type: QueryType,
    /// API path relative to `/dataservice/`.
    pub url_endpoint: String,
    /// Entry properties promoted to tags, in order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Entry properties promoted to fields, in order.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Inactive definitions are never scheduled (default: true).
    #[serde(default = "default_active")]
    pub active: bool,
    /// Devices polled individually by `realtime` queries.
    #[serde(default, alias = "deviceIDs")]
    pub device_ids: Vec<String>,
    /// Look-back window of range queries (default: the collection interval).
    #[serde(default, with = "humantime_serde")]
    pub query_window: Option<Duration>,
}

impl MeasurementDefinition {
    /// Create an active definition with no tags or fields.
    pub fn new(
        name: impl Into<String>,
        series_name: impl Into<String>,
        collect_interval: u64,
        query_type: QueryType,
        url_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            series_name: series_name.into(),
            collect_interval,
            query_type,
            url_endpoint: url_endpoint.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            active: true,
            device_ids: Vec::new(),
            query_window: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_device_ids<I, S>(mut self, device_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.device_ids = device_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_query_window(mut self, window: Duration) -> Self {
        self.query_window = Some(window);
        self
    }

    /// Look-back window for `aggregate` and `bulk` queries.
    pub fn window(&self) -> Duration {
        self.query_window
            .unwrap_or(Duration::from_secs(self.collect_interval))
    }

    /// Validate a single definition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: &str| -> Result<(), ConfigError> {
            Err(ConfigError::ValidationError(format!(
                "measurement '{}': {}",
                self.name, reason
            )))
        };

        if self.series_name.trim().is_empty() {
            return fail("series_name cannot be empty");
        }
        if self.collect_interval == 0 {
            return fail("collect_interval must be positive");
        }
        if self.url_endpoint.trim().is_empty() {
            return fail("url_endpoint cannot be empty");
        }
        if self.fields.is_empty() {
            return fail("at least one field must be configured");
        }
        if self.query_type == QueryType::RealTime && self.device_ids.is_empty() {
            return fail("realtime queries require device_ids");
        }
        if self.query_window.is_some_and(|w| w.is_zero()) {
            return fail("query_window must be positive");
        }
        Ok(())
    }
}

/// Contents of the measurements file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementsConfig {
    /// Definitions keyed by name.
    #[serde(default, alias = "Measurements")]
    pub measurements: BTreeMap<String, MeasurementDefinition>,
}

impl MeasurementsConfig {
    /// Load and validate the measurements file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate measurements from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        for (name, definition) in config.measurements.iter_mut() {
            definition.name = name.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate every active definition.
    ///
    /// Inactive drafts only have to parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for definition in self.measurements.values().filter(|d| d.active) {
            definition.validate()?;
        }
        Ok(())
    }

    /// Consume into the ordered list of definitions.
    pub fn into_definitions(self) -> Vec<MeasurementDefinition> {
        self.measurements.into_values().collect()
    }
}
