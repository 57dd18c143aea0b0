//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::storage::Origin;

use super::validation::{ConfigError, expand_env_vars, validate_address};

// =============================================================================
// Constants
// =============================================================================

/// Default controller request timeout (30 seconds).
pub const DEFAULT_CONTROLLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default sink request timeout (10 seconds).
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default InfluxDB HTTP port.
pub const DEFAULT_SINK_PORT: u16 = 8086;

/// Default delay before the first connection attempt (60 seconds).
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(60);

fn default_controller_timeout() -> Duration {
    DEFAULT_CONTROLLER_TIMEOUT
}

fn default_sink_timeout() -> Duration {
    DEFAULT_SINK_TIMEOUT
}

fn default_sink_port() -> u16 {
    DEFAULT_SINK_PORT
}

fn default_startup_delay() -> Duration {
    DEFAULT_STARTUP_DELAY
}

fn default_measurements_path() -> String {
    "configs/measurements.yaml".to_string()
}

// =============================================================================
// Controller Configuration
// =============================================================================

/// Controller (vManage) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Controller address (`host` or `host:port`).
    pub address: String,

    pub username: String,

    /// Password; `${VAR}` references are expanded at load time.
    pub password: String,

    /// Human-readable label, stored as the `region` tag.
    #[serde(default)]
    pub description: String,

    /// Tenant to switch into on multi-tenant controllers.
    #[serde(default)]
    pub tenant: Option<String>,

    /// Verify the controller's TLS certificate (default: false).
    #[serde(default)]
    pub verify_tls: bool,

    /// Per-request timeout (default: 30s).
    #[serde(default = "default_controller_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl ControllerConfig {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
            description: String::new(),
            tenant: None,
            verify_tls: false,
            timeout: DEFAULT_CONTROLLER_TIMEOUT,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Identity stamped on every collected point.
    pub fn origin(&self) -> Origin {
        Origin::new(&self.address, &self.description)
    }
}

// =============================================================================
// Sink Configuration
// =============================================================================

/// Time-series sink (InfluxDB) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub address: String,

    /// HTTP port (default: 8086).
    #[serde(default = "default_sink_port")]
    pub port: u16,

    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Use HTTPS (default: false).
    #[serde(default)]
    pub tls: bool,

    /// Drop and recreate the database on the first connect (default: false).
    #[serde(default)]
    pub drop_on_start: bool,

    /// Per-request timeout (default: 10s).
    #[serde(default = "default_sink_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl SinkConfig {
    pub fn new(address: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port,
            database: database.into(),
            username: None,
            password: None,
            tls: false,
            drop_on_start: false,
            timeout: DEFAULT_SINK_TIMEOUT,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub controller: ControllerConfig,

    pub sink: SinkConfig,

    /// Measurements file, re-read every tick.
    #[serde(default = "default_measurements_path")]
    pub measurements_path: String,

    /// Wait before the first connection attempt (default: 60s).
    #[serde(default = "default_startup_delay", with = "humantime_serde")]
    pub startup_delay: Duration,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding credential references.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.expand_credentials();
        config.validate()?;
        Ok(config)
    }

    fn expand_credentials(&mut self) {
        self.controller.username = expand_env_vars(&self.controller.username);
        self.controller.password = expand_env_vars(&self.controller.password);
        for value in [&mut self.sink.username, &mut self.sink.password]
            .into_iter()
            .flatten()
        {
            *value = expand_env_vars(value);
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_address("controller", &self.controller.address)?;
        if self.controller.username.is_empty() {
            return Err(ConfigError::ValidationError(
                "controller username cannot be empty".to_string(),
            ));
        }
        if self.controller.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "controller timeout must be positive".to_string(),
            ));
        }

        validate_address("sink", &self.sink.address)?;
        if self.sink.port == 0 {
            return Err(ConfigError::ValidationError(
                "sink port must be non-zero".to_string(),
            ));
        }
        if self.sink.database.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sink database cannot be empty".to_string(),
            ));
        }

        if self.measurements_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "measurements_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
