//! InfluxDB 1.x HTTP sink.

use std::time::Instant;

use reqwest::Client;
use url::Url;

use crate::config::SinkConfig;
use crate::storage::StorageError;
use crate::storage::line_protocol::encode_batch;
use crate::storage::sink::TimeSeriesSink;
use crate::storage::types::Point;

/// Sink writing line protocol to an InfluxDB `/write` endpoint.
pub struct InfluxSink {
    config: SinkConfig,
    client: Option<Client>,
    dropped: bool,
}

impl InfluxSink {
    pub fn new(config: SinkConfig) -> Self {
        tracing::info!(
            address = %config.address,
            database = %config.database,
            "Initializing InfluxDB sink"
        );
        Self {
            config,
            client: None,
            dropped: false,
        }
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Build an endpoint URL carrying credentials when configured.
    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, StorageError> {
        let scheme = if self.config.tls { "https" } else { "http" };
        let mut url = Url::parse(&format!(
            "{}://{}:{}/",
            scheme, self.config.address, self.config.port
        ))
        .and_then(|base| base.join(path))
        .map_err(|e| StorageError::Connection(format!("invalid sink address: {e}")))?;

        let mut pairs: Vec<(&str, &str)> = params.to_vec();
        if let Some(user) = &self.config.username {
            pairs.push(("u", user));
        }
        if let Some(pass) = &self.config.password {
            pairs.push(("p", pass));
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    async fn query(&self, client: &Client, statement: &str) -> Result<(), StorageError> {
        let url = self.endpoint("query", &[])?;
        let response = client
            .post(url)
            .form(&[("q", statement)])
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Connection(format!(
                "'{statement}' failed with status {}: {body}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for InfluxSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSink")
            .field("address", &self.config.address)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .field("connected", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl TimeSeriesSink for InfluxSink {
    async fn connect(&mut self) -> Result<(), StorageError> {
        self.client = None;

        let client = Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| StorageError::Connection(format!("failed to build HTTP client: {e}")))?;

        let ping = client
            .get(self.endpoint("ping", &[])?)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if !ping.status().is_success() {
            return Err(StorageError::Connection(format!(
                "ping returned status {}",
                ping.status().as_u16()
            )));
        }

        let database = &self.config.database;
        if self.config.drop_on_start && !self.dropped {
            self.query(&client, &format!("DROP DATABASE \"{database}\""))
                .await?;
            self.dropped = true;
            tracing::warn!(database = %database, "Dropped database on first connect");
        }
        self.query(&client, &format!("CREATE DATABASE \"{database}\""))
            .await?;

        tracing::info!(
            address = %self.config.address,
            database = %database,
            "Opened sink session"
        );
        self.client = Some(client);
        Ok(())
    }

    async fn write(&self, points: &[Point]) -> Result<(), StorageError> {
        if points.is_empty() {
            return Ok(());
        }
        let client = self.client.as_ref().ok_or(StorageError::NotConnected)?;

        let (body, count) = encode_batch(points);
        if count == 0 {
            return Ok(());
        }

        let url = self.endpoint(
            "write",
            &[("db", self.config.database.as_str()), ("precision", "ms")],
        )?;
        let start = Instant::now();
        let response = client.post(url).body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Write {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            points = count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Updated sink with datapoints"
        );
        Ok(())
    }
}
