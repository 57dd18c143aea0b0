//! vManage REST session.
//!
//! Authenticates with the form login at `/j_security_check`, picks up the
//! XSRF token from `/dataservice/client/token`, and optionally switches into a
//! tenant. Every request after that goes to `/dataservice/<path>`.

use std::time::Instant;

use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

use crate::config::ControllerConfig;

use super::rest::{Controller, RestClient};
use super::ClientError;

const LOGIN_PATH: &str = "j_security_check";
const TOKEN_PATH: &str = "client/token";
const TENANT_PATH: &str = "tenant";
const XSRF_HEADER: &str = "X-XSRF-TOKEN";
const VSESSION_HEADER: &str = "VSessionId";

/// Authenticated state of one controller session.
struct Session {
    http: Client,
    base_url: String,
    xsrf_token: Option<String>,
    vsession_id: Option<String>,
}

impl Session {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let url = format!(
            "{}/dataservice/{}",
            self.base_url,
            path.trim_start_matches('/')
        );

        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = &self.xsrf_token {
            request = request.header(XSRF_HEADER, token);
        }
        if let Some(id) = &self.vsession_id {
            request = request.header(VSESSION_HEADER, id);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::request(path, None, e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::request(path, Some(status.as_u16()), e.to_string()))?;

        tracing::info!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            response_time_ms = start.elapsed().as_millis() as u64,
            "Controller request"
        );

        if !status.is_success() {
            return Err(ClientError::request(path, Some(status.as_u16()), text));
        }

        serde_json::from_str(&text)
            .map_err(|e| ClientError::format(path, format!("body is not valid JSON: {e}")))
    }
}

/// REST client for a vManage controller.
pub struct VManageClient {
    config: ControllerConfig,
    base_url: String,
    session: Option<Session>,
}

impl VManageClient {
    /// Create a client for `https://<address>`; no connection is made yet.
    pub fn new(config: ControllerConfig) -> Self {
        let base_url = format!("https://{}", config.address);
        Self::with_base_url(config, base_url)
    }

    /// Create a client against an explicit base URL (scheme, host and port).
    pub fn with_base_url(config: ControllerConfig, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!(
            controller = %config.address,
            description = %config.description,
            "Initializing controller client"
        );
        Self {
            config,
            base_url,
            session: None,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn login_error(&self, reason: impl Into<String>) -> ClientError {
        ClientError::Login {
            address: self.config.address.clone(),
            reason: reason.into(),
        }
    }

    async fn login(&self, http: &Client) -> Result<(), ClientError> {
        let url = format!("{}/{}", self.base_url, LOGIN_PATH);
        let response = http
            .post(&url)
            .form(&[
                ("j_username", self.config.username.as_str()),
                ("j_password", self.config.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ClientError::request(LOGIN_PATH, None, e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // A rejected login answers 200 with the HTML login page.
        if status != StatusCode::OK || body.contains("<html>") {
            return Err(self.login_error(format!("status {}", status.as_u16())));
        }
        Ok(())
    }

    async fn fetch_token(&self, http: &Client) -> Result<Option<String>, ClientError> {
        let url = format!("{}/dataservice/{}", self.base_url, TOKEN_PATH);
        let response = http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::request(TOKEN_PATH, None, e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let token = response.text().await.unwrap_or_default();
                Ok(Some(token.trim().to_string()))
            }
            // Older releases have no token endpoint.
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(self.login_error(format!(
                "failed getting {XSRF_HEADER}: status {}",
                other.as_u16()
            ))),
        }
    }

    async fn switch_tenant(&self, session: &Session, tenant: &str) -> Result<String, ClientError> {
        let tenants = session.request(Method::GET, TENANT_PATH, None).await?;
        let tenant_id = tenants
            .get("data")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|t| t.get("name").and_then(Value::as_str) == Some(tenant))
            .filter_map(|t| t.get("tenantId"))
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .next_back()
            .ok_or_else(|| ClientError::TenantNotFound(tenant.to_string()))?;

        let switch_path = format!("{TENANT_PATH}/{tenant_id}/switch");
        let response = session
            .request(Method::POST, &switch_path, Some(&json!({})))
            .await?;

        response
            .get(VSESSION_HEADER)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::format(&switch_path, format!("missing {VSESSION_HEADER}")))
    }

    fn session(&self) -> Result<&Session, ClientError> {
        self.session.as_ref().ok_or(ClientError::NotConnected)
    }
}

impl std::fmt::Debug for VManageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VManageClient")
            .field("address", &self.config.address)
            .field("base_url", &self.base_url)
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl RestClient for VManageClient {
    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.session()?.request(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.session()?.request(Method::POST, path, Some(body)).await
    }
}

#[async_trait::async_trait]
impl Controller for VManageClient {
    async fn connect(&mut self) -> Result<(), ClientError> {
        self.session = None;

        let http = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(!self.config.verify_tls)
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| self.login_error(format!("failed to build HTTP client: {e}")))?;

        self.login(&http).await?;
        let xsrf_token = self.fetch_token(&http).await?;

        let mut session = Session {
            http,
            base_url: self.base_url.clone(),
            xsrf_token,
            vsession_id: None,
        };

        if let Some(tenant) = self.config.tenant.clone() {
            let id = self.switch_tenant(&session, &tenant).await?;
            tracing::info!(tenant = %tenant, "Switched controller session to tenant");
            session.vsession_id = Some(id);
        }

        tracing::info!(
            controller = %self.config.address,
            description = %self.config.description,
            "Opened controller session"
        );
        self.session = Some(session);
        Ok(())
    }
}
