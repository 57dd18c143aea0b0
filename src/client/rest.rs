//! REST capabilities consumed by the query executors.

use serde_json::Value;

use super::ClientError;

/// Authenticated JSON request capability.
///
/// Paths are relative to the controller's data-service root and may carry a
/// query string.
#[async_trait::async_trait]
pub trait RestClient: Send + Sync {
    /// Issue a GET and parse the JSON body.
    ///
    /// # Errors
    /// `ClientError::Request` on transport failure or non-2xx status,
    /// `ClientError::ResponseFormat` when the body is not JSON.
    async fn get(&self, path: &str) -> Result<Value, ClientError>;

    /// Issue a POST with a JSON body and parse the JSON response.
    ///
    /// # Errors
    /// Same contract as [`get`](Self::get).
    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError>;
}

/// A controller whose session can be re-established.
#[async_trait::async_trait]
pub trait Controller: RestClient {
    /// Drop any existing session and authenticate again.
    ///
    /// # Errors
    /// `ClientError::Login`, `ClientError::TenantNotFound`, or a request error
    /// from the handshake.
    async fn connect(&mut self) -> Result<(), ClientError>;
}
