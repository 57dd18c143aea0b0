//! Controller client error types.

use thiserror::Error;

/// Errors raised while talking to the controller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or non-success status.
    ///
    /// `status` is `None` when no response was received at all.
    #[error("request to '{endpoint}' failed (status {}): {body}", display_status(.status))]
    Request {
        endpoint: String,
        status: Option<u16>,
        body: String,
    },

    /// The response body was not the JSON shape we expected.
    #[error("unexpected response from '{endpoint}': {reason}")]
    ResponseFormat { endpoint: String, reason: String },

    /// Authentication handshake failed.
    #[error("login to {address} failed: {reason}")]
    Login { address: String, reason: String },

    /// The named tenant does not exist on the controller.
    #[error("tenant '{0}' not found")]
    TenantNotFound(String),

    /// A request was issued before `connect` succeeded.
    #[error("controller session is not established")]
    NotConnected,
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl ClientError {
    pub(crate) fn request(endpoint: &str, status: Option<u16>, body: impl Into<String>) -> Self {
        Self::Request {
            endpoint: endpoint.to_string(),
            status,
            body: body.into(),
        }
    }

    pub(crate) fn format(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::ResponseFormat {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status of a failed request, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_display() {
        let err = ClientError::request("device", Some(503), "busy");
        assert_eq!(
            err.to_string(),
            "request to 'device' failed (status 503): busy"
        );
        assert_eq!(err.status(), Some(503));

        let err = ClientError::request("device", None, "connection refused");
        assert!(err.to_string().contains("status none"));
    }
}
