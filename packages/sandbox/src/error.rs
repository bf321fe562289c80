// ABOUTME: Error taxonomy for sandbox gateway operations
// ABOUTME: Separates configuration, caller misuse, transport and protocol failures

use std::time::Duration;

use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway-specific error types
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Sandbox gateway is disabled")]
    Disabled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a caller misuse error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Check if this error happened below the protocol layer
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            GatewayError::Network(_) | GatewayError::Timeout(_) | GatewayError::InvalidResponse(_)
        )
    }

    /// Check if this is a deployment/programmer error rather than a runtime condition
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, GatewayError::Configuration(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("Connection failed: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        Self::Configuration(format!("Invalid gateway URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(GatewayError::Network("refused".to_string()).is_transport_error());
        assert!(GatewayError::Timeout(Duration::from_secs(30)).is_transport_error());
        assert!(GatewayError::InvalidResponse("not json".to_string()).is_transport_error());
        assert!(!GatewayError::Disabled.is_transport_error());
        assert!(!GatewayError::invalid_request("missing id").is_transport_error());

        assert!(GatewayError::config("no url").is_configuration_error());
        assert!(!GatewayError::Timeout(Duration::from_secs(30)).is_configuration_error());
    }

    #[test]
    fn test_timeout_message_names_the_limit() {
        assert_eq!(
            GatewayError::Timeout(Duration::from_secs(30)).to_string(),
            "Request timed out after 30s"
        );
        assert_eq!(
            GatewayError::Timeout(Duration::from_millis(250)).to_string(),
            "Request timed out after 250ms"
        );
    }

    #[test]
    fn test_serde_error_maps_to_invalid_response() {
        let err: GatewayError = serde_json::from_str::<serde_json::Value>("<html>")
            .unwrap_err()
            .into();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }
}
