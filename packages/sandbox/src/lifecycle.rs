// ABOUTME: Sandbox lifecycle manager built on the gateway proxy
// ABOUTME: Create, inspect and destroy sandboxes and derive their streaming endpoint

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::envelope::{ResultEnvelope, SandboxStatus};
use crate::error::GatewayError;
use crate::proxy::{GatewayProxy, ProxyRequest};
use crate::routes;

/// Request to create a new sandbox
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateSandboxRequest {
    /// Sandbox image family, e.g. `asr`
    #[serde(rename = "type")]
    pub sandbox_type: String,

    pub options: Map<String, Value>,

    /// Ask the gateway to reuse or attach to this sandbox instead of allocating one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
}

impl CreateSandboxRequest {
    pub fn new(sandbox_type: impl Into<String>) -> Self {
        Self {
            sandbox_type: sandbox_type.into(),
            ..Default::default()
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_sandbox_id(mut self, sandbox_id: impl Into<String>) -> Self {
        self.sandbox_id = Some(sandbox_id.into());
        self
    }
}

/// Sandbox lifecycle manager.
///
/// `Unknown -> Running -> Exited`; `destroy` forces the terminal state from
/// anywhere. Teardown is asynchronous upstream, so `get_status` may still
/// report `Running` for a short while after a successful `destroy`.
#[derive(Clone)]
pub struct SandboxManager {
    proxy: GatewayProxy,
}

impl SandboxManager {
    pub fn new(proxy: GatewayProxy) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> &GatewayProxy {
        &self.proxy
    }

    /// Request a new sandbox
    pub async fn create(&self, request: &CreateSandboxRequest) -> ResultEnvelope {
        if request.sandbox_type.trim().is_empty() {
            return ResultEnvelope::from_error(&GatewayError::invalid_request(
                "sandbox type is required",
            ));
        }
        if let Some(sandbox_id) = &request.sandbox_id {
            if let Err(e) = routes::validate_sandbox_id(sandbox_id) {
                return ResultEnvelope::from_error(&e);
            }
        }

        let body = match serde_json::to_value(request) {
            Ok(body) => body,
            Err(e) => {
                return ResultEnvelope::from_error(&GatewayError::invalid_request(format!(
                    "Failed to serialize create request: {}",
                    e
                )))
            }
        };

        let envelope = self
            .proxy
            .request(&ProxyRequest::post(routes::SANDBOXES).json(body))
            .await;

        if envelope.success {
            info!(
                sandbox_id = %envelope.data.sandbox_id,
                sandbox_type = %request.sandbox_type,
                status = %envelope.data.status,
                "Sandbox created"
            );
        } else {
            warn!(
                sandbox_type = %request.sandbox_type,
                "Failed to create sandbox: {}",
                envelope.message
            );
        }
        envelope
    }

    /// Read the current sandbox state; the only way to resolve `Unknown`
    pub async fn get_status(&self, sandbox_id: &str) -> ResultEnvelope {
        let sandbox_id = match routes::validate_sandbox_id(sandbox_id) {
            Ok(id) => id,
            Err(e) => return ResultEnvelope::from_error(&e),
        };

        self.proxy
            .request(&ProxyRequest::get(routes::sandbox(sandbox_id)))
            .await
    }

    /// Best-effort teardown
    pub async fn destroy(&self, sandbox_id: &str) -> ResultEnvelope {
        let sandbox_id = match routes::validate_sandbox_id(sandbox_id) {
            Ok(id) => id,
            Err(e) => return ResultEnvelope::from_error(&e),
        };

        let envelope = self
            .proxy
            .request(&ProxyRequest::delete(routes::sandbox(sandbox_id)))
            .await;

        if envelope.success {
            info!(sandbox_id, "Sandbox destroy requested");
        } else {
            warn!(sandbox_id, "Failed to destroy sandbox: {}", envelope.message);
        }
        envelope
    }

    /// Streaming endpoint for a sandbox. Pure derivation from the configured
    /// ingress address; an empty or invalid id yields an empty string.
    pub fn websocket_url(&self, sandbox_id: &str) -> String {
        let sandbox_id = match routes::validate_sandbox_id(sandbox_id) {
            Ok(id) => id,
            Err(_) => return String::new(),
        };

        let config = self.proxy.config().snapshot();
        let mut url = match config.base() {
            Ok(url) => url,
            Err(_) => return String::new(),
        };

        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        if url.set_scheme(scheme).is_err() {
            return String::new();
        }

        url.join(&routes::sandbox_websocket(sandbox_id))
            .map(|url| url.to_string())
            .unwrap_or_default()
    }

    /// Whether the gateway currently reports the sandbox as running
    pub async fn is_running(&self, sandbox_id: &str) -> bool {
        self.get_status(sandbox_id).await.status() == SandboxStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, SharedConfig};
    use serde_json::json;

    fn manager(base_url: &str) -> SandboxManager {
        let config = SharedConfig::new(GatewayConfig::new(base_url, "t")).unwrap();
        SandboxManager::new(GatewayProxy::new(config).unwrap())
    }

    #[test]
    fn test_create_request_serialization() {
        let request = CreateSandboxRequest::new("asr").with_option("gpu", json!(false));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"type": "asr", "options": {"gpu": false}})
        );

        let request = request.with_sandbox_id("be9ae617");
        assert_eq!(
            serde_json::to_value(&request).unwrap()["sandbox_id"],
            json!("be9ae617")
        );
    }

    #[test]
    fn test_websocket_url_derivation() {
        assert_eq!(
            manager("http://gateway.local:8000").websocket_url("abc"),
            "ws://gateway.local:8000/api/v1/sandboxes/ws/abc"
        );
        assert_eq!(
            manager("https://gateway.example.com/ingress/").websocket_url("abc"),
            "wss://gateway.example.com/ingress/api/v1/sandboxes/ws/abc"
        );
    }

    #[test]
    fn test_websocket_url_empty_for_bad_id() {
        let manager = manager("http://gateway.local");
        assert_eq!(manager.websocket_url(""), "");
        assert_eq!(manager.websocket_url("../x"), "");
    }

    #[test]
    fn test_websocket_url_follows_reload() {
        let manager = manager("http://one.local");
        manager
            .proxy()
            .config()
            .reload(GatewayConfig::new("https://two.local", "t"))
            .unwrap();
        assert_eq!(
            manager.websocket_url("abc"),
            "wss://two.local/api/v1/sandboxes/ws/abc"
        );
    }
}
