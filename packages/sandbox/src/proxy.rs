// ABOUTME: Gateway proxy performing one request against the sandbox ingress
// ABOUTME: Injects the bearer token, enforces the fixed timeout and normalizes every reply

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::{GatewayConfig, SharedConfig, REQUEST_TIMEOUT_SECS};
use crate::envelope::{GatewayReply, ResultEnvelope};
use crate::error::{GatewayError, GatewayResult};
use crate::routes;

/// Header carrying the gateway bearer token
pub const TOKEN_HEADER: &str = "token";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const LOGGED_BODY_CHARS: usize = 500;

/// One gateway request: method, gateway-relative path, JSON body and extra headers
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a caller-supplied header; the token header cannot be overridden
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Proxy to the sandbox gateway.
///
/// Configuration is snapshotted on every call, so token rotation through the
/// [`SharedConfig`] takes effect on the next request. There is no retry.
#[derive(Clone)]
pub struct GatewayProxy {
    http_client: Client,
    config: SharedConfig,
}

impl GatewayProxy {
    /// Create a new proxy over a shared configuration
    pub fn new(config: SharedConfig) -> GatewayResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Create a proxy from environment variables
    pub fn from_env() -> GatewayResult<Self> {
        Self::new(SharedConfig::from_env()?)
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Send a request to a gateway route and decode the reply.
    ///
    /// Non-200 replies with a decodable body are returned as `Ok`; only
    /// transport, decoding, misuse and disabled-gateway conditions are `Err`.
    pub async fn send(&self, request: &ProxyRequest) -> GatewayResult<GatewayReply> {
        self.send_within(request, "").await
    }

    /// Send a request into a running sandbox through the gateway ingress
    pub async fn forward(
        &self,
        sandbox_id: &str,
        request: &ProxyRequest,
    ) -> GatewayResult<GatewayReply> {
        let sandbox_id = routes::validate_sandbox_id(sandbox_id)?;
        let path = routes::validate_path(&request.path)?;
        let routed = ProxyRequest {
            path: routes::sandbox_proxy(sandbox_id, path),
            ..request.clone()
        };

        let reply = self
            .send_within(&routed, &routes::sandbox_proxy(sandbox_id, ""))
            .await?;
        debug!(
            sandbox_id,
            path = %request.path,
            code = reply.code,
            "Sandbox proxy call completed"
        );
        Ok(reply)
    }

    async fn send_within(&self, request: &ProxyRequest, scope: &str) -> GatewayResult<GatewayReply> {
        let config = self.config.snapshot();
        if !config.enabled {
            warn!(path = %request.path, "Sandbox gateway is disabled, skipping request");
            return Err(GatewayError::Disabled);
        }

        let url = resolve_url(&config.base()?, &request.path, scope)?;
        let headers = build_headers(&config, &request.headers)?;

        debug!(
            method = %request.method,
            path = %request.path,
            has_body = request.body.is_some(),
            "Sending sandbox gateway request"
        );

        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .headers(headers)
            .timeout(config.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                error!(
                    method = %request.method,
                    path = %request.path,
                    "Sandbox gateway request timed out after {:?}",
                    config.timeout
                );
                GatewayError::Timeout(config.timeout)
            } else {
                error!(
                    method = %request.method,
                    path = %request.path,
                    "Sandbox gateway request failed: {}",
                    e
                );
                GatewayError::from(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                error!(
                    path = %request.path,
                    "Gateway response body not received within {:?}",
                    config.timeout
                );
                GatewayError::Timeout(config.timeout)
            } else {
                error!(path = %request.path, "Failed to read gateway response body: {}", e);
                GatewayError::from(e)
            }
        })?;

        let mut reply: GatewayReply = serde_json::from_str(&text).map_err(|e| {
            let snippet: String = text.chars().take(LOGGED_BODY_CHARS).collect();
            error!(
                path = %request.path,
                status = status.as_u16(),
                "Gateway reply is not valid JSON: {}. Body snippet: {}",
                e,
                snippet
            );
            GatewayError::InvalidResponse(format!(
                "HTTP {} with undecodable body: {}",
                status.as_u16(),
                e
            ))
        })?;
        reply.http_status = status.as_u16();

        debug!(
            method = %request.method,
            path = %request.path,
            status = reply.http_status,
            code = reply.code,
            "Received sandbox gateway reply"
        );

        Ok(reply)
    }

    /// Gateway route call normalized into an envelope; never fails
    pub async fn request(&self, request: &ProxyRequest) -> ResultEnvelope {
        match self.send(request).await {
            Ok(reply) => log_envelope(None, request, ResultEnvelope::from_reply(&reply)),
            Err(e) => ResultEnvelope::from_error(&e),
        }
    }

    /// Sandbox proxy call normalized into an envelope; never fails
    pub async fn proxy(&self, sandbox_id: &str, request: &ProxyRequest) -> ResultEnvelope {
        match self.forward(sandbox_id, request).await {
            Ok(reply) => log_envelope(Some(sandbox_id), request, ResultEnvelope::from_reply(&reply)),
            Err(e) => {
                warn!(sandbox_id, path = %request.path, "Sandbox proxy call failed: {}", e);
                ResultEnvelope::from_error(&e)
            }
        }
    }
}

/// Join a caller path onto the base URL, refusing anything that lands outside `scope`
fn resolve_url(base: &Url, path: &str, scope: &str) -> GatewayResult<Url> {
    let path = routes::validate_path(path)?;
    let invalid = |e: url::ParseError| {
        GatewayError::invalid_request(format!("Invalid path '{}': {}", path, e))
    };

    let url = base.join(path).map_err(invalid)?;
    let root = base.join(scope).map_err(invalid)?;
    if !url.as_str().starts_with(root.as_str()) {
        return Err(GatewayError::invalid_request(format!(
            "path '{}' resolves outside {}",
            path, root
        )));
    }
    Ok(url)
}

fn build_headers(config: &GatewayConfig, extra: &[(String, String)]) -> GatewayResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| GatewayError::invalid_request(format!("Invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            GatewayError::invalid_request(format!("Invalid value for header {}", name))
        })?;
        headers.insert(name, value);
    }

    let token = HeaderValue::from_str(&config.token)
        .map_err(|_| GatewayError::config("Gateway token contains invalid header characters"))?;
    headers.insert(HeaderName::from_static(TOKEN_HEADER), token);

    Ok(headers)
}

fn log_envelope(
    sandbox_id: Option<&str>,
    request: &ProxyRequest,
    envelope: ResultEnvelope,
) -> ResultEnvelope {
    if !envelope.success {
        warn!(
            sandbox_id = sandbox_id.unwrap_or_default(),
            path = %request.path,
            code = envelope.code,
            "Sandbox gateway reported failure: {}",
            envelope.message
        );
    }
    envelope
}
