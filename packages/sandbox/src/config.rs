// ABOUTME: Sandbox gateway configuration and the process-wide shared handle
// ABOUTME: Validates the ingress address once and supports credential rotation without restart

use std::sync::{Arc, RwLock};
use std::time::Duration;

use sandgate_config::constants::{
    SANDBOX_GATEWAY_ENABLED, SANDBOX_GATEWAY_TOKEN, SANDBOX_GATEWAY_URL,
};
use sandgate_config::{env_flag, env_string};
use reqwest::header::HeaderValue;
use tracing::info;
use url::Url;

use crate::error::{GatewayError, GatewayResult};

/// Fixed per-request timeout for every gateway call
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Sandbox gateway configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Gateway base address, e.g. `https://gateway.internal`
    pub base_url: String,

    /// Bearer token sent in the `token` header
    pub token: String,

    /// Whether outbound calls are allowed at all
    pub enabled: bool,

    /// Request timeout, fixed for callers outside this crate
    pub(crate) timeout: Duration,
}

impl GatewayConfig {
    /// Initialize with a gateway address and token
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            enabled: true,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> GatewayResult<Self> {
        let base_url = env_string(SANDBOX_GATEWAY_URL).ok_or_else(|| {
            GatewayError::config(format!("{} is not set", SANDBOX_GATEWAY_URL))
        })?;
        let token = env_string(SANDBOX_GATEWAY_TOKEN).unwrap_or_default();

        let config = Self {
            enabled: env_flag(SANDBOX_GATEWAY_ENABLED, true),
            ..Self::new(base_url, token)
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> GatewayResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(GatewayError::config("Gateway base URL is required"));
        }

        let url = Url::parse(self.base_url.trim())?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(GatewayError::config(format!(
                    "Gateway base URL must use http or https, got {}",
                    other
                )))
            }
        }
        if url.host_str().is_none() {
            return Err(GatewayError::config("Gateway base URL has no host"));
        }

        if HeaderValue::from_str(&self.token).is_err() {
            return Err(GatewayError::config(
                "Gateway token contains invalid header characters",
            ));
        }

        Ok(())
    }

    /// Parsed base URL with a trailing slash so relative routes join underneath it
    pub fn base(&self) -> GatewayResult<Url> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/", trimmed))?)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}

/// Configuration builder
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Start building a new configuration
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: GatewayConfig::new(base_url, String::new()),
        }
    }

    /// Set the bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = token.into();
        self
    }

    /// Enable or disable outbound calls
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> GatewayResult<GatewayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Process-wide gateway configuration, read fresh on every call.
///
/// Cloning shares the same underlying configuration, so a `reload` or
/// `rotate_token` through any clone is observed by every proxy holding one.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<GatewayConfig>>,
}

impl SharedConfig {
    /// Wrap a configuration, rejecting it if invalid
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
        })
    }

    /// Load from environment variables
    pub fn from_env() -> GatewayResult<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    /// Current configuration
    pub fn snapshot(&self) -> GatewayConfig {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the whole configuration after validating it
    pub fn reload(&self, config: GatewayConfig) -> GatewayResult<()> {
        config.validate()?;
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = config;
        info!("Sandbox gateway configuration reloaded");
        Ok(())
    }

    /// Re-read configuration from environment variables
    pub fn reload_from_env(&self) -> GatewayResult<()> {
        self.reload(GatewayConfig::from_env()?)
    }

    /// Replace only the bearer token; an unusable token leaves the old one in place
    pub fn rotate_token(&self, token: impl Into<String>) -> GatewayResult<()> {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let candidate = GatewayConfig {
            token: token.into(),
            ..guard.clone()
        };
        candidate.validate()?;

        *guard = candidate;
        info!("Sandbox gateway token rotated");
        Ok(())
    }
}
