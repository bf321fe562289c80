// ABOUTME: Shared CLI plumbing: gateway connection flags and proxy construction
// ABOUTME: Command groups live in the sandbox and asr submodules

use anyhow::Context;
use clap::Args;
use sandgate_config::constants::{SANDBOX_GATEWAY_ENABLED, SANDBOX_GATEWAY_TOKEN};
use sandgate_config::{env_flag, env_string};
use sandgate_sandbox::{GatewayConfig, GatewayConfigBuilder, GatewayProxy, SharedConfig};

pub mod asr;
pub mod sandbox;
pub mod utils;

/// Connection flags accepted by every command
#[derive(Debug, Args)]
pub struct GatewayArgs {
    /// Gateway base URL (overrides SANDBOX_GATEWAY_URL)
    #[arg(long, global = true)]
    pub gateway_url: Option<String>,

    /// Gateway token (overrides SANDBOX_GATEWAY_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,
}

impl GatewayArgs {
    /// Resolve the gateway configuration, flags first, then environment
    pub fn config(&self) -> anyhow::Result<GatewayConfig> {
        let mut config = match &self.gateway_url {
            Some(url) => GatewayConfigBuilder::new(url)
                .token(env_string(SANDBOX_GATEWAY_TOKEN).unwrap_or_default())
                .enabled(env_flag(SANDBOX_GATEWAY_ENABLED, true))
                .build()
                .context("Invalid --gateway-url")?,
            None => GatewayConfig::from_env().context("Failed to load gateway configuration")?,
        };

        if let Some(token) = &self.token {
            config.token = token.clone();
        }
        Ok(config)
    }

    pub fn proxy(&self) -> anyhow::Result<GatewayProxy> {
        let shared = SharedConfig::new(self.config()?)?;
        Ok(GatewayProxy::new(shared)?)
    }
}
