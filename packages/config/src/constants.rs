// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Sandgate

// Sandbox Gateway Configuration
pub const SANDBOX_GATEWAY_URL: &str = "SANDBOX_GATEWAY_URL";
pub const SANDBOX_GATEWAY_TOKEN: &str = "SANDBOX_GATEWAY_TOKEN";
pub const SANDBOX_GATEWAY_ENABLED: &str = "SANDBOX_GATEWAY_ENABLED";

// CLI Poll Loop
pub const SANDGATE_POLL_MAX_ELAPSED_SECS: &str = "SANDGATE_POLL_MAX_ELAPSED_SECS";

// Defaults
pub const DEFAULT_WORKSPACE_DIR: &str = ".workspace";
pub const DEFAULT_POLL_MAX_ELAPSED_SECS: u64 = 600;
pub const DEFAULT_LOG_FILTER: &str = "info";
