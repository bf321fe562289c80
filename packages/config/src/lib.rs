// ABOUTME: Configuration and environment variable helpers for Sandgate
// ABOUTME: Exposes env var names plus small typed readers shared by every package

pub mod constants;

use std::env;
use tracing::warn;

/// Read an environment variable, treating unset and blank values the same
pub fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse a boolean flag such as `true`, `0` or `yes`
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag, falling back to `default` when unset or unparseable
pub fn env_flag(name: &str, default: bool) -> bool {
    match env_string(name) {
        Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
            warn!("Ignoring invalid boolean for {}: {:?}", name, raw);
            default
        }),
        None => default,
    }
}

/// Read an unsigned integer, falling back to `default` when unset or unparseable
pub fn env_u64(name: &str, default: u64) -> u64 {
    match env_string(name) {
        Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
            warn!("Ignoring invalid number for {}: {:?}", name, raw);
            default
        }),
        None => default,
    }
}
