// ABOUTME: Gateway-relative route table for sandbox lifecycle, proxy and job endpoints
// ABOUTME: Also validates sandbox identifiers and caller paths before they are spliced into a URL

use crate::error::{GatewayError, GatewayResult};

pub const SANDBOXES: &str = "api/v1/sandboxes";

pub const ASR_TASK_START: &str = "api/asr/task/start";
pub const ASR_TASK_FINISH: &str = "api/asr/task/finish";
pub const ASR_TASK_CANCEL: &str = "api/asr/task/cancel";

/// Reject ids that are empty or could escape their path segment
pub fn validate_sandbox_id(sandbox_id: &str) -> GatewayResult<&str> {
    let sandbox_id = sandbox_id.trim();
    if sandbox_id.is_empty() {
        return Err(GatewayError::invalid_request("sandbox_id is required"));
    }
    if !sandbox_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(GatewayError::invalid_request(format!(
            "sandbox_id contains invalid characters: {}",
            sandbox_id
        )));
    }
    Ok(sandbox_id)
}

/// Accept only a gateway-relative path: no scheme, no authority, no dot segments.
///
/// Returns the path without its leading slashes, ready to join onto the base URL.
pub fn validate_path(path: &str) -> GatewayResult<&str> {
    if path.chars().any(|c| c.is_control()) {
        return Err(GatewayError::invalid_request(
            "path contains control characters",
        ));
    }
    if path.contains('\\') {
        return Err(GatewayError::invalid_request(format!(
            "path contains a backslash: {}",
            path
        )));
    }
    if path.starts_with("//") {
        return Err(GatewayError::invalid_request(format!(
            "path must not name a host: {}",
            path
        )));
    }

    let path = path.trim_start_matches('/');
    let route = path.split(['?', '#']).next().unwrap_or_default();

    if route.split('/').next().is_some_and(|first| first.contains(':')) {
        return Err(GatewayError::invalid_request(format!(
            "path must be relative to the gateway: {}",
            path
        )));
    }

    let escapes = route.split('/').any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    });
    if escapes {
        return Err(GatewayError::invalid_request(format!(
            "path must not contain dot segments: {}",
            path
        )));
    }

    Ok(path)
}

pub fn sandbox(sandbox_id: &str) -> String {
    format!("{}/{}", SANDBOXES, sandbox_id)
}

pub fn sandbox_proxy(sandbox_id: &str, path: &str) -> String {
    format!(
        "{}/{}/proxy/{}",
        SANDBOXES,
        sandbox_id,
        path.trim_start_matches('/')
    )
}

pub fn sandbox_websocket(sandbox_id: &str) -> String {
    format!("{}/ws/{}", SANDBOXES, sandbox_id)
}
