// ABOUTME: CLI commands for the sandbox lifecycle (create, status, destroy, ws-url)
// ABOUTME: Thin wrappers over SandboxManager that render the uniform envelope

use clap::Subcommand;
use colored::*;
use sandgate_sandbox::{CreateSandboxRequest, SandboxManager};
use serde_json::Value;

use super::utils::{print_json, report_envelope, status_label};
use super::GatewayArgs;

#[derive(Debug, Subcommand)]
pub enum SandboxCommands {
    /// Create a sandbox (or attach to an existing one with --sandbox-id)
    Create {
        /// Sandbox image family
        #[arg(long = "type", default_value = "asr")]
        sandbox_type: String,

        /// Reuse this sandbox id instead of allocating a new one
        #[arg(long)]
        sandbox_id: Option<String>,

        /// Creation option as key=value; JSON values are parsed, anything else is a string
        #[arg(long = "option", value_parser = parse_option)]
        options: Vec<(String, Value)>,
    },

    /// Show the current state of a sandbox
    Status { sandbox_id: String },

    /// Destroy a sandbox
    Destroy { sandbox_id: String },

    /// Print the streaming endpoint of a sandbox
    WsUrl { sandbox_id: String },
}

pub async fn handle_sandbox_command(
    command: SandboxCommands,
    gateway: &GatewayArgs,
) -> anyhow::Result<()> {
    let manager = SandboxManager::new(gateway.proxy()?);

    match command {
        SandboxCommands::Create {
            sandbox_type,
            sandbox_id,
            options,
        } => {
            let mut request = options
                .into_iter()
                .fold(CreateSandboxRequest::new(sandbox_type), |request, (key, value)| {
                    request.with_option(key, value)
                });
            if let Some(sandbox_id) = sandbox_id {
                request = request.with_sandbox_id(sandbox_id);
            }

            let envelope = manager.create(&request).await;
            report_envelope("🚀 Sandbox created", &envelope, gateway.json)?;
            if !gateway.json {
                println!(
                    "Stream: {}",
                    manager.websocket_url(&envelope.data.sandbox_id).cyan()
                );
            }
            Ok(())
        }

        SandboxCommands::Status { sandbox_id } => {
            let envelope = manager.get_status(&sandbox_id).await;
            if envelope.is_not_found() && !gateway.json {
                eprintln!("{}", format!("Sandbox '{}' not found", sandbox_id).yellow());
            }
            report_envelope("📦 Sandbox status", &envelope, gateway.json)
        }

        SandboxCommands::Destroy { sandbox_id } => {
            let envelope = manager.destroy(&sandbox_id).await;
            report_envelope("🧹 Sandbox destroy requested", &envelope, gateway.json)?;
            if !gateway.json {
                println!(
                    "Teardown is asynchronous; current status: {}",
                    status_label(envelope.status())
                );
            }
            Ok(())
        }

        SandboxCommands::WsUrl { sandbox_id } => {
            let url = manager.websocket_url(&sandbox_id);
            if url.is_empty() {
                anyhow::bail!("Invalid sandbox id '{}'", sandbox_id);
            }

            if gateway.json {
                print_json(&serde_json::json!({ "sandbox_id": sandbox_id, "websocket_url": url }))
            } else {
                println!("{}", url);
                Ok(())
            }
        }
    }
}

/// Parse `key=value`, keeping JSON literals typed
fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option name in '{}'", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
