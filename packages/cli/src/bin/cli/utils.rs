// ABOUTME: Output helpers shared by CLI commands
// ABOUTME: Renders envelopes and job responses as tables, colored text or raw JSON

use chrono::DateTime;
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use sandgate_sandbox::{JobResponse, JobState, ResultEnvelope, SandboxDescriptor, SandboxStatus};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a lifecycle envelope; a failed envelope becomes the command error
pub fn report_envelope(title: &str, envelope: &ResultEnvelope, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(envelope)?;
    } else if envelope.success {
        println!("{}", title.blue().bold());
        println!();
        println!("{}", sandbox_table(&envelope.data));
    }

    if !envelope.success {
        anyhow::bail!("[{}] {}", envelope.code, envelope.message);
    }
    Ok(())
}

/// Print a job response; a failed call becomes the command error
pub fn report_job(title: &str, response: &JobResponse, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(response)?;
    } else if response.is_success() {
        println!("{} {}", title.blue().bold(), job_state_label(response));
        if !response.file_path.is_empty() {
            println!("  File: {}", response.file_path.cyan());
        }
        if !response.message.is_empty() {
            println!("  {}", response.message.dimmed());
        }
    }

    if !response.is_success() {
        anyhow::bail!("[{}] {}", response.code, response.message);
    }
    Ok(())
}

pub fn sandbox_table(descriptor: &SandboxDescriptor) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Sandbox ID", "Status", "IP Address", "Created"]);
    table.add_row(vec![
        or_dash(&descriptor.sandbox_id),
        status_label(descriptor.status).to_string(),
        or_dash(&descriptor.ip_address),
        format_timestamp(descriptor.created_at),
    ]);

    for (key, value) in &descriptor.extra {
        table.add_row(vec![key.clone(), value.to_string(), String::new(), String::new()]);
    }
    table
}

pub fn status_label(status: SandboxStatus) -> ColoredString {
    match status {
        SandboxStatus::Running => status.as_str().green().bold(),
        SandboxStatus::Exited => status.as_str().yellow(),
        SandboxStatus::Unknown => status.as_str().dimmed(),
    }
}

fn job_state_label(response: &JobResponse) -> ColoredString {
    let status = if response.status.is_empty() {
        "unknown"
    } else {
        response.status.as_str()
    };

    match response.state() {
        JobState::Completed => status.green().bold(),
        JobState::Processing => status.cyan(),
        JobState::Cancelled => status.yellow(),
        JobState::Error => status.red().bold(),
        JobState::Other(_) => status.normal(),
    }
}

/// Format seconds since the epoch as a UTC wall-clock time
pub fn format_timestamp(seconds: f64) -> String {
    let whole = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}
