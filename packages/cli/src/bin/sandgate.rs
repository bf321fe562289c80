// ABOUTME: Entry point for the sandgate operator CLI
// ABOUTME: Loads .env, installs logging and dispatches sandbox and asr subcommands

use clap::{Parser, Subcommand};
use colored::*;
use sandgate_config::constants::DEFAULT_LOG_FILTER;
use std::process;

mod cli;

use cli::asr::AsrCommands;
use cli::sandbox::SandboxCommands;
use cli::GatewayArgs;

#[derive(Parser)]
#[command(name = "sandgate")]
#[command(about = "Sandgate CLI - remote sandbox lifecycle and job orchestration")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    gateway: GatewayArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage sandboxes
    #[command(subcommand)]
    Sandbox(SandboxCommands),
    /// Drive recording transcription jobs inside a sandbox
    #[command(subcommand)]
    Asr(AsrCommands),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = handle_command(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn init_tracing() {
    // stderr keeps --json output on stdout clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

async fn handle_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Sandbox(command) => {
            cli::sandbox::handle_sandbox_command(command, &cli.gateway).await
        }
        Commands::Asr(command) => cli::asr::handle_asr_command(command, &cli.gateway).await,
    }
}
