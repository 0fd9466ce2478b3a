mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{
    client::ClientArgs, config::ConfigArgs, start::StartArgs, template::TemplateCommands,
};

#[derive(Parser)]
#[command(author, version, about = "Nuke MCP relay CLI")]
struct Cli {
    /// Path to the configuration file. Defaults to ~/.config/nukemcp/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Start(StartArgs),
    /// Stop the relay server
    Stop,
    /// Display relay server status
    Status,
    /// Restart the relay server
    Restart(StartArgs),
    /// Show or update configuration
    Config(ConfigArgs),
    /// Write the MCP client configuration for this relay
    Client(ClientArgs),
    /// Manage saved node templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Internal command used for daemonized server execution
    #[command(name = "__internal:server", hide = true)]
    InternalServer,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { config, command } = Cli::parse();

    match command {
        Commands::Start(args) => commands::start::execute(config, args).await?,
        Commands::Stop => commands::start::stop(config)?,
        Commands::Status => commands::start::status(config)?,
        Commands::Restart(args) => restart(config, args).await?,
        Commands::Config(args) => commands::config::execute(config, args)?,
        Commands::Client(args) => commands::client::execute(config, args)?,
        Commands::Template { command } => commands::template::execute(config, command)?,
        Commands::InternalServer => commands::start::run_internal(config).await?,
    }

    Ok(())
}

async fn restart(config: Option<PathBuf>, args: StartArgs) -> Result<()> {
    if let Err(err) = commands::start::stop(config.clone()) {
        tracing::warn!("failed to stop relay server before restart: {err}");
    }
    commands::start::execute(config, args).await
}
