use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use nukemcp::{client_config::ClientConfig, config::load_or_default};

#[derive(Args)]
pub struct ClientArgs {
    /// Write the client configuration to this path instead of the data directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Print the configuration to stdout without writing a file
    #[arg(long)]
    pub print: bool,
}

pub fn execute(config_path: Option<PathBuf>, args: ClientArgs) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let client = ClientConfig::for_server(&config)?;

    if args.print {
        println!("{}", client.to_json()?);
        return Ok(());
    }

    let path = args.output.unwrap_or_else(|| config.client_config_path());
    client.write_to(&path)?;
    println!("MCP client configuration written to {}", path.display());
    Ok(())
}
