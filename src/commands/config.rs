use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use nukemcp::config::{load_or_default, ConfigUpdate};

#[derive(Args)]
pub struct ConfigArgs {
    /// Update the server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Update the bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Update the data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

pub fn execute(config_path: Option<PathBuf>, args: ConfigArgs) -> Result<()> {
    let (mut config, path) = load_or_default(config_path)?;

    let update = ConfigUpdate {
        port: args.port,
        host: args.host,
        data_dir: args.data_dir,
    };
    let has_changes =
        update.port.is_some() || update.host.is_some() || update.data_dir.is_some();
    if has_changes {
        config.apply_update(update);
        config.ensure_data_dir()?;
        config.save(&path)?;
        println!("Configuration updated at {}", path.display());
    }

    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
