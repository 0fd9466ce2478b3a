use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use nukemcp::{config::load_or_default, template::TemplateStore};

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List saved templates
    List,
    /// Show a template's contents
    Show { name: String },
    /// Remove a template
    Remove { name: String },
}

pub fn execute(config_path: Option<PathBuf>, command: TemplateCommands) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let store = TemplateStore::open(config.templates_dir())?;

    match command {
        TemplateCommands::List => {
            let summaries = store.list()?;
            if summaries.is_empty() {
                println!("No templates saved.");
            } else {
                for summary in summaries {
                    println!(
                        "{}/{} ({} nodes, saved {})",
                        summary.category,
                        summary.name,
                        summary.node_count,
                        summary.saved_at.to_rfc3339()
                    );
                }
            }
        }
        TemplateCommands::Show { name } => {
            let template = store.load(&name)?;
            println!("{}", serde_json::to_string_pretty(&template)?);
        }
        TemplateCommands::Remove { name } => {
            store.remove(&name)?;
            println!("Template '{name}' removed.");
        }
    }

    Ok(())
}
