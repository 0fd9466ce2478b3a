//! Generates the MCP client configuration block that points an
//! assistant at this relay.

use std::{collections::BTreeMap, env, fs, path::Path};

use serde::Serialize;

use crate::{
    config::{Config, ROOT_ENV},
    error::{BridgeError, Result},
};

#[derive(Debug, Serialize)]
pub struct ClientConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, ServerEntry>,
}

#[derive(Debug, Serialize)]
pub struct ServerEntry {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ClientConfig {
    /// Builds an entry that launches this binary in foreground mode on
    /// the configured port.
    pub fn for_server(config: &Config) -> Result<Self> {
        let command = env::current_exe()
            .map_err(|err| BridgeError::Config(format!("unable to locate executable: {err}")))?;
        let mut env_vars = BTreeMap::new();
        env_vars.insert(
            ROOT_ENV.to_string(),
            config.data_dir.to_string_lossy().into_owned(),
        );

        let mut mcp_servers = BTreeMap::new();
        mcp_servers.insert(
            "nuke".to_string(),
            ServerEntry {
                command: command.to_string_lossy().into_owned(),
                args: vec![
                    "start".to_string(),
                    "--foreground".to_string(),
                    "--port".to_string(),
                    config.port.to_string(),
                ],
                env: env_vars,
            },
        );
        Ok(Self { mcp_servers })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn client_config_names_the_nuke_server() {
        let dir = tempdir().unwrap();
        let config = Config {
            port: 7001,
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let client = ClientConfig::for_server(&config).unwrap();
        let json = client.to_json().unwrap();
        assert!(json.contains("mcpServers"));
        assert!(json.contains("\"nuke\""));
        assert!(json.contains("7001"));
        assert!(json.contains(ROOT_ENV));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let path = dir.path().join("nested/client.json");
        ClientConfig::for_server(&config)
            .unwrap()
            .write_to(&path)
            .unwrap();
        assert!(path.exists());
    }
}
