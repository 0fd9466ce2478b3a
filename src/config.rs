use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

pub const DEFAULT_PORT: u16 = 9876;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Overrides the data directory, mainly for tests and packaged installs.
pub const ROOT_ENV: &str = "NUKE_MCP_ROOT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub data_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Config {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            data_dir: default_data_dir(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub data_dir: Option<PathBuf>,
}

pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir()
        .ok_or_else(|| BridgeError::Config("unable to locate user config directory".to_string()))?;
    path.push("nukemcp");
    path.push("config.toml");
    Ok(path)
}

pub fn load_or_default(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let config_path = if let Some(path) = path {
        path
    } else {
        default_config_path()?
    };
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let cfg: Config = toml::from_str(&contents)?;
        cfg.ensure_data_dir()?;
        Ok((cfg, config_path))
    } else {
        let cfg = Config::default();
        cfg.ensure_data_dir()?;
        cfg.save(&config_path)?;
        Ok((cfg, config_path))
    }
}

impl Config {
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_update(&mut self, update: ConfigUpdate) {
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(host) = update.host {
            self.host = host;
        }
        if let Some(dir) = update.data_dir {
            self.data_dir = dir;
        }
        self.updated_at = Utc::now();
    }

    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.data_dir.join("templates")
    }

    pub fn pid_file_path(&self) -> PathBuf {
        self.data_dir.join("nukemcp.pid")
    }

    pub fn client_config_path(&self) -> PathBuf {
        self.data_dir.join("mcp_client.json")
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(root) = env::var(ROOT_ENV) {
        return PathBuf::from(root);
    }
    let Some(home) = dirs::home_dir() else {
        return PathBuf::from(".nukemcp");
    };
    home.join(".nukemcp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_creates_a_default_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let (cfg, written) = load_or_default(Some(path.clone())).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(written, path);
        assert!(path.exists());
    }

    #[test]
    fn updates_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let (mut cfg, _) = load_or_default(Some(path.clone())).unwrap();
        cfg.apply_update(ConfigUpdate {
            port: Some(7001),
            ..ConfigUpdate::default()
        });
        cfg.save(&path).unwrap();

        let (reloaded, _) = load_or_default(Some(path)).unwrap();
        assert_eq!(reloaded.port, 7001);
        assert!(reloaded.updated_at >= reloaded.created_at);
    }
}
