use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct CliTest {
    _tmp: TempDir,
    home: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
    config_home: PathBuf,
}

impl CliTest {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir().context("failed to create temp dir")?;
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).context("failed to create temporary home directory")?;
        let data_dir = home.join("data");
        fs::create_dir_all(&data_dir).context("failed to create temporary data directory")?;
        let log_dir = home.join("logs");
        fs::create_dir_all(&log_dir).context("failed to create temporary log directory")?;
        let config_home = home.join(".config");
        fs::create_dir_all(&config_home).context("failed to create temporary config directory")?;
        Ok(Self {
            _tmp: tmp,
            home,
            data_dir,
            log_dir,
            config_home,
        })
    }

    fn command(&self) -> Result<Command> {
        let mut cmd = Command::cargo_bin("nukemcp")?;
        cmd.env("HOME", &self.home);
        cmd.env("XDG_CONFIG_HOME", &self.config_home);
        cmd.env("NUKE_MCP_ROOT", &self.data_dir);
        cmd.env("NUKE_MCP_LOG_DIR", &self.log_dir);
        Ok(cmd)
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.command()?.args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "nukemcp {:?} exited with {}: {}",
                args,
                output.status,
                stderr
            );
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}

#[test]
fn help_names_the_relay_commands() -> Result<()> {
    let cli = CliTest::new()?;
    cli.command()?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("template"));
    Ok(())
}

#[test]
fn config_shows_the_default_port() -> Result<()> {
    let cli = CliTest::new()?;
    let stdout = cli.run(&["config"])?;
    assert!(stdout.contains("port = 9876"), "got:\n{stdout}");
    assert!(stdout.contains("host = \"127.0.0.1\""), "got:\n{stdout}");
    Ok(())
}

#[test]
fn config_updates_persist() -> Result<()> {
    let cli = CliTest::new()?;
    let stdout = cli.run(&["config", "--port", "7001"])?;
    assert!(stdout.contains("Configuration updated"), "got:\n{stdout}");

    let stdout = cli.run(&["config"])?;
    assert!(stdout.contains("port = 7001"), "got:\n{stdout}");
    Ok(())
}

#[test]
fn status_reports_not_running() -> Result<()> {
    let cli = CliTest::new()?;
    let stdout = cli.run(&["status"])?;
    assert!(stdout.contains("not running"), "got:\n{stdout}");
    Ok(())
}

#[test]
fn stop_without_a_server_is_a_no_op() -> Result<()> {
    let cli = CliTest::new()?;
    let stdout = cli.run(&["stop"])?;
    assert!(
        stdout.contains("No running relay server found"),
        "got:\n{stdout}"
    );
    Ok(())
}

#[test]
fn template_list_starts_empty() -> Result<()> {
    let cli = CliTest::new()?;
    let stdout = cli.run(&["template", "list"])?;
    assert!(stdout.contains("No templates saved"), "got:\n{stdout}");
    Ok(())
}

#[test]
fn template_remove_reports_missing_templates() -> Result<()> {
    let cli = CliTest::new()?;
    cli.command()?
        .args(["template", "remove", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("template 'ghost' not found"));
    Ok(())
}

#[test]
fn client_print_emits_the_mcp_block() -> Result<()> {
    let cli = CliTest::new()?;
    let stdout = cli.run(&["client", "--print"])?;
    let parsed: serde_json::Value = serde_json::from_str(stdout.trim())?;
    assert!(parsed["mcpServers"]["nuke"]["command"].is_string());
    assert_eq!(
        parsed["mcpServers"]["nuke"]["args"][0],
        serde_json::json!("start")
    );
    Ok(())
}

#[test]
fn client_writes_the_config_file() -> Result<()> {
    let cli = CliTest::new()?;
    let stdout = cli.run(&["client"])?;
    assert!(
        stdout.contains("MCP client configuration written"),
        "got:\n{stdout}"
    );
    let path = cli.data_dir.join("mcp_client.json");
    assert!(path.exists());
    let contents = fs::read_to_string(path)?;
    assert!(contents.contains("mcpServers"));
    Ok(())
}
