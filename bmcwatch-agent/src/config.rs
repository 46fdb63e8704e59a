//! Configuration loading
//!
//! Handles:
//! - TOML file at `$BMCWATCH_CONFIG` or the OS config directory
//! - `BMCWATCH_TIMEOUT` override of the request timeout
//! - Target passwords kept out of the file, in the OS keyring

use anyhow::{Context, Result};
use bmcwatch_core::Target;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Level};

const KEYRING_SERVICE: &str = "bmcwatch";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Seconds between scrape cycles; one-shot when absent
    pub interval_secs: Option<u64>,
    pub log_level: String,
    pub targets: Vec<TargetConfig>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    pub username: String,
    #[serde(default, skip_serializing)] // Never serialize passwords
    pub password: Option<String>,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            interval_secs: None,
            log_level: "info".to_string(),
            targets: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Load config from `$BMCWATCH_CONFIG` or the OS-specific location
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        Self::load_from(&config_path).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::parse(&content).with_context(|| format!("Invalid configuration in {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_timeout_override(std::env::var("BMCWATCH_TIMEOUT").ok())?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    fn apply_timeout_override(&mut self, value: Option<String>) -> Result<()> {
        if let Some(value) = value {
            self.timeout_secs = value
                .trim()
                .parse()
                .with_context(|| format!("BMCWATCH_TIMEOUT is not a number of seconds: {value:?}"))?;
        }
        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("BMCWATCH_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push("bmcwatch");
        path.push("config.toml");
        Ok(path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Maximum log level; unknown names fall back to `info`
    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }

    /// Targets ready to scrape. A target whose password cannot be found is
    /// skipped with a warning.
    pub async fn targets(&self) -> Vec<Target> {
        let mut targets = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            match target.to_target(self.timeout()).await {
                Ok(ready) => targets.push(ready),
                Err(e) => warn!("Skipping target {}: {:#}", target.host, e),
            }
        }
        targets
    }
}

impl TargetConfig {
    async fn to_target(&self, timeout: Duration) -> Result<Target> {
        let password = match &self.password {
            Some(password) => password.clone(),
            None => {
                info!("Target {}: reading password from the OS keyring", self.host);
                // Keyring backends block on IPC
                let (username, host) = (self.username.clone(), self.host.clone());
                tokio::task::spawn_blocking(move || Self::load_password(&username, &host))
                    .await
                    .context("Keyring lookup task failed")??
            }
        };
        Ok(Target::new(&self.host, &self.username, password).with_timeout(timeout))
    }

    fn keyring_account(username: &str, host: &str) -> String {
        format!("{username}@{host}")
    }

    /// Load password from secure OS keyring
    fn load_password(username: &str, host: &str) -> Result<String> {
        let entry = Entry::new(KEYRING_SERVICE, &Self::keyring_account(username, host))?;
        entry
            .get_password()
            .with_context(|| format!("No password for {username}@{host} in config or keyring"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
timeout_secs = 30
interval_secs = 60
log_level = "debug"

[[targets]]
host = "10.0.0.5"
username = "root"
password = "calvin"

[[targets]]
host = "bmc-02.lab:8443"
username = "admin"
password = "hunter2"
"#;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.interval(), None);
        assert_eq!(config.max_level(), Level::INFO);
        assert!(config.targets.is_empty());
    }

    #[tokio::test]
    async fn test_parse_full_config() {
        let config = AgentConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.max_level(), Level::DEBUG);

        let targets = config.targets().await;
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].host, "10.0.0.5");
        assert_eq!(targets[0].password, "calvin");
        assert_eq!(targets[1].timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_target_without_password_anywhere_is_skipped() {
        let config = AgentConfig::parse(
            r#"
[[targets]]
host = "bmc-unknown.lab"
username = "nobody"

[[targets]]
host = "10.0.0.5"
username = "root"
password = "calvin"
"#,
        )
        .unwrap();

        let targets = config.targets().await;

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].host, "10.0.0.5");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = AgentConfig::parse("interval_secs = 0\nlog_level = \"loud\"").unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.interval(), None);
        assert_eq!(config.max_level(), Level::INFO);
    }

    #[test]
    fn test_timeout_override() {
        let mut config = AgentConfig::default();
        config.apply_timeout_override(Some(" 25 ".to_string())).unwrap();
        assert_eq!(config.timeout_secs, 25);
        config.apply_timeout_override(None).unwrap();
        assert_eq!(config.timeout_secs, 25);
        assert!(config.apply_timeout_override(Some("soon".to_string())).is_err());
    }

    #[test]
    fn test_passwords_never_leak() {
        let config = AgentConfig::parse(SAMPLE).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("calvin"));
        assert!(!debug.contains("hunter2"));
        let serialized = toml::to_string(&config).unwrap();
        assert!(!serialized.contains("calvin"));
    }

    #[test]
    fn test_keyring_account_name() {
        assert_eq!(TargetConfig::keyring_account("root", "10.0.0.5"), "root@10.0.0.5");
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::load_from(&dir.path().join("config.toml")).await.unwrap();
        assert!(config.targets.is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();
        let config = AgentConfig::load_from(&path).await.unwrap();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[1].username, "admin");
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "targets = 3").await.unwrap();
        assert!(AgentConfig::load_from(&path).await.is_err());
    }
}
