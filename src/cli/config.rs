// ABOUTME: Configuration management for the cliq application
// ABOUTME: Handles loading configuration from files and CLIQ_* environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::ExecutionConfig;
use crate::registry::SettingsProvider;
use crate::store::DEFAULT_MAX_TEMPLATE_BYTES;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory scanned when no template file is given
    #[serde(default)]
    pub template_dir: Option<PathBuf>,

    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default = "default_kill_grace", with = "humantime_serde")]
    pub kill_grace: Duration,

    #[serde(default = "default_hub_base_url")]
    pub hub_base_url: String,

    #[serde(default = "default_max_template_bytes")]
    pub max_template_bytes: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_kill_grace() -> Duration {
    Duration::from_secs(2)
}

fn default_hub_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_template_bytes() -> usize {
    DEFAULT_MAX_TEMPLATE_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_dir: None,
            shell: default_shell(),
            kill_grace: default_kill_grace(),
            hub_base_url: default_hub_base_url(),
            max_template_bytes: default_max_template_bytes(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => Some(p),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_yaml::from_str(&contents)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            _ => Config::default(),
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let local = [PathBuf::from("cliq.yaml"), PathBuf::from(".cliq.yaml")];
        if let Some(path) = local.into_iter().find(|p| p.exists()) {
            return Some(path);
        }

        dirs::home_dir()
            .map(|home| home.join(".cliq").join("config.yaml"))
            .filter(|p| p.exists())
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("CLIQ_TEMPLATE_DIR") {
            self.template_dir = Some(PathBuf::from(dir));
        }
        if let Ok(shell) = std::env::var("CLIQ_SHELL") {
            self.shell = shell;
        }
        if let Ok(grace) = std::env::var("CLIQ_KILL_GRACE") {
            self.kill_grace = humantime_serde::re::humantime::parse_duration(&grace)
                .with_context(|| format!("Invalid CLIQ_KILL_GRACE '{}'", grace))?;
        }
        if let Ok(url) = std::env::var("CLIQ_HUB_BASE_URL") {
            self.hub_base_url = url;
        }
        if let Ok(level) = std::env::var("CLIQ_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CLIQ_LOG_FORMAT") {
            self.logging.format = format;
        }
        Ok(())
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            shell: self.shell.clone(),
            kill_grace: self.kill_grace,
            ..ExecutionConfig::default()
        }
    }
}

impl SettingsProvider for Config {
    fn hub_base_url(&self) -> String {
        self.hub_base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.shell, "/bin/sh");
        assert_eq!(config.kill_grace, Duration::from_secs(2));
        assert_eq!(config.hub_base_url, "http://localhost:8080");
        assert_eq!(config.max_template_bytes, 1024 * 1024);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("cliq.yaml");
        fs::write(
            &config_path,
            r#"
template_dir: /opt/templates
kill_grace: 500ms
hub_base_url: https://hub.example.com
logging:
  level: debug
  format: compact
"#,
        )
        .unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.template_dir, Some(PathBuf::from("/opt/templates")));
        assert_eq!(config.kill_grace, Duration::from_millis(500));
        assert_eq!(config.shell, "/bin/sh");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.execution_config().kill_grace, Duration::from_millis(500));
        assert_eq!(SettingsProvider::hub_base_url(&config), "https://hub.example.com");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("cliq.yaml");
        fs::write(&config_path, "kill_grace: [not, a, duration]").unwrap();
        assert!(Config::load(Some(config_path)).is_err());
    }
}
