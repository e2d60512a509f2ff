//! Configuration management

use anyhow::{bail, Result};
use directories::{ProjectDirs, UserDirs};
use moodlet_core::{ClientConfig, BROWSER_USER_AGENT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Site and HTTP settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Remembered between runs
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub downloads: DownloadsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root of the Moodle installation
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Never holds a password
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub last_username: Option<String>,

    /// Course reopened after the next login
    #[serde(default)]
    pub last_course_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Where downloads are saved; the user's download folder when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "moodlet", "moodlet")
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Log file used when the TUI runs with verbose logging
    pub fn log_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.data_dir().join("moodlet.log"))
    }

    /// Session settings for the core client
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.general.base_url.clone(),
            user_agent: self.general.user_agent.clone(),
            timeout_secs: self.general.timeout_secs,
        }
    }

    /// Directory downloads are written to
    pub fn download_dir(&self) -> PathBuf {
        if let Some(dir) = &self.downloads.directory {
            return dir.clone();
        }
        UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Change a value in memory without saving
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "base_url" | "url" => {
                url_must_parse(value)?;
                self.general.base_url = value.to_string();
            }
            "timeout" | "timeout_secs" => {
                self.general.timeout_secs = match value.parse() {
                    Ok(secs) if secs > 0 => secs,
                    _ => bail!("timeout must be a positive number of seconds"),
                };
            }
            "user_agent" | "ua" => {
                self.general.user_agent = value.to_string();
            }
            "download_dir" | "downloads" => {
                self.downloads.directory = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "username" => {
                self.session.last_username = Some(value.to_string()).filter(|v| !v.is_empty());
            }
            _ => bail!("Unknown setting: {}", key),
        }
        Ok(())
    }

    /// Whether a setting changes how the HTTP client talks to the site
    pub fn affects_client(key: &str) -> bool {
        matches!(
            key,
            "base_url" | "url" | "timeout" | "timeout_secs" | "user_agent" | "ua"
        )
    }
}

fn url_must_parse(value: &str) -> Result<()> {
    if let Err(e) = Url::parse(value) {
        bail!("Invalid base URL {}: {}", value, e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.general.base_url, "http://localhost");
        assert_eq!(config.general.timeout_secs, 30);
        assert!(config.session.last_username.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[general]\nbase_url = \"https://moodle.example.edu\"\n\n[session]\nlast_username = \"ada\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.general.base_url, "https://moodle.example.edu");
        assert_eq!(config.general.timeout_secs, 30);
        assert_eq!(config.general.user_agent, BROWSER_USER_AGENT);
        assert_eq!(config.session.last_username.as_deref(), Some("ada"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.session.last_course_id = Some("12".to_string());
        config.downloads.directory = Some(PathBuf::from("/tmp/moodle"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.session.last_course_id.as_deref(), Some("12"));
        assert_eq!(loaded.download_dir(), PathBuf::from("/tmp/moodle"));
    }

    #[test]
    fn test_affects_client() {
        assert!(Config::affects_client("url"));
        assert!(Config::affects_client("timeout"));
        assert!(Config::affects_client("ua"));
        assert!(!Config::affects_client("downloads"));
        assert!(!Config::affects_client("username"));
    }

    #[test]
    fn test_apply() {
        let mut config = Config::default();
        config.apply("timeout", "10").unwrap();
        config.apply("url", "https://m.edu/moodle").unwrap();
        assert_eq!(config.to_client_config().timeout_secs, 10);
        assert_eq!(config.to_client_config().base_url, "https://m.edu/moodle");

        assert!(config.apply("timeout", "0").is_err());
        assert!(config.apply("url", "not a url").is_err());
        assert!(config.apply("javascript", "true").is_err());
        assert_eq!(config.general.base_url, "https://m.edu/moodle");
    }
}
