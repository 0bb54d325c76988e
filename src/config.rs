use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the config file in the current directory.
const LOCAL_CONFIG: &str = "waverless.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the console API, e.g. `https://console.example.com`.
    pub api_url: String,
    /// Portal hosting the external sign-in page.
    #[serde(default = "default_portal_url")]
    pub portal_url: String,
    /// Sent as a bearer token when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Raw `Cookie` header value of a browser session, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_endpoints_refresh_secs")]
    pub endpoints_refresh_secs: u64,
    #[serde(default = "default_detail_refresh_secs")]
    pub detail_refresh_secs: u64,
    #[serde(default = "default_stats_refresh_secs")]
    pub stats_refresh_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[inline(always)]
#[rustfmt::skip]
fn default_portal_url() -> String          { "https://wavespeed.ai".to_string() }
#[inline(always)]
#[rustfmt::skip]
fn default_log_file() -> String            { "waverless-tui.log".to_string() }
#[inline(always)]
#[rustfmt::skip]
fn default_endpoints_refresh_secs() -> u64 { 10 }
#[inline(always)]
#[rustfmt::skip]
fn default_detail_refresh_secs() -> u64    { 5 }
#[inline(always)]
#[rustfmt::skip]
fn default_stats_refresh_secs() -> u64     { 60 }
#[inline(always)]
#[rustfmt::skip]
fn default_request_timeout_secs() -> u64   { 30 }

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080".to_string(),
            portal_url: default_portal_url(),
            api_key: None,
            session_cookie: None,
            log_file: default_log_file(),
            endpoints_refresh_secs: default_endpoints_refresh_secs(),
            detail_refresh_secs: default_detail_refresh_secs(),
            stats_refresh_secs: default_stats_refresh_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load config from either current directory or `~/.waverless/` directory,
    /// then apply environment overrides.
    pub fn load() -> color_eyre::Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> color_eyre::Result<Self> {
        // try current directory first
        let local_path = PathBuf::from(LOCAL_CONFIG);
        if local_path.exists() {
            let content = fs::read_to_string(&local_path)?;
            return Ok(serde_json::from_str(&content)?);
        }

        let home_path = Self::home_config_path();
        if home_path.exists() {
            let content = fs::read_to_string(&home_path)?;
            return Ok(serde_json::from_str(&content)?);
        }

        // if neither exists, create default config in current directory
        let config = Self::default();
        let content = serde_json::to_string_pretty(&config)?;
        fs::write(&local_path, content)?;
        Ok(config)
    }

    /// `WAVERLESS_API_URL` and `WAVERLESS_API_KEY` win over the file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("WAVERLESS_API_URL").filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(key) = var("WAVERLESS_API_KEY").filter(|v| !v.is_empty()) {
            self.api_key = Some(key);
        }
    }

    /// Save config where it was loaded from, `~/.waverless/` if there is no
    /// local file.
    pub fn save(&self) -> color_eyre::Result<()> {
        let local_path = PathBuf::from(LOCAL_CONFIG);
        let config_path = if local_path.exists() {
            local_path
        } else {
            Self::home_config_path()
        };

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    #[rustfmt::skip]
    pub fn endpoints_interval(&self) -> Duration { Duration::from_secs(self.endpoints_refresh_secs.max(1)) }
    #[rustfmt::skip]
    pub fn detail_interval(&self) -> Duration    { Duration::from_secs(self.detail_refresh_secs.max(1)) }
    #[rustfmt::skip]
    pub fn stats_interval(&self) -> Duration     { Duration::from_secs(self.stats_refresh_secs.max(1)) }

    /// Get the path to `$HOME/.waverless/console.json`
    fn home_config_path() -> PathBuf {
        let mut path = match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home),
            Err(_) => PathBuf::from("."),
        };
        path.push(".waverless");
        path.push("console.json");
        path
    }

    /// Get the current config location (for display purposes)
    pub fn current_location() -> String {
        if PathBuf::from(LOCAL_CONFIG).exists() {
            return format!("./{}", LOCAL_CONFIG);
        }

        let home_path = Self::home_config_path();
        if home_path.exists() {
            return home_path.to_string_lossy().to_string();
        }

        format!("./{} (not found)", LOCAL_CONFIG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"api_url": "https://console.example.com"}"#).unwrap();
        assert_eq!(config.portal_url, "https://wavespeed.ai");
        assert_eq!(config.endpoints_refresh_secs, 10);
        assert_eq!(config.detail_refresh_secs, 5);
        assert_eq!(config.stats_refresh_secs, 60);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "WAVERLESS_API_URL" => Some("https://other.example.com".to_string()),
            "WAVERLESS_API_KEY" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.api_url, "https://other.example.com");
        assert!(config.api_key.is_none());
    }
}
