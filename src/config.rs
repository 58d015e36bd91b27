use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Conventional variables understood by other Octopus tooling
const ENV_SERVER_URL: &str = "OCTOPUS_URL";
const ENV_API_KEY: &str = "OCTOPUS_APIKEY";
const ENV_SPACE: &str = "OCTOPUS_SPACE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub offline: OfflineConfig,
}

/// Octopus server connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base address, e.g. https://octopus.example.com
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub api_key: String,
    /// Space to scope requests to; the default space when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
}

/// HTTP client behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retries for failed reads (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    10_000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to a file instead of stderr
    #[serde(default)]
    pub to_file: bool,

    /// Directory for log files (default: the platform data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
            dir: None,
        }
    }
}

/// Local stand-in server used with `--offline`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// JSON file the offline server is kept in between runs (default: the platform data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// Project ids to provide, each with an empty deployment process
    #[serde(default)]
    pub projects: Vec<String>,
}

impl Config {
    /// Path to the user config file, if a config dir exists on this platform
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("octoform").join("config.toml"))
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so the CLI works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // User config in ~/.config/octoform/
        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with OCTOFORM__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("OCTOFORM")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        let mut config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply OCTOPUS_URL, OCTOPUS_APIKEY and OCTOPUS_SPACE when set
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(address) = lookup(ENV_SERVER_URL) {
            self.server.address = address;
        }
        if let Some(api_key) = lookup(ENV_API_KEY) {
            self.server.api_key = api_key;
        }
        if let Some(space) = lookup(ENV_SPACE) {
            self.server.space_id = Some(space);
        }
    }

    /// Get absolute path to the logs directory
    pub fn logs_path(&self) -> PathBuf {
        match &self.logging.dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .map(|dir| dir.join("octoform").join("logs"))
                .unwrap_or_else(|| PathBuf::from(".octoform").join("logs")),
        }
    }

    /// Get absolute path to the offline server's store file
    pub fn offline_store_path(&self) -> PathBuf {
        match &self.offline.store {
            Some(path) => PathBuf::from(path),
            None => dirs::data_local_dir()
                .map(|dir| dir.join("octoform").join("offline.json"))
                .unwrap_or_else(|| PathBuf::from(".octoform").join("offline.json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.to_file);
        assert!(config.server.space_id.is_none());
        assert!(config.offline.projects.is_empty());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
address = "https://octopus.example.com"
api_key = "API-TESTKEY"
space_id = "Spaces-2"

[http]
max_retries = 1

[offline]
projects = ["Projects-1", "Projects-2"]
"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.server.space_id.as_deref(), Some("Spaces-2"));
        assert_eq!(config.http.max_retries, 1);
        assert_eq!(config.offline.projects, ["Projects-1", "Projects-2"]);
        // Untouched settings keep their defaults
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Config::load(Some(&path.to_string_lossy())).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OCTOPUS_URL", "https://deploy.example.com"),
            ("OCTOPUS_APIKEY", "API-FROMENV"),
            ("OCTOPUS_SPACE", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.server.space_id = Some("Spaces-1".to_string());
        config.apply_env_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.server.address, "https://deploy.example.com");
        assert_eq!(config.server.api_key, "API-FROMENV");
        // Blank values are ignored
        assert_eq!(config.server.space_id.as_deref(), Some("Spaces-1"));
    }

    #[test]
    fn test_logs_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.logging.dir = Some(temp_dir.path().to_string_lossy().to_string());
        assert_eq!(config.logs_path(), temp_dir.path());

        config.logging.dir = None;
        assert!(config.logs_path().ends_with("logs"));
    }

    #[test]
    fn test_offline_store_path() {
        let mut config = Config::default();
        assert!(config.offline_store_path().ends_with("offline.json"));

        config.offline.store = Some("/tmp/octoform-offline.json".to_string());
        assert_eq!(
            config.offline_store_path(),
            PathBuf::from("/tmp/octoform-offline.json")
        );
    }
}
