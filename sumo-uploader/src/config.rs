//! Configuration management for the uploader.
//!
//! Loads configuration from TOML file with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environments known to the Sumo deployment.
pub const KNOWN_ENVS: &[&str] = &["preview", "dev", "test", "prod", "localhost"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sumo: SumoConfig,
    #[serde(default)]
    pub case: CaseConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SumoConfig {
    /// Sumo environment (prod, dev, ...)
    #[serde(default = "default_env")]
    pub env: String,

    /// Explicit API base URL, overrides the one derived from `env`
    #[serde(default)]
    pub url: Option<String>,

    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Timeout for a single request in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConfig {
    /// Case-relative path to the case metadata
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    /// Path to the global variables (fmu config) file
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Path to the realization parameters file
    #[serde(default = "default_parameters_path")]
    pub parameters_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Number of concurrent upload workers, 4 when unset
    #[serde(default)]
    pub threads: Option<usize>,

    /// copy keeps local files, move deletes them after upload
    #[serde(default)]
    pub mode: SumoMode,

    /// Extra attempts for failed (not rejected) uploads
    #[serde(default)]
    pub retries: u32,

    /// Seconds to wait after registering a case so it becomes searchable
    #[serde(default = "default_register_settle_secs")]
    pub register_settle_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// What happens to local files after a successful upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SumoMode {
    #[default]
    Copy,
    Move,
}

impl fmt::Display for SumoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SumoMode::Copy => write!(f, "copy"),
            SumoMode::Move => write!(f, "move"),
        }
    }
}

// Default values
fn default_env() -> String {
    "prod".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("share/metadata/fmu_case.yml")
}

fn default_config_path() -> PathBuf {
    PathBuf::from("fmuconfig/output/global_variables.yml")
}

fn default_parameters_path() -> PathBuf {
    PathBuf::from("parameters.txt")
}

fn default_register_settle_secs() -> u64 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SumoConfig {
    fn default() -> Self {
        Self {
            env: default_env(),
            url: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            metadata_path: default_metadata_path(),
            config_path: default_config_path(),
            parameters_path: default_parameters_path(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            threads: None,
            mode: SumoMode::Copy,
            retries: 0,
            register_settle_secs: default_register_settle_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SumoConfig {
    /// API base URL: the explicit `url`, otherwise derived from `env`.
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.trim_end_matches('/').to_string();
        }
        match self.env.as_str() {
            "localhost" => "http://localhost:8084/api/v1".to_string(),
            env => format!("https://main-sumo-{}.radix.equinor.com/api/v1", env),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_known_env(&self) -> bool {
        KNOWN_ENVS.contains(&self.env.as_str())
    }
}

impl UploadConfig {
    pub const DEFAULT_THREADS: usize = 4;

    pub fn threads(&self) -> usize {
        self.threads.unwrap_or(Self::DEFAULT_THREADS)
    }

    pub fn register_settle(&self) -> Duration {
        Duration::from_secs(self.register_settle_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Create a default configuration
    pub fn default() -> Self {
        let mut config = Config {
            sumo: SumoConfig::default(),
            case: CaseConfig::default(),
            upload: UploadConfig::default(),
            log: LogConfig::default(),
        };
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("SUMO_TOKEN") {
            if !token.is_empty() {
                self.sumo.token = Some(token);
            }
        }
    }
}
