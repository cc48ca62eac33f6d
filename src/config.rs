use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key; falls back to the `api_key_env` environment variable
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: String,

    /// Model to request completions from
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Optional cap on response length
    pub max_tokens: Option<u32>,

    /// Whole-request timeout, in seconds
    pub request_timeout_secs: u64,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo-0613".to_string(),
            temperature: 0.0,
            max_tokens: None,
            request_timeout_secs: 120,
            log_level: None,
        }
    }
}

impl Config {
    /// Application home, `~/.portablemind`
    pub fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".portablemind"))
    }

    /// Load configuration from the default location, writing defaults on first run
    pub fn load() -> Result<Self> {
        let home = Self::home_dir()?;
        fs::create_dir_all(&home).context("Failed to create .portablemind directory")?;

        let config_path = home.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Check if API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Get API key from config or environment; blank values count as missing
    pub fn api_key(&self) -> Option<String> {
        non_blank(self.api_key.clone()).or_else(|| non_blank(std::env::var(&self.api_key_env).ok()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
