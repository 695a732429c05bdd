use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ArticleError, Result};
use crate::generate::GenerationOptions;

fn default_model() -> String {
    "gpt-5.2".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("articles")
}

fn default_open_browser() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote model name, or a local model path when the remote provider does not serve it
    #[serde(default = "default_model")]
    pub model: String,
    /// Root directory for per-video working directories
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Regenerate cached step results
    #[serde(default)]
    pub overwrite: bool,
    /// Skip the critical review step
    #[serde(default)]
    pub skip_review: bool,
    /// Open the rendered HTML once written
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    /// Default generation options bound at backend construction
    #[serde(default)]
    pub generation: GenerationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of an OpenAI-compatible API (OPENAI_BASE_URL overrides it)
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Path to the local inference runtime (llama.cpp CLI)
    pub binary_path: String,
    /// Context size passed to the runtime, if set
    pub context_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Path to the yt-dlp binary
    pub binary_path: String,
    /// Subtitle languages to request
    pub subtitle_langs: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 600,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            binary_path: "llama-cli".to_string(),
            context_size: None,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            binary_path: "yt-dlp".to_string(),
            subtitle_langs: vec!["en".to_string()],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            output_dir: default_output_dir(),
            overwrite: false,
            skip_review: false,
            open_browser: default_open_browser(),
            remote: RemoteConfig::default(),
            local: LocalConfig::default(),
            download: DownloadConfig::default(),
            generation: GenerationOptions::default(),
        }
    }
}

impl RemoteConfig {
    /// Base URL with the OPENAI_BASE_URL environment override applied
    pub fn effective_base_url(&self) -> String {
        std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.base_url.clone())
            .trim_end_matches('/')
            .to_string()
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ArticleError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ArticleError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ArticleError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ArticleError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
