use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArticleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Missing dependency: {dependency} ({hint})")]
    DependencyMissing { dependency: String, hint: String },

    #[error("Corrupted cache file {path}: {reason}")]
    CacheCorrupted { path: PathBuf, reason: String },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, ArticleError>;
