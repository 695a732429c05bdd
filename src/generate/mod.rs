// Text generation backends
//
// Two interchangeable implementations sit behind the `Generator` trait:
// - Remote: an OpenAI-compatible chat completion API
// - Local: a model file run by a local inference runtime
//
// `BackendSelector` picks one per run by asking the remote provider whether
// it serves the requested model.

pub mod common;
pub mod local;
pub mod openai;
pub mod selector;

use async_trait::async_trait;

pub use common::*;
pub use local::LocalBackend;
pub use openai::{ChatProvider, ChatRequest, OpenAiClient, RemoteBackend};
pub use selector::{BackendSelector, ModelCatalog};

use crate::error::Result;

/// Main trait for text generation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete a single-turn conversation.
    ///
    /// `overrides` are layered over the options the backend was built with.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        overrides: &GenerationOptions,
    ) -> Result<String>;
}

/// Backend chosen once at construction
pub enum Backend {
    Remote(RemoteBackend),
    Local(LocalBackend),
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Remote(_) => "remote",
            Self::Local(_) => "local",
        }
    }
}

#[async_trait]
impl Generator for Backend {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        overrides: &GenerationOptions,
    ) -> Result<String> {
        match self {
            Self::Remote(backend) => backend.generate(messages, overrides).await,
            Self::Local(backend) => backend.generate(messages, overrides).await,
        }
    }
}
