// OpenAI-compatible chat completion backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RemoteConfig;
use crate::error::{ArticleError, Result};
use super::{ChatMessage, GenerationOptions, Generator};

/// Body of a chat completion request; options are flattened into the top level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub options: GenerationOptions,
}

/// Remote model provider operations the backend and selector rely on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Identifiers of every model the provider serves
    async fn list_models(&self) -> Result<HashSet<String>>;

    /// Run one completion and return the first choice's content
    async fn chat_completion(&self, request: &ChatRequest) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible API
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ArticleError::Config(format!(
                    "{} environment variable is not set",
                    config.api_key_env
                ))
            })?;

        Self::new(config.effective_base_url(), api_key, config.timeout_secs)
    }

    pub fn new<S1: Into<String>, S2: Into<String>>(
        base_url: S1,
        api_key: S2,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("v2a/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("{}: {}", status, body.trim())
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn list_models(&self) -> Result<HashSet<String>> {
        let url = format!("{}/models", self.base_url);
        debug!("Listing models from {}", url);

        let response = self.client.get(&url).bearer_auth(&self.api_key).send().await?;

        if !response.status().is_success() {
            return Err(ArticleError::Generation(format!(
                "Listing models failed {}",
                Self::error_body(response).await
            )));
        }

        let models: ModelList = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            "Sending {} message(s) to {} for model {}",
            request.messages.len(),
            url,
            request.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ArticleError::Generation(format!(
                "Chat completion failed {}",
                Self::error_body(response).await
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| {
                ArticleError::Generation(format!("Malformed completion response: {}", e))
            })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ArticleError::Generation("Completion contained no message content".to_string())
            })
    }
}

/// Backend served by the remote provider
pub struct RemoteBackend {
    model: String,
    defaults: GenerationOptions,
    provider: Arc<dyn ChatProvider>,
}

impl RemoteBackend {
    pub fn new<S: Into<String>>(
        model: S,
        defaults: GenerationOptions,
        provider: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            model: model.into(),
            defaults,
            provider,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for RemoteBackend {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        overrides: &GenerationOptions,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            options: self.defaults.merged_with(overrides),
        };

        let content = self.provider.chat_completion(&request).await?;
        info!("Received {} characters from {}", content.len(), self.model);
        Ok(content)
    }
}
