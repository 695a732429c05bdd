use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::config::LocalConfig;
use crate::error::Result;
use super::{Backend, ChatProvider, GenerationOptions, LocalBackend, RemoteBackend};

/// Lazily fetched set of model ids served by the remote provider.
///
/// Filled on first use and kept until `reset`; a failed fetch leaves it empty
/// so the next call asks again.
#[derive(Debug, Default)]
pub struct ModelCatalog {
    models: Mutex<Option<Arc<HashSet<String>>>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn models(&self, provider: &dyn ChatProvider) -> Result<Arc<HashSet<String>>> {
        if let Some(models) = self.cached() {
            return Ok(models);
        }

        let models = Arc::new(provider.list_models().await?);
        debug!("Remote provider serves {} models", models.len());

        let mut slot = self.models.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slot.get_or_insert(models).clone())
    }

    pub async fn contains(&self, provider: &dyn ChatProvider, model: &str) -> Result<bool> {
        Ok(self.models(provider).await?.contains(model))
    }

    /// Forget the fetched set so the next lookup refreshes it
    pub fn reset(&self) {
        *self.models.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.cached().is_some()
    }

    fn cached(&self) -> Option<Arc<HashSet<String>>> {
        self.models.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Chooses a backend for a model identifier
pub struct BackendSelector {
    provider: Arc<dyn ChatProvider>,
    catalog: ModelCatalog,
    local: LocalConfig,
}

impl BackendSelector {
    pub fn new(provider: Arc<dyn ChatProvider>, local: LocalConfig) -> Self {
        Self {
            provider,
            catalog: ModelCatalog::new(),
            local,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Remote backend if the provider serves `model`, otherwise a local
    /// backend treating `model` as a model path.
    pub async fn select(&self, model: &str, options: GenerationOptions) -> Result<Backend> {
        info!("Getting generator for {}", model);

        if self.catalog.contains(self.provider.as_ref(), model).await? {
            info!("Using remote model {}", model);
            return Ok(Backend::Remote(RemoteBackend::new(
                model,
                options,
                Arc::clone(&self.provider),
            )));
        }

        info!("{} is not a remote model, trying local inference", model);
        let backend = LocalBackend::load(&self.local, model, options).await?;
        Ok(Backend::Local(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArticleError;
    use crate::generate::openai::MockChatProvider;

    fn provider_serving(models: &'static [&'static str], times: usize) -> MockChatProvider {
        let mut provider = MockChatProvider::new();
        provider
            .expect_list_models()
            .times(times)
            .returning(move || Ok(models.iter().map(|m| m.to_string()).collect()));
        provider
    }

    fn missing_runtime() -> LocalConfig {
        LocalConfig {
            binary_path: "v2a-missing-llama-cli-7e0b".to_string(),
            context_size: None,
        }
    }

    #[tokio::test]
    async fn test_served_model_selects_remote() {
        let provider = provider_serving(&["gpt-5.2", "gpt-4o"], 1);
        let selector = BackendSelector::new(Arc::new(provider), missing_runtime());

        let backend = selector
            .select("gpt-5.2", GenerationOptions::default())
            .await
            .unwrap();
        assert!(matches!(backend, Backend::Remote(ref remote) if remote.model() == "gpt-5.2"));
        assert_eq!(backend.kind(), "remote");
    }

    #[tokio::test]
    async fn test_unknown_model_falls_back_to_local() {
        let provider = provider_serving(&["gpt-5.2"], 1);
        let selector = BackendSelector::new(Arc::new(provider), missing_runtime());

        let result = selector
            .select("./models/qwen3-8b.gguf", GenerationOptions::default())
            .await;
        assert!(matches!(result, Err(ArticleError::DependencyMissing { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unserved_model_selects_local() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = crate::generate::local::fake_runtime::install(dir.path());
        let model = dir.path().join("qwen3-8b.gguf");
        std::fs::write(&model, b"weights").unwrap();

        let provider = provider_serving(&["gpt-5.2"], 1);
        let local = LocalConfig {
            binary_path: runtime.to_string_lossy().to_string(),
            context_size: None,
        };
        let selector = BackendSelector::new(Arc::new(provider), local);

        let backend = selector
            .select(&model.to_string_lossy(), GenerationOptions::default())
            .await
            .unwrap();
        assert!(matches!(backend, Backend::Local(ref local) if local.model_path() == model));
        assert_eq!(backend.kind(), "local");
    }

    #[tokio::test]
    async fn test_catalog_fetched_once_until_reset() {
        let provider = provider_serving(&["gpt-5.2"], 2);
        let catalog = ModelCatalog::new();

        assert!(!catalog.is_loaded());
        assert!(catalog.contains(&provider, "gpt-5.2").await.unwrap());
        assert!(!catalog.contains(&provider, "gpt-3").await.unwrap());
        assert!(catalog.is_loaded());

        catalog.reset();
        assert!(!catalog.is_loaded());
        assert!(catalog.contains(&provider, "gpt-5.2").await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_list_models()
            .times(1)
            .returning(|| Err(ArticleError::Generation("503 Service Unavailable".to_string())));
        let selector = BackendSelector::new(Arc::new(provider), missing_runtime());

        let result = selector.select("gpt-5.2", GenerationOptions::default()).await;
        assert!(matches!(result, Err(ArticleError::Generation(_))));
        assert!(!selector.catalog().is_loaded());
    }
}
