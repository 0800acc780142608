use anyhow::{Context, Result};
use async_trait::async_trait;
use coach_storage::models::{AiConfig, AiProvider};

use crate::providers::{ollama::OllamaProvider, openai::OpenAiProvider};

/// Trait for AI providers
#[async_trait]
pub trait AiProviderTrait: Send + Sync {
    /// Generate a text response for a system instruction and a user prompt
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Check if the provider is available
    async fn is_available(&self) -> bool {
        true
    }
}

/// Create a provider instance based on configuration
///
/// # Errors
///
/// Returns an error if the API key is missing for providers that require one
pub fn create_provider(config: &AiConfig) -> Result<Box<dyn AiProviderTrait>> {
    let model = config.effective_model();
    let base_url = config.effective_base_url();

    match config.provider {
        AiProvider::OpenAi => {
            let api_key = config
                .effective_api_key()
                .context("API Key required for OpenAI")?;
            Ok(Box::new(OpenAiProvider::new(&api_key, model, Some(base_url))))
        }
        AiProvider::Ollama => Ok(Box::new(OllamaProvider::new(Some(base_url), model))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_provider_uses_default_model() {
        let provider = create_provider(&AiConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "llama3.2");
    }

    #[test]
    fn test_create_openai_provider_with_explicit_key() {
        let config = AiConfig {
            provider: AiProvider::OpenAi,
            model: Some("gpt-4o".to_string()),
            api_key: Some("sk-test".to_string()),
            ..AiConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o");
    }
}
