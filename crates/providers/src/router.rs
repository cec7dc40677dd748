//! Provider selection — builds the configured chat-completion backend.

use std::sync::Arc;
use std::time::Duration;

use crabot_config::AppConfig;
use crabot_core::provider::Provider;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the default provider from configuration.
///
/// Per-provider settings under `[providers.<name>]` override the top-level
/// API key and the well-known base URL. A missing key still yields a
/// provider; callers check [`Provider::has_credential`] before any request.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    debug!(provider = name, base_url = %base_url, "Building provider");

    let provider = if name == "ollama" && api_key.is_empty() {
        OpenAiCompatProvider::ollama(Some(&base_url))
    } else {
        OpenAiCompatProvider::new(name, &base_url, &api_key)
    };

    Arc::new(provider.with_timeout(Duration::from_secs(config.request_timeout_secs)))
}

/// Model to use with the default provider, honoring a per-provider override.
pub fn model_for(config: &AppConfig) -> String {
    config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone())
}

/// Resolve the model used for report synthesis: `report.model`, else the chat model.
pub fn report_model_for(config: &AppConfig) -> String {
    config
        .report
        .model
        .clone()
        .unwrap_or_else(|| model_for(config))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
