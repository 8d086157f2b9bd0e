//! Build provider clients from configuration.

use crate::error::{ProviderError, ProviderResult};
use crate::gemini::GeminiVision;
use crate::ollama::OllamaVision;
use crate::openai::OpenAiVision;
use crate::traits::{TranscriptionProvider, VisionProvider};
use crate::whisper::WhisperClient;
use lectern_config::{TranscriptionProviderConfig, VisionKind, VisionProviderConfig};
use std::sync::Arc;
use std::time::Duration;

/// Read an API key from the named environment variable.
pub fn api_key_from_env(var: &str) -> ProviderResult<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ProviderError::MissingApiKey {
            var: var.to_string(),
        }),
    }
}

/// Build the transcription client.
pub fn transcription_from_config(
    config: &TranscriptionProviderConfig,
    timeout: Duration,
) -> ProviderResult<Arc<dyn TranscriptionProvider>> {
    let api_key = api_key_from_env(&config.api_key_env)?;
    let mut client = WhisperClient::new(&config.base_url, api_key, &config.model, timeout)?;
    if let Some(language) = &config.language {
        client = client.with_language(language);
    }
    Ok(Arc::new(client))
}

/// Build a vision client of the configured kind.
pub fn vision_from_config(
    config: &VisionProviderConfig,
    prompt: &str,
    timeout: Duration,
) -> ProviderResult<Arc<dyn VisionProvider>> {
    let api_key = config
        .api_key_env
        .as_deref()
        .map(api_key_from_env)
        .transpose()?;

    let provider: Arc<dyn VisionProvider> = match config.kind {
        VisionKind::Gemini => {
            let api_key = api_key.ok_or_else(|| {
                ProviderError::InvalidConfig("gemini requires api_key_env".to_string())
            })?;
            Arc::new(GeminiVision::new(
                &config.base_url,
                api_key,
                &config.model,
                prompt,
                timeout,
            )?)
        }
        VisionKind::OpenAi => Arc::new(OpenAiVision::new(
            &config.base_url,
            api_key,
            &config.model,
            prompt,
            timeout,
        )?),
        VisionKind::Ollama => Arc::new(OllamaVision::new(
            &config.base_url,
            &config.model,
            prompt,
            timeout,
        )?),
    };

    Ok(provider)
}
