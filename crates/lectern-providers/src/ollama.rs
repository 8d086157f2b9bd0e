//! Ollama vision client for local multimodal models.

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_status, trim_base};
use crate::traits::VisionProvider;
use crate::types::{OllamaGenerateRequest, OllamaGenerateResponse};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Client for `POST {host}/api/generate` with `images`.
#[derive(Clone)]
pub struct OllamaVision {
    client: Client,
    host: String,
    model: String,
    prompt: String,
    timeout: Duration,
}

impl OllamaVision {
    pub fn new(
        host: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            host: trim_base(&host.into()),
            model: model.into(),
            prompt: prompt.into(),
            timeout,
        })
    }
}

#[async_trait]
impl VisionProvider for OllamaVision {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn caption(&self, image: &[u8], _mime: &str) -> ProviderResult<String> {
        let url = format!("{}/api/generate", self.host);
        debug!("Captioning {} bytes with {}", image.len(), self.model);

        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            images: vec![STANDARD.encode(image)],
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::ServerNotRunning {
                        host: self.host.clone(),
                    }
                } else if e.is_timeout() {
                    ProviderError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let response = check_status(response).await?;
        let body: OllamaGenerateResponse = response.json().await?;
        let text = body.response.trim().to_string();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.name().to_string(),
            });
        }
        Ok(text)
    }
}
