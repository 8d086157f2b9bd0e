//! Google Gemini vision client.

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_status, send_error, trim_base};
use crate::traits::VisionProvider;
use crate::types::{GeminiContent, GeminiInlineData, GeminiPart, GeminiRequest, GeminiResponse};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Client for `POST {base_url}/v1beta/models/{model}:generateContent`.
#[derive(Clone)]
pub struct GeminiVision {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    prompt: String,
    timeout: Duration,
}

impl GeminiVision {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base(&base_url.into()),
            api_key: api_key.into(),
            model: model.into(),
            prompt: prompt.into(),
            timeout,
        })
    }
}

#[async_trait]
impl VisionProvider for GeminiVision {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn caption(&self, image: &[u8], mime: &str) -> ProviderResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!("Captioning {} bytes with {}", image.len(), self.model);

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart {
                        text: Some(self.prompt.clone()),
                        inline_data: None,
                    },
                    GeminiPart {
                        text: None,
                        inline_data: Some(GeminiInlineData {
                            mime_type: mime.to_string(),
                            data: STANDARD.encode(image),
                        }),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(e, &self.base_url, self.timeout))?;

        let response = check_status(response).await?;
        let body: GeminiResponse = response.json().await?;
        let text = body.text().trim().to_string();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.name().to_string(),
            });
        }
        Ok(text)
    }
}
