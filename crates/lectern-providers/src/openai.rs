//! OpenAI-compatible chat completions vision client.

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_status, send_error, trim_base};
use crate::traits::VisionProvider;
use crate::types::{ChatContent, ChatMessage, ChatRequest, ChatResponse, ImageUrl};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const MAX_TOKENS: u32 = 300;

/// Client for `POST {base_url}/chat/completions` with an image part.
///
/// Works with OpenAI and with Groq or other compatible hosts.
#[derive(Clone)]
pub struct OpenAiVision {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    prompt: String,
    timeout: Duration,
}

impl OpenAiVision {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base(&base_url.into()),
            api_key,
            model: model.into(),
            prompt: prompt.into(),
            timeout,
        })
    }
}

#[async_trait]
impl VisionProvider for OpenAiVision {
    fn name(&self) -> &str {
        "openai"
    }

    async fn caption(&self, image: &[u8], mime: &str) -> ProviderResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Captioning {} bytes with {}", image.len(), self.model);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ChatContent::Text {
                        text: self.prompt.clone(),
                    },
                    ChatContent::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{}", mime, STANDARD.encode(image)),
                        },
                    },
                ],
            }],
            max_tokens: MAX_TOKENS,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| send_error(e, &self.base_url, self.timeout))?;

        let response = check_status(response).await?;
        let body: ChatResponse = response.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.name().to_string(),
            });
        }
        Ok(text)
    }
}
