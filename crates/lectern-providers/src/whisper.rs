//! OpenAI-compatible Whisper transcription client.

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_status, send_error, trim_base};
use crate::traits::TranscriptionProvider;
use crate::types::TranscriptionResponse;
use async_trait::async_trait;
use reqwest::{multipart, Client};
use std::time::Duration;
use tracing::{debug, info};

/// Client for `POST {base_url}/audio/transcriptions`.
#[derive(Clone)]
pub struct WhisperClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    language: Option<String>,
    timeout: Duration,
}

impl WhisperClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base(&base_url.into()),
            api_key: api_key.into(),
            model: model.into(),
            language: None,
            timeout,
        })
    }

    /// Hint the spoken language (ISO-639-1).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperClient {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> ProviderResult<String> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let mime = mime_guess::from_path(file_name)
            .first_raw()
            .unwrap_or("application/octet-stream");

        debug!(
            "Transcribing {} ({} bytes) with model {}",
            file_name,
            audio.len(),
            self.model
        );

        let file_part = multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| ProviderError::InvalidConfig(format!("mime {}: {}", mime, e)))?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("temperature", "0")
            .part("file", file_part);
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| send_error(e, &self.base_url, self.timeout))?;

        let response = check_status(response).await?;
        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let text = body.text.trim().to_string();
        info!("Transcribed {} into {} chars", file_name, text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_transcribe() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": " Welcome to the lecture. "})))
            .expect(1)
            .mount(&server)
            .await;

        let client = WhisperClient::new(server.uri(), "test-key", "whisper-1", Duration::from_secs(5))
            .unwrap()
            .with_language("en");
        let text = client
            .transcribe(b"ID3fake".to_vec(), "lecture.mp3")
            .await
            .unwrap();

        assert_eq!(text, "Welcome to the lecture.");
    }

    #[tokio::test]
    async fn test_quota_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client =
            WhisperClient::new(server.uri(), "k", "whisper-1", Duration::from_secs(5)).unwrap();
        let err = client
            .transcribe(vec![0u8; 16], "chunk_0.mp3")
            .await
            .unwrap_err();

        match err {
            ProviderError::ApiError { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"text": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client =
            WhisperClient::new(server.uri(), "k", "whisper-1", Duration::from_millis(200)).unwrap();
        let err = client.transcribe(vec![1, 2, 3], "a.mp3").await.unwrap_err();
        assert!(err.is_timeout());
    }
}
