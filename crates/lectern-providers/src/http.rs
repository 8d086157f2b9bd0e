//! Shared HTTP plumbing for the provider clients.

use crate::error::{ProviderError, ProviderResult};
use reqwest::{Client, Response};
use std::time::Duration;

pub(crate) fn build_client(timeout: Duration) -> ProviderResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ProviderError::Http)
}

/// Map a send failure onto the provider error taxonomy.
pub(crate) fn send_error(e: reqwest::Error, host: &str, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            seconds: timeout.as_secs(),
        }
    } else if e.is_connect() {
        ProviderError::Connection(format!("{}: {}", host, e))
    } else {
        ProviderError::Http(e)
    }
}

/// Turn a non-success status into `ApiError`.
pub(crate) async fn check_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::ApiError {
        status: status.as_u16(),
        message,
    })
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
