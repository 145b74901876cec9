//! HTTP utilities for ARM REST calls

use crate::error::ProviderError;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body and strip control characters before logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// HTTP client wrapper for ARM calls. `Ok(None)` means the resource is gone.
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!("azrefresh/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transient(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub async fn get(&self, url: &str, token: &str) -> Result<Option<Value>, ProviderError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("request failed: {}", e)))?;

        Self::read(response).await
    }

    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<Option<Value>, ProviderError> {
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        } else {
            request = request.header(reqwest::header::CONTENT_LENGTH, 0);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("request failed: {}", e)))?;

        Self::read(response).await
    }

    async fn read(response: Response) -> Result<Option<Value>, ProviderError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("failed to read response body: {}", e)))?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("Resource not found");
            return Ok(None);
        }

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            let message = status.canonical_reason().unwrap_or("error").to_string();
            return Err(if is_transient(status) {
                ProviderError::Transient(format!("{} {}", status.as_u16(), message))
            } else {
                ProviderError::Status {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        if body.trim().is_empty() {
            return Ok(Some(Value::Null));
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
