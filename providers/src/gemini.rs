//! Google Gemini `generateContent` client.
//!
//! Sends one non-streaming request per call:
//! `POST {base}/models/{model}:generateContent` with the prompt as a single
//! user text part. The key travels in the `x-goog-api-key` header, never in the URL.

use crate::{GenerationError, GenerationService, client_builder, read_capped_error_body};
use serde_json::{Value, json};
use std::time::Duration;
use thoughtcomm_types::ApiKey;
use url::Url;

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: Url,
    pub model: String,
    pub api_key: ApiKey,
    pub timeout: Duration,
    pub allow_http: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GeminiClientError {
    #[error("invalid endpoint for model {model:?}: {source}")]
    Endpoint {
        model: String,
        source: url::ParseError,
    },
    #[error("plain http endpoint {0} requires allow_http")]
    InsecureEndpoint(Url),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    url: Url,
    api_key: ApiKey,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, GeminiClientError> {
        if settings.base_url.scheme() != "https" && !settings.allow_http {
            return Err(GeminiClientError::InsecureEndpoint(settings.base_url));
        }
        let url = generate_content_url(&settings.base_url, &settings.model)?;
        let client = client_builder(settings.timeout, settings.allow_http).build()?;
        Ok(Self {
            client,
            url,
            api_key: settings.api_key,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn generate_content_url(base: &Url, model: &str) -> Result<Url, GeminiClientError> {
    let base = base.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/models/{model}:generateContent")).map_err(|source| {
        GeminiClientError::Endpoint {
            model: model.to_string(),
            source,
        }
    })
}

/// Build the request body for a single-prompt `generateContent` call.
fn build_request_body(prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }]
        }]
    })
}

impl GenerationService for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Value, GenerationError> {
        let body = build_request_body(prompt);

        let response = self
            .client
            .post(self.url.clone())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = read_capped_error_body(response).await;
            tracing::warn!(%status, body = %error_text, "Gemini request failed");
            return Err(GenerationError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::from_reqwest(&e))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(%e, payload_bytes = bytes.len(), "Gemini response is not JSON");
            GenerationError::MalformedEnvelope(e.to_string())
        })
    }
}
