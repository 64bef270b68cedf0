//! Generation service client for the simulation pipeline.
//!
//! # Architecture
//!
//! - [`GenerationService`] - the seam the pipeline calls through: one prompt in,
//!   one JSON response envelope out
//! - [`gemini`] - Google Gemini `generateContent` implementation over `reqwest`
//! - [`AnswerPath`] - the known location of the answer text inside an envelope
//!
//! # Error Handling
//!
//! Every failure is reported as a [`GenerationError`], which maps onto the
//! pipeline's [`FailureReason`] taxonomy via [`GenerationError::reason`].
//! Nothing here retries: one call to [`GenerationService::generate`] is one
//! outbound request.

mod envelope;
pub mod gemini;

pub use envelope::{AnswerPath, InvalidAnswerPath};
pub use gemini::{GeminiClient, GeminiClientError, GeminiSettings};
pub use thoughtcomm_types;

use std::future::Future;
use std::time::Duration;
use thoughtcomm_types::FailureReason;

const CONNECT_TIMEOUT_SECS: u64 = 10;

// Note: reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Failure of a single generation call.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service returned status {status}")]
    Status { status: u16 },
    #[error("response body is not a JSON envelope: {0}")]
    MalformedEnvelope(String),
}

impl GenerationError {
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Timeout | Self::Transport(_) => FailureReason::NetworkError,
            Self::Status { status } => FailureReason::ServiceError(*status),
            Self::MalformedEnvelope(_) => FailureReason::MalformedEnvelope,
        }
    }

    fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// An external text-generation service.
///
/// Implementations send exactly one request per call and return the decoded
/// response envelope untouched; locating the answer inside it is the caller's job.
pub trait GenerationService: Send + Sync + 'static {
    fn generate(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<serde_json::Value, GenerationError>> + Send;
}

/// Hardened client builder shared by service implementations.
///
/// Plain-HTTP endpoints are refused unless `allow_http` is set (loopback test servers).
pub fn client_builder(timeout: Duration, allow_http: bool) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .https_only(!allow_http)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::{FailureReason, GenerationError};

    #[test]
    fn errors_map_onto_failure_reasons() {
        assert_eq!(GenerationError::Timeout.reason(), FailureReason::NetworkError);
        assert_eq!(
            GenerationError::Transport("connection refused".to_string()).reason(),
            FailureReason::NetworkError
        );
        assert_eq!(
            GenerationError::Status { status: 429 }.reason(),
            FailureReason::ServiceError(429)
        );
        assert_eq!(
            GenerationError::MalformedEnvelope("eof".to_string()).reason(),
            FailureReason::MalformedEnvelope
        );
    }
}
