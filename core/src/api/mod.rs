//! HTTP client for the counselling backend.

mod error;
pub mod mock;
mod transport;
pub mod wire;

pub use error::ApiError;
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError,
};
pub use wire::{
    AnonymousAuthResponse, ChatResponseFormatted, ChatResponseWire, EmotionData, HealthStatus,
    SessionSummary,
};

use crate::locale::Language;
use crate::security::{CredentialStore, CsrfGuard, ACCESS_TOKEN};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wire::{AnonymousAuthRequest, ChatRequest};

const CHAT_PATH: &str = "/api/v3/chat/multilingual";
const ANONYMOUS_AUTH_PATH: &str = "/api/v3/auth/anonymous";
const HEALTH_PATH: &str = "/health";
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    credentials: CredentialStore,
    csrf: CsrfGuard,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        credentials: CredentialStore,
        csrf: CsrfGuard,
        retry: RetryPolicy,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
            credentials,
            csrf,
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub async fn send_message(
        &self,
        content: &str,
        user_id: &str,
        session_id: Option<&str>,
        language: Language,
    ) -> Result<ChatResponseFormatted, ApiError> {
        let body = to_json(&ChatRequest {
            user_id,
            message: content,
            session_id,
            language,
        })?;
        let request = self
            .prepare(HttpRequest::post(self.url(CHAT_PATH), body))
            .with_header("Accept-Language", language.as_str());

        let body = self
            .execute_with_retry(request, self.retry.max_attempts)
            .await?;
        let parsed = ChatResponseWire::parse(&body)?;
        wire::normalize(parsed, session_id)
    }

    /// Single attempt: a failed anonymous login is handled by the caller.
    pub async fn anonymous_auth(
        &self,
        device_id: &str,
        language: Language,
    ) -> Result<AnonymousAuthResponse, ApiError> {
        let body = to_json(&AnonymousAuthRequest {
            device_id,
            language,
        })?;
        let request = self.prepare(HttpRequest::post(self.url(ANONYMOUS_AUTH_PATH), body));
        let body = self.execute_with_retry(request, 1).await?;
        decode(&body)
    }

    pub async fn session_summary(&self, session_id: &str) -> Result<SessionSummary, ApiError> {
        let path = format!("/api/v3/sessions/{session_id}/summary");
        let request = self.prepare(HttpRequest::get(self.url(&path)));
        let body = self
            .execute_with_retry(request, self.retry.max_attempts)
            .await?;
        decode(&body)
    }

    pub async fn check_health(&self) -> Result<HealthStatus, ApiError> {
        let request = HttpRequest::get(self.url(HEALTH_PATH));
        let body = self.execute_with_retry(request, 1).await?;
        decode(&body)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        if let Some(token) = self.credentials.get_token(ACCESS_TOKEN) {
            request = request.with_header("Authorization", format!("Bearer {token}"));
        }
        request.with_header(CsrfGuard::HEADER, self.csrf.token())
    }

    /// Runs `request` up to `max_attempts` times and returns the body of the
    /// first 2xx response.
    pub async fn execute_with_retry(
        &self,
        request: HttpRequest,
        max_attempts: u32,
    ) -> Result<String, ApiError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let last_attempt = attempt + 1 >= max_attempts;
            let delay = match self.transport.execute(request.clone()).await {
                Ok(response) if response.is_success() => return Ok(response.body),
                Ok(response) => {
                    let status = response.status;
                    let retryable = is_retryable_status(status);
                    if !retryable || last_attempt {
                        return Err(ApiError::Http {
                            status,
                            message: error_message(status, &response.body),
                            retryable,
                        });
                    }
                    let backoff = self.retry.delay_for(attempt);
                    if status == 429 {
                        retry_after(&response).unwrap_or(backoff)
                    } else {
                        backoff
                    }
                }
                Err(err) => {
                    if last_attempt {
                        warn!(url = %request.url, %err, "request failed after retries");
                        return Err(ApiError::Network(err.0));
                    }
                    self.retry.delay_for(attempt)
                }
            };

            debug!(url = %request.url, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("Retry-After")?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "detail"].iter().find_map(|field| {
                value
                    .get(field)
                    .and_then(|field| field.as_str())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| format!("HTTP Error: {status}"))
}

fn to_json<T: serde::Serialize>(body: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|err| ApiError::MalformedResponse(err.to_string()))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|err| ApiError::MalformedResponse(err.to_string()))
}
