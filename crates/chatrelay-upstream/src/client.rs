// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the upstream chat endpoint.
//!
//! Provides [`UpstreamClient`] which handles payload construction, bearer
//! authentication, reply parsing, and bounded retry of transient failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use chatrelay_config::model::UpstreamConfig;
use chatrelay_core::{ChatRequest, RelayError, UpstreamError};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use crate::backoff::{self, RetryPolicy};
use crate::types::{self, ChatPayload};

/// Error detail returned by sends issued after [`UpstreamClient::close`].
pub const SHUT_DOWN: &str = "client is shut down";

/// HTTP client for upstream chat communication.
///
/// Owns a pooled `reqwest::Client` for its whole lifetime. The pool is
/// released by [`close`](Self::close); later sends fail fast.
pub struct UpstreamClient {
    pool: ArcSwapOption<reqwest::Client>,
    url: String,
    policy: RetryPolicy,
}

/// Outcome of a single HTTP attempt.
enum Attempt {
    Reply(String),
    Retryable {
        error: UpstreamError,
        retry_after: Option<Duration>,
    },
    Terminal(UpstreamError),
}

impl UpstreamClient {
    /// Creates a client from the `[upstream]` config section.
    ///
    /// Fails when no API token is configured or it is not a valid header value.
    pub fn new(config: &UpstreamConfig) -> Result<Self, RelayError> {
        let token = config
            .api_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                RelayError::Config(
                    "upstream.api_token is not set (use CHATRELAY_UPSTREAM_API_TOKEN)".into(),
                )
            })?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| RelayError::Config(format!("invalid API token header value: {e}")))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {e}")))?;

        let policy = RetryPolicy::from_config(config);
        info!(
            url = %config.url,
            max_attempts = policy.max_attempts,
            request_timeout_secs = config.request_timeout_secs,
            "upstream client initialized"
        );

        Ok(Self {
            pool: ArcSwapOption::from_pointee(client),
            url: config.url.clone(),
            policy,
        })
    }

    /// Whether the connection pool is still open.
    pub fn is_open(&self) -> bool {
        self.pool.load().is_some()
    }

    /// Releases the connection pool. Idle connections close once in-flight
    /// sends holding a handle finish.
    pub fn close(&self) {
        if self.pool.swap(None).is_some() {
            info!("upstream client shut down");
        }
    }

    /// Sends a composed request and returns the reply text.
    ///
    /// Transient failures (429, 500, 502, 503, 504, connection errors and
    /// per-attempt timeouts) are retried up to the policy's attempt count.
    /// `deadline` bounds the whole call including backoff sleeps.
    pub async fn send(
        &self,
        request: &ChatRequest,
        deadline: Duration,
    ) -> Result<String, UpstreamError> {
        let Some(client) = self.pool.load_full() else {
            return Err(UpstreamError::Unexpected(SHUT_DOWN.into()));
        };

        let payload = ChatPayload::from(request);
        let started = Instant::now();

        match tokio::time::timeout(
            deadline,
            self.send_with_retry(&client, &payload, started, deadline),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(deadline_ms = deadline.as_millis() as u64, "upstream deadline elapsed");
                Err(UpstreamError::Timeout {
                    elapsed: started.elapsed(),
                })
            }
        }
    }

    async fn send_with_retry(
        &self,
        client: &Arc<reqwest::Client>,
        payload: &ChatPayload,
        started: Instant,
        deadline: Duration,
    ) -> Result<String, UpstreamError> {
        let mut attempt = 1;
        loop {
            let (error, retry_after) = match self.attempt(client, payload, attempt).await {
                Attempt::Reply(text) => return Ok(text),
                Attempt::Terminal(error) => return Err(error),
                Attempt::Retryable { error, retry_after } => (error, retry_after),
            };

            if attempt >= self.policy.max_attempts {
                warn!(attempt, error = %error, "upstream retries exhausted");
                return Err(error);
            }

            let delay = self.policy.delay_for(attempt, retry_after);
            if started.elapsed() + delay >= deadline {
                // Sleeping would overrun the deadline; the last response stands.
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "no time left to retry"
                );
                return Err(error);
            }

            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient upstream error, will retry"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        client: &reqwest::Client,
        payload: &ChatPayload,
        attempt: u32,
    ) -> Attempt {
        let attempt_started = Instant::now();
        let response = match client.post(&self.url).json(payload).send().await {
            Ok(response) => response,
            Err(e) => return classify_transport_error(e, attempt_started.elapsed()),
        };

        let status = response.status();
        debug!(status = %status, attempt, "upstream response received");

        if status == StatusCode::OK {
            return match response.text().await {
                Ok(body) => Attempt::Reply(types::parse_reply(&body)),
                Err(e) if e.is_timeout() => Attempt::Retryable {
                    error: UpstreamError::Timeout {
                        elapsed: attempt_started.elapsed(),
                    },
                    retry_after: None,
                },
                Err(e) => Attempt::Terminal(UpstreamError::Unexpected(format!(
                    "failed to read response body: {e}"
                ))),
            };
        }

        let retry_after = backoff::retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        let error = UpstreamError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        };

        if backoff::is_transient_status(status) {
            Attempt::Retryable { error, retry_after }
        } else {
            warn!(status = %status, "upstream rejected request");
            Attempt::Terminal(error)
        }
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Maps a `reqwest` send error onto a retryable or terminal outcome.
fn classify_transport_error(e: reqwest::Error, elapsed: Duration) -> Attempt {
    if e.is_builder() {
        return Attempt::Terminal(UpstreamError::Unexpected(format!(
            "failed to build request: {e}"
        )));
    }
    let error = if e.is_timeout() {
        UpstreamError::Timeout { elapsed }
    } else {
        UpstreamError::ConnectionFailure(e.to_string())
    };
    Attempt::Retryable {
        error,
        retry_after: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::{Message, UpstreamErrorKind};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: &str) -> UpstreamConfig {
        UpstreamConfig {
            url: url.to_string(),
            api_token: Some("test-token".into()),
            request_timeout_secs: 5,
            deadline_secs: 10,
            max_attempts: 3,
            backoff_base_ms: 10,
            max_backoff_ms: 100,
        }
    }

    fn test_client(url: &str) -> UpstreamClient {
        UpstreamClient::new(&test_config(url)).unwrap()
    }

    fn test_request() -> ChatRequest {
        ChatRequest::compose(
            "Be kind. ###",
            "Nova",
            "User",
            &[Message::new("Nova", "hello!")],
            "Hello",
        )
        .unwrap()
    }

    const DEADLINE: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn json_reply_extracts_model_output() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"model_output": "hi there"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let reply = client.send(&test_request(), DEADLINE).await.unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn plain_text_reply_falls_back_to_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain reply"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let reply = client.send(&test_request(), DEADLINE).await.unwrap();
        assert_eq!(reply, "plain reply");
    }

    #[tokio::test]
    async fn retries_on_429_then_succeeds() {
        let server = MockServer::start().await;

        // First request returns 429, second returns 200.
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"model_output": "after retry"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let reply = client.send(&test_request(), DEADLINE).await.unwrap();
        assert_eq!(reply, "after retry");
    }

    #[tokio::test]
    async fn exhausts_attempts_on_503() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.send(&test_request(), DEADLINE).await.unwrap_err();
        assert_eq!(err.kind(), UpstreamErrorKind::UpstreamError);
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("overloaded"), "got: {err}");
    }

    #[tokio::test]
    async fn fails_fast_on_400() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.send(&test_request(), DEADLINE).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.send(&test_request(), DEADLINE).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn connection_refused_is_connection_failure() {
        // Bind then drop a listener so the port is closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client(&format!("http://{addr}/"));
        let err = client.send(&test_request(), DEADLINE).await.unwrap_err();
        assert_eq!(err.kind(), UpstreamErrorKind::ConnectionFailure, "got: {err}");
    }

    #[tokio::test]
    async fn slow_upstream_hits_deadline() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let started = Instant::now();
        let err = client
            .send(&test_request(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), UpstreamErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn no_retry_sleeps_past_deadline() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .expect(2)
            .mount(&server)
            .await;

        // Delays are 100ms then 200ms; the second would end past 250ms.
        let config = UpstreamConfig {
            backoff_base_ms: 100,
            max_backoff_ms: 1000,
            max_attempts: 5,
            ..test_config(&server.uri())
        };
        let client = UpstreamClient::new(&config).unwrap();
        let started = Instant::now();
        let err = client
            .send(&test_request(), Duration::from_millis(250))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), UpstreamErrorKind::UpstreamError, "got: {err}");
        assert_eq!(err.status(), Some(503));
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn long_retry_after_keeps_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "30")
                    .set_body_string("slow down"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = UpstreamConfig {
            max_backoff_ms: 30_000,
            ..test_config(&server.uri())
        };
        let client = UpstreamClient::new(&config).unwrap();
        let err = client
            .send(&test_request(), Duration::from_secs(10))
            .await
            .unwrap_err();
        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn per_attempt_timeout_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_secs(3)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
            .mount(&server)
            .await;

        let config = UpstreamConfig {
            request_timeout_secs: 1,
            ..test_config(&server.uri())
        };
        let client = UpstreamClient::new(&config).unwrap();
        let reply = client.send(&test_request(), DEADLINE).await.unwrap();
        assert_eq!(reply, "fast");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn honours_retry_after_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let config = UpstreamConfig {
            max_backoff_ms: 5000,
            ..test_config(&server.uri())
        };
        let client = UpstreamClient::new(&config).unwrap();
        let started = Instant::now();
        let reply = client.send(&test_request(), DEADLINE).await.unwrap();
        assert_eq!(reply, "ok");
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn sends_bearer_and_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "bot_name": "Nova",
                "user_name": "User",
                "prompt": "Be kind. ###",
                "memory": "",
                "chat_history": [
                    {"sender": "Nova", "message": "hello!"},
                    {"sender": "User", "message": "Hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.send(&test_request(), DEADLINE).await;
        assert!(result.is_ok(), "headers should match: {result:?}");
    }

    #[tokio::test]
    async fn send_after_shutdown_makes_no_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.is_open());
        client.close();
        assert!(!client.is_open());

        let err = client.send(&test_request(), DEADLINE).await.unwrap_err();
        assert_eq!(err.kind(), UpstreamErrorKind::Unexpected);
        assert!(err.to_string().contains(SHUT_DOWN));
    }

    #[test]
    fn missing_token_is_config_error() {
        let config = UpstreamConfig {
            api_token: None,
            ..UpstreamConfig::default()
        };
        let err = UpstreamClient::new(&config).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)), "got: {err:?}");
    }

    #[test]
    fn debug_does_not_leak_token() {
        let client = test_client("http://127.0.0.1:1/");
        let debug = format!("{client:?}");
        assert!(!debug.contains("test-token"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn retry_is_logged_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model_output": "ok"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.send(&test_request(), DEADLINE).await.unwrap();

        assert!(logs_contain("transient upstream error, will retry"));
        assert!(logs_contain("upstream client initialized"));
        assert!(!logs_contain("test-token"));
    }
}
