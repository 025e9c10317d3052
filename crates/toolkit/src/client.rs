//! Retrying client for remote backend operations.
//!
//! Outcome classification per attempt:
//!
//! | outcome | action |
//! |---------|--------|
//! | 2xx | success, return |
//! | 4xx | permanent failure, return |
//! | 5xx / other status | record, retry |
//! | timeout / connection failure | record, retry |
//! | any other transport error | permanent failure, return |
//!
//! Backoff waits only between attempts, never after the last one.

use std::sync::Arc;
use std::time::Duration;

use mediaflow_core::catalog::{self, HttpMethod};
use mediaflow_core::types::Params;
use serde::Serialize;
use serde_json::Value;

use crate::backoff::{delay_after_attempt, BackoffConfig};
use crate::transport::{RemoteTransport, TransportError, TransportResponse};

/// Capability-list sub-resource queried by the liveness probe.
pub const CAPABILITIES_ENDPOINT: &str = "/v1/toolkit/endpoints";

/// Default per-attempt timeout for media operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default attempt cap.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Settings shared by every call of one client.
#[derive(Debug, Clone)]
pub struct ToolkitConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: BackoffConfig,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Result of a remote call. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the caller may try again later.
    pub retryable: bool,
    pub attempts_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl DispatchOutcome {
    fn success(data: Value, attempts_used: u32, status: u16) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            retryable: false,
            attempts_used,
            status_code: Some(status),
        }
    }

    fn failure(error: String, retryable: bool, attempts_used: u32, status: Option<u16>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            retryable,
            attempts_used,
            status_code: status,
        }
    }
}

/// Reachability of the remote backend, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteHealth {
    Healthy,
    Unhealthy,
    Unreachable,
}

/// Remote backend client with bounded retry.
#[derive(Clone)]
pub struct RemoteDispatchClient {
    transport: Arc<dyn RemoteTransport>,
    config: ToolkitConfig,
}

impl RemoteDispatchClient {
    pub fn new(transport: Arc<dyn RemoteTransport>, config: ToolkitConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    /// [`call`](Self::call) with the configured timeout and attempt cap.
    pub async fn call_default(&self, endpoint: &str, params: &Params) -> DispatchOutcome {
        self.call(endpoint, params, self.config.timeout, self.config.max_retries)
            .await
    }

    /// Invoke `endpoint` with up to `max_retries` attempts (at least one).
    pub async fn call(
        &self,
        endpoint: &str,
        params: &Params,
        timeout: Duration,
        max_retries: u32,
    ) -> DispatchOutcome {
        let max_attempts = max_retries.max(1);
        let method = catalog::find_operation(endpoint)
            .map(|op| op.method)
            .unwrap_or(HttpMethod::Post);
        let body = Value::Object(params.clone());

        let mut last_error = String::new();
        let mut last_status = None;

        for attempt in 1..=max_attempts {
            tracing::debug!(endpoint, attempt, max_attempts, "Calling remote backend");

            let result = match method {
                HttpMethod::Post => self.transport.post_json(endpoint, &body, timeout).await,
                HttpMethod::Get => self.transport.get_json(endpoint, timeout).await,
            };

            match result {
                Ok(response) if response.is_success() => {
                    tracing::info!(endpoint, attempt, status = response.status, "Remote call succeeded");
                    return DispatchOutcome::success(response.body, attempt, response.status);
                }
                Ok(response) if (400..500).contains(&response.status) => {
                    let error = format_status_error(&response);
                    tracing::warn!(endpoint, attempt, status = response.status, error = %error, "Remote rejected request");
                    return DispatchOutcome::failure(error, false, attempt, Some(response.status));
                }
                Ok(response) => {
                    last_error = format_status_error(&response);
                    last_status = Some(response.status);
                    tracing::warn!(endpoint, attempt, status = response.status, error = %last_error, "Remote server error");
                }
                Err(e) if e.is_retryable() => {
                    last_error = e.to_string();
                    last_status = None;
                    tracing::warn!(endpoint, attempt, error = %e, "Remote call failed transiently");
                }
                Err(e) => {
                    tracing::error!(endpoint, attempt, error = %e, "Remote call failed");
                    return DispatchOutcome::failure(e.to_string(), false, attempt, None);
                }
            }

            if attempt < max_attempts {
                let delay = delay_after_attempt(attempt, &self.config.backoff);
                tracing::info!(endpoint, attempt, delay_ms = delay.as_millis() as u64, "Retrying remote call");
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(endpoint, attempts = max_attempts, error = %last_error, "Remote call exhausted retries");
        DispatchOutcome::failure(
            format!("{last_error} (after {max_attempts} attempts, please retry later)"),
            true,
            max_attempts,
            last_status,
        )
    }

    /// Fetch the backend's capability list. Single attempt.
    pub async fn capabilities(&self, timeout: Duration) -> Result<Value, TransportError> {
        let response = self.transport.get_json(CAPABILITIES_ENDPOINT, timeout).await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(TransportError::Other(format_status_error(&response)))
        }
    }

    /// Classify backend reachability using the test operation.
    pub async fn health(&self, timeout: Duration) -> RemoteHealth {
        match self.transport.get_json(catalog::ENDPOINT_TOOLKIT_TEST, timeout).await {
            Ok(response) if response.is_success() => RemoteHealth::Healthy,
            Ok(_) => RemoteHealth::Unhealthy,
            Err(_) => RemoteHealth::Unreachable,
        }
    }
}

fn format_status_error(response: &TransportResponse) -> String {
    format!("HTTP {}: {}", response.status, response.error_text())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    /// Replays scripted responses and counts calls.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        calls: Mutex<Vec<(String, &'static str)>>,
        fallback: Result<TransportResponse, TransportError>,
    }

    impl ScriptedTransport {
        fn new(
            script: Vec<Result<TransportResponse, TransportError>>,
            fallback: Result<TransportResponse, TransportError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                fallback,
            })
        }

        fn next(&self, endpoint: &str, method: &'static str) -> Result<TransportResponse, TransportError> {
            self.calls.lock().unwrap().push((endpoint.to_string(), method));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RemoteTransport for ScriptedTransport {
        async fn post_json(
            &self,
            endpoint: &str,
            _body: &Value,
            _timeout: Duration,
        ) -> Result<TransportResponse, TransportError> {
            self.next(endpoint, "POST")
        }

        async fn get_json(
            &self,
            endpoint: &str,
            _timeout: Duration,
        ) -> Result<TransportResponse, TransportError> {
            self.next(endpoint, "GET")
        }
    }

    fn status(code: u16, body: Value) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse { status: code, body })
    }

    fn client(transport: Arc<ScriptedTransport>) -> RemoteDispatchClient {
        RemoteDispatchClient::new(transport, ToolkitConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn two_server_errors_then_success_waits_one_plus_two_seconds() {
        let transport = ScriptedTransport::new(
            vec![status(500, json!("boom")), status(503, json!("busy"))],
            status(200, json!({"response": "ok"})),
        );
        let client = client(transport.clone());

        let start = tokio::time::Instant::now();
        let outcome = client
            .call("/audio-mixing", &Params::new(), Duration::from_secs(600), 3)
            .await;
        let elapsed = start.elapsed();

        assert!(outcome.success);
        assert_eq!(outcome.attempts_used, 3);
        assert_eq!(outcome.data, Some(json!({"response": "ok"})));
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "elapsed {elapsed:?}");
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_fails_after_one_attempt_without_waiting() {
        let transport = ScriptedTransport::new(vec![], status(404, json!({"message": "no such route"})));
        let client = client(transport.clone());

        let start = tokio::time::Instant::now();
        let outcome = client
            .call("/audio-mixing", &Params::new(), Duration::from_secs(600), 3)
            .await;

        assert!(!outcome.success);
        assert!(!outcome.retryable);
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(outcome.status_code, Some(404));
        assert_eq!(outcome.error.as_deref(), Some("HTTP 404: no such route"));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_are_retryable_and_skip_final_wait() {
        let transport = ScriptedTransport::new(vec![], Err(TransportError::Timeout("slow".into())));
        let client = client(transport.clone());

        let start = tokio::time::Instant::now();
        let outcome = client
            .call("/transcribe", &Params::new(), Duration::from_secs(1), 3)
            .await;

        assert!(!outcome.success);
        assert!(outcome.retryable);
        assert_eq!(outcome.attempts_used, 3);
        assert!(outcome.error.unwrap().contains("please retry later"));
        // 1s + 2s between the three attempts, nothing after the last.
        assert!(start.elapsed() < Duration::from_millis(3100));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_transport_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![], Err(TransportError::Other("bad builder".into())));
        let client = client(transport.clone());

        let outcome = client.call_default("/transcribe", &Params::new()).await;

        assert!(!outcome.success);
        assert!(!outcome.retryable);
        assert_eq!(outcome.attempts_used, 1);
    }

    #[tokio::test]
    async fn zero_retries_still_makes_one_attempt() {
        let transport = ScriptedTransport::new(vec![], status(200, json!({})));
        let outcome = client(transport.clone())
            .call("/transcribe", &Params::new(), Duration::from_secs(1), 0)
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.attempts_used, 1);
    }

    #[tokio::test]
    async fn get_operations_use_get() {
        let transport = ScriptedTransport::new(vec![], status(200, json!({"ok": true})));
        client(transport.clone())
            .call_default(catalog::ENDPOINT_TOOLKIT_TEST, &Params::new())
            .await;
        let calls = transport.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(catalog::ENDPOINT_TOOLKIT_TEST.to_string(), "GET")]);
    }

    #[tokio::test]
    async fn health_classifies_reachability() {
        let healthy = ScriptedTransport::new(vec![], status(200, json!({})));
        assert_eq!(client(healthy).health(Duration::from_secs(1)).await, RemoteHealth::Healthy);

        let unhealthy = ScriptedTransport::new(vec![], status(502, json!({})));
        assert_eq!(client(unhealthy).health(Duration::from_secs(1)).await, RemoteHealth::Unhealthy);

        let down = ScriptedTransport::new(vec![], Err(TransportError::Connection("refused".into())));
        assert_eq!(client(down).health(Duration::from_secs(1)).await, RemoteHealth::Unreachable);
    }

    #[tokio::test]
    async fn capabilities_fail_on_error_status() {
        let transport = ScriptedTransport::new(vec![], status(404, json!("missing")));
        let result = client(transport).capabilities(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(TransportError::Other(_))));
    }
}
