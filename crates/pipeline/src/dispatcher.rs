//! Operation dispatcher: normalization, validation and local/remote routing.

use std::time::Duration;

use async_trait::async_trait;
use mediaflow_core::catalog::{self, ENDPOINT_TOOLKIT_TEST};
use mediaflow_core::types::Params;
use mediaflow_toolkit::RemoteDispatchClient;
use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::router::LocalOverrideRouter;

/// Timeout of the capability query behind the liveness probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Routes operations to their executor. Implemented by [`Dispatcher`];
/// tests substitute their own.
#[async_trait]
pub trait OperationDispatcher: Send + Sync {
    /// Full dispatch: normalize, strip blanks, validate, probe or route.
    async fn dispatch(&self, endpoint: &str, params: Params) -> Result<Value, DispatchError>;

    /// Call the remote backend directly, skipping validation and local
    /// overrides. Used by author-configured scenario steps.
    async fn call_remote(&self, endpoint: &str, params: Params) -> Result<Value, DispatchError>;
}

pub struct Dispatcher {
    router: LocalOverrideRouter,
    remote: RemoteDispatchClient,
    probe_timeout: Duration,
}

impl Dispatcher {
    pub fn new(router: LocalOverrideRouter, remote: RemoteDispatchClient) -> Self {
        Self {
            router,
            remote,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn remote(&self) -> &RemoteDispatchClient {
        &self.remote
    }

    /// Liveness probe. Always succeeds; an unreachable backend yields a
    /// `mock` result listing the local catalog.
    pub async fn probe(&self) -> Value {
        match self.remote.capabilities(self.probe_timeout).await {
            Ok(endpoints) => {
                tracing::info!("Remote backend reachable");
                json!({
                    "status": "online",
                    "mode": "live",
                    "message": "Remote backend is reachable",
                    "endpoints": endpoints,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote backend probe failed, answering in mock mode");
                let endpoints: Vec<&str> = catalog::operations().iter().map(|op| op.endpoint).collect();
                json!({
                    "status": "online",
                    "mode": "mock",
                    "message": format!("Remote backend not reachable: {e}"),
                    "endpoints": endpoints,
                })
            }
        }
    }

    async fn remote_call(&self, endpoint: &str, params: &Params) -> Result<Value, DispatchError> {
        let outcome = self.remote.call_default(endpoint, params).await;
        if outcome.success {
            return Ok(outcome.data.unwrap_or(Value::Null));
        }
        Err(DispatchError::Remote {
            endpoint: endpoint.to_string(),
            message: outcome.error.unwrap_or_else(|| "unknown error".to_string()),
            retryable: outcome.retryable,
            attempts: outcome.attempts_used,
            status_code: outcome.status_code,
        })
    }
}

#[async_trait]
impl OperationDispatcher for Dispatcher {
    async fn dispatch(&self, endpoint: &str, params: Params) -> Result<Value, DispatchError> {
        let endpoint = catalog::normalize_endpoint(endpoint);
        let params = catalog::strip_blank_params(params);
        catalog::check_params(&endpoint, &params)?;

        if endpoint == ENDPOINT_TOOLKIT_TEST {
            return Ok(self.probe().await);
        }

        if let Some(claim) = self.router.claim(&endpoint, &params).await {
            tracing::info!(endpoint = %endpoint, executor = claim.name(), "Local override claimed operation");
            return self
                .router
                .execute(&claim)
                .await
                .map_err(|e| DispatchError::local(&endpoint, e));
        }

        tracing::info!(endpoint = %endpoint, "Dispatching to remote backend");
        self.remote_call(&endpoint, &params).await
    }

    async fn call_remote(&self, endpoint: &str, params: Params) -> Result<Value, DispatchError> {
        let endpoint = catalog::normalize_endpoint(endpoint);
        let params = catalog::strip_blank_params(params);
        self.remote_call(&endpoint, &params).await
    }
}
