//! Client for the external runtime agent that starts and stops stacks.
//!
//! Each operation issues exactly one outbound call, raced against an
//! explicit cancellation token armed by a timer. Nothing here retries: a
//! provisioning request is not idempotent-safe to resend, so failures are
//! classified and surfaced to the caller.

use serde::Serialize;
use stackd_core::services::RuntimeService;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors raised by a dispatch call.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The agent did not respond before the deadline; the in-flight call was
    /// aborted and must not be assumed to have taken effect.
    #[error("orchestrator request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    /// The agent answered with a non-success status.
    #[error("orchestrator request failed ({status}): {message}")]
    Upstream { status: u16, message: String },
    /// The transport itself failed before a response arrived.
    #[error("orchestrator request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Body of a provision dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionPayload {
    pub project_id: u32,
    pub project_ref: String,
    pub project_name: String,
    pub organization_slug: String,
    pub project_root: String,
    pub cloud_provider: String,
    pub region: String,
    pub database_password: String,
    pub excluded_services: Vec<RuntimeService>,
    pub network_id: String,
    /// The agent's own readiness probing is skipped; the health gate owns
    /// readiness so the same lifecycle works from inside a container.
    pub ignore_health_check: bool,
}

/// Body of a stop dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct StopPayload {
    pub project_ref: String,
    pub project_root: String,
}

/// Body of a destroy dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DestroyPayload {
    pub project_ref: String,
    pub project_root: String,
    pub organization_slug: String,
}

/// A long-lived client for one orchestrator endpoint.
///
/// Owned by the provisioning context that created it; there is no implicit
/// process-wide client cache.
#[derive(Debug)]
pub struct OrchestratorClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl OrchestratorClient {
    /// Builds a client for `base_url` (trailing slashes ignored).
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    /// Submits a provisioning request. Success means "submitted", not
    /// "ready"; readiness belongs to the health gate.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on timeout, transport failure, or a
    /// non-success response. Never retried.
    pub async fn provision(
        &self,
        payload: &ProvisionPayload,
        timeout: Option<Duration>,
    ) -> Result<(), DispatchError> {
        debug!(project_ref = %payload.project_ref, "dispatching provision request");
        self.post("/v1/projects/provision", payload, timeout).await
    }

    /// Asks the agent to stop a project's stack.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on timeout, transport failure, or a
    /// non-success response.
    pub async fn stop(
        &self,
        payload: &StopPayload,
        timeout: Option<Duration>,
    ) -> Result<(), DispatchError> {
        debug!(project_ref = %payload.project_ref, "dispatching stop request");
        self.post("/v1/projects/stop", payload, timeout).await
    }

    /// Asks the agent to tear a project's stack down.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on timeout, transport failure, or a
    /// non-success response.
    pub async fn destroy(
        &self,
        payload: &DestroyPayload,
        timeout: Option<Duration>,
    ) -> Result<(), DispatchError> {
        debug!(project_ref = %payload.project_ref, "dispatching destroy request");
        self.post("/v1/projects/destroy", payload, timeout).await
    }

    async fn post<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        timeout: Option<Duration>,
    ) -> Result<(), DispatchError> {
        let timeout = timeout.unwrap_or(self.timeout);
        let elapsed_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        let cancel = CancellationToken::new();
        let timer = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            }
        });

        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let call = async {
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        Ok(())
                    } else {
                        let message = response.text().await.unwrap_or_default();
                        Err(DispatchError::Upstream {
                            status: status.as_u16(),
                            message,
                        })
                    }
                }
                Err(e) => Err(DispatchError::Transport(e)),
            }
        };

        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(DispatchError::Timeout { elapsed_ms }),
            outcome = call => outcome,
        };

        // The timer must not outlive the call on either path.
        timer.abort();
        outcome
    }
}
