//! Readiness gate for freshly provisioned stacks.
//!
//! Dispatch only means the runtime agent accepted the request; the gate is
//! what turns "submitted" into "usable". It polls the stack's own health
//! surface, REST-gateway readiness and edge-function readiness, until both
//! answer in the same attempt or the deadline passes.

use stackd_core::config::HealthConfig;
use stackd_core::ports::{PortPlan, PortRangeError};
use stackd_core::services::RuntimeService;
use stackd_utils::probe;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const REST_READY_PATH: &str = "/rest-admin/v1/ready";
const FUNCTIONS_HEALTH_PATH: &str = "/functions/v1/_internal/health";

/// Errors raised by the readiness gate.
#[derive(Error, Debug)]
pub enum HealthError {
    #[error(transparent)]
    Ports(#[from] PortRangeError),
    /// The stack never became ready inside the allowed window.
    #[error("stack health checks timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("failed to build health probe client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Polls a project stack's health endpoints until ready or deadline.
#[derive(Debug)]
pub struct HealthGate {
    client: reqwest::Client,
    host: String,
    ports: PortPlan,
    timeout: Duration,
    interval: Duration,
}

impl HealthGate {
    /// Builds a gate probing `health.host` with the given port plan.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(health: &HealthConfig, ports: PortPlan) -> Result<Self, HealthError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            host: health.host.clone(),
            ports,
            timeout: health.timeout(),
            interval: health.interval(),
        })
    }

    /// Waits until every applicable check passes in the same attempt.
    ///
    /// Checks backed by excluded services are skipped: excluding the REST
    /// gateway or its proxy skips REST readiness, excluding the
    /// edge-function runtime skips function readiness. When everything is
    /// skipped the gate reports success immediately without touching the
    /// network.
    ///
    /// `timeout` and `interval` default to configuration when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::Timeout`] when the deadline passes first, or
    /// [`HealthError::Ports`] when the project's port block is out of range.
    pub async fn wait_until_healthy(
        &self,
        project_id: u32,
        excluded: &[RuntimeService],
        timeout: Option<Duration>,
        interval: Option<Duration>,
    ) -> Result<(), HealthError> {
        let timeout = timeout.unwrap_or(self.timeout);
        let interval = interval.unwrap_or(self.interval);
        let allocation = self.ports.allocate_for(project_id)?;

        let check_rest = !excluded.contains(&RuntimeService::Postgrest)
            && !excluded.contains(&RuntimeService::Kong);
        let check_functions = !excluded.contains(&RuntimeService::EdgeRuntime);

        if !check_rest && !check_functions {
            // Nothing checkable was provisioned. Reported as ready, but with
            // a distinct log line so telemetry can tell "verified" from
            // "skipped".
            info!(project_id, "all health-checkable services excluded; skipping readiness checks");
            return Ok(());
        }

        let rest_url = check_rest
            .then(|| format!("http://{}:{}{REST_READY_PATH}", self.host, allocation.api));
        let functions_url = check_functions
            .then(|| format!("http://{}:{}{FUNCTIONS_HEALTH_PATH}", self.host, allocation.api));

        let started = Instant::now();
        let deadline = started + timeout;
        while Instant::now() < deadline {
            if self
                .attempt(rest_url.as_deref(), functions_url.as_deref(), interval)
                .await
            {
                debug!(
                    project_id,
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "stack reported healthy"
                );
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }

        Err(HealthError::Timeout {
            elapsed_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Runs one polling attempt. All applicable checks run concurrently and
    /// must pass together; partial progress never carries over to the next
    /// attempt.
    async fn attempt(
        &self,
        rest_url: Option<&str>,
        functions_url: Option<&str>,
        interval: Duration,
    ) -> bool {
        let cancel = CancellationToken::new();
        let timer = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(interval).await;
                cancel.cancel();
            }
        });

        let rest = async {
            match rest_url {
                Some(url) => probe::check_http(&self.client, url, &cancel).await,
                None => true,
            }
        };
        let functions = async {
            match functions_url {
                Some(url) => probe::check_http(&self.client, url, &cancel).await,
                None => true,
            }
        };
        let (rest_ok, functions_ok) = tokio::join!(rest, functions);

        // The per-attempt timer must not leak into the sleep that follows.
        timer.abort();
        rest_ok && functions_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use stackd_core::config::HealthConfig;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn gate_for_port(port: u16, timeout_ms: u64, interval_ms: u64) -> HealthGate {
        let health = HealthConfig {
            host: "127.0.0.1".to_string(),
            timeout_ms,
            interval_ms,
        };
        // Base the plan on the test server's port so project id 0 maps to it.
        let plan = PortPlan { base: port, step: 0 };
        HealthGate::new(&health, plan).unwrap()
    }

    /// Minimal readiness endpoint that fails the first `failures` requests
    /// and succeeds afterwards.
    async fn flaky_ready_server(failures: usize) -> (u16, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut served = 0_usize;
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0_u8; 512];
                let _ = socket.read(&mut buf).await;
                let status = if served < failures {
                    "503 Service Unavailable"
                } else {
                    "200 OK"
                };
                served += 1;
                let response =
                    format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        (port, handle)
    }

    #[tokio::test]
    async fn fully_excluded_stack_is_ready_without_network_activity() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path_contains("/");
                then.status(200);
            })
            .await;

        let gate = gate_for_port(server.port(), 1_000, 50);
        gate.wait_until_healthy(
            0,
            &[RuntimeService::Postgrest, RuntimeService::EdgeRuntime],
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn excluding_the_gateway_also_skips_the_rest_check() {
        let server = MockServer::start_async().await;
        let functions = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/functions/v1/_internal/health");
                then.status(200);
            })
            .await;
        let rest = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/rest-admin/v1/ready");
                then.status(200);
            })
            .await;

        let gate = gate_for_port(server.port(), 1_000, 100);
        gate.wait_until_healthy(0, &[RuntimeService::Kong], None, None)
            .await
            .unwrap();

        assert_eq!(rest.hits_async().await, 0);
        assert_eq!(functions.hits_async().await, 1);
    }

    #[tokio::test]
    async fn both_checks_must_pass_in_the_same_attempt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/rest-admin/v1/ready");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/functions/v1/_internal/health");
                then.status(503);
            })
            .await;

        let gate = gate_for_port(server.port(), 250, 50);
        let err = gate
            .wait_until_healthy(0, &[], None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::Timeout { .. }));
    }

    #[tokio::test]
    async fn persistent_failure_times_out_after_about_six_attempts() {
        let server = MockServer::start_async().await;
        let rest = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/rest-admin/v1/ready");
                then.status(503);
            })
            .await;

        let gate = gate_for_port(server.port(), 300, 50);
        let err = gate
            .wait_until_healthy(0, &[RuntimeService::EdgeRuntime], None, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out after 300ms"));
        let attempts = rest.hits_async().await;
        assert!((4..=8).contains(&attempts), "made {attempts} attempts");
    }

    #[tokio::test]
    async fn recovery_on_a_later_attempt_resolves_before_the_deadline() {
        let (port, server) = flaky_ready_server(2).await;

        let health = HealthConfig {
            host: "127.0.0.1".to_string(),
            timeout_ms: 5_000,
            interval_ms: 50,
        };
        let gate = HealthGate::new(&health, PortPlan { base: port, step: 0 }).unwrap();

        let started = Instant::now();
        gate.wait_until_healthy(0, &[RuntimeService::EdgeRuntime], None, None)
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "resolved too early");
        assert!(elapsed < Duration::from_secs(2), "waited out the deadline");

        server.abort();
    }

    #[tokio::test]
    async fn connection_refusal_counts_as_a_failed_attempt() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let gate = gate_for_port(port, 200, 50);
        let err = gate
            .wait_until_healthy(0, &[RuntimeService::EdgeRuntime], None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::Timeout { .. }));
    }
}
