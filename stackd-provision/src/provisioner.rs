//! The end-to-end provisioning flow.
//!
//! A [`Provisioner`] is the single long-lived context for one orchestrator
//! endpoint: it owns the configuration, the dispatch client, and the health
//! gate, and is dropped explicitly when the platform shuts down. Each
//! provisioning call runs a single logical flow (normalize, materialize,
//! dispatch, gate) and returns exactly one classified outcome.

use crate::health::{HealthError, HealthGate};
use crate::orchestrator::{
    DestroyPayload, DispatchError, OrchestratorClient, ProvisionPayload, StopPayload,
};
use crate::runtime::{prepare_runtime, PrepareRuntimeOptions, PreparedRuntime, RuntimeError};
use stackd_core::config::PlatformConfig;
use stackd_core::ports::PortRangeError;
use stackd_core::services::{
    apply_default_exclusions, excluded_to_arg, normalize_excluded, RuntimeService,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Everything needed to provision one project stack.
///
/// Immutable once constructed; owned exclusively by the call using it.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub project_id: u32,
    pub project_ref: String,
    pub project_name: String,
    pub organization_slug: String,
    pub cloud_provider: String,
    pub region: String,
    pub database_password: String,
    pub db_version: String,
    pub project_root: PathBuf,
    /// Raw caller input; normalized and defaulted during provisioning.
    pub excluded_services: Option<Vec<String>>,
}

/// Inputs for stopping a running stack.
#[derive(Debug, Clone)]
pub struct StopRequest {
    pub project_ref: String,
    pub project_root: PathBuf,
}

/// Inputs for tearing a stack down.
#[derive(Debug, Clone)]
pub struct DestroyRequest {
    pub project_ref: String,
    pub organization_slug: String,
    pub project_root: PathBuf,
}

/// A successfully provisioned, healthy stack.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub runtime: PreparedRuntime,
    /// The exclusion list actually applied, after normalization and the
    /// default policy.
    pub excluded: Vec<RuntimeService>,
}

/// Classified provisioning failures. None are retried by this layer.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// No orchestrator endpoint is configured; nothing can be dispatched.
    #[error("orchestrator endpoint is not configured")]
    Unconfigured,
    #[error(transparent)]
    Ports(#[from] PortRangeError),
    #[error("failed to materialize runtime: {0}")]
    Runtime(RuntimeError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Health(#[from] HealthError),
    #[error("failed to build orchestrator client: {0}")]
    Client(#[from] reqwest::Error),
}

impl From<RuntimeError> for ProvisionError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Ports(ports) => Self::Ports(ports),
            other => Self::Runtime(other),
        }
    }
}

/// Long-lived provisioning context for one orchestrator endpoint.
#[derive(Debug)]
pub struct Provisioner {
    config: PlatformConfig,
    orchestrator: OrchestratorClient,
    gate: HealthGate,
}

impl Provisioner {
    /// Builds the context from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Unconfigured`] when no orchestrator URL is
    /// set, or a client construction error.
    pub fn new(config: PlatformConfig) -> Result<Self, ProvisionError> {
        let url = config
            .orchestrator
            .url
            .as_deref()
            .ok_or(ProvisionError::Unconfigured)?;
        let orchestrator = OrchestratorClient::new(
            url,
            config.orchestrator.token.clone(),
            config.orchestrator.timeout(),
        )?;
        let gate = HealthGate::new(&config.health, config.ports)?;
        Ok(Self {
            config,
            orchestrator,
            gate,
        })
    }

    /// Provisions a project stack and waits for it to become usable.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProvisionError`]; a request either completes
    /// with a ready stack or fails with one clear error, never an ambiguous
    /// in-between.
    pub async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let excluded =
            apply_default_exclusions(normalize_excluded(request.excluded_services.as_deref()));
        info!(
            project_ref = %request.project_ref,
            excluded = excluded_to_arg(&excluded).as_deref().unwrap_or("none"),
            "provisioning stack"
        );

        let runtime = prepare_runtime(
            &self.config,
            &PrepareRuntimeOptions {
                project_id: request.project_id,
                project_ref: request.project_ref.clone(),
                project_name: request.project_name.clone(),
                project_root: request.project_root.clone(),
                database_password: request.database_password.clone(),
                db_version: request.db_version.clone(),
            },
        )?;

        let payload = ProvisionPayload {
            project_id: request.project_id,
            project_ref: request.project_ref.clone(),
            project_name: request.project_name.clone(),
            organization_slug: request.organization_slug.clone(),
            project_root: request.project_root.display().to_string(),
            cloud_provider: request.cloud_provider.clone(),
            region: request.region.clone(),
            database_password: request.database_password.clone(),
            excluded_services: excluded.clone(),
            network_id: self.config.runtime.network_id.clone(),
            ignore_health_check: true,
        };
        self.orchestrator.provision(&payload, None).await?;

        self.gate
            .wait_until_healthy(request.project_id, &excluded, None, None)
            .await?;

        info!(project_ref = %request.project_ref, site_url = %runtime.site_url, "stack ready");
        Ok(ProvisionOutcome { runtime, excluded })
    }

    /// Asks the runtime agent to stop a project's stack.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Dispatch`] when the agent rejects the
    /// request or cannot be reached.
    pub async fn stop(&self, request: &StopRequest) -> Result<(), ProvisionError> {
        info!(project_ref = %request.project_ref, "stopping stack");
        self.orchestrator
            .stop(
                &StopPayload {
                    project_ref: request.project_ref.clone(),
                    project_root: request.project_root.display().to_string(),
                },
                None,
            )
            .await?;
        info!(project_ref = %request.project_ref, "stack stopped");
        Ok(())
    }

    /// Asks the runtime agent to tear a project's stack down.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Dispatch`] when the agent rejects the
    /// request or cannot be reached.
    pub async fn destroy(&self, request: &DestroyRequest) -> Result<(), ProvisionError> {
        info!(project_ref = %request.project_ref, "destroying stack");
        self.orchestrator
            .destroy(
                &DestroyPayload {
                    project_ref: request.project_ref.clone(),
                    project_root: request.project_root.display().to_string(),
                    organization_slug: request.organization_slug.clone(),
                },
                None,
            )
            .await?;
        info!(project_ref = %request.project_ref, "stack destroyed");
        Ok(())
    }
}
