//! # stackd-provision
//!
//! The provisioning engine for the stackd platform. Given a project, it
//! materializes the on-disk runtime the stack boots from, dispatches a
//! provisioning request to the external runtime agent, and then gates on the
//! stack's own health endpoints until the stack is actually usable.
//!
//! ## Flow
//!
//! 1. **Normalize**: the caller's excluded-service list is validated against
//!    the catalog and the default-exclusion policy applied.
//! 2. **Materialize**: [`runtime::prepare_runtime`] writes the stack's
//!    config and merged env file under the project root.
//! 3. **Dispatch**: [`orchestrator::OrchestratorClient`] submits the request
//!    to the runtime agent under a hard timeout.
//! 4. **Gate**: [`health::HealthGate`] polls the stack's readiness endpoints
//!    until success or deadline.
//!
//! The entry point tying these together is [`provisioner::Provisioner`].

pub mod config_loader;
pub mod health;
pub mod orchestrator;
pub mod provisioner;
pub mod runtime;

pub use provisioner::{ProvisionError, ProvisionRequest, Provisioner};
