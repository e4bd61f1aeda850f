//! Builds a [`PlatformConfig`] from the process environment.
//!
//! The config types themselves live in `stackd-core` and stay pure; this is
//! the one place that reads env vars. Every knob has a documented default
//! and an invalid value falls back to it rather than failing startup.

use stackd_core::config::{HealthConfig, OrchestratorConfig, PlatformConfig, RuntimeConfig};
use stackd_core::ports::PortPlan;
use stackd_utils::env::{non_empty_var, parsed_var};
use std::path::PathBuf;

pub const ENV_PORT_BASE: &str = "STACKD_PORT_BASE";
pub const ENV_PORT_STEP: &str = "STACKD_PORT_STEP";
pub const ENV_HEALTH_HOST: &str = "STACKD_HEALTH_HOST";
pub const ENV_HEALTH_TIMEOUT_MS: &str = "STACKD_HEALTH_TIMEOUT_MS";
pub const ENV_HEALTH_INTERVAL_MS: &str = "STACKD_HEALTH_INTERVAL_MS";
pub const ENV_ORCHESTRATOR_URL: &str = "STACKD_ORCHESTRATOR_URL";
pub const ENV_ORCHESTRATOR_TOKEN: &str = "STACKD_ORCHESTRATOR_TOKEN";
pub const ENV_ORCHESTRATOR_TIMEOUT_MS: &str = "STACKD_ORCHESTRATOR_TIMEOUT_MS";
pub const ENV_TEMPLATE_DIR: &str = "STACKD_TEMPLATE_DIR";
pub const ENV_NETWORK_ID: &str = "STACKD_NETWORK_ID";

/// Reads the full configuration surface from the environment.
#[must_use]
pub fn load_from_env() -> PlatformConfig {
    let defaults = PlatformConfig::default();
    PlatformConfig {
        ports: PortPlan {
            base: parsed_var(ENV_PORT_BASE, defaults.ports.base),
            step: parsed_var(ENV_PORT_STEP, defaults.ports.step),
        },
        health: HealthConfig {
            host: non_empty_var(ENV_HEALTH_HOST).unwrap_or(defaults.health.host),
            timeout_ms: parsed_var(ENV_HEALTH_TIMEOUT_MS, defaults.health.timeout_ms),
            interval_ms: parsed_var(ENV_HEALTH_INTERVAL_MS, defaults.health.interval_ms),
        },
        orchestrator: OrchestratorConfig {
            url: non_empty_var(ENV_ORCHESTRATOR_URL),
            token: non_empty_var(ENV_ORCHESTRATOR_TOKEN),
            timeout_ms: parsed_var(ENV_ORCHESTRATOR_TIMEOUT_MS, defaults.orchestrator.timeout_ms),
        },
        runtime: RuntimeConfig {
            template_dir: non_empty_var(ENV_TEMPLATE_DIR).map(PathBuf::from),
            network_id: non_empty_var(ENV_NETWORK_ID).unwrap_or(defaults.runtime.network_id),
        },
    }
}
