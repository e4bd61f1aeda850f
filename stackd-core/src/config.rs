//! Configuration types for the provisioning layer.
//!
//! This module holds pure data only. Reading the process environment is a
//! side effect and lives in `stackd-provision::config_loader`.

use crate::ports::PortPlan;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the provisioning layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Project port mapping.
    #[serde(default)]
    pub ports: PortPlan,
    /// Readiness-gate settings.
    #[serde(default)]
    pub health: HealthConfig,
    /// Runtime-agent endpoint settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Stack materialization settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Settings for the post-dispatch readiness gate.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HealthConfig {
    /// Host the stack's health endpoints are reachable on.
    #[serde(default = "default_health_host")]
    pub host: String,
    /// Overall deadline for the gate, in milliseconds.
    #[serde(default = "default_health_timeout_ms")]
    pub timeout_ms: u64,
    /// Pause between polling attempts, in milliseconds. Also bounds each
    /// attempt's in-flight checks.
    #[serde(default = "default_health_interval_ms")]
    pub interval_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: default_health_host(),
            timeout_ms: default_health_timeout_ms(),
            interval_ms: default_health_interval_ms(),
        }
    }
}

impl HealthConfig {
    /// The overall gate deadline as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The polling interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Settings for reaching the external runtime agent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Endpoint URL. Provisioning cannot dispatch without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Optional bearer credential sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Per-request deadline, in milliseconds.
    #[serde(default = "default_orchestrator_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout_ms: default_orchestrator_timeout_ms(),
        }
    }
}

impl OrchestratorConfig {
    /// The per-request deadline as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Settings for materializing a project's on-disk runtime.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Directory copied into a project's stack dir on first provision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
    /// Docker network the runtime agent attaches stack containers to.
    #[serde(default = "default_network_id")]
    pub network_id: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            network_id: default_network_id(),
        }
    }
}

fn default_health_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_health_timeout_ms() -> u64 {
    120_000
}

const fn default_health_interval_ms() -> u64 {
    2_000
}

const fn default_orchestrator_timeout_ms() -> u64 {
    30_000
}

fn default_network_id() -> String {
    "stackd_default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = PlatformConfig::default();
        assert_eq!(config.ports.base, 23000);
        assert_eq!(config.ports.step, 20);
        assert_eq!(config.health.host, "127.0.0.1");
        assert_eq!(config.health.timeout(), Duration::from_secs(120));
        assert_eq!(config.health.interval(), Duration::from_secs(2));
        assert!(config.orchestrator.url.is_none());
        assert_eq!(config.orchestrator.timeout(), Duration::from_secs(30));
        assert_eq!(config.runtime.network_id, "stackd_default");
    }
}
