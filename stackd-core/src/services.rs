//! The catalog of optional stack services and exclusion-list normalization.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the optional services a project stack can run.
///
/// The set is closed: exclusion lists may only ever contain these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeService {
    /// Auth server.
    Gotrue,
    /// Websocket change feed.
    Realtime,
    /// Object storage API.
    StorageApi,
    /// Image transformation proxy.
    Imgproxy,
    /// API gateway.
    Kong,
    /// Mail capture.
    Mailpit,
    /// REST gateway over the database.
    Postgrest,
    /// Database metadata API.
    PostgresMeta,
    /// Studio UI.
    Studio,
    /// Edge-function runtime.
    EdgeRuntime,
    /// Analytics collector.
    Logflare,
    /// Log forwarder.
    Vector,
    /// Connection pooler.
    Supavisor,
}

/// Every service in the catalog, in canonical order.
pub const ALL_RUNTIME_SERVICES: [RuntimeService; 13] = [
    RuntimeService::Gotrue,
    RuntimeService::Realtime,
    RuntimeService::StorageApi,
    RuntimeService::Imgproxy,
    RuntimeService::Kong,
    RuntimeService::Mailpit,
    RuntimeService::Postgrest,
    RuntimeService::PostgresMeta,
    RuntimeService::Studio,
    RuntimeService::EdgeRuntime,
    RuntimeService::Logflare,
    RuntimeService::Vector,
    RuntimeService::Supavisor,
];

/// Services excluded when the caller does not choose any.
pub const DEFAULT_EXCLUDED_SERVICES: [RuntimeService; 2] =
    [RuntimeService::Logflare, RuntimeService::Vector];

impl RuntimeService {
    /// The wire name of the service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gotrue => "gotrue",
            Self::Realtime => "realtime",
            Self::StorageApi => "storage-api",
            Self::Imgproxy => "imgproxy",
            Self::Kong => "kong",
            Self::Mailpit => "mailpit",
            Self::Postgrest => "postgrest",
            Self::PostgresMeta => "postgres-meta",
            Self::Studio => "studio",
            Self::EdgeRuntime => "edge-runtime",
            Self::Logflare => "logflare",
            Self::Vector => "vector",
            Self::Supavisor => "supavisor",
        }
    }

    /// Looks a service up by name, ignoring case and surrounding whitespace.
    ///
    /// Returns `None` for names outside the catalog; unknown names are
    /// typically forward-compatible or typo'd client input and must not fail
    /// provisioning.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gotrue" => Some(Self::Gotrue),
            "realtime" => Some(Self::Realtime),
            "storage-api" => Some(Self::StorageApi),
            "imgproxy" => Some(Self::Imgproxy),
            "kong" => Some(Self::Kong),
            "mailpit" => Some(Self::Mailpit),
            "postgrest" => Some(Self::Postgrest),
            "postgres-meta" => Some(Self::PostgresMeta),
            "studio" => Some(Self::Studio),
            "edge-runtime" => Some(Self::EdgeRuntime),
            "logflare" => Some(Self::Logflare),
            "vector" => Some(Self::Vector),
            "supavisor" => Some(Self::Supavisor),
            _ => None,
        }
    }
}

impl fmt::Display for RuntimeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes a caller-supplied exclusion list.
///
/// Known names are matched case-insensitively and de-duplicated with the
/// order of first occurrence preserved; unknown names are dropped silently.
/// Absent or empty input normalizes to an empty list; callers layer their
/// own default-exclusion policy on top via [`apply_default_exclusions`].
#[must_use]
pub fn normalize_excluded<S: AsRef<str>>(requested: Option<&[S]>) -> Vec<RuntimeService> {
    let mut normalized = Vec::new();
    if let Some(requested) = requested {
        for raw in requested {
            if let Some(service) = RuntimeService::parse(raw.as_ref()) {
                if !normalized.contains(&service) {
                    normalized.push(service);
                }
            }
        }
    }
    normalized
}

/// Applies the default-exclusion policy on top of a normalized list.
///
/// An empty list (nothing requested, or nothing survived normalization)
/// falls back to [`DEFAULT_EXCLUDED_SERVICES`]; a non-empty list is the
/// caller's explicit choice and is kept as-is.
#[must_use]
pub fn apply_default_exclusions(normalized: Vec<RuntimeService>) -> Vec<RuntimeService> {
    if normalized.is_empty() {
        DEFAULT_EXCLUDED_SERVICES.to_vec()
    } else {
        normalized
    }
}

/// Renders an exclusion list as a single comma-joined token, or `None` when
/// nothing is excluded.
#[must_use]
pub fn excluded_to_arg(excluded: &[RuntimeService]) -> Option<String> {
    if excluded.is_empty() {
        return None;
    }
    Some(
        excluded
            .iter()
            .map(|service| service.as_str())
            .collect::<Vec<_>>()
            .join(","),
    )
}
