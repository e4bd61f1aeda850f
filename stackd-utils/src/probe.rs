//! Lightweight HTTP readiness probes.

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sends a `HEAD` request and reports whether the endpoint answered with a
/// success status before `cancel` fired.
///
/// Probes are read-only and idempotent; a failed or cancelled probe is just
/// `false`, never an error.
pub async fn check_http(client: &reqwest::Client, url: &str, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => {
            debug!("probe cancelled for {url}");
            false
        }
        result = client.head(url).send() => match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("probe failed for {url}: {e}");
                false
            }
        }
    }
}
