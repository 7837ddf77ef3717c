//! Best-effort protocol-version discovery.

use serde::Deserialize;
use wabridge_core::traits::{ConnectError, ProtocolVersion};

#[derive(Deserialize)]
struct VersionResponse {
    version: [u32; 3],
}

/// Fetch the latest descriptor the sidecar knows about.
///
/// Callers treat failure as non-fatal and keep their cached
/// descriptor.
///
/// # Errors
/// Returns error if the sidecar is unreachable or replies malformed.
pub async fn fetch(
    http: &reqwest::Client,
    base_url: &str,
) -> Result<ProtocolVersion, ConnectError> {
    let url = format!("{base_url}/version");
    let body: VersionResponse = http
        .get(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| ConnectError::Protocol(e.to_string()))?
        .json()
        .await
        .map_err(|e| ConnectError::Protocol(e.to_string()))?;
    Ok(ProtocolVersion(
        body.version[0],
        body.version[1],
        body.version[2],
    ))
}
