//! Response handling shared by the HTTP adapters.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use silence_sync::BackendError;
use tracing::warn;

/// Default timeout for backend requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Build the client used by every adapter.
pub(crate) fn client() -> Result<Client, BackendError> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(BackendError::transport)
}

/// Base URL with any trailing slash removed.
pub(crate) fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Pass the response through when it carries `expected`, otherwise turn it into
/// [`BackendError::Status`] with the body attached.
pub(crate) async fn expect_status(
    response: Response,
    expected: StatusCode,
) -> Result<Response, BackendError> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let text = response.text().await.map_err(BackendError::transport)?;
    serde_json::from_str(&text).map_err(|e| {
        warn!(error = %e, body = %text, "Failed to parse response");
        BackendError::Decode(e.to_string())
    })
}
