//! Response handling shared by the HTTP backend dialects.

use serde::de::DeserializeOwned;

use crate::backend::BackendError;

/// Send a request, mapping transport failures to
/// [`BackendError::Unreachable`].
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    url: &str,
) -> Result<reqwest::Response, BackendError> {
    request.send().await.map_err(|e| unreachable(url, &e))
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or [`BackendError::Rejected`] carrying the
/// status and the raw body text on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(BackendError::Rejected {
            status: status.as_u16(),
            detail,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
pub(crate) async fn parse_json<T: DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
) -> Result<T, BackendError> {
    let response = ensure_success(response).await?;
    let text = response.text().await.map_err(|e| unreachable(url, &e))?;
    serde_json::from_str(&text).map_err(|e| BackendError::MalformedResponse {
        detail: format!("{e} in body {}", truncate(&text, 512)),
    })
}

/// Read a successful response body as raw bytes.
pub(crate) async fn read_bytes(
    response: reqwest::Response,
    url: &str,
) -> Result<Vec<u8>, BackendError> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await.map_err(|e| unreachable(url, &e))?;
    Ok(bytes.to_vec())
}

/// Discard the body of a successful response.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<(), BackendError> {
    ensure_success(response).await?;
    Ok(())
}

fn unreachable(url: &str, e: &reqwest::Error) -> BackendError {
    BackendError::Unreachable {
        url: url.to_string(),
        detail: e.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
