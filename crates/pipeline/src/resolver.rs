//! Input asset resolution.
//!
//! Turns a caller-supplied asset location into bytes ready for upload to
//! the render backend. [`DefaultAssetResolver`] understands `http(s)://`
//! URLs, `data:<mime>;base64,<payload>` URIs and local file paths
//! (optionally prefixed with `file://`).

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;

/// Errors from resolving an input asset.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Asset location must not be empty")]
    EmptyLocation,

    #[error("Asset at {location} is empty")]
    EmptyAsset { location: String },

    #[error("Failed to fetch {location}: {detail}")]
    Request { location: String, detail: String },

    #[error("Fetching {location} returned HTTP {status}")]
    HttpStatus { location: String, status: u16 },

    #[error("Invalid data URI: {detail}")]
    InvalidDataUri { detail: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bytes of an input asset plus a file name suitable for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Loads input assets from wherever the caller says they are.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self, location: &str) -> Result<ResolvedAsset, ResolveError>;
}

/// Resolver for HTTP(S) URLs, base64 `data:` URIs and local paths.
pub struct DefaultAssetResolver {
    client: reqwest::Client,
}

impl Default for DefaultAssetResolver {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new())
    }
}

impl DefaultAssetResolver {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, ResolveError> {
        let request_error = |e: reqwest::Error| ResolveError::Request {
            location: url.to_string(),
            detail: e.to_string(),
        };
        let response = self.client.get(url).send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::HttpStatus {
                location: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ResolveError> {
        tokio::fs::read(path).await.map_err(|source| ResolveError::Io {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl AssetResolver for DefaultAssetResolver {
    async fn resolve(&self, location: &str) -> Result<ResolvedAsset, ResolveError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ResolveError::EmptyLocation);
        }

        let (file_name, bytes) = if location.starts_with("http://") || location.starts_with("https://") {
            (url_file_name(location), self.fetch_url(location).await?)
        } else if let Some(data) = location.strip_prefix("data:") {
            decode_data_uri(data)?
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            (path_file_name(path), self.read_file(path).await?)
        };

        if bytes.is_empty() {
            return Err(ResolveError::EmptyAsset {
                location: abbreviate(location),
            });
        }

        tracing::debug!(
            location = %abbreviate(location),
            file_name = %file_name,
            bytes = bytes.len(),
            "Resolved input asset",
        );
        Ok(ResolvedAsset { file_name, bytes })
    }
}

/// Decode the part of a data URI after `data:`.
fn decode_data_uri(data: &str) -> Result<(String, Vec<u8>), ResolveError> {
    let (header, payload) = data.split_once(',').ok_or_else(|| ResolveError::InvalidDataUri {
        detail: "missing ',' separator".into(),
    })?;
    let Some(mime) = header.strip_suffix(";base64") else {
        return Err(ResolveError::InvalidDataUri {
            detail: "only base64 payloads are supported".into(),
        });
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ResolveError::InvalidDataUri {
            detail: e.to_string(),
        })?;
    Ok((format!("asset.{}", extension_for(mime)), bytes))
}

fn extension_for(mime: &str) -> &'static str {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

fn url_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    match after_scheme.split_once('/') {
        Some((_, rest)) => path_file_name(rest),
        None => "asset".to_string(),
    }
}

fn path_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("asset")
        .to_string()
}

/// Keep `data:` payloads out of logs and error messages.
fn abbreviate(location: &str) -> String {
    const MAX: usize = 64;
    match location.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &location[..cut]),
        None => location.to_string(),
    }
}
