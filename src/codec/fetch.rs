//! Remote image retrieval.

use crate::codec::Blob;
use crate::error::CodecError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

/// Fetches a remote resource into memory
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Blob, CodecError>;
}

/// HTTP(S) fetcher backed by reqwest. No retry and no timeout.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn fetch_failed(url: &str, reason: impl std::fmt::Display) -> CodecError {
    CodecError::FetchFailed {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Blob, CodecError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_failed(url, e))?
            .error_for_status()
            .map_err(|e| fetch_failed(url, e))?;

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let bytes = response.bytes().await.map_err(|e| fetch_failed(url, e))?;

        debug!(url, size = bytes.len(), mime = ?mime, "Fetched remote image");
        Ok(Blob::new(bytes.to_vec(), mime))
    }
}
