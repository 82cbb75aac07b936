use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use reqwest::{Client, StatusCode};
use tracing::warn;

use crate::error::BackendError;
use crate::types::{ByteStream, SourceMetadata};

/// Streams media from a remote HTTP origin: HEAD for metadata, ranged GET
/// for bytes.
#[derive(Debug, Clone)]
pub struct RemoteAdapter {
    client: Client,
}

impl RemoteAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn probe(&self, url: &str) -> Result<SourceMetadata, BackendError> {
        let response = self.client.head(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound);
        }
        let response = response.error_for_status()?;

        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or(BackendError::SizeUnknown)?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        Ok(SourceMetadata {
            content_type,
            content_length,
        })
    }

    pub async fn open_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, BackendError> {
        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound);
        }
        let response = response.error_for_status()?;

        // The origin may have changed since the HEAD probe; its GET headers
        // govern the bytes streamed below.
        let expected = end - start + 1;
        if let Some(declared) = response.content_length() {
            if declared != expected {
                warn!(
                    url,
                    declared, expected, "origin length disagrees with requested range"
                );
            }
        }

        Ok(Box::pin(response.bytes_stream().map_err(BackendError::from)))
    }
}
