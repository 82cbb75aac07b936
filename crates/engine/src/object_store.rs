use aws_sdk_s3::Client;
use futures::TryStreamExt;
use tokio_util::io::ReaderStream;

use crate::error::BackendError;
use crate::types::{ByteStream, SourceMetadata};

/// Streams media from a bucket in an S3-compatible object store.
#[derive(Debug, Clone)]
pub struct ObjectStoreAdapter {
    client: Client,
}

impl ObjectStoreAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn probe(&self, bucket: &str, key: &str) -> Result<SourceMetadata, BackendError> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_not_found())
                {
                    BackendError::NotFound
                } else {
                    BackendError::ObjectStore(err.to_string())
                }
            })?;

        let content_length = head
            .content_length()
            .filter(|len| *len >= 0)
            .ok_or(BackendError::SizeUnknown)? as u64;

        Ok(SourceMetadata {
            content_type: head
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string(),
            content_length,
        })
    }

    pub async fn open_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, BackendError> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key())
                {
                    BackendError::NotFound
                } else {
                    BackendError::ObjectStore(err.to_string())
                }
            })?;

        let reader = object.body.into_async_read();
        Ok(Box::pin(ReaderStream::new(reader).map_err(BackendError::from)))
    }
}
