use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use streamvault_session::UploadedPart;

use crate::client::{S3Config, is_retryable_s3_error};
use crate::error::GatewayError;

/// S3 caps multipart uploads at 10,000 parts, each at least 5 MiB except
/// the last.
pub const MAX_MULTIPART_PARTS: u32 = 10_000;
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// A presigned URL the client PUTs one part to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUploadUrl {
    pub part_number: u32,
    pub signed_url: String,
}

/// Outcome of assembling the parts into the final object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedUpload {
    pub location: String,
}

/// Multipart upload lifecycle against an object store. The server
/// implements this with S3 calls; the upload client implements it by
/// speaking the server's JSON protocol.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Registers a new multipart upload and returns its upload id.
    async fn create_upload(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, GatewayError>;

    /// Presigns one upload URL per requested part number.
    async fn part_upload_urls(
        &self,
        file_name: &str,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<Vec<PartUploadUrl>, GatewayError>;

    /// Assembles the uploaded parts into the final object.
    async fn complete_upload(
        &self,
        file_name: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<CompletedUpload, GatewayError>;

    /// Discards an in-progress upload and its stored parts.
    async fn abort_upload(&self, file_name: &str, upload_id: &str) -> Result<(), GatewayError>;
}

/// `StorageGateway` backed by a real S3 (or S3-compatible) bucket.
#[derive(Debug, Clone)]
pub struct S3StorageGateway {
    client: Client,
    bucket: String,
    part_url_expiry: Duration,
}

impl S3StorageGateway {
    pub fn new(client: Client, config: &S3Config) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            part_url_expiry: config.part_url_expiry(),
        }
    }
}

#[async_trait]
impl StorageGateway for S3StorageGateway {
    async fn create_upload(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, GatewayError> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(file_name)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| {
                map_sdk_error(err, "create multipart upload", &self.bucket, file_name)
            })?;

        let upload_id = response.upload_id().ok_or_else(|| {
            GatewayError::retryable(format!("storage returned no upload id for {file_name}"))
        })?;

        info!(
            bucket = %self.bucket,
            key = %file_name,
            upload_id = %upload_id,
            "multipart upload created"
        );

        Ok(upload_id.to_string())
    }

    async fn part_upload_urls(
        &self,
        file_name: &str,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<Vec<PartUploadUrl>, GatewayError> {
        let presign = PresigningConfig::expires_in(self.part_url_expiry)
            .map_err(|err| GatewayError::non_retryable(format!("invalid part URL expiry: {err}")))?;

        let mut urls = Vec::with_capacity(part_numbers.len());
        for &part_number in part_numbers {
            let presigned = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(file_name)
                .upload_id(upload_id)
                .part_number(part_number as i32)
                .presigned(presign.clone())
                .await
                .map_err(|err| map_sdk_error(err, "presign upload part", &self.bucket, file_name))?;

            urls.push(PartUploadUrl {
                part_number,
                signed_url: presigned.uri().to_string(),
            });
        }

        Ok(urls)
    }

    async fn complete_upload(
        &self,
        file_name: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<CompletedUpload, GatewayError> {
        if parts.is_empty() {
            return Err(GatewayError::non_retryable(format!(
                "refusing to complete {file_name} with no parts"
            )));
        }

        // S3 insists on ascending part numbers.
        let mut parts = parts.to_vec();
        parts.sort_by_key(|part| part.part_number);

        let completed: Vec<CompletedPart> = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number as i32)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect();

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        let response = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(file_name)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|err| {
                map_sdk_error(err, "complete multipart upload", &self.bucket, file_name)
            })?;

        let location = response
            .location()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/{}", self.bucket, file_name));

        info!(
            bucket = %self.bucket,
            key = %file_name,
            upload_id = %upload_id,
            parts = parts.len(),
            "multipart upload completed"
        );

        Ok(CompletedUpload { location })
    }

    async fn abort_upload(&self, file_name: &str, upload_id: &str) -> Result<(), GatewayError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(file_name)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, "abort multipart upload", &self.bucket, file_name))?;

        warn!(
            bucket = %self.bucket,
            key = %file_name,
            upload_id = %upload_id,
            "multipart upload aborted"
        );

        Ok(())
    }
}

fn map_sdk_error<E>(err: SdkError<E>, action: &str, bucket: &str, key: &str) -> GatewayError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let retryable = is_retryable_s3_error(&err);
    let message = if let SdkError::ServiceError(service_err) = &err {
        let status = service_err.raw().status().as_u16();
        let code = service_err.err().code().unwrap_or("unknown");
        let mut detail = format!("{action} failed (status {status}, code {code})");
        if let Some(msg) = service_err.err().message() {
            detail.push_str(": ");
            detail.push_str(msg);
        }
        detail.push_str(&format!(" [bucket={bucket}, key={key}]"));
        detail
    } else {
        format!("{action} failed [bucket={bucket}, key={key}]: {err}")
    };

    if retryable {
        GatewayError::retryable(message)
    } else {
        GatewayError::non_retryable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_upload_url_uses_wire_casing() {
        let url = PartUploadUrl {
            part_number: 3,
            signed_url: "https://bucket.example/3".into(),
        };

        let json = serde_json::to_value(&url).unwrap();
        assert_eq!(json["partNumber"], 3);
        assert_eq!(json["signedUrl"], "https://bucket.example/3");
    }

    #[test]
    fn non_service_errors_keep_context_in_the_message() {
        let err: SdkError<
            aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadError,
        > = SdkError::timeout_error("timed out");

        let mapped = map_sdk_error(err, "create multipart upload", "videos", "clip.mp4");
        assert!(mapped.is_retryable());
        let message = mapped.to_string();
        assert!(message.contains("create multipart upload"));
        assert!(message.contains("bucket=videos"));
    }
}
