use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use streamvault_session::UploadedPart;
use streamvault_store::{CompletedUpload, GatewayError, PartUploadUrl, StorageGateway};

/// `StorageGateway` that speaks the upload server's JSON protocol instead
/// of calling object storage directly. The server side of the same wire
/// format lives in `streamvault-api`.
#[derive(Debug, Clone)]
pub struct HttpStorageGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest<'a> {
    file_name: &'a str,
    content_type: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    upload_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PartUrlsRequest<'a> {
    file_name: &'a str,
    upload_id: &'a str,
    part_numbers: &'a [u32],
}

#[derive(Deserialize)]
struct PartUrlsResponse {
    urls: Vec<PartUploadUrl>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    part_number: u32,
    e_tag: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteRequest<'a> {
    file_name: &'a str,
    upload_id: &'a str,
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
struct CompleteResponse {
    success: bool,
    location: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AbortRequest<'a> {
    file_name: &'a str,
    upload_id: &'a str,
}

#[derive(Deserialize)]
struct AbortResponse {
    success: bool,
}

impl HttpStorageGateway {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    async fn post_json<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, GatewayError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "upload protocol request");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                let message = format!("{path} request failed: {err}");
                if err.is_timeout() || err.is_connect() {
                    GatewayError::retryable(message)
                } else {
                    GatewayError::non_retryable(message)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("{path} returned {status}: {}", body.trim());
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                GatewayError::retryable(message)
            } else {
                GatewayError::non_retryable(message)
            });
        }

        response
            .json()
            .await
            .map_err(|err| GatewayError::non_retryable(format!("{path} returned bad JSON: {err}")))
    }
}

#[async_trait]
impl StorageGateway for HttpStorageGateway {
    async fn create_upload(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, GatewayError> {
        let response: StartResponse = self
            .post_json(
                "/upload/start",
                &StartRequest {
                    file_name,
                    content_type,
                },
            )
            .await?;
        Ok(response.upload_id)
    }

    async fn part_upload_urls(
        &self,
        file_name: &str,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<Vec<PartUploadUrl>, GatewayError> {
        let response: PartUrlsResponse = self
            .post_json(
                "/upload/presigned-urls",
                &PartUrlsRequest {
                    file_name,
                    upload_id,
                    part_numbers,
                },
            )
            .await?;
        Ok(response.urls)
    }

    async fn complete_upload(
        &self,
        file_name: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<CompletedUpload, GatewayError> {
        let parts = parts
            .iter()
            .map(|part| WirePart {
                part_number: part.part_number,
                e_tag: part.etag.clone(),
            })
            .collect();

        let response: CompleteResponse = self
            .post_json(
                "/upload/complete",
                &CompleteRequest {
                    file_name,
                    upload_id,
                    parts,
                },
            )
            .await?;

        if !response.success {
            return Err(GatewayError::retryable(format!(
                "server did not confirm completion of upload {upload_id}"
            )));
        }

        Ok(CompletedUpload {
            location: response.location,
        })
    }

    async fn abort_upload(&self, file_name: &str, upload_id: &str) -> Result<(), GatewayError> {
        let response: AbortResponse = self
            .post_json(
                "/upload/abort",
                &AbortRequest {
                    file_name,
                    upload_id,
                },
            )
            .await?;

        if !response.success {
            return Err(GatewayError::non_retryable(format!(
                "server refused to abort upload {upload_id}"
            )));
        }

        Ok(())
    }
}
