use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, timeout::TimeoutConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::{Region, StalledStreamProtectionConfig},
    error::SdkError,
};
use http::Uri;
use serde::{Deserialize, Serialize};

const DEFAULT_PART_URL_EXPIRY_SECS: u64 = 3600;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the bucket that receives multipart uploads.
///
/// `endpoint` stays `None` for AWS itself; S3-compatible stores (MinIO,
/// Wasabi, ...) set it together with `force_path_style = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub force_path_style: bool,
    pub part_url_expiry_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
}

impl S3Config {
    /// How long presigned part URLs stay valid.
    pub fn part_url_expiry(&self) -> Duration {
        Duration::from_secs(
            self.part_url_expiry_secs
                .unwrap_or(DEFAULT_PART_URL_EXPIRY_SECS),
        )
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS))
    }
}

/// Transient failures (timeouts, connection drops, throttling, 5xx) are
/// worth retrying; everything else is not.
pub fn is_retryable_s3_error<E>(err: &SdkError<E>) -> bool {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            matches!(status, 408 | 429) || (500..=599).contains(&status)
        }
        _ => false,
    }
}

pub async fn build_s3_client(config: &S3Config) -> Result<Client> {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "streamvault",
    );

    let region = Region::new(config.region.clone());
    let shared_config = aws_config::defaults(BehaviorVersion::latest())
        .region(region.clone())
        .credentials_provider(credentials)
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(config.connect_timeout())
                .read_timeout(config.read_timeout())
                .build(),
        )
        .load()
        .await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared_config)
        .region(region)
        .force_path_style(config.force_path_style)
        .stalled_stream_protection(StalledStreamProtectionConfig::disabled());

    if let Some(endpoint) = &config.endpoint {
        let endpoint = format!("{}/", endpoint.trim_end_matches('/'));
        Uri::from_str(&endpoint).context("invalid s3 endpoint URL")?;
        builder = builder.endpoint_url(endpoint);
    }

    Ok(Client::from_conf(builder.build()))
}
