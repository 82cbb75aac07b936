use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failure putting one part to its signed URL.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("part upload request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("part upload rejected with status {status}")]
    Status { status: u16 },
    #[error("part upload response carried no ETag header")]
    MissingEtag,
}

impl TransportError {
    /// Connection and timeout errors, throttling and server-side
    /// statuses, and a missing ETag are all worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Status { status } => {
                *status == 408 || *status == 429 || (500..=599).contains(status)
            }
            Self::MissingEtag => true,
        }
    }
}

/// Moves one part's bytes to its time-limited signed URL and returns the
/// entity tag the backend assigned.
#[async_trait]
pub trait PartTransport: Send + Sync {
    async fn put_part(&self, signed_url: &str, body: Bytes) -> Result<String, TransportError>;
}

/// `PartTransport` over plain HTTP PUT. Signed URLs cover only the verb,
/// key, and expiry, so no extra headers are attached.
#[derive(Debug, Clone)]
pub struct HttpPartTransport {
    client: reqwest::Client,
}

impl HttpPartTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PartTransport for HttpPartTransport {
    async fn put_part(&self, signed_url: &str, body: Bytes) -> Result<String, TransportError> {
        let response = self.client.put(signed_url).body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(TransportError::MissingEtag)
    }
}
