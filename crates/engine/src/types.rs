use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::error::BackendError;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

/// Size and content type reported by a backend probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    pub content_type: String,
    pub content_length: u64,
}
