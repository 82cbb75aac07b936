use crate::error::BackendError;
use crate::local::LocalAdapter;
use crate::object_store::ObjectStoreAdapter;
use crate::registry::VideoSource;
use crate::remote::RemoteAdapter;
use crate::types::{ByteStream, SourceMetadata};

/// Dispatches probes and ranged reads to the adapter matching a source
/// descriptor.
#[derive(Debug, Clone)]
pub struct MediaBackend {
    local: LocalAdapter,
    object_store: ObjectStoreAdapter,
    remote: RemoteAdapter,
}

impl MediaBackend {
    pub fn new(object_store: ObjectStoreAdapter, remote: RemoteAdapter) -> Self {
        Self {
            local: LocalAdapter,
            object_store,
            remote,
        }
    }

    pub async fn probe(&self, source: &VideoSource) -> Result<SourceMetadata, BackendError> {
        match source {
            VideoSource::Local { path } => self.local.probe(path).await,
            VideoSource::ObjectStore { bucket, key } => self.object_store.probe(bucket, key).await,
            VideoSource::Remote { url } => self.remote.probe(url).await,
        }
    }

    /// Opens the inclusive span `start..=end`, which must already be
    /// resolved against the probed size.
    pub async fn open_range(
        &self,
        source: &VideoSource,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, BackendError> {
        match source {
            VideoSource::Local { path } => self.local.open_range(path, start, end).await,
            VideoSource::ObjectStore { bucket, key } => {
                self.object_store.open_range(bucket, key, start, end).await
            }
            VideoSource::Remote { url } => self.remote.open_range(url, start, end).await,
        }
    }
}
