use thiserror::Error;

use streamvault_session::StoreError;
use streamvault_store::GatewayError;

use crate::transport::TransportError;

/// Everything that can go wrong while driving an upload. Failures leave
/// the persisted session in place so a later run can resume; only a
/// successful completion deletes it.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no upload session recorded for {0}")]
    SessionNotFound(String),

    #[error("{0}")]
    InvalidSource(String),

    #[error("refusing to upload an empty file")]
    EmptyFile,

    #[error("{total} parts exceed the {max} part limit, use a larger chunk size")]
    TooManyParts { total: u32, max: u32 },

    #[error("server returned no upload URL for part {0}")]
    MissingPartUrl(u32),

    #[error("part {part_number} failed after {attempts} attempt(s): {source}")]
    PartTransferFailed {
        part_number: u32,
        attempts: usize,
        #[source]
        source: TransportError,
    },

    #[error("upload cannot complete, parts {missing:?} were never transferred")]
    IncompletePartSet { missing: Vec<u32> },

    #[error("completing the upload failed: {0}")]
    CompletionFailed(#[source] GatewayError),

    #[error("storage gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("upload worker failed: {0}")]
    Worker(String),
}
