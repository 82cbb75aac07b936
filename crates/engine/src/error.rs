use thiserror::Error;

/// Failure modes shared by every backend adapter. `NotFound` and
/// `SizeUnknown` are distinguished so the serving layer can answer 404
/// versus 500; everything else is a plain backend failure.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("resource not found")]
    NotFound,

    #[error("origin did not declare a content length")]
    SizeUnknown,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("origin request failed: {0}")]
    Origin(#[from] reqwest::Error),
}
