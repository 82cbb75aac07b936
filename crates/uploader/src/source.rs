use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::UploadError;

/// The file being uploaded, with the identity fields a resumed session is
/// checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified_ms: i64,
}

impl SourceFile {
    /// Stats `path` and derives name, size, guessed content type, and
    /// modification time in epoch milliseconds.
    pub async fn inspect(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(UploadError::InvalidSource(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                UploadError::InvalidSource(format!("{} has no usable file name", path.display()))
            })?;

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        let last_modified_ms = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0);

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
            content_type,
            last_modified_ms,
        })
    }
}
