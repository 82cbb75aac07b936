use std::io::SeekFrom;
use std::path::Path;

use futures::TryStreamExt;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader};
use tokio_util::io::ReaderStream;

use crate::error::BackendError;
use crate::types::{ByteStream, SourceMetadata};

/// Serves media straight off the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAdapter;

impl LocalAdapter {
    pub async fn probe(&self, path: &Path) -> Result<SourceMetadata, BackendError> {
        let meta = fs::metadata(path).await.map_err(not_found_or_io)?;
        if !meta.is_file() {
            return Err(BackendError::NotFound);
        }

        Ok(SourceMetadata {
            content_type: guess_content_type(path),
            content_length: meta.len(),
        })
    }

    /// Opens the file at `start` and reads exactly `end - start + 1` bytes.
    pub async fn open_range(
        &self,
        path: &Path,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, BackendError> {
        let mut file = fs::File::open(path).await.map_err(not_found_or_io)?;
        file.seek(SeekFrom::Start(start)).await?;

        let reader = BufReader::new(file).take(end - start + 1);
        let stream = ReaderStream::new(reader).map_err(BackendError::from);

        Ok(Box::pin(stream))
    }
}

fn not_found_or_io(err: std::io::Error) -> BackendError {
    if err.kind() == std::io::ErrorKind::NotFound {
        BackendError::NotFound
    } else {
        BackendError::Io(err)
    }
}

fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::path::PathBuf;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("streamvault-local-{}-{}", uuid::Uuid::new_v4(), name))
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn probe_reports_size_and_content_type() {
        let path = scratch_file("probe.mp4");
        fs::write(&path, vec![0u8; 1000]).await.unwrap();

        let meta = LocalAdapter.probe(&path).await.unwrap();
        assert_eq!(meta.content_length, 1000);
        assert_eq!(meta.content_type, "video/mp4");

        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn probe_missing_file_is_not_found() {
        let path = scratch_file("missing.mp4");
        let err = LocalAdapter.probe(&path).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound));
    }

    #[tokio::test]
    async fn open_range_yields_exactly_the_requested_bytes() {
        let path = scratch_file("range.bin");
        let content: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
        fs::write(&path, &content).await.unwrap();

        let stream = LocalAdapter.open_range(&path, 10, 19).await.unwrap();
        assert_eq!(collect(stream).await, &content[10..=19]);

        let stream = LocalAdapter.open_range(&path, 500, 999).await.unwrap();
        assert_eq!(collect(stream).await, &content[500..]);

        let _ = fs::remove_file(&path).await;
    }
}
