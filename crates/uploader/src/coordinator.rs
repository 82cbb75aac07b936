use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use streamvault_session::{SessionStore, UploadSession, UploadedPart};
use streamvault_store::StorageGateway;

use crate::error::UploadError;
use crate::plan::{self, DEFAULT_CHUNK_SIZE, MAX_MULTIPART_PARTS, PartSpan};
use crate::retry::RetryPolicy;
use crate::source::SourceFile;
use crate::transport::PartTransport;

/// Knobs for one coordinator. The chunk size must stay constant across
/// resumes of the same file or previously recorded parts would no longer
/// line up with their byte spans.
#[derive(Debug, Clone, Copy)]
pub struct UploadConfig {
    pub chunk_size: u64,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// How the session for a file was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionResolution {
    /// No stored session existed; a new upload was started.
    Fresh,
    /// A stored session matched the file's identity and was reused.
    Resumed { recorded_parts: usize },
    /// A stored session existed but its identity no longer matched the
    /// file, so a new upload replaced it.
    Replaced,
}

/// Summary of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub location: String,
    pub resolution: SessionResolution,
    pub total_parts: u32,
    pub parts_reused: usize,
    pub parts_transferred: usize,
}

/// Snapshot handed to the progress observer after each persisted part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub recorded_parts: usize,
    pub total_parts: u32,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total_parts == 0 {
            return 100;
        }
        ((self.recorded_parts as f64 / self.total_parts as f64) * 100.0).round() as u8
    }
}

type ProgressFn = dyn Fn(UploadProgress) + Send + Sync;

/// Drives one file at a time through session resolution, part transfer,
/// and completion. Progress is persisted after every part, so a failed
/// or interrupted run resumes from the parts that already landed.
pub struct UploadCoordinator<G, S, T> {
    gateway: G,
    store: S,
    transport: Arc<T>,
    config: UploadConfig,
    progress: Option<Box<ProgressFn>>,
}

impl<G, S, T> UploadCoordinator<G, S, T>
where
    G: StorageGateway,
    S: SessionStore,
    T: PartTransport + 'static,
{
    pub fn new(gateway: G, store: S, transport: T, config: UploadConfig) -> Self {
        Self {
            gateway,
            store,
            transport: Arc::new(transport),
            config,
            progress: None,
        }
    }

    /// Registers an observer invoked after every persisted part.
    pub fn with_progress(
        mut self,
        observer: impl Fn(UploadProgress) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Box::new(observer));
        self
    }

    /// Uploads the whole file: resolve, transfer what is pending, then
    /// assemble. Returns the final object location.
    pub async fn upload(&self, source: &SourceFile) -> Result<UploadOutcome, UploadError> {
        if source.size == 0 {
            return Err(UploadError::EmptyFile);
        }
        let total_parts = plan::total_parts(source.size, self.config.chunk_size);
        if total_parts > MAX_MULTIPART_PARTS {
            return Err(UploadError::TooManyParts {
                total: total_parts,
                max: MAX_MULTIPART_PARTS,
            });
        }

        let (mut session, resolution) = self.resolve(source).await?;
        let parts_reused = session.part_count();

        let parts_transferred = self.transfer(source, &mut session).await?;
        let location = self.complete(&session).await?;

        Ok(UploadOutcome {
            location,
            resolution,
            total_parts,
            parts_reused,
            parts_transferred,
        })
    }

    /// Finds a resumable session for the file or starts a fresh one. A
    /// stored session whose identity fields disagree with the file is
    /// never reused; the fresh session overwrites it.
    pub async fn resolve(
        &self,
        source: &SourceFile,
    ) -> Result<(UploadSession, SessionResolution), UploadError> {
        let file_key = UploadSession::file_key(&source.file_name, source.size);

        match self.store.get(&file_key).await? {
            Some(existing)
                if existing.matches(&source.file_name, source.size, source.last_modified_ms) =>
            {
                info!(
                    file_key = %file_key,
                    upload_id = %existing.upload_id,
                    recorded_parts = existing.part_count(),
                    "resuming stored upload session"
                );
                let recorded_parts = existing.part_count();
                Ok((existing, SessionResolution::Resumed { recorded_parts }))
            }
            Some(stale) => {
                warn!(
                    file_key = %file_key,
                    upload_id = %stale.upload_id,
                    "stored session identity mismatch, starting a fresh upload"
                );
                let session = self.start_session(source).await?;
                Ok((session, SessionResolution::Replaced))
            }
            None => {
                let session = self.start_session(source).await?;
                Ok((session, SessionResolution::Fresh))
            }
        }
    }

    async fn start_session(&self, source: &SourceFile) -> Result<UploadSession, UploadError> {
        let upload_id = self
            .gateway
            .create_upload(&source.file_name, &source.content_type)
            .await?;

        let session = UploadSession::new(
            upload_id,
            source.file_name.clone(),
            source.size,
            source.content_type.clone(),
            source.last_modified_ms,
        );
        self.store.put(&session).await?;

        info!(
            file_key = %session.file_key,
            upload_id = %session.upload_id,
            file_size = source.size,
            "started upload session"
        );
        Ok(session)
    }

    /// Transfers every part the session does not yet record, up to
    /// `concurrency` at a time, persisting the session after each part
    /// lands. On failure the parts that did land stay recorded and the
    /// session is kept, so the error is returned only after in-flight
    /// parts have drained. Returns the number of parts transferred.
    pub async fn transfer(
        &self,
        source: &SourceFile,
        session: &mut UploadSession,
    ) -> Result<usize, UploadError> {
        let pending = plan::pending_parts(session, self.config.chunk_size);
        if pending.is_empty() {
            return Ok(0);
        }

        let part_numbers: Vec<u32> = pending.iter().map(|span| span.part_number).collect();
        let urls = self
            .gateway
            .part_upload_urls(&session.file_name, &session.upload_id, &part_numbers)
            .await?;
        let mut url_by_part: HashMap<u32, String> = urls
            .into_iter()
            .map(|url| (url.part_number, url.signed_url))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut workers: JoinSet<Result<UploadedPart, UploadError>> = JoinSet::new();

        for span in pending {
            let signed_url = url_by_part
                .remove(&span.part_number)
                .ok_or(UploadError::MissingPartUrl(span.part_number))?;
            let semaphore = Arc::clone(&semaphore);
            let transport = Arc::clone(&self.transport);
            let path = source.path.clone();
            let retry = self.config.retry;

            workers.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| UploadError::Worker("upload semaphore closed".into()))?;
                let bytes = read_span(&path, span).await?;
                let etag =
                    put_with_retry(transport.as_ref(), &signed_url, bytes, span.part_number, retry)
                        .await?;
                Ok(UploadedPart {
                    part_number: span.part_number,
                    etag,
                })
            });
        }

        let total_parts = plan::total_parts(session.file_size, self.config.chunk_size);
        let mut transferred = 0;
        let mut first_error: Option<UploadError> = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(part)) => {
                    if session.record_part(part) {
                        transferred += 1;
                        self.store.put(session).await?;
                        if let Some(observer) = &self.progress {
                            observer(UploadProgress {
                                recorded_parts: session.part_count(),
                                total_parts,
                            });
                        }
                    }
                }
                Ok(Err(err)) => first_error = first_error.or(Some(err)),
                Err(join_err) => {
                    first_error = first_error.or(Some(UploadError::Worker(join_err.to_string())));
                }
            }
        }

        if let Some(err) = first_error {
            warn!(
                file_key = %session.file_key,
                recorded_parts = session.part_count(),
                "part transfer failed, session kept for a future resume"
            );
            return Err(err);
        }
        Ok(transferred)
    }

    /// Assembles the object once every part is recorded, then deletes
    /// the session. A completion failure keeps the session so it can be
    /// retried without re-uploading anything.
    pub async fn complete(&self, session: &UploadSession) -> Result<String, UploadError> {
        let total = plan::total_parts(session.file_size, self.config.chunk_size);
        let missing: Vec<u32> = (1..=total)
            .filter(|number| !session.has_part(*number))
            .collect();
        if !missing.is_empty() {
            return Err(UploadError::IncompletePartSet { missing });
        }

        let completed = self
            .gateway
            .complete_upload(&session.file_name, &session.upload_id, &session.uploaded_parts)
            .await
            .map_err(UploadError::CompletionFailed)?;

        self.store.delete(&session.file_key).await?;
        info!(
            file_key = %session.file_key,
            upload_id = %session.upload_id,
            location = %completed.location,
            "upload completed"
        );
        Ok(completed.location)
    }

    /// Drops a stored session and asks the server to discard its parts.
    /// The session record is removed even when the remote abort fails.
    pub async fn abandon(&self, file_key: &str) -> Result<(), UploadError> {
        let session = self
            .store
            .get(file_key)
            .await?
            .ok_or_else(|| UploadError::SessionNotFound(file_key.to_string()))?;

        if let Err(err) = self
            .gateway
            .abort_upload(&session.file_name, &session.upload_id)
            .await
        {
            warn!(
                file_key = %file_key,
                upload_id = %session.upload_id,
                error = %err,
                "remote abort failed, removing local session anyway"
            );
        }

        self.store.delete(file_key).await?;
        info!(file_key = %file_key, "upload session abandoned");
        Ok(())
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }
}

async fn read_span(path: &Path, span: PartSpan) -> Result<Bytes, UploadError> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(span.offset)).await?;
    let mut buffer = vec![0u8; span.length as usize];
    file.read_exact(&mut buffer).await?;
    Ok(Bytes::from(buffer))
}

async fn put_with_retry<T: PartTransport + ?Sized>(
    transport: &T,
    signed_url: &str,
    bytes: Bytes,
    part_number: u32,
    retry: RetryPolicy,
) -> Result<String, UploadError> {
    let max_attempts = retry.max_attempts();
    let mut attempt = 0;

    // Retry transient failures with backoff; anything else stops the part.
    loop {
        attempt += 1;
        match transport.put_part(signed_url, bytes.clone()).await {
            Ok(etag) => {
                info!(part_number, attempt, bytes = bytes.len(), "part uploaded");
                return Ok(etag);
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let backoff = retry.backoff_for(attempt);
                warn!(
                    part_number,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "part upload failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => {
                return Err(UploadError::PartTransferFailed {
                    part_number,
                    attempts: attempt,
                    source: err,
                });
            }
        }
    }
}
