use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use streamvault_session::{MemorySessionStore, SessionStore, UploadSession, UploadedPart};
use streamvault_store::{CompletedUpload, GatewayError, PartUploadUrl, StorageGateway};
use streamvault_uploader::{
    PartTransport, RetryPolicy, SessionResolution, SourceFile, TransportError, UploadConfig,
    UploadCoordinator, UploadError,
};

const CHUNK: u64 = 1024;

/// Gateway double that hands out sequential upload ids and records every
/// call so tests can assert on the protocol traffic.
#[derive(Clone, Default)]
struct RecordingGateway {
    created: Arc<AtomicUsize>,
    url_requests: Arc<Mutex<Vec<Vec<u32>>>>,
    completions: Arc<Mutex<Vec<(String, Vec<(u32, String)>)>>>,
    aborts: Arc<Mutex<Vec<(String, String)>>>,
    fail_create: bool,
    fail_complete: bool,
}

#[async_trait]
impl StorageGateway for RecordingGateway {
    async fn create_upload(
        &self,
        _file_name: &str,
        _content_type: &str,
    ) -> Result<String, GatewayError> {
        if self.fail_create {
            return Err(GatewayError::retryable("injected create failure"));
        }
        let serial = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("upload-{serial}"))
    }

    async fn part_upload_urls(
        &self,
        _file_name: &str,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<Vec<PartUploadUrl>, GatewayError> {
        self.url_requests.lock().await.push(part_numbers.to_vec());
        Ok(part_numbers
            .iter()
            .map(|&number| PartUploadUrl {
                part_number: number,
                signed_url: format!("fake://{upload_id}/{number}"),
            })
            .collect())
    }

    async fn complete_upload(
        &self,
        file_name: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<CompletedUpload, GatewayError> {
        if self.fail_complete {
            return Err(GatewayError::retryable("injected completion failure"));
        }
        let recorded = parts
            .iter()
            .map(|part| (part.part_number, part.etag.clone()))
            .collect();
        self.completions
            .lock()
            .await
            .push((upload_id.to_string(), recorded));
        Ok(CompletedUpload {
            location: format!("https://store.example/{file_name}"),
        })
    }

    async fn abort_upload(&self, file_name: &str, upload_id: &str) -> Result<(), GatewayError> {
        self.aborts
            .lock()
            .await
            .push((file_name.to_string(), upload_id.to_string()));
        Ok(())
    }
}

/// Transport double keyed by the part number encoded at the end of each
/// fake signed URL. Can inject transient and permanent failures, and
/// tracks how many transfers ran at once.
#[derive(Clone, Default)]
struct FakeTransport {
    bodies: Arc<Mutex<HashMap<u32, Bytes>>>,
    attempts: Arc<Mutex<HashMap<u32, usize>>>,
    flaky: Arc<Mutex<HashMap<u32, usize>>>,
    poisoned: Option<u32>,
    hold_ms: u64,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FakeTransport {
    fn flaky_part(part_number: u32, failures: usize) -> Self {
        let transport = Self::default();
        transport
            .flaky
            .try_lock()
            .unwrap()
            .insert(part_number, failures);
        transport
    }

    async fn attempts_for(&self, part_number: u32) -> usize {
        self.attempts
            .lock()
            .await
            .get(&part_number)
            .copied()
            .unwrap_or(0)
    }

    async fn body_for(&self, part_number: u32) -> Option<Bytes> {
        self.bodies.lock().await.get(&part_number).cloned()
    }
}

#[async_trait]
impl PartTransport for FakeTransport {
    async fn put_part(&self, signed_url: &str, body: Bytes) -> Result<String, TransportError> {
        let part_number: u32 = signed_url
            .rsplit('/')
            .next()
            .and_then(|tail| tail.parse().ok())
            .unwrap();
        *self
            .attempts
            .lock()
            .await
            .entry(part_number)
            .or_insert(0) += 1;

        let running = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if self.hold_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.hold_ms)).await;
        }
        self.live.fetch_sub(1, Ordering::SeqCst);

        if self.poisoned == Some(part_number) {
            return Err(TransportError::Status { status: 403 });
        }
        if let Some(remaining) = self.flaky.lock().await.get_mut(&part_number) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Status { status: 503 });
            }
        }

        self.bodies.lock().await.insert(part_number, body);
        Ok(format!("\"etag-{part_number}\""))
    }
}

fn fixture_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn write_source(len: usize) -> (SourceFile, Vec<u8>) {
    let path = std::env::temp_dir().join(format!(
        "streamvault-coordinator-{}.mp4",
        uuid::Uuid::new_v4()
    ));
    let bytes = fixture_bytes(len);
    tokio::fs::write(&path, &bytes).await.unwrap();
    let source = SourceFile::inspect(&path).await.unwrap();
    (source, bytes)
}

fn test_config() -> UploadConfig {
    UploadConfig {
        chunk_size: CHUNK,
        concurrency: 3,
        retry: RetryPolicy {
            max_retries: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
        },
    }
}

fn coordinator(
    gateway: &RecordingGateway,
    store: &MemorySessionStore,
    transport: &FakeTransport,
) -> UploadCoordinator<RecordingGateway, MemorySessionStore, FakeTransport> {
    UploadCoordinator::new(
        gateway.clone(),
        store.clone(),
        transport.clone(),
        test_config(),
    )
}

#[tokio::test]
async fn fresh_upload_transfers_every_part_and_completes() {
    let (source, bytes) = write_source(3 * CHUNK as usize + 512).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::default();

    let outcome = coordinator(&gateway, &store, &transport)
        .upload(&source)
        .await
        .unwrap();

    assert_eq!(outcome.resolution, SessionResolution::Fresh);
    assert_eq!(outcome.total_parts, 4);
    assert_eq!(outcome.parts_transferred, 4);
    assert_eq!(outcome.parts_reused, 0);
    assert_eq!(
        outcome.location,
        format!("https://store.example/{}", source.file_name)
    );

    // Reassembling the transferred bodies in part order restores the file.
    let mut reassembled = Vec::new();
    for part_number in 1..=4 {
        reassembled.extend_from_slice(&transport.body_for(part_number).await.unwrap());
    }
    assert_eq!(reassembled, bytes);

    // Completion saw every part in ascending order, and the session is gone.
    let completions = gateway.completions.lock().await;
    assert_eq!(completions.len(), 1);
    let numbers: Vec<u32> = completions[0].1.iter().map(|(number, _)| *number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    let file_key = UploadSession::file_key(&source.file_name, source.size);
    assert!(store.get(&file_key).await.unwrap().is_none());
}

#[tokio::test]
async fn resume_transfers_only_the_pending_parts() {
    let (source, _) = write_source(4 * CHUNK as usize).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::default();

    let mut seeded = UploadSession::new(
        "upload-seeded".into(),
        source.file_name.clone(),
        source.size,
        source.content_type.clone(),
        source.last_modified_ms,
    );
    seeded.record_part(UploadedPart {
        part_number: 1,
        etag: "\"seed-1\"".into(),
    });
    seeded.record_part(UploadedPart {
        part_number: 3,
        etag: "\"seed-3\"".into(),
    });
    store.put(&seeded).await.unwrap();

    let outcome = coordinator(&gateway, &store, &transport)
        .upload(&source)
        .await
        .unwrap();

    assert_eq!(
        outcome.resolution,
        SessionResolution::Resumed { recorded_parts: 2 }
    );
    assert_eq!(outcome.parts_reused, 2);
    assert_eq!(outcome.parts_transferred, 2);

    // No fresh upload was started and only parts 2 and 4 asked for URLs.
    assert_eq!(gateway.created.load(Ordering::SeqCst), 0);
    assert_eq!(*gateway.url_requests.lock().await, vec![vec![2, 4]]);

    // Completion interleaves seeded and new tags in ascending part order.
    let completions = gateway.completions.lock().await;
    assert_eq!(completions[0].0, "upload-seeded");
    assert_eq!(
        completions[0].1,
        vec![
            (1, "\"seed-1\"".to_string()),
            (2, "\"etag-2\"".to_string()),
            (3, "\"seed-3\"".to_string()),
            (4, "\"etag-4\"".to_string()),
        ]
    );
}

#[tokio::test]
async fn identity_mismatch_starts_a_fresh_upload() {
    let (source, _) = write_source(2 * CHUNK as usize).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::default();

    let mut stale = UploadSession::new(
        "upload-stale".into(),
        source.file_name.clone(),
        source.size,
        source.content_type.clone(),
        source.last_modified_ms - 1_000,
    );
    stale.record_part(UploadedPart {
        part_number: 1,
        etag: "\"stale-1\"".into(),
    });
    store.put(&stale).await.unwrap();

    let outcome = coordinator(&gateway, &store, &transport)
        .upload(&source)
        .await
        .unwrap();

    assert_eq!(outcome.resolution, SessionResolution::Replaced);
    assert_eq!(outcome.parts_reused, 0);
    assert_eq!(outcome.parts_transferred, 2);

    // The stale upload id is never reused; every part transfers again.
    assert_eq!(gateway.created.load(Ordering::SeqCst), 1);
    assert_eq!(*gateway.url_requests.lock().await, vec![vec![1, 2]]);
    let completions = gateway.completions.lock().await;
    assert_eq!(completions[0].0, "upload-1");
}

#[tokio::test]
async fn part_failure_keeps_the_session_for_resume() {
    let (source, _) = write_source(4 * CHUNK as usize).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport {
        poisoned: Some(3),
        ..FakeTransport::default()
    };

    let err = coordinator(&gateway, &store, &transport)
        .upload(&source)
        .await
        .unwrap_err();

    match err {
        UploadError::PartTransferFailed {
            part_number,
            attempts,
            ..
        } => {
            assert_eq!(part_number, 3);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected PartTransferFailed, got {other:?}"),
    }

    // The parts that did land are persisted; nothing was completed.
    let file_key = UploadSession::file_key(&source.file_name, source.size);
    let session = store.get(&file_key).await.unwrap().unwrap();
    let recorded: Vec<u32> = session
        .uploaded_parts
        .iter()
        .map(|part| part.part_number)
        .collect();
    assert_eq!(recorded, vec![1, 2, 4]);
    assert!(gateway.completions.lock().await.is_empty());
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let (source, _) = write_source(3 * CHUNK as usize).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::flaky_part(2, 2);

    let outcome = coordinator(&gateway, &store, &transport)
        .upload(&source)
        .await
        .unwrap();

    assert_eq!(outcome.parts_transferred, 3);
    assert_eq!(transport.attempts_for(2).await, 3);
    assert_eq!(transport.attempts_for(1).await, 1);
}

#[tokio::test]
async fn retry_exhaustion_fails_the_part_and_keeps_the_session() {
    let (source, _) = write_source(2 * CHUNK as usize).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::flaky_part(1, 10);

    let err = coordinator(&gateway, &store, &transport)
        .upload(&source)
        .await
        .unwrap_err();

    match err {
        UploadError::PartTransferFailed {
            part_number,
            attempts,
            source: cause,
        } => {
            assert_eq!(part_number, 1);
            assert_eq!(attempts, 3);
            assert!(cause.is_retryable());
        }
        other => panic!("expected PartTransferFailed, got {other:?}"),
    }

    let file_key = UploadSession::file_key(&source.file_name, source.size);
    assert!(store.get(&file_key).await.unwrap().is_some());
}

#[tokio::test]
async fn completion_failure_retries_without_reuploading_parts() {
    let (source, _) = write_source(2 * CHUNK as usize).await;
    let store = MemorySessionStore::new();
    let transport = FakeTransport::default();

    let failing = RecordingGateway {
        fail_complete: true,
        ..RecordingGateway::default()
    };
    let err = coordinator(&failing, &store, &transport)
        .upload(&source)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::CompletionFailed(_)));

    // Every part is recorded, so the next run only needs to complete.
    let healthy = RecordingGateway::default();
    let outcome = coordinator(&healthy, &store, &transport)
        .upload(&source)
        .await
        .unwrap();

    assert_eq!(
        outcome.resolution,
        SessionResolution::Resumed { recorded_parts: 2 }
    );
    assert_eq!(outcome.parts_transferred, 0);
    assert_eq!(healthy.created.load(Ordering::SeqCst), 0);
    assert!(healthy.url_requests.lock().await.is_empty());
    assert_eq!(transport.attempts_for(1).await, 1);
    assert_eq!(transport.attempts_for(2).await, 1);

    let file_key = UploadSession::file_key(&source.file_name, source.size);
    assert!(store.get(&file_key).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_files_are_rejected_before_any_session_is_created() {
    let (source, _) = write_source(0).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::default();

    let err = coordinator(&gateway, &store, &transport)
        .upload(&source)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::EmptyFile));
    assert_eq!(gateway.created.load(Ordering::SeqCst), 0);
    assert!(store.list_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn plans_past_the_part_limit_are_rejected_up_front() {
    let (source, _) = write_source(10 * CHUNK as usize + 240).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::default();

    let config = UploadConfig {
        chunk_size: 1,
        ..test_config()
    };
    let err = UploadCoordinator::new(gateway.clone(), store.clone(), transport, config)
        .upload(&source)
        .await
        .unwrap_err();

    match err {
        UploadError::TooManyParts { total, max } => {
            assert_eq!(total, 10 * CHUNK as u32 + 240);
            assert_eq!(max, 10_000);
        }
        other => panic!("expected TooManyParts, got {other:?}"),
    }
    assert_eq!(gateway.created.load(Ordering::SeqCst), 0);
    assert!(store.list_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn complete_refuses_a_session_with_missing_parts() {
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::default();

    let mut session = UploadSession::new(
        "upload-1".into(),
        "movie.mp4".into(),
        3 * CHUNK,
        "video/mp4".into(),
        1_700_000_000_000,
    );
    session.record_part(UploadedPart {
        part_number: 1,
        etag: "\"a\"".into(),
    });
    session.record_part(UploadedPart {
        part_number: 3,
        etag: "\"c\"".into(),
    });

    let err = coordinator(&gateway, &store, &transport)
        .complete(&session)
        .await
        .unwrap_err();

    match err {
        UploadError::IncompletePartSet { missing } => assert_eq!(missing, vec![2]),
        other => panic!("expected IncompletePartSet, got {other:?}"),
    }
    assert!(gateway.completions.lock().await.is_empty());
}

#[tokio::test]
async fn abandon_aborts_the_remote_upload_and_deletes_the_session() {
    let (source, _) = write_source(CHUNK as usize).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::default();

    let seeded = UploadSession::new(
        "upload-seeded".into(),
        source.file_name.clone(),
        source.size,
        source.content_type.clone(),
        source.last_modified_ms,
    );
    let file_key = seeded.file_key.clone();
    store.put(&seeded).await.unwrap();

    coordinator(&gateway, &store, &transport)
        .abandon(&file_key)
        .await
        .unwrap();

    assert_eq!(
        *gateway.aborts.lock().await,
        vec![(source.file_name.clone(), "upload-seeded".to_string())]
    );
    assert!(store.get(&file_key).await.unwrap().is_none());
}

#[tokio::test]
async fn abandon_without_a_session_reports_session_not_found() {
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport::default();

    let err = coordinator(&gateway, &store, &transport)
        .abandon("missing.mp4-123")
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::SessionNotFound(_)));
}

#[tokio::test]
async fn progress_is_reported_after_every_persisted_part() {
    let (source, _) = write_source(4 * CHUNK as usize).await;
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let coordinator = UploadCoordinator::new(
        RecordingGateway::default(),
        MemorySessionStore::new(),
        FakeTransport::default(),
        test_config(),
    )
    .with_progress(move |progress| {
        sink.lock()
            .unwrap()
            .push((progress.recorded_parts, progress.percent()));
    });

    coordinator.upload(&source).await.unwrap();

    let seen = seen.lock().unwrap();
    let counts: Vec<usize> = seen.iter().map(|(recorded, _)| *recorded).collect();
    assert_eq!(counts, vec![1, 2, 3, 4]);
    assert_eq!(seen.last(), Some(&(4, 100)));
}

#[tokio::test]
async fn concurrent_transfers_stay_within_the_worker_bound() {
    let (source, _) = write_source(6 * CHUNK as usize).await;
    let gateway = RecordingGateway::default();
    let store = MemorySessionStore::new();
    let transport = FakeTransport {
        hold_ms: 5,
        ..FakeTransport::default()
    };

    let config = UploadConfig {
        chunk_size: CHUNK,
        concurrency: 2,
        retry: RetryPolicy::default(),
    };
    UploadCoordinator::new(gateway, store, transport.clone(), config)
        .upload(&source)
        .await
        .unwrap();

    let peak = transport.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak concurrency was {peak}");
}
