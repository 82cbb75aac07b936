use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::UploadSession;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed session record: {0}")]
    Corrupt(String),
}

/// Atomic keyed persistence for in-flight upload sessions. A `put`
/// replaces the whole record in one step, so a reader sees either the
/// record before an appended part or after it, never in between.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, file_key: &str) -> Result<Option<UploadSession>, StoreError>;

    async fn put(&self, session: &UploadSession) -> Result<(), StoreError>;

    async fn delete(&self, file_key: &str) -> Result<bool, StoreError>;

    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-memory store for tests and ephemeral runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<String, UploadSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, file_key: &str) -> Result<Option<UploadSession>, StoreError> {
        Ok(self.sessions.lock().await.get(file_key).cloned())
    }

    async fn put(&self, session: &UploadSession) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .insert(session.file_key.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, file_key: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.lock().await.remove(file_key).is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadedPart;

    fn session(name: &str) -> UploadSession {
        UploadSession::new(
            "upload-1".into(),
            name.into(),
            1000,
            "video/mp4".into(),
            1_700_000_000_000,
        )
    }

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let store = MemorySessionStore::new();
        let session = session("a.mp4");
        let key = session.file_key.clone();

        store.put(&session).await.unwrap();
        let loaded = store.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded.upload_id, "upload-1");

        assert!(store.delete(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(!store.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn put_replaces_the_whole_record() {
        let store = MemorySessionStore::new();
        let mut session = session("a.mp4");
        let key = session.file_key.clone();

        store.put(&session).await.unwrap();
        session.record_part(UploadedPart {
            part_number: 1,
            etag: "\"x\"".into(),
        });
        store.put(&session).await.unwrap();

        let loaded = store.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded.part_count(), 1);
        assert_eq!(store.list_keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_keys_is_sorted() {
        let store = MemorySessionStore::new();
        store.put(&session("b.mp4")).await.unwrap();
        store.put(&session("a.mp4")).await.unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec!["a.mp4-1000", "b.mp4-1000"]);
    }
}
