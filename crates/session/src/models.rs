use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One successfully transferred chunk, identified by its 1-based number
/// and the entity tag the storage backend returned for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedPart {
    pub part_number: u32,
    pub etag: String,
}

/// The persisted record of an in-progress upload. Keyed by `file_key`;
/// `uploaded_parts` is append-only and kept sorted by part number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: Uuid,
    pub file_key: String,
    pub upload_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub last_modified_ms: i64,
    pub created_at: DateTime<Utc>,
    pub uploaded_parts: Vec<UploadedPart>,
}

impl UploadSession {
    pub fn new(
        upload_id: String,
        file_name: String,
        file_size: u64,
        file_type: String,
        last_modified_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_key: Self::file_key(&file_name, file_size),
            upload_id,
            file_name,
            file_size,
            file_type,
            last_modified_ms,
            created_at: Utc::now(),
            uploaded_parts: Vec::new(),
        }
    }

    /// Derived identity of the logical file, stable across resumes.
    pub fn file_key(file_name: &str, file_size: u64) -> String {
        format!("{file_name}-{file_size}")
    }

    /// Whether the stored identity fields agree with the file on disk.
    pub fn matches(&self, file_name: &str, file_size: u64, last_modified_ms: i64) -> bool {
        self.file_name == file_name
            && self.file_size == file_size
            && self.last_modified_ms == last_modified_ms
    }

    pub fn has_part(&self, part_number: u32) -> bool {
        self.uploaded_parts
            .iter()
            .any(|part| part.part_number == part_number)
    }

    /// Appends a completed part, keeping the set sorted and free of
    /// duplicate part numbers. Returns false when the part was already
    /// recorded.
    pub fn record_part(&mut self, part: UploadedPart) -> bool {
        if self.has_part(part.part_number) {
            return false;
        }
        self.uploaded_parts.push(part);
        self.uploaded_parts.sort_by_key(|part| part.part_number);
        true
    }

    pub fn part_count(&self) -> usize {
        self.uploaded_parts.len()
    }
}
