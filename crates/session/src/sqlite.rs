use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{UploadSession, UploadedPart};
use crate::store::{SessionStore, StoreError};

/// SQLite-backed session store. The part set is serialized as a JSON
/// column and every `put` is a single upsert, so appends are atomic.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<UploadSession, StoreError> {
    let parts: Vec<UploadedPart> =
        serde_json::from_str(&row.get::<String, _>("uploaded_parts")).map_err(corrupt)?;

    Ok(UploadSession {
        id: Uuid::parse_str(&row.get::<String, _>("id")).map_err(corrupt)?,
        file_key: row.get("file_key"),
        upload_id: row.get("upload_id"),
        file_name: row.get("file_name"),
        file_size: row.get::<i64, _>("file_size") as u64,
        file_type: row.get("file_type"),
        last_modified_ms: row.get("last_modified_ms"),
        created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
            .map_err(corrupt)?
            .with_timezone(&Utc),
        uploaded_parts: parts,
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, file_key: &str) -> Result<Option<UploadSession>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, file_key, upload_id, file_name, file_size, file_type, last_modified_ms, created_at, uploaded_parts
            FROM upload_sessions
            WHERE file_key = ?
            "#,
        )
        .bind(file_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn put(&self, session: &UploadSession) -> Result<(), StoreError> {
        let parts = serde_json::to_string(&session.uploaded_parts).map_err(corrupt)?;

        sqlx::query(
            r#"
            INSERT INTO upload_sessions (id, file_key, upload_id, file_name, file_size, file_type, last_modified_ms, created_at, uploaded_parts)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_key) DO UPDATE SET
                id = excluded.id,
                upload_id = excluded.upload_id,
                file_name = excluded.file_name,
                file_size = excluded.file_size,
                file_type = excluded.file_type,
                last_modified_ms = excluded.last_modified_ms,
                created_at = excluded.created_at,
                uploaded_parts = excluded.uploaded_parts
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.file_key)
        .bind(&session.upload_id)
        .bind(&session.file_name)
        .bind(session.file_size as i64)
        .bind(session.file_type.as_str())
        .bind(session.last_modified_ms)
        .bind(session.created_at.to_rfc3339())
        .bind(&parts)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, file_key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM upload_sessions WHERE file_key = ?")
            .bind(file_key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT file_key FROM upload_sessions ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("file_key")).collect())
    }
}
