use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

use crate::store::StoreError;

pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        Sqlite::create_database(database_url).await?;
        tracing::info!("Session database created: {}", database_url);
    }
    Ok(())
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upload_sessions (
            id TEXT PRIMARY KEY NOT NULL,
            file_key TEXT NOT NULL UNIQUE,
            upload_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            file_type TEXT NOT NULL,
            last_modified_ms INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            uploaded_parts TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_upload_sessions_created ON upload_sessions (created_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Session store migrations completed");
    Ok(())
}
