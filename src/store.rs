//! SQLite-backed store for uploaded user documents.
//!
//! Each upload keeps the stored file path, the chunked clauses as JSON,
//! and a content hash used for dedup: re-uploading identical text returns
//! the existing document id instead of creating a duplicate row.

use anyhow::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::Config;
use crate::models::Clause;

/// Row summary for `docs list`.
#[derive(Debug, serde::Serialize)]
pub struct UserDoc {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub created_at: i64,
}

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = config.data.db_path();

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_docs (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            path TEXT NOT NULL,
            clauses_json TEXT NOT NULL,
            hash TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Hash of the extracted document text, used for dedup.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Insert an uploaded document, returning its id.
///
/// If a document with the same text hash already exists, its id is
/// returned and no new row is written.
pub async fn insert_doc(
    pool: &SqlitePool,
    filename: &str,
    path: &Path,
    hash: &str,
    clauses: &[Clause],
) -> Result<String> {
    let existing = sqlx::query("SELECT id FROM user_docs WHERE hash = ?")
        .bind(hash)
        .fetch_optional(pool)
        .await?;
    if let Some(row) = existing {
        return Ok(row.get("id"));
    }

    let id = Uuid::new_v4().to_string();
    let clauses_json = serde_json::to_string(clauses)?;

    sqlx::query(
        "INSERT INTO user_docs (id, filename, path, clauses_json, hash, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(filename)
    .bind(path.display().to_string())
    .bind(&clauses_json)
    .bind(hash)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;

    Ok(id)
}

/// Fetch the stored clauses for a document, or `None` if unknown.
pub async fn get_clauses(pool: &SqlitePool, id: &str) -> Result<Option<Vec<Clause>>> {
    let row = sqlx::query("SELECT clauses_json FROM user_docs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let json: String = row.get("clauses_json");
            Ok(Some(serde_json::from_str(&json)?))
        }
        None => Ok(None),
    }
}

pub async fn list_docs(pool: &SqlitePool) -> Result<Vec<UserDoc>> {
    let rows =
        sqlx::query("SELECT id, filename, path, created_at FROM user_docs ORDER BY created_at")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .iter()
        .map(|row| UserDoc {
            id: row.get("id"),
            filename: row.get("filename"),
            path: row.get("path"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// Delete a document row and its stored file. Returns `false` if the id
/// was unknown.
pub async fn delete_doc(pool: &SqlitePool, id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT path FROM user_docs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(false);
    };

    let path: String = row.get("path");
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            eprintln!("Warning: could not remove {}: {}", path, e);
        }
    }

    sqlx::query("DELETE FROM user_docs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn test_pool(dir: &Path) -> SqlitePool {
        let config = Config::with_data_dir(dir);
        let pool = connect(&config).await.unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    fn clauses() -> Vec<Clause> {
        vec![
            Clause {
                id: "section_0".to_string(),
                text: "WHEREAS the parties agree.".to_string(),
            },
            Clause {
                id: "section_1".to_string(),
                text: "Clause 1. Rent is due monthly.".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_insert_and_fetch_roundtrip() {
        let dir = tempdir().unwrap();
        let pool = test_pool(dir.path()).await;

        let id = insert_doc(
            &pool,
            "lease.txt",
            Path::new("/data/uploads/lease.txt"),
            &text_hash("body"),
            &clauses(),
        )
        .await
        .unwrap();

        let restored = get_clauses(&pool, &id).await.unwrap().unwrap();
        assert_eq!(restored, clauses());
    }

    #[tokio::test]
    async fn test_duplicate_hash_returns_existing_id() {
        let dir = tempdir().unwrap();
        let pool = test_pool(dir.path()).await;
        let hash = text_hash("same body");

        let first = insert_doc(&pool, "a.txt", Path::new("/tmp/a.txt"), &hash, &clauses())
            .await
            .unwrap();
        let second = insert_doc(&pool, "b.txt", Path::new("/tmp/b.txt"), &hash, &clauses())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(list_docs(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_none() {
        let dir = tempdir().unwrap();
        let pool = test_pool(dir.path()).await;
        assert!(get_clauses(&pool, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_doc() {
        let dir = tempdir().unwrap();
        let pool = test_pool(dir.path()).await;

        let stored = dir.path().join("upload.txt");
        std::fs::write(&stored, "body").unwrap();

        let id = insert_doc(&pool, "upload.txt", &stored, &text_hash("body"), &clauses())
            .await
            .unwrap();

        assert!(delete_doc(&pool, &id).await.unwrap());
        assert!(!stored.exists());
        assert!(get_clauses(&pool, &id).await.unwrap().is_none());
        assert!(!delete_doc(&pool, &id).await.unwrap());
    }
}
