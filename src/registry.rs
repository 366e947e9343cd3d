//! Durable record store for users and document processing status.
//!
//! Backed by SQLite. Documents move through a one-way state machine:
//! `processing` (set at create) → `ready` | `error`. The terminal-state
//! updates are merges guarded on the current status, so a record can never
//! be observed leaving `ready` or `error` except by full deletion.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::RegistryError;
use crate::models::{Document, DocumentStatus, User};

#[derive(Clone)]
pub struct DocumentRegistry {
    pool: SqlitePool,
}

impl DocumentRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a document record with `status = processing`, `chunk_count = 0`.
    ///
    /// Keyed by id; re-creating with the same id replaces the record
    /// (last-write-wins).
    pub async fn create(&self, doc: &Document) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, filename, storage_location, uploaded_by, uploaded_at, status, chunk_count, error_message)
            VALUES (?, ?, ?, ?, ?, 'processing', 0, NULL)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                storage_location = excluded.storage_location,
                uploaded_by = excluded.uploaded_by,
                uploaded_at = excluded.uploaded_at,
                status = 'processing',
                chunk_count = 0,
                error_message = NULL
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(&doc.storage_location)
        .bind(&doc.uploaded_by)
        .bind(doc.uploaded_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Merge `status = ready` and the final chunk count into the record.
    ///
    /// No-op if the document is not in `processing` (terminal states are
    /// never overwritten).
    pub async fn mark_ready(&self, id: &str, chunk_count: i64) -> Result<(), RegistryError> {
        sqlx::query(
            "UPDATE documents SET status = 'ready', chunk_count = ? WHERE id = ? AND status = 'processing'",
        )
        .bind(chunk_count)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Merge `status = error` and a human-readable message into the record.
    pub async fn mark_error(&self, id: &str, message: &str) -> Result<(), RegistryError> {
        sqlx::query(
            "UPDATE documents SET status = 'error', error_message = ? WHERE id = ? AND status = 'processing'",
        )
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Document, RegistryError> {
        let row = sqlx::query(
            "SELECT id, filename, storage_location, uploaded_by, uploaded_at, status, chunk_count, error_message FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row_to_document(&row)),
            None => Err(RegistryError::NotFound(id.to_string())),
        }
    }

    /// All documents, in no particular order. Ordering by `uploaded_at` is a
    /// presentation-layer concern.
    pub async fn list(&self) -> Result<Vec<Document>, RegistryError> {
        let rows = sqlx::query(
            "SELECT id, filename, storage_location, uploaded_by, uploaded_at, status, chunk_count, error_message FROM documents",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    /// Remove the record. The caller is responsible for deleting the raw
    /// file and the document's vectors first.
    pub async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert or refresh a user row after an external identity verification.
    pub async fn upsert_user(&self, user: &User) -> Result<(), RegistryError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO users (uid, email, display_name, role, created_at, last_login_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(uid) DO UPDATE SET
                email = excluded.email,
                display_name = excluded.display_name,
                role = excluded.role,
                last_login_at = excluded.last_login_at
            "#,
        )
        .bind(&user.uid)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.role)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_user(&self, uid: &str) -> Result<User, RegistryError> {
        let row = sqlx::query("SELECT uid, email, display_name, role FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(User {
                uid: row.get("uid"),
                email: row.get("email"),
                display_name: row.get("display_name"),
                role: row.get("role"),
            }),
            None => Err(RegistryError::NotFound(uid.to_string())),
        }
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    let status: String = row.get("status");
    let uploaded_at: i64 = row.get("uploaded_at");
    Document {
        id: row.get("id"),
        filename: row.get("filename"),
        storage_location: row.get("storage_location"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_at: timestamp_to_datetime(uploaded_at),
        status: DocumentStatus::parse(&status).unwrap_or(DocumentStatus::Error),
        chunk_count: row.get("chunk_count"),
        error_message: row.get("error_message"),
    }
}

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use tempfile::TempDir;

    async fn test_registry() -> (TempDir, DocumentRegistry) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("akb.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, DocumentRegistry::new(pool))
    }

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            filename: "handbook.txt".to_string(),
            storage_location: format!("/tmp/uploads/{}", id),
            uploaded_by: "admin-1".to_string(),
            uploaded_at: Utc::now(),
            status: DocumentStatus::Processing,
            chunk_count: 0,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn create_then_mark_ready() {
        let (_tmp, registry) = test_registry().await;
        registry.create(&doc("d1")).await.unwrap();

        let d = registry.get("d1").await.unwrap();
        assert_eq!(d.status, DocumentStatus::Processing);
        assert_eq!(d.chunk_count, 0);

        registry.mark_ready("d1", 7).await.unwrap();
        let d = registry.get("d1").await.unwrap();
        assert_eq!(d.status, DocumentStatus::Ready);
        assert_eq!(d.chunk_count, 7);
    }

    #[tokio::test]
    async fn mark_error_stores_message() {
        let (_tmp, registry) = test_registry().await;
        registry.create(&doc("d1")).await.unwrap();
        registry.mark_error("d1", "PDF extraction failed").await.unwrap();

        let d = registry.get("d1").await.unwrap();
        assert_eq!(d.status, DocumentStatus::Error);
        assert_eq!(d.error_message.as_deref(), Some("PDF extraction failed"));
        assert_eq!(d.chunk_count, 0);
    }

    #[tokio::test]
    async fn terminal_states_are_sticky() {
        let (_tmp, registry) = test_registry().await;
        registry.create(&doc("d1")).await.unwrap();
        registry.mark_ready("d1", 3).await.unwrap();

        // A late failure report must not flip a ready document to error.
        registry.mark_error("d1", "late failure").await.unwrap();
        let d = registry.get("d1").await.unwrap();
        assert_eq!(d.status, DocumentStatus::Ready);
        assert_eq!(d.chunk_count, 3);

        registry.create(&doc("d2")).await.unwrap();
        registry.mark_error("d2", "boom").await.unwrap();
        registry.mark_ready("d2", 9).await.unwrap();
        let d = registry.get("d2").await.unwrap();
        assert_eq!(d.status, DocumentStatus::Error);
    }

    #[tokio::test]
    async fn recreate_same_id_replaces_record() {
        let (_tmp, registry) = test_registry().await;
        registry.create(&doc("d1")).await.unwrap();
        registry.mark_ready("d1", 4).await.unwrap();

        registry.create(&doc("d1")).await.unwrap();
        let d = registry.get("d1").await.unwrap();
        assert_eq!(d.status, DocumentStatus::Processing);
        assert_eq!(d.chunk_count, 0);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_tmp, registry) = test_registry().await;
        let err = registry.get("nope").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let (_tmp, registry) = test_registry().await;
        registry.create(&doc("d1")).await.unwrap();
        registry.delete("d1").await.unwrap();
        assert!(matches!(
            registry.get("d1").await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_upsert_and_get() {
        let (_tmp, registry) = test_registry().await;
        let user = User {
            uid: "u1".to_string(),
            email: "staff@dreamcollegepath.com".to_string(),
            display_name: "Staff".to_string(),
            role: "admin".to_string(),
        };
        registry.upsert_user(&user).await.unwrap();
        let got = registry.get_user("u1").await.unwrap();
        assert_eq!(got.email, user.email);
        assert_eq!(got.role, "admin");
    }
}
