//! src/services/record_store.rs
//!
//! RecordStore — document metadata rows in SQLite.
//!
//! Older deployments created `documents` without the `original_filename`
//! column. The layout is inspected once when the store is opened; rows are
//! then written and read with the column set that layout supports, so a
//! legacy database keeps working until `--migrate` adds the column.

use crate::models::document::{Document, NewDocument};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};
use tracing::{debug, info, warn};

const CREATE_DOCUMENTS_SQL: &str = include_str!("../../migrations/0001_create_documents.sql");
const ADD_ORIGINAL_FILENAME_SQL: &str =
    include_str!("../../migrations/0002_add_original_filename.sql");

const DOCUMENT_COLUMNS: &str = "id, filename, original_filename, filepath, filesize, created_at";
const LEGACY_DOCUMENT_COLUMNS: &str =
    "id, filename, NULL AS original_filename, filepath, filesize, created_at";

/// Which columns the `documents` table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaLayout {
    /// Has `original_filename`.
    Current,
    /// Predates `original_filename`; display names are not stored.
    Legacy,
}

#[derive(Clone)]
pub struct RecordStore {
    /// Shared SQLite connection pool.
    db: Arc<SqlitePool>,
    layout: SchemaLayout,
}

impl RecordStore {
    /// Wrap an existing pool, detecting the table layout once.
    pub async fn open(db: Arc<SqlitePool>) -> sqlx::Result<Self> {
        let layout = detect_layout(&db).await?;
        if layout == SchemaLayout::Legacy {
            warn!(
                "documents table has no original_filename column; display names will not be \
                 stored until migrations are run"
            );
        }
        Ok(Self { db, layout })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    pub fn layout(&self) -> SchemaLayout {
        self.layout
    }

    /// Round trip through the pool.
    pub async fn ping(&self) -> sqlx::Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await
            .map(|_| ())
    }

    fn select_columns(&self) -> &'static str {
        match self.layout {
            SchemaLayout::Current => DOCUMENT_COLUMNS,
            SchemaLayout::Legacy => LEGACY_DOCUMENT_COLUMNS,
        }
    }

    /// Insert a row and return it as stored.
    ///
    /// On a legacy layout the display name is dropped and the returned row
    /// has `original_filename = None`.
    pub async fn insert(&self, new: &NewDocument) -> sqlx::Result<Document> {
        match self.layout {
            SchemaLayout::Current => {
                let sql = format!(
                    "INSERT INTO documents (filename, original_filename, filepath, filesize)
                     VALUES (?, ?, ?, ?)
                     RETURNING {DOCUMENT_COLUMNS}"
                );
                sqlx::query_as::<_, Document>(&sql)
                    .bind(&new.storage_key)
                    .bind(&new.display_name)
                    .bind(&new.blob_location)
                    .bind(new.size_bytes)
                    .fetch_one(&*self.db)
                    .await
            }
            SchemaLayout::Legacy => {
                let sql = format!(
                    "INSERT INTO documents (filename, filepath, filesize)
                     VALUES (?, ?, ?)
                     RETURNING {LEGACY_DOCUMENT_COLUMNS}"
                );
                sqlx::query_as::<_, Document>(&sql)
                    .bind(&new.storage_key)
                    .bind(&new.blob_location)
                    .bind(new.size_bytes)
                    .fetch_one(&*self.db)
                    .await
            }
        }
    }

    /// All rows, newest first; rows created in the same instant are ordered
    /// by descending id.
    pub async fn list(&self) -> sqlx::Result<Vec<Document>> {
        let sql = format!(
            "SELECT {} FROM documents ORDER BY created_at DESC, id DESC",
            self.select_columns()
        );
        sqlx::query_as::<_, Document>(&sql)
            .fetch_all(&*self.db)
            .await
    }

    pub async fn fetch(&self, id: i64) -> sqlx::Result<Option<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE id = ?",
            self.select_columns()
        );
        sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await
    }

    /// Delete a row. Returns false if no row had that id.
    pub async fn delete(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Open a SQLite pool, creating the database file if needed.
pub async fn connect(database_url: &str) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// Inspect `documents` and report which layout it has.
pub async fn detect_layout(db: &SqlitePool) -> sqlx::Result<SchemaLayout> {
    let columns: Vec<String> =
        sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info('documents')")
            .fetch_all(db)
            .await?;
    debug!("documents columns: {:?}", columns);

    if columns.iter().any(|c| c == "original_filename") {
        Ok(SchemaLayout::Current)
    } else {
        Ok(SchemaLayout::Legacy)
    }
}

/// Create the `documents` table if it does not exist. Leaves an existing
/// legacy table untouched.
pub async fn ensure_schema(db: &SqlitePool) -> sqlx::Result<()> {
    execute_script(db, CREATE_DOCUMENTS_SQL).await
}

/// Bring the database fully up to date, adding `original_filename` to a
/// legacy table.
pub async fn run_migrations(db: &SqlitePool) -> sqlx::Result<()> {
    ensure_schema(db).await?;
    if detect_layout(db).await? == SchemaLayout::Legacy {
        info!("adding original_filename column to documents");
        execute_script(db, ADD_ORIGINAL_FILENAME_SQL).await?;
    }
    Ok(())
}

async fn execute_script(db: &SqlitePool, sql: &str) -> sqlx::Result<()> {
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn temp_pool(dir: &TempDir) -> Arc<SqlitePool> {
        let url = format!("sqlite://{}", dir.path().join("documents.db").display());
        Arc::new(connect(&url).await.unwrap())
    }

    pub(crate) async fn create_legacy_table(db: &SqlitePool) {
        sqlx::query(
            "CREATE TABLE documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                filepath TEXT NOT NULL,
                filesize INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(db)
        .await
        .unwrap();
    }

    fn new_document(key: &str) -> NewDocument {
        NewDocument {
            storage_key: key.to_string(),
            display_name: format!("Display {key}"),
            blob_location: format!("/blobs/{key}"),
            size_bytes: 128,
        }
    }

    #[tokio::test]
    async fn insert_fetch_and_delete_round() {
        let dir = TempDir::new().unwrap();
        let db = temp_pool(&dir).await;
        ensure_schema(&db).await.unwrap();
        let store = RecordStore::open(db).await.unwrap();
        assert_eq!(store.layout(), SchemaLayout::Current);

        let doc = store.insert(&new_document("a.pdf")).await.unwrap();
        assert_eq!(doc.filename, "a.pdf");
        assert_eq!(doc.original_filename.as_deref(), Some("Display a.pdf"));
        assert_eq!(doc.filepath, "/blobs/a.pdf");
        assert_eq!(doc.filesize, 128);

        let fetched = store.fetch(doc.id).await.unwrap();
        assert_eq!(fetched, Some(doc.clone()));

        assert!(store.delete(doc.id).await.unwrap());
        assert!(!store.delete(doc.id).await.unwrap());
        assert_eq!(store.fetch(doc.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn ping_reports_closed_pool() {
        let dir = TempDir::new().unwrap();
        let db = temp_pool(&dir).await;
        ensure_schema(&db).await.unwrap();
        let store = RecordStore::open(db).await.unwrap();

        store.ping().await.unwrap();
        store.pool().close().await;
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let dir = TempDir::new().unwrap();
        let db = temp_pool(&dir).await;
        ensure_schema(&db).await.unwrap();
        let store = RecordStore::open(db).await.unwrap();

        let first = store.insert(&new_document("1.pdf")).await.unwrap();
        let second = store.insert(&new_document("2.pdf")).await.unwrap();
        let third = store.insert(&new_document("3.pdf")).await.unwrap();

        let ids: Vec<i64> = store.list().await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn legacy_layout_uses_reduced_columns() {
        let dir = TempDir::new().unwrap();
        let db = temp_pool(&dir).await;
        create_legacy_table(&db).await;
        ensure_schema(&db).await.unwrap();

        let store = RecordStore::open(db).await.unwrap();
        assert_eq!(store.layout(), SchemaLayout::Legacy);

        let doc = store.insert(&new_document("old.pdf")).await.unwrap();
        assert_eq!(doc.original_filename, None);
        assert_eq!(doc.display_name(), "old.pdf");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn migrations_upgrade_legacy_table() {
        let dir = TempDir::new().unwrap();
        let db = temp_pool(&dir).await;
        create_legacy_table(&db).await;

        run_migrations(&db).await.unwrap();
        assert_eq!(detect_layout(&db).await.unwrap(), SchemaLayout::Current);

        // Running again is a no-op.
        run_migrations(&db).await.unwrap();
        assert_eq!(detect_layout(&db).await.unwrap(), SchemaLayout::Current);
    }
}
