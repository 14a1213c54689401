//! SQLite storage backend

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use snip_core::{Document, DocumentKind, DocumentStore, Slug, StorageError, Transaction, UserId};
use std::path::Path;
use tracing::{debug, warn};

/// SQLite storage backend
///
/// Embedded persistence suitable for single-node setups. Each transaction
/// holds the connection and runs under `BEGIN IMMEDIATE`, so writers from
/// other processes sharing the file are serialized by SQLite itself.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(db_error)?;

        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(db_error)?;

        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                slug TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                content TEXT NOT NULL,
                kind TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner);
            "#,
        )
        .map_err(db_error)?;

        Ok(())
    }
}

const SELECT_DOCUMENT: &str = "SELECT slug, owner, content, kind, version, created_at, updated_at \
     FROM documents WHERE slug = ?1";

fn find_document(conn: &Connection, slug: &Slug) -> Result<Option<Document>, StorageError> {
    let row = conn
        .query_row(SELECT_DOCUMENT, params![slug.as_str()], RawDocument::from_row)
        .optional()
        .map_err(db_error)?;

    row.map(RawDocument::into_document).transpose()
}

/// Columns as stored, before validation
struct RawDocument {
    slug: String,
    owner: String,
    content: String,
    kind: String,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

impl RawDocument {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            slug: row.get(0)?,
            owner: row.get(1)?,
            content: row.get(2)?,
            kind: row.get(3)?,
            version: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_document(self) -> Result<Document, StorageError> {
        let slug =
            Slug::parse(self.slug).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let kind = DocumentKind::parse(&self.kind).ok_or_else(|| {
            StorageError::Serialization(format!("unknown document kind '{}'", self.kind))
        })?;

        Ok(Document {
            slug,
            owner: UserId::new(self.owner),
            content: self.content,
            kind,
            version: self.version as u64,
            created_at: self.created_at as u64,
            updated_at: self.updated_at as u64,
        })
    }
}

/// Busy databases and duplicate keys are worth a retry; anything else is not
fn db_error(e: rusqlite::Error) -> StorageError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            StorageError::Conflict(e.to_string())
        }
        Some(ErrorCode::ConstraintViolation) => StorageError::Conflict(e.to_string()),
        _ => StorageError::Database(e.to_string()),
    }
}

struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Transaction for SqliteTransaction<'_> {
    fn find(&mut self, slug: &Slug) -> Result<Option<Document>, StorageError> {
        find_document(&self.conn, slug)
    }

    fn insert(&mut self, document: &Document) -> Result<(), StorageError> {
        self.conn
            .execute(
                r#"
                INSERT INTO documents (slug, owner, content, kind, version, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    document.slug.as_str(),
                    document.owner.as_str(),
                    document.content,
                    document.kind.as_str(),
                    document.version as i64,
                    document.created_at as i64,
                    document.updated_at as i64,
                ],
            )
            .map_err(db_error)?;

        Ok(())
    }

    fn update(&mut self, document: &Document) -> Result<(), StorageError> {
        let previous = document.version.checked_sub(1).ok_or_else(|| {
            StorageError::Conflict(format!("{} has no prior version", document.slug))
        })?;

        let affected = self
            .conn
            .execute(
                r#"
                UPDATE documents
                SET content = ?2, kind = ?3, version = ?4, updated_at = ?5
                WHERE slug = ?1 AND version = ?6
                "#,
                params![
                    document.slug.as_str(),
                    document.content,
                    document.kind.as_str(),
                    document.version as i64,
                    document.updated_at as i64,
                    previous as i64,
                ],
            )
            .map_err(db_error)?;

        if affected == 0 {
            return Err(StorageError::Conflict(document.slug.to_string()));
        }

        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        self.conn.execute_batch("COMMIT").map_err(db_error)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Rolling back uncommitted transaction");
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "Rollback failed");
            }
        }
    }
}

impl DocumentStore for SqliteStorage {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, StorageError> {
        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE").map_err(db_error)?;

        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }

    fn get(&self, slug: &Slug) -> Result<Option<Document>, StorageError> {
        find_document(&self.conn.lock(), slug)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(db_error)?;

        Ok(count as usize)
    }
}
