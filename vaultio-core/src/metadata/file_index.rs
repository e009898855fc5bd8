use crate::error::{Result, VaultError};
use crate::storage::storage_key;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File metadata as stored in the index. The unit of truth for a stored file.
///
/// A record exists only if the corresponding blob write already succeeded;
/// the index insert is the last committing step of an upload. Records are
/// never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub upload_date: chrono::DateTime<chrono::Utc>,
    pub owner_id: String,
    pub storage_key: String,
}

impl FileRecord {
    /// Build a fresh record for an upload. The storage key is derived from
    /// the id and name, never taken from the client.
    pub fn new(id: String, original_name: String, mime_type: String, size: u64, owner_id: String) -> Self {
        let storage_key = storage_key(&id, &original_name);
        Self {
            id,
            original_name,
            mime_type,
            size,
            upload_date: chrono::Utc::now(),
            owner_id,
            storage_key,
        }
    }
}

/// Durable file-identifier index.
///
/// `insert` must fail with `DuplicateFileId` if the id is already present,
/// and reads must observe the caller's own preceding insert.
pub trait FileIndex: Send + Sync {
    fn insert(&self, record: &FileRecord) -> Result<()>;
    fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>>;
}

/// SQLite-backed index. One connection per operation against a single
/// database file; SQLite itself gives read-your-writes.
pub struct SqliteFileIndex {
    db_path: PathBuf,
}

impl SqliteFileIndex {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        let index = Self { db_path };
        index.init_schema()?;
        Ok(index)
    }

    pub(crate) fn get_conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                original_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                upload_date TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                storage_key TEXT NOT NULL
            )",
            [],
        )?;

        // Index for per-owner queries
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner_id)",
            [],
        )?;

        // Owner contacts resolved at notify time
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                email_address TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }
}

impl FileIndex for SqliteFileIndex {
    fn insert(&self, record: &FileRecord) -> Result<()> {
        let conn = self.get_conn()?;

        // SQLite integers are signed 64-bit
        let size = i64::try_from(record.size).map_err(|_| {
            VaultError::InvalidRequest(format!("file size {} exceeds index range", record.size))
        })?;

        let result = conn.execute(
            "INSERT INTO files (
                id, original_name, mime_type, size, upload_date, owner_id, storage_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.original_name,
                record.mime_type,
                size,
                record.upload_date.to_rfc3339(),
                record.owner_id,
                record.storage_key,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(VaultError::DuplicateFileId(record.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>> {
        let conn = self.get_conn()?;

        let row: Option<(String, String, i64, String, String, String)> = conn
            .query_row(
                "SELECT original_name, mime_type, size, upload_date, owner_id, storage_key
                 FROM files WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((original_name, mime_type, size, upload_date, owner_id, storage_key)) => {
                Ok(Some(FileRecord {
                    id: id.to_string(),
                    original_name,
                    mime_type,
                    size: u64::try_from(size).map_err(|_| {
                        VaultError::Internal(format!("negative size {} in index for {}", size, id))
                    })?,
                    upload_date: chrono::DateTime::parse_from_rfc3339(&upload_date)
                        .map_err(|e| VaultError::Internal(format!("bad upload_date in index: {}", e)))?
                        .with_timezone(&chrono::Utc),
                    owner_id,
                    storage_key,
                }))
            }
            None => Ok(None),
        }
    }
}
