use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Contact details for a file owner, resolved at notify time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerContact {
    pub user_id: String,
    pub email_address: String,
}

/// External collaborator that resolves owner ids to contact details.
///
/// The gateway does not own user records; it stores the owner id as a weak
/// reference and resolves it through this seam. Resolution failures never
/// fail an upload.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_owner(&self, owner_id: &str) -> Result<Option<OwnerContact>>;
}

/// Directory backed by the `users` table of the index database.
pub struct SqliteUserDirectory {
    db_path: PathBuf,
}

impl SqliteUserDirectory {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    /// Seed or update a contact. Used by provisioning and tests.
    pub fn register(&self, user_id: &str, email_address: &str) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "INSERT OR REPLACE INTO users (user_id, email_address) VALUES (?1, ?2)",
            [user_id, email_address],
        )?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn resolve_owner(&self, owner_id: &str) -> Result<Option<OwnerContact>> {
        let conn = Connection::open(&self.db_path)?;

        let email: Option<String> = conn
            .query_row(
                "SELECT email_address FROM users WHERE user_id = ?1",
                [owner_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(email.map(|email_address| OwnerContact {
            user_id: owner_id.to_string(),
            email_address,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SqliteFileIndex;

    #[tokio::test]
    async fn test_resolve_registered_owner() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("meta.db");
        // Schema lives with the index
        SqliteFileIndex::new(db_path.clone()).unwrap();

        let directory = SqliteUserDirectory::new(db_path);
        directory.register("u1", "u1@example.com").unwrap();

        let contact = directory.resolve_owner("u1").await.unwrap().unwrap();
        assert_eq!(contact.email_address, "u1@example.com");

        assert!(directory.resolve_owner("missing").await.unwrap().is_none());
    }
}
