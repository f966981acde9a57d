//! ACID-durable key-value store backed by redb.
//!
//! The engine writes its snapshot here; a batch commit is one redb write
//! transaction, so a crash leaves either the old snapshot or the new one.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

use super::{Durable, StoreResult};
use crate::error::StoreError;

/// Knowledge-base table (binary keys to binary values).
const KB_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kb");

/// File name of the database inside the data directory.
pub const DB_FILE: &str = "terms.redb";

pub struct DurableStore {
    db: Arc<Database>,
}

fn redb_err(what: &str, e: impl Into<redb::Error>) -> StoreError {
    StoreError::Redb {
        message: format!("{what} failed: {}", e.into()),
    }
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl Durable for DurableStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read", e))?;
        let table = match txn.open_table(KB_TABLE) {
            Ok(table) => table,
            // Nothing committed yet.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(redb_err("open_table", e)),
        };
        let result = table.get(key).map_err(|e| redb_err("get", e))?;
        Ok(result.map(|guard| guard.value().to_vec()))
    }

    fn commit(&self, batch: &[(&[u8], &[u8])]) -> StoreResult<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| redb_err("begin_write", e))?;
        {
            let mut table = txn
                .open_table(KB_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            for (key, value) in batch {
                table
                    .insert(*key, *value)
                    .map_err(|e| redb_err("insert", e))?;
            }
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}
