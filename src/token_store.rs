use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableDefinition, TableError,
    TransactionError,
};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenStoreError {
    #[error("Redb database error: {0}")]
    RedbDatabase(#[from] DatabaseError),
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub const KV: TableDefinition<&str, &str> = TableDefinition::new("kv");
pub const TOKEN_KEY: &str = "token";

/// Persisted client-side key-value store. The bearer token lives under
/// [`TOKEN_KEY`].
pub struct TokenStore {
    db: Database,
}

impl TokenStore {
    pub fn open(path: &Path) -> Result<Self, TokenStoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create the table up front so readers never hit a missing table.
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(KV)?;
        }
        write_txn.commit()?;

        Ok(TokenStore { db })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, TokenStoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV)?;
        let value = table.get(key)?.map(|v| v.value().to_string());
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), TokenStoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Returns whether the key was present.
    pub fn remove(&self, key: &str) -> Result<bool, TokenStoreError> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(KV)?;
            let removed = table.remove(key)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// The stored bearer token, ignoring blank values.
    pub fn token(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self
            .get(TOKEN_KEY)?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}
