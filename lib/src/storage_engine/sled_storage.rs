// lib/src/storage_engine/sled_storage.rs
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use models::{MedError, MedResult};
use sled::Db;
use tracing::{error, info};

use super::storage_engine::StorageEngine;

#[derive(Debug, Clone)]
pub struct SledStorage {
    db: Db,
}

/// Opens (creating if needed) a sled database under `path`.
pub fn open_sled_db(path: &Path) -> MedResult<Db> {
    if !path.exists() {
        info!("Creating database directory at {:?}", path);
        fs::create_dir_all(path).map_err(|e| {
            error!("Failed to create database directory at {:?}: {}", path, e);
            MedError::StorageError(format!("Failed to create database directory at {:?}: {}", path, e))
        })?;
    } else if !path.is_dir() {
        return Err(MedError::StorageError(format!("Path {:?} is not a directory", path)));
    }
    let db = sled::Config::new().path(path).use_compression(false).open().map_err(|e| {
        error!("Failed to open Sled database at {:?}: {}", path, e);
        MedError::StorageError(format!("Failed to open Sled database at {:?}: {}", path, e))
    })?;
    info!("Opened Sled database at {:?}", path);
    Ok(db)
}

impl SledStorage {
    pub fn new(db: Db) -> Self {
        SledStorage { db }
    }

    pub fn open(path: &Path) -> MedResult<Self> {
        open_sled_db(path).map(Self::new)
    }
}

#[async_trait]
impl StorageEngine for SledStorage {
    async fn insert(&self, key: &[u8], value: &[u8]) -> MedResult<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    async fn get(&self, key: &[u8]) -> MedResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    async fn remove(&self, key: &[u8]) -> MedResult<Option<Vec<u8>>> {
        Ok(self.db.remove(key)?.map(|v| v.to_vec()))
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> MedResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.db
            .scan_prefix(prefix)
            .map(|item| item.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(MedError::from))
            .collect()
    }

    async fn compare_and_swap(&self, key: &[u8], expected: Option<&[u8]>, new: Option<&[u8]>) -> MedResult<bool> {
        Ok(self.db.compare_and_swap(key, expected, new)?.is_ok())
    }

    async fn flush(&self) -> MedResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "Sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = SledStorage::open(dir.path()).unwrap();
            storage.insert(b"k", b"v").await.unwrap();
            storage.flush().await.unwrap();
        }
        let storage = SledStorage::open(dir.path()).unwrap();
        assert_eq!(storage.get(b"k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn compare_and_swap_matches_sled_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SledStorage::open(dir.path()).unwrap();
        assert!(storage.compare_and_swap(b"k", None, Some(b"1")).await.unwrap());
        assert!(!storage.compare_and_swap(b"k", None, Some(b"2")).await.unwrap());
        assert!(storage.compare_and_swap(b"k", Some(b"1"), Some(b"2")).await.unwrap());
        assert_eq!(storage.scan_prefix(b"k").await.unwrap(), vec![(b"k".to_vec(), b"2".to_vec())]);
    }
}
