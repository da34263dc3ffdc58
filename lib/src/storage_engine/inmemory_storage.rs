// lib/src/storage_engine/inmemory_storage.rs
use super::storage_engine::StorageEngine;
use async_trait::async_trait;
use models::MedResult;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageEngine for InMemoryStorage {
    async fn insert(&self, key: &[u8], value: &[u8]) -> MedResult<()> {
        self.data.write().await.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &[u8]) -> MedResult<Option<Vec<u8>>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &[u8]) -> MedResult<Option<Vec<u8>>> {
        Ok(self.data.write().await.remove(key))
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> MedResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read().await;
        Ok(data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn compare_and_swap(&self, key: &[u8], expected: Option<&[u8]>, new: Option<&[u8]>) -> MedResult<bool> {
        let mut data = self.data.write().await;
        if data.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        match new {
            Some(value) => data.insert(key.to_vec(), value.to_vec()),
            None => data.remove(key),
        };
        Ok(true)
    }

    async fn flush(&self) -> MedResult<()> {
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "InMemory"
    }
}
