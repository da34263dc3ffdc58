// lib/src/storage_engine/storage_engine.rs

use async_trait::async_trait;
use models::MedResult;
use std::fmt::Debug;

/// An ordered byte key/value store. Every higher level structure (records,
/// unique indexes, tenant namespaces) is encoded into keys on top of it.
#[async_trait]
pub trait StorageEngine: Send + Sync + Debug + 'static {
    async fn insert(&self, key: &[u8], value: &[u8]) -> MedResult<()>;
    async fn get(&self, key: &[u8]) -> MedResult<Option<Vec<u8>>>;
    /// Removes the key, returning the previous value.
    async fn remove(&self, key: &[u8]) -> MedResult<Option<Vec<u8>>>;
    /// All pairs whose key starts with `prefix`, in key order.
    async fn scan_prefix(&self, prefix: &[u8]) -> MedResult<Vec<(Vec<u8>, Vec<u8>)>>;
    /// Atomically replaces the value at `key` if it currently equals
    /// `expected` (`None` meaning absent). `new = None` deletes the key.
    /// Returns whether the swap happened.
    async fn compare_and_swap(&self, key: &[u8], expected: Option<&[u8]>, new: Option<&[u8]>) -> MedResult<bool>;
    async fn flush(&self) -> MedResult<()>;
    fn get_type(&self) -> &'static str;
}
