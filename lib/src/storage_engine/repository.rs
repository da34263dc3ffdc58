// lib/src/storage_engine/repository.rs
//! Typed access to JSON encoded records and unique value indexes.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use models::{MedError, MedResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::storage_engine::StorageEngine;
use super::storage_utils::{build_key, collection_prefix, record_key, Namespace};

/// Upper bound of optimistic retries before `update` gives up.
pub const MAX_CAS_RETRIES: usize = 64;

pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Entity name used in "not found" errors.
    const ENTITY: &'static str;
    fn id(&self) -> Uuid;
}

pub struct Repository<T> {
    engine: Arc<dyn StorageEngine>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Repository { engine: self.engine.clone(), _marker: PhantomData }
    }
}

impl<T: Record> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository").field("collection", &T::COLLECTION).finish()
    }
}

impl<T: Record> Repository<T> {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Repository { engine, _marker: PhantomData }
    }

    fn key(ns: Namespace, id: Uuid) -> Vec<u8> {
        record_key(ns, T::COLLECTION, id.as_bytes())
    }

    /// Stores a new record, failing if one with the same id exists.
    pub async fn insert(&self, ns: Namespace, record: &T) -> MedResult<()> {
        let bytes = serde_json::to_vec(record)?;
        if self.engine.compare_and_swap(&Self::key(ns, record.id()), None, Some(&bytes)).await? {
            Ok(())
        } else {
            Err(MedError::AlreadyExists(format!("{} {}", T::ENTITY, record.id())))
        }
    }

    /// Unconditional write.
    pub async fn save(&self, ns: Namespace, record: &T) -> MedResult<()> {
        let bytes = serde_json::to_vec(record)?;
        self.engine.insert(&Self::key(ns, record.id()), &bytes).await
    }

    pub async fn get(&self, ns: Namespace, id: Uuid) -> MedResult<Option<T>> {
        match self.engine.get(&Self::key(ns, id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn require(&self, ns: Namespace, id: Uuid) -> MedResult<T> {
        self.get(ns, id).await?.ok_or_else(|| MedError::not_found(T::ENTITY, id))
    }

    pub async fn delete(&self, ns: Namespace, id: Uuid) -> MedResult<bool> {
        Ok(self.engine.remove(&Self::key(ns, id)).await?.is_some())
    }

    pub async fn list(&self, ns: Namespace) -> MedResult<Vec<T>> {
        self.filter(ns, |_| true).await
    }

    pub async fn filter<F>(&self, ns: Namespace, mut predicate: F) -> MedResult<Vec<T>>
    where
        F: FnMut(&T) -> bool,
    {
        let mut out = Vec::new();
        for (_, bytes) in self.engine.scan_prefix(&collection_prefix(ns, T::COLLECTION)).await? {
            let record: T = serde_json::from_slice(&bytes)?;
            if predicate(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Read-modify-write with optimistic concurrency: `f` runs against the
    /// current value and the result is written back only if nobody changed
    /// the record in between, otherwise `f` runs again on the fresh value.
    /// An error from `f` aborts without writing.
    pub async fn update<F>(&self, ns: Namespace, id: Uuid, mut f: F) -> MedResult<T>
    where
        F: FnMut(&mut T) -> MedResult<()>,
    {
        let key = Self::key(ns, id);
        for attempt in 0..MAX_CAS_RETRIES {
            let current = self.engine.get(&key).await?.ok_or_else(|| MedError::not_found(T::ENTITY, id))?;
            let mut record: T = serde_json::from_slice(&current)?;
            f(&mut record)?;
            let updated = serde_json::to_vec(&record)?;
            if self.engine.compare_and_swap(&key, Some(&current), Some(&updated)).await? {
                return Ok(record);
            }
            if attempt > 0 && attempt % 16 == 0 {
                warn!(collection = T::COLLECTION, %id, attempt, "heavy contention on record update");
            }
            tokio::task::yield_now().await;
        }
        Err(MedError::Conflict(format!("{} {} is being modified concurrently", T::ENTITY, id)))
    }
}

/// Maps unique values (usernames, domains) to the id of their owner.
#[derive(Clone)]
pub struct UniqueIndex {
    engine: Arc<dyn StorageEngine>,
    name: &'static str,
}

impl fmt::Debug for UniqueIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueIndex").field("name", &self.name).finish()
    }
}

impl UniqueIndex {
    pub fn new(engine: Arc<dyn StorageEngine>, name: &'static str) -> Self {
        UniqueIndex { engine, name }
    }

    fn key(&self, ns: Namespace, value: &str) -> Vec<u8> {
        build_key(&[ns.as_str().as_bytes(), b"idx", self.name.as_bytes(), value.as_bytes()])
    }

    /// Atomically reserves `value` for `owner`. Reclaiming a value one already
    /// owns succeeds.
    pub async fn claim(&self, ns: Namespace, value: &str, owner: Uuid) -> MedResult<()> {
        let key = self.key(ns, value);
        if self.engine.compare_and_swap(&key, None, Some(owner.as_bytes())).await? {
            return Ok(());
        }
        match self.lookup(ns, value).await? {
            Some(existing) if existing == owner => Ok(()),
            _ => Err(MedError::AlreadyExists(format!("{} '{}' is already taken", self.name, value))),
        }
    }

    pub async fn lookup(&self, ns: Namespace, value: &str) -> MedResult<Option<Uuid>> {
        match self.engine.get(&self.key(ns, value)).await? {
            Some(bytes) => Ok(Some(Uuid::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Frees `value` if `owner` holds it. Returns whether anything was freed.
    pub async fn release(&self, ns: Namespace, value: &str, owner: Uuid) -> MedResult<bool> {
        self.engine.compare_and_swap(&self.key(ns, value), Some(owner.as_bytes()), None).await
    }
}
