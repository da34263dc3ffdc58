// lib/src/storage_engine/mod.rs

// Module declarations
pub mod inmemory_storage;
pub mod records;
pub mod repository;
pub mod sled_storage;
pub mod storage_engine;
pub mod storage_utils;

// Re-export key types and traits for external use
pub use inmemory_storage::InMemoryStorage;
pub use repository::{Record, Repository, UniqueIndex};
pub use sled_storage::{open_sled_db, SledStorage};
pub use storage_engine::StorageEngine;
pub use storage_utils::Namespace;

use std::sync::Arc;

use models::MedResult;
use tracing::info;

use crate::config::{StorageConfig, StorageEngineType};

/// Creates a storage engine instance based on the provided configuration.
pub fn create_storage(config: &StorageConfig) -> MedResult<Arc<dyn StorageEngine>> {
    let engine: Arc<dyn StorageEngine> = match config.engine {
        StorageEngineType::Sled => Arc::new(SledStorage::open(&config.data_directory)?),
        StorageEngineType::InMemory => Arc::new(InMemoryStorage::new()),
    };
    info!(engine = engine.get_type(), "storage engine ready");
    Ok(engine)
}
