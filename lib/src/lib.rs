// lib/src/lib.rs
// Core services of the Medcor platform. The HTTP layer lives in `rest_api`,
// the binary in `server`.

pub mod ai;
pub mod billing;
pub mod config;
pub mod context;
pub mod locks;
pub mod logging;
pub mod notifications;
pub mod platform;
pub mod scheduling;
pub mod seed;
pub mod storage_engine;
pub mod tenants;
pub mod treatments;
pub mod users;

pub use models::{MedError, MedResult};

pub use crate::config::AppConfig;
pub use crate::context::{Actor, TenantScope};
pub use crate::platform::Platform;
pub use crate::storage_engine::{create_storage, StorageEngine};
