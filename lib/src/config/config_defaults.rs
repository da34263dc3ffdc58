// lib/src/config/config_defaults.rs
use std::path::PathBuf;

use crate::config::config_structs::StorageEngineType;

pub const DEFAULT_CONFIG_FILE: &str = "medcor.yaml";
pub const ENV_PREFIX: &str = "MEDCOR";
pub const DEFAULT_DATA_DIRECTORY: &str = "./data/medcor";
/// Only meant for local development; `check-config` warns when it is in use.
pub const DEV_JWT_SECRET: &str = "medcor-development-secret-change-me-0123456789";
pub const MIN_JWT_SECRET_LEN: usize = 32;

pub fn default_host() -> String { "127.0.0.1".to_string() }
pub fn default_port() -> u16 { 8080 }

pub fn default_storage_engine_type() -> StorageEngineType { StorageEngineType::Sled }
pub fn default_data_directory() -> PathBuf { PathBuf::from(DEFAULT_DATA_DIRECTORY) }

pub fn default_jwt_secret() -> String { DEV_JWT_SECRET.to_string() }
pub fn default_access_token_ttl_secs() -> u64 { 15 * 60 }
pub fn default_refresh_token_ttl_secs() -> u64 { 7 * 24 * 3600 }
pub fn default_password_hash_cost() -> u32 { 12 }

pub fn default_from_address() -> String { "no-reply@medcor.local".to_string() }
pub fn default_max_retries() -> u32 { 3 }
pub fn default_retry_backoff_ms() -> u64 { 500 }
pub fn default_queue_capacity() -> usize { 1024 }

pub fn default_max_recurring_days() -> u32 { 90 }
pub fn default_min_slot_minutes() -> u32 { 10 }

pub fn default_trial_days() -> u32 { 14 }
pub fn default_grace_days() -> u32 { 7 }
pub fn default_sweep_interval_secs() -> u64 { 3600 }
pub fn default_free_max_doctors() -> Option<u32> { Some(2) }
pub fn default_free_max_patients() -> Option<u32> { Some(50) }

pub fn default_max_history() -> usize { 50 }
pub fn default_session_ttl_secs() -> u64 { 3600 }
pub fn default_max_sessions_per_user() -> usize { 20 }

pub fn default_log_level() -> String { "info".to_string() }
