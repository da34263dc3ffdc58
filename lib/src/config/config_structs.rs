// lib/src/config/config_structs.rs
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::config_defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { host: default_host(), port: default_port() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngineType {
    Sled,
    InMemory,
}

impl fmt::Display for StorageEngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageEngineType::Sled => write!(f, "sled"),
            StorageEngineType::InMemory => write!(f, "inmemory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_engine_type")]
    pub engine: StorageEngineType,
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig { engine: default_storage_engine_type(), data_directory: default_data_directory() }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: u64,
    #[serde(default = "default_refresh_token_ttl_secs")]
    pub refresh_token_ttl_secs: u64,
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
    /// Role table override; the bundled table is used when unset.
    #[serde(default)]
    pub roles_file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: default_jwt_secret(),
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_token_ttl_secs: default_refresh_token_ttl_secs(),
            password_hash_cost: default_password_hash_cost(),
            roles_file: None,
        }
    }
}

// Never print the secret.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("password_hash_cost", &self.password_hash_cost)
            .field("roles_file", &self.roles_file)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for EmailConfig {
    fn default() -> Self {
        EmailConfig {
            from_address: default_from_address(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_max_recurring_days")]
    pub max_recurring_days: u32,
    #[serde(default = "default_min_slot_minutes")]
    pub min_slot_minutes: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        SchedulingConfig {
            max_recurring_days: default_max_recurring_days(),
            min_slot_minutes: default_min_slot_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_trial_days")]
    pub trial_days: u32,
    #[serde(default = "default_grace_days")]
    pub grace_days: u32,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Limits for tenants without a usable subscription. `None` is unlimited.
    #[serde(default = "default_free_max_doctors")]
    pub free_max_doctors: Option<u32>,
    #[serde(default = "default_free_max_patients")]
    pub free_max_patients: Option<u32>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        BillingConfig {
            trial_days: default_trial_days(),
            grace_days: default_grace_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            free_max_doctors: default_free_max_doctors(),
            free_max_patients: default_free_max_patients(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Idle chat sessions are dropped after this many seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_max_sessions_per_user")]
    pub max_sessions_per_user: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            max_history: default_max_history(),
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions_per_user: default_max_sessions_per_user(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level(), json: false }
    }
}
