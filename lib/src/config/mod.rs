// lib/src/config/mod.rs
//! Layered application configuration: built-in defaults, then an optional
//! YAML file, then `MEDCOR_<SECTION>__<KEY>` environment variables.

pub mod config_defaults;
pub mod config_structs;

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use models::{MedError, MedResult};
use tracing::debug;

pub use config_defaults::*;
pub use config_structs::*;

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn build(path: Option<&Path>, env: Environment) -> MedResult<AppConfig> {
    let file = match path {
        Some(path) => File::from(path).format(FileFormat::Yaml).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).format(FileFormat::Yaml).required(false),
    };
    let config: AppConfig = Config::builder()
        .add_source(file)
        .add_source(env)
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| MedError::ConfigurationError(e.to_string()))?;
    config.validate()?;
    debug!(?config, "configuration loaded");
    Ok(config)
}

impl AppConfig {
    /// Loads the configuration. An explicit `path` must exist; without one
    /// `medcor.yaml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> MedResult<Self> {
        build(path, environment())
    }

    pub fn validate(&self) -> MedResult<()> {
        let invalid = |msg: String| Err(MedError::ConfigurationError(msg));
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return invalid(format!("auth.jwt_secret must be at least {} bytes", MIN_JWT_SECRET_LEN));
        }
        if self.server.port == 0 {
            return invalid("server.port must not be 0".into());
        }
        if !(4..=31).contains(&self.auth.password_hash_cost) {
            return invalid("auth.password_hash_cost must be between 4 and 31".into());
        }
        if self.auth.access_token_ttl_secs == 0 || self.auth.refresh_token_ttl_secs == 0 {
            return invalid("token lifetimes must be positive".into());
        }
        if self.email.queue_capacity == 0 {
            return invalid("email.queue_capacity must be positive".into());
        }
        if self.scheduling.min_slot_minutes == 0 || self.scheduling.max_recurring_days == 0 {
            return invalid("scheduling limits must be positive".into());
        }
        if self.billing.sweep_interval_secs == 0 {
            return invalid("billing.sweep_interval_secs must be positive".into());
        }
        if self.ai.session_ttl_secs == 0 || self.ai.max_sessions_per_user == 0 {
            return invalid("ai session limits must be positive".into());
        }
        Ok(())
    }

    /// Whether the built-in development secret is still in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.auth.jwt_secret == DEV_JWT_SECRET
    }

    /// Configuration suited to tests: in-memory storage and cheap hashing.
    pub fn for_tests() -> Self {
        let mut config = AppConfig::default();
        config.storage.engine = StorageEngineType::InMemory;
        config.auth.password_hash_cost = 4;
        config.email.retry_backoff_ms = 1;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        environment().source(Some(map))
    }

    #[test]
    fn defaults_are_valid() {
        let config = build(None, env_of(&[])).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.engine, StorageEngineType::Sled);
        assert_eq!(config.billing.free_max_doctors, Some(2));
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn yaml_file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server:\n  port: 9000\nstorage:\n  engine: inmemory\nbilling:\n  trial_days: 0").unwrap();
        let config = build(
            Some(file.path()),
            env_of(&[("MEDCOR_SERVER__PORT", "9100"), ("MEDCOR_LOGGING__JSON", "true")]),
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.storage.engine, StorageEngineType::InMemory);
        assert_eq!(config.billing.trial_days, 0);
        assert!(config.logging.json);
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = build(None, env_of(&[("MEDCOR_AUTH__JWT_SECRET", "short")])).unwrap_err();
        assert!(matches!(err, MedError::ConfigurationError(_)));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(build(Some(Path::new("/nonexistent/medcor.yaml")), env_of(&[])).is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", AppConfig::default());
        assert!(!rendered.contains(DEV_JWT_SECRET));
        assert!(rendered.contains("<redacted>"));
    }
}
