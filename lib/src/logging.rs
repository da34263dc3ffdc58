// lib/src/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over the
/// configured level. Returns `false` when a subscriber was already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_initialization_is_harmless() {
        let config = LoggingConfig { level: "not a directive ===".into(), json: false };
        init_logging(&config);
        assert!(!init_logging(&LoggingConfig::default()));
    }
}
