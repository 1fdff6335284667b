//! Subscriber installation.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level. Output goes to stderr so that
/// stdout stays reserved for generated results. Calling this more than once
/// is harmless; only the first subscriber is installed.
pub fn init_logging(config: &LoggingConfig) {
    let fallback = config.level.trim().to_ascii_lowercase();
    let make_filter = || {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&fallback))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if config.json {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(make_filter())
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(make_filter())
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig {
            level: "not-a-level".to_string(),
            json: true,
        };
        init_logging(&config);
        init_logging(&LoggingConfig::default());
        tracing::info!("still logging");
    }
}
