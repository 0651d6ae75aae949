//! Logging system setup.
//!
//! `RUST_LOG` wins over the configured level when set.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Resolves the effective level: `--debug` forces `debug`, otherwise the
/// configured level.
pub fn effective_level(config: &LoggingSettings, debug: bool) -> &str {
    if debug {
        "debug"
    } else {
        config.level.as_str()
    }
}

/// Initialize the global tracing subscriber.
pub fn setup_logging(config: &LoggingSettings, debug: bool, json_format: bool) -> Result<()> {
    let log_level = effective_level(config, debug);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_overrides_level() {
        let settings = LoggingSettings {
            level: "warn".to_string(),
            json_format: false,
        };
        assert_eq!(effective_level(&settings, false), "warn");
        assert_eq!(effective_level(&settings, true), "debug");
    }
}
