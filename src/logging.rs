//! Logging setup.
//!
//! The TUI owns the terminal, so nothing is ever written to stdout. On Linux
//! events go to systemd's journal when it is reachable, otherwise to a daily
//! rolling file in the configured log directory.

use anyhow::Result;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

const LOG_ENV: &str = "CUTOUT_LOG";

// ONNX Runtime reports every graph optimisation pass at info.
const ORT_DIRECTIVE: &str = "ort=warn";

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the logging system.
///
/// The filter comes from `CUTOUT_LOG` when set, otherwise from `log.level`
/// in the config. Either accepts any `EnvFilter` directive.
pub fn init(config: &LogConfig) -> Result<()> {
    let directive = filter_directive(std::env::var(LOG_ENV).ok(), &config.level);
    let env_filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .init();

            tracing::info!(filter = %directive, "Logging initialized with journald backend");
            return Ok(());
        }
    }

    std::fs::create_dir_all(&config.dir)?;

    let file_appender = tracing_appender::rolling::daily(&config.dir, "cutout.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the writer thread; init() runs once per process.
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!(dir = ?config.dir, filter = %directive, "Logging initialized with file backend");
    Ok(())
}

/// Pick the filter directive and quiet ONNX Runtime unless it is named.
fn filter_directive(env: Option<String>, level: &str) -> String {
    let base = env
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| level.trim().to_string());

    if base.is_empty() {
        return format!("info,{}", ORT_DIRECTIVE);
    }
    if base.split(',').any(|d| d.trim_start().starts_with("ort")) {
        return base;
    }
    format!("{},{}", base, ORT_DIRECTIVE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_level_is_default() {
        assert_eq!(filter_directive(None, "debug"), "debug,ort=warn");
        assert_eq!(filter_directive(None, ""), "info,ort=warn");
    }

    #[test]
    fn test_env_overrides_config() {
        assert_eq!(
            filter_directive(Some("cutout=trace".to_string()), "info"),
            "cutout=trace,ort=warn"
        );
        assert_eq!(filter_directive(Some("  ".to_string()), "warn"), "warn,ort=warn");
    }

    #[test]
    fn test_explicit_ort_directive_is_kept() {
        assert_eq!(
            filter_directive(Some("info,ort=debug".to_string()), "info"),
            "info,ort=debug"
        );
    }
}
