//! Logging setup.
//!
//! Logs go to stderr; stdout carries tagging results.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directives appended to the default filter. ONNX Runtime is chatty at info.
const QUIET_DEPENDENCIES: &str = "ort=warn";

/// Filter string used when `RUST_LOG` is not set.
fn default_filter(level: &str) -> String {
    format!("{level},{QUIET_DEPENDENCIES}")
}

/// Install the global subscriber at `level`, as pretty text or JSON.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Pick level and format from `[logging]`, with CLI flags taking priority.
pub fn init_from_config(config: &wdtag_core::Config, verbose: bool, json_logs: bool) {
    let (level, json_format) = resolve(config, verbose, json_logs);
    init(&level, json_format);
}

fn resolve(config: &wdtag_core::Config, verbose: bool, json_logs: bool) -> (String, bool) {
    let level = if verbose && !matches!(config.logging.level.as_str(), "trace") {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    (level, json_logs || config.logging.format == "json")
}
