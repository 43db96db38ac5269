// src/logging.rs
//! Logger initialization.
//!
//! The crate logs through the `log` facade (and `tracing` spans, which forward to
//! `log`). This helper installs `env_logger` natively and `console_log` on the web.

use std::sync::Once;

use log::LevelFilter;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "material_plugins=debug"). When `None`, `RUST_LOG` is used, then `default_level`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub default_level: LevelFilter,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: if cfg!(debug_assertions) {
                LevelFilter::Debug
            } else {
                LevelFilter::Warn
            },
            timestamps: true,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once. Subsequent calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let mut builder = env_logger::Builder::new();
            builder.filter_level(config.default_level);

            if let Some(filter) = &config.env_filter {
                builder.parse_filters(filter);
            } else if let Ok(filter) = std::env::var("RUST_LOG") {
                builder.parse_filters(&filter);
            }

            if config.timestamps {
                builder.format_timestamp_millis();
            } else {
                builder.format_timestamp(None);
            }

            // A test harness may already have installed a logger.
            if builder.try_init().is_err() {
                return;
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            let level = config.default_level.to_level().unwrap_or(log::Level::Warn);
            if console_log::init_with_level(level).is_err() {
                return;
            }
        }

        log::debug!("logging initialized");
    });
}
