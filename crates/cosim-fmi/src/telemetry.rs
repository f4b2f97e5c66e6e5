use std::sync::Once;

use cosim_core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the diagnostic log filter.
pub const LOG_ENV: &str = "COSIM_LOG";

static INIT: Once = Once::new();

/// Installs the stderr diagnostic subscriber, once per process.
///
/// `COSIM_LOG` overrides the configured filter. A subscriber the host already
/// installed is left in place.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(&config.filter))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        // Logs go to stderr; stdout belongs to the host.
        let subscriber = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true);

        let installed = match config.format {
            LogFormat::Json => subscriber.json().try_init(),
            LogFormat::Text => subscriber.try_init(),
        };
        if installed.is_ok() {
            tracing::debug!(filter = %config.filter, "Diagnostic logging initialized");
        }
    });
}
