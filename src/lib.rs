pub mod config;
pub mod pipeline_config; // Analyzer policy values + env overrides
pub mod models;
pub mod pipeline;
pub mod intelligence; // Knowledge base + disease detection

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config::default_log_filter()`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("{} v{} tracing initialized", config::APP_NAME, config::APP_VERSION);
}
