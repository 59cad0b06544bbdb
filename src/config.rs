use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "rxlens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when `RUST_LOG` is not set.
/// Debug builds are chattier about per-stage pipeline decisions.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "rxlens_lib=debug,rxlens=debug,warn"
    } else {
        "rxlens_lib=info,rxlens=info,warn"
    }
}

/// Per-user data directory (`$XDG_DATA_HOME/rxlens` on Linux).
/// `None` when the platform has no notion of a data directory.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_NAME))
}

/// Directory checked for knowledge-base override files at startup.
pub fn knowledge_override_dir() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("knowledge"))
}
