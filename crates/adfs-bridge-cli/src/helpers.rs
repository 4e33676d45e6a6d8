//! Shared helpers for the CLI subcommands.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use adfs_bridge_auth::AdfsConfig;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// `RUST_LOG` overrides the default when set.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Load `.env` from the working directory or its parents, if present.
///
/// Runs before tracing is initialized so `RUST_LOG` may come from the file.
pub fn load_dotenv() -> Option<std::path::PathBuf> {
    dotenvy::dotenv().ok()
}

/// Build the ADFS configuration from the environment.
pub fn load_config() -> Result<AdfsConfig> {
    AdfsConfig::from_env().context("invalid ADFS configuration")
}

/// Show the first few characters of a secret.
pub fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    if value.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

/// `"yes"`/`"no"` for status output.
pub fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
