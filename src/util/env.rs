use std::path::PathBuf;
use std::sync::Once;

use crate::ingest::urls::DEFAULT_BASE_URL;

static INIT: Once = Once::new();

/// Load `.env` once per process. Safe to call from every entry point.
pub fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
    });
}

/// Base URL of the publisher archive. Override with AE_BASE_URL
/// (useful for pointing at a local mirror).
pub fn base_url() -> String {
    std::env::var("AE_BASE_URL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Path of the organisation registry snapshot (AE_EXPORT_PATH).
pub fn export_path() -> PathBuf {
    std::env::var("AE_EXPORT_PATH")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("organisation_code.csv"))
}

/// Directory chart PNGs are written to (AE_OUT_DIR, defaults to cwd).
pub fn out_dir() -> PathBuf {
    std::env::var("AE_OUT_DIR")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
