//! Shared test bootstrap.

#![allow(dead_code)]

use tracing_subscriber::EnvFilter;

/// Installs a tracing subscriber for the test binary. Idempotent.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A per-test temp file path that will not collide across test binaries.
pub fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("schedlab-{}-{}", std::process::id(), name))
}
