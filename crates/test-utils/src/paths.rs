//! Path utilities for locating bundled configuration and scratch space.

use std::path::PathBuf;

/// Returns the workspace root directory.
///
/// This is determined by walking up from the test-utils manifest directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Directory of the evaluation scripts shipped with the service.
pub fn evalscript_dir() -> PathBuf {
    workspace_root().join("config").join("evalscripts")
}

/// Path of the default service configuration file.
pub fn service_config_path() -> PathBuf {
    workspace_root().join("config").join("naturalness.yaml")
}

/// Creates a temporary cache directory that is cleaned up when dropped.
///
/// # Example
///
/// ```
/// use test_utils::temp_cache_dir;
///
/// let dir = temp_cache_dir();
/// assert!(dir.path().exists());
/// ```
pub fn temp_cache_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("naturalness-cache-")
        .tempdir()
        .expect("Failed to create temp cache dir")
}
