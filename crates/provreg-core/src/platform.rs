//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here.

use crate::config::AppConfig;
use crate::error::{Result, SetupError};
use std::path::PathBuf;

/// Returns true if this process is a 64-bit process.
pub fn is_64bit_process() -> bool {
    cfg!(target_pointer_width = "64")
}

/// Directory holding the system libraries that in-process servers point at.
///
/// # Platform Behavior
/// - **Windows**: `%SystemRoot%\System32`, or `%SystemRoot%\SysWOW64` for the
///   32-bit view on a 64-bit process
/// - **Other**: `None`
pub fn system_directory(wow64: bool) -> Option<PathBuf> {
    #[cfg(windows)]
    {
        let root = std::env::var_os("SystemRoot").map(PathBuf::from)?;
        if wow64 && is_64bit_process() {
            Some(root.join("SysWOW64"))
        } else {
            Some(root.join("System32"))
        }
    }
    #[cfg(not(windows))]
    {
        let _ = wow64;
        None
    }
}

/// Base directory for provreg's own data (hive file, shared cache).
///
/// # Platform Behavior
/// - **Linux**: `~/.local/share/provreg`
/// - **Windows**: `%APPDATA%\provreg`
/// - **macOS**: `~/Library/Application Support/provreg`
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| SetupError::Config {
        message: "Could not determine data directory".to_string(),
    })?;
    Ok(base.join(AppConfig::APP_NAME))
}

/// Default location of the JSON hive file.
pub fn default_hive_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(AppConfig::DEFAULT_HIVE_FILE))
}

/// Default root of the shared component cache.
pub fn default_cache_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join(AppConfig::DEFAULT_CACHE_DIR))
}
