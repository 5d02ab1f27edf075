//! Atomic file operations for safe JSON persistence.
//!
//! Writes go to a uniquely named temp file next to the target, are synced to
//! disk, and then renamed over the target so readers never see a partial file.

use crate::error::{Result, SetupError};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|e| SetupError::Io {
        message: format!("Failed to read {}", path.display()),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    let data: T = serde_json::from_str(&contents).map_err(|e| SetupError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Write data to a JSON file atomically.
///
/// When `keep_backup` is set the previous file is copied to `<name>.bak`
/// before being replaced.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| SetupError::io_with_path(e, parent))?;
        }
    }

    let temp_path = path.with_extension(format!(
        "json.{}.{}.tmp",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| SetupError::Json {
        message: format!("Failed to serialize data: {}", e),
        source: Some(e),
    })?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| SetupError::Io {
                message: format!("Failed to create temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;

        let written = file
            .write_all(serialized.as_bytes())
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_all());
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(SetupError::Io {
                message: format!("Failed to write temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            });
        }
    }

    if keep_backup && path.exists() {
        let backup_path = path.with_extension("json.bak");
        if let Err(e) = fs::copy(path, &backup_path) {
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
        }
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        SetupError::Io {
            message: format!("Failed to rename temp file to {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        }
    })?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_read_missing_returns_none() {
        let temp = TempDir::new().unwrap();
        let result: Option<Sample> = atomic_read_json(&temp.path().join("missing.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("hive.json");
        let sample = Sample {
            name: "hive".into(),
            count: 3,
        };

        atomic_write_json(&path, &sample, false).unwrap();
        let loaded: Sample = atomic_read_json(&path).unwrap().unwrap();
        assert_eq!(loaded, sample);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_backup_keeps_previous_contents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hive.json");

        atomic_write_json(&path, &Sample { name: "a".into(), count: 1 }, true).unwrap();
        atomic_write_json(&path, &Sample { name: "b".into(), count: 2 }, true).unwrap();

        let backup: Sample = atomic_read_json(&path.with_extension("json.bak")).unwrap().unwrap();
        assert_eq!(backup.name, "a");
    }

    #[test]
    fn test_invalid_json_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let result: Result<Option<Sample>> = atomic_read_json(&path);
        assert!(matches!(result, Err(SetupError::Json { .. })));
    }
}
