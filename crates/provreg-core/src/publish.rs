//! Shared component cache publishing.
//!
//! The provider files are published to a machine-wide cache so every runtime
//! can resolve them by name. Files go in core first and come out in reverse.

use crate::engine::OperationOutcome;
use crate::error::{Result, SetupError};
use crate::settings::Configuration;
use crate::store::ChangeCounters;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A cache that provider files can be published to.
pub trait SharedCache: Send + Sync {
    /// Publish `path`. Returns whether the cache changed.
    fn install(&self, path: &Path) -> Result<bool>;

    /// Withdraw the file named by `path`. Returns whether the cache changed.
    fn remove(&self, path: &Path) -> Result<bool>;

    /// Whether [`install`](Self::install) would change the cache. Read-only.
    fn would_install(&self, path: &Path) -> Result<bool>;

    /// Whether [`remove`](Self::remove) would change the cache. Read-only.
    fn would_remove(&self, path: &Path) -> Result<bool>;
}

/// Cache stored as `{root}/{file_stem}/{file_name}`.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    root: PathBuf,
}

impl DirectoryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `path` lives once published.
    pub fn entry_path(&self, path: &Path) -> Result<PathBuf> {
        let (Some(stem), Some(name)) = (path.file_stem(), path.file_name()) else {
            return Err(SetupError::Validation {
                field: "path".to_string(),
                message: format!("{} does not name a file", path.display()),
            });
        };
        Ok(self.root.join(stem).join(name))
    }
}

impl DirectoryCache {
    /// Source bytes of `path`, or `None` when the published copy already matches.
    fn pending_install(&self, path: &Path) -> Result<Option<(PathBuf, Vec<u8>)>> {
        let source = fs::read(path).map_err(|e| SetupError::io_with_path(e, path))?;
        let entry = self.entry_path(path)?;

        if let Ok(existing) = fs::read(&entry) {
            if existing == source {
                debug!("{} is already published", entry.display());
                return Ok(None);
            }
        }
        Ok(Some((entry, source)))
    }
}

impl SharedCache for DirectoryCache {
    fn install(&self, path: &Path) -> Result<bool> {
        let Some((entry, source)) = self.pending_install(path)? else {
            return Ok(false);
        };

        if let Some(parent) = entry.parent() {
            fs::create_dir_all(parent).map_err(|e| SetupError::io_with_path(e, parent))?;
        }
        fs::write(&entry, &source).map_err(|e| SetupError::io_with_path(e, &entry))?;
        Ok(true)
    }

    fn remove(&self, path: &Path) -> Result<bool> {
        let entry = self.entry_path(path)?;
        match fs::remove_file(&entry) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(SetupError::io_with_path(e, &entry)),
        }

        if let Some(parent) = entry.parent() {
            // Only succeeds once the directory is empty.
            let _ = fs::remove_dir(parent);
        }
        Ok(true)
    }

    fn would_install(&self, path: &Path) -> Result<bool> {
        Ok(self.pending_install(path)?.is_some())
    }

    fn would_remove(&self, path: &Path) -> Result<bool> {
        let entry = self.entry_path(path)?;
        match fs::metadata(&entry) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SetupError::io_with_path(e, &entry)),
        }
    }
}

/// Files to publish for `config`, in install order.
pub fn cache_files(config: &Configuration) -> Vec<PathBuf> {
    let mut files = vec![config.core_file.clone()];
    if config.is_linq_supported() {
        files.push(config.linq_file.clone());
    }
    if config.is_ef6_supported() {
        files.push(config.ef6_file.clone());
    }
    if config.designer_in_cache() {
        files.push(config.designer_file.clone());
    }
    files
}

/// Publish (or withdraw) `files` through `cache`.
///
/// Removal walks the list in reverse. Under simulate the cache is only asked
/// what would change, so the counters match a real run from the same state.
pub fn publish(
    cache: &dyn SharedCache,
    files: &[PathBuf],
    install: bool,
    simulate: bool,
) -> Result<OperationOutcome> {
    let mut counters = ChangeCounters::default();
    let mut changed = false;

    let ordered: Vec<&PathBuf> = if install {
        files.iter().collect()
    } else {
        files.iter().rev().collect()
    };

    for path in ordered {
        if install {
            info!("Cache install: {}", path.display());
            let applied = if simulate {
                cache.would_install(path)?
            } else {
                cache.install(path)?
            };
            if applied {
                counters.files_created += 1;
                changed = true;
            }
        } else {
            info!("Cache remove: {}", path.display());
            let applied = if simulate {
                cache.would_remove(path)?
            } else {
                cache.remove(path)?
            };
            if applied {
                counters.files_deleted += 1;
                changed = true;
            }
        }
    }

    Ok(OperationOutcome::new(changed, counters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Surface;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl SharedCache for Recorder {
        fn install(&self, path: &Path) -> Result<bool> {
            self.calls.lock().unwrap().push(format!("+{}", path.display()));
            Ok(true)
        }

        fn remove(&self, path: &Path) -> Result<bool> {
            self.calls.lock().unwrap().push(format!("-{}", path.display()));
            Ok(true)
        }

        fn would_install(&self, path: &Path) -> Result<bool> {
            self.calls.lock().unwrap().push(format!("?+{}", path.display()));
            Ok(true)
        }

        fn would_remove(&self, path: &Path) -> Result<bool> {
            self.calls.lock().unwrap().push(format!("?-{}", path.display()));
            Ok(false)
        }
    }

    #[test]
    fn test_file_order_follows_configuration() {
        let mut config = Configuration::default();
        config.set_directory("/p");
        config.ef6_available = true;
        let names: Vec<String> = cache_files(&config)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "System.Data.SQLite.dll",
                "System.Data.SQLite.Linq.dll",
                "System.Data.SQLite.EF6.dll",
                "SQLite.Designer.dll"
            ]
        );

        config.surfaces.remove(&Surface::DesignerCache);
        config.ef6_available = false;
        config.suppress.netfx35 = true;
        config.suppress.netfx40 = true;
        config.suppress.netfx45 = true;
        config.suppress.netfx451 = true;
        assert_eq!(cache_files(&config), [PathBuf::from("/p/System.Data.SQLite.dll")]);
    }

    #[test]
    fn test_removal_runs_in_reverse() {
        let recorder = Recorder::default();
        let files = [PathBuf::from("a.dll"), PathBuf::from("b.dll")];

        publish(&recorder, &files, true, false).unwrap();
        publish(&recorder, &files, false, false).unwrap();
        assert_eq!(*recorder.calls.lock().unwrap(), ["+a.dll", "+b.dll", "-b.dll", "-a.dll"]);
    }

    #[test]
    fn test_simulate_only_queries_cache() {
        let recorder = Recorder::default();
        let files = [PathBuf::from("a.dll")];

        let outcome = publish(&recorder, &files, true, true).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.counters.files_created, 1);

        let outcome = publish(&recorder, &files, false, true).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.counters.files_deleted, 0);
        assert_eq!(*recorder.calls.lock().unwrap(), ["?+a.dll", "?-a.dll"]);
    }

    #[test]
    fn test_simulated_republish_matches_real() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("System.Data.SQLite.dll");
        fs::write(&source, b"image").unwrap();
        let cache = DirectoryCache::new(temp.path().join("cache"));
        let files = [source.clone()];

        assert!(!cache.would_remove(&source).unwrap());
        publish(&cache, &files, true, false).unwrap();
        assert!(!cache.would_install(&source).unwrap());
        assert!(cache.would_remove(&source).unwrap());

        let simulated = publish(&cache, &files, true, true).unwrap();
        let real = publish(&cache, &files, true, false).unwrap();
        assert_eq!(simulated, real);
        assert!(!simulated.changed);

        fs::write(&source, b"newer image").unwrap();
        assert!(cache.would_install(&source).unwrap());
        let entry = cache.entry_path(&source).unwrap();
        assert_eq!(fs::read(&entry).unwrap(), b"image");
    }

    #[test]
    fn test_directory_cache_round_trip() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("System.Data.SQLite.dll");
        fs::write(&source, b"image").unwrap();
        let cache = DirectoryCache::new(temp.path().join("cache"));

        assert!(cache.install(&source).unwrap());
        assert!(!cache.install(&source).unwrap());
        let entry = cache.entry_path(&source).unwrap();
        assert_eq!(
            entry,
            temp.path()
                .join("cache")
                .join("System.Data.SQLite")
                .join("System.Data.SQLite.dll")
        );
        assert_eq!(fs::read(&entry).unwrap(), b"image");

        assert!(cache.remove(&source).unwrap());
        assert!(!cache.remove(&source).unwrap());
        assert!(!entry.parent().unwrap().exists());
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let temp = TempDir::new().unwrap();
        let cache = DirectoryCache::new(temp.path());
        let err = cache.install(&temp.path().join("missing.dll")).unwrap_err();
        assert!(matches!(err, SetupError::Io { .. }));
    }
}
