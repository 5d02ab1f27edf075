//! JSON-file hive backend.
//!
//! The whole hive is loaded into a [`MemoryHive`] on open and rewritten
//! atomically after every committed mutation, so an interrupted run leaves
//! either the previous or the new document on disk. A mutation whose write
//! fails is rolled back in memory as well.

use super::backend::HiveBackend;
use super::memory::{HiveSnapshot, MemoryHive};
use super::value::{NodeId, RootScope, StoreValue};
use crate::atomic::{atomic_read_json, atomic_write_json};
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persistent hive stored as a single JSON document.
#[derive(Debug)]
pub struct FileHive {
    path: PathBuf,
    inner: MemoryHive,
    keep_backup: bool,
}

impl FileHive {
    /// Open a hive file, starting from an empty hive if it does not exist yet.
    ///
    /// Nothing is written until the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = match atomic_read_json::<HiveSnapshot>(&path)? {
            Some(snapshot) => {
                debug!("Loaded hive from {}", path.display());
                MemoryHive::from_snapshot(snapshot)
            }
            None => {
                info!("Hive file {} not found, starting empty", path.display());
                MemoryHive::new()
            }
        };

        Ok(Self {
            path,
            inner,
            keep_backup: false,
        })
    }

    /// Keep a `.bak` copy of the previous document on every rewrite.
    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the current contents of both scopes.
    pub fn snapshot(&self) -> Result<HiveSnapshot> {
        self.inner.snapshot()
    }

    fn persist(&self) -> Result<()> {
        atomic_write_json(&self.path, &self.inner.snapshot()?, self.keep_backup)
    }

    /// Apply `mutate` and persist the result, undoing it if the write fails.
    fn commit<T>(&self, mutate: impl FnOnce(&MemoryHive) -> Result<T>) -> Result<T> {
        let before = self.inner.snapshot()?;
        let out = mutate(&self.inner)?;
        if let Err(e) = self.persist() {
            if let Err(restore) = self.inner.restore(before) {
                warn!("Failed to roll back hive {}: {}", self.path.display(), restore);
            }
            return Err(e);
        }
        Ok(out)
    }
}

impl HiveBackend for FileHive {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn root(&self, scope: RootScope) -> Result<NodeId> {
        self.inner.root(scope)
    }

    fn open_node(&self, parent: NodeId, path: &str, writable: bool) -> Result<Option<NodeId>> {
        self.inner.open_node(parent, path, writable)
    }

    fn create_node(&self, parent: NodeId, path: &str) -> Result<NodeId> {
        let before = self.inner.snapshot()?;
        let node = self.inner.create_node(parent, path)?;
        if let Err(e) = self.persist() {
            self.inner.close_node(node);
            if let Err(restore) = self.inner.restore(before) {
                warn!("Failed to roll back hive {}: {}", self.path.display(), restore);
            }
            return Err(e);
        }
        Ok(node)
    }

    fn close_node(&self, node: NodeId) {
        self.inner.close_node(node)
    }

    fn node_path(&self, node: NodeId) -> Result<String> {
        self.inner.node_path(node)
    }

    fn child_names(&self, node: NodeId) -> Result<Vec<String>> {
        self.inner.child_names(node)
    }

    fn get_value(&self, node: NodeId, name: &str) -> Result<Option<StoreValue>> {
        self.inner.get_value(node, name)
    }

    fn set_value(&self, node: NodeId, name: &str, value: StoreValue) -> Result<()> {
        self.commit(|inner| inner.set_value(node, name, value))
    }

    fn delete_value(&self, node: NodeId, name: &str, throw_on_missing: bool) -> Result<()> {
        self.commit(|inner| inner.delete_value(node, name, throw_on_missing))
    }

    fn delete_node(&self, parent: NodeId, path: &str, throw_on_missing: bool) -> Result<()> {
        self.commit(|inner| inner.delete_node(parent, path, throw_on_missing))
    }

    fn delete_tree(&self, parent: NodeId, path: &str) -> Result<()> {
        self.commit(|inner| inner.delete_tree(parent, path))
    }
}
