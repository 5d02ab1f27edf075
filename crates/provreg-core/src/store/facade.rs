//! The configuration store facade.
//!
//! `ConfigurationStore` is the single authority for whether a store operation
//! is allowed right now. It owns the backend, the run policy and the two
//! cached root handles, traces every primitive when verbose, and keeps the
//! caller's [`ChangeCounters`] up to date.

use super::backend::HiveBackend;
use super::counters::ChangeCounters;
use super::handle::StoreHandle;
use super::value::{join_path, RootScope, StorePolicy, StoreValue};
use crate::error::{Result, SetupError};
use std::sync::Arc;
use tracing::{error, trace};

/// Layered wrapper enforcing read-only and simulate policy over a backend.
pub struct ConfigurationStore {
    backend: Arc<dyn HiveBackend>,
    policy: StorePolicy,
    verbose: bool,
    current_user: StoreHandle,
    local_machine: StoreHandle,
    closed: bool,
}

impl ConfigurationStore {
    /// Open both root scopes on `backend` under `policy`.
    pub fn new(backend: Arc<dyn HiveBackend>, policy: StorePolicy) -> Result<Self> {
        let current_user = Self::open_root(&backend, RootScope::CurrentUser, policy)?;
        let local_machine = Self::open_root(&backend, RootScope::LocalMachine, policy)?;

        Ok(Self {
            backend,
            policy,
            verbose: false,
            current_user,
            local_machine,
            closed: false,
        })
    }

    fn open_root(
        backend: &Arc<dyn HiveBackend>,
        scope: RootScope,
        policy: StorePolicy,
    ) -> Result<StoreHandle> {
        let node = backend.root(scope)?;
        Ok(StoreHandle::open(
            Arc::clone(backend),
            node,
            scope.as_str().to_string(),
            policy,
        ))
    }

    /// Emit a trace line for every primitive.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    pub fn is_simulate(&self) -> bool {
        self.policy.simulate
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    fn check_disposed(&self) -> Result<()> {
        if self.closed {
            return Err(SetupError::Disposed {
                what: "ConfigurationStore",
            });
        }
        Ok(())
    }

    /// Cached root handle for `scope`.
    pub fn root(&self, scope: RootScope) -> Result<&StoreHandle> {
        self.check_disposed()?;
        Ok(match scope {
            RootScope::CurrentUser => &self.current_user,
            RootScope::LocalMachine => &self.local_machine,
        })
    }

    /// Scope of `handle` if it is one of this store's open root handles.
    pub fn scope_of(&self, handle: &StoreHandle) -> Option<RootScope> {
        if self.closed {
            return None;
        }
        let node = handle.node()?;
        if self.current_user.node() == Some(node) {
            Some(RootScope::CurrentUser)
        } else if self.local_machine.node() == Some(node) {
            Some(RootScope::LocalMachine)
        } else {
            None
        }
    }

    pub fn is_supported_root(&self, handle: &StoreHandle) -> bool {
        self.scope_of(handle).is_some()
    }

    fn trace_op(&self, operation: &str, handle: &StoreHandle, detail: &str) {
        if self.verbose {
            let name = handle.name().unwrap_or("<disposed>");
            if detail.is_empty() {
                trace!("{}: {}", operation, name);
            } else {
                trace!("{}: {} {}", operation, name, detail);
            }
        }
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e @ SetupError::ReadOnlyViolation { .. }) = &result {
            error!("{}", e);
        }
        result
    }

    // ========================================
    // Read-through primitives
    // ========================================

    /// Open an existing child. `Ok(None)` if the path does not exist.
    pub fn open_child(
        &self,
        parent: &StoreHandle,
        path: &str,
        writable: bool,
    ) -> Result<Option<StoreHandle>> {
        self.check_disposed()?;
        self.trace_op("OpenSubKey", parent, &format!("{} writable={}", path, writable));
        parent.open_child(path, writable)
    }

    pub fn get_value(&self, handle: &StoreHandle, name: Option<&str>) -> Result<Option<StoreValue>> {
        self.check_disposed()?;
        self.trace_op("GetValue", handle, name.unwrap_or("(default)"));
        handle.get_value(name)
    }

    pub fn child_names(&self, handle: &StoreHandle) -> Result<Vec<String>> {
        self.check_disposed()?;
        self.trace_op("GetSubKeyNames", handle, "");
        handle.child_names()
    }

    // ========================================
    // Counted primitives
    // ========================================

    /// Create (or open) a child. `nodes_created` is counted even when the
    /// underlying call fails.
    pub fn create_child(
        &self,
        parent: &StoreHandle,
        path: &str,
        counters: &mut ChangeCounters,
    ) -> Result<StoreHandle> {
        self.check_disposed()?;
        self.trace_op("CreateSubKey", parent, path);
        let result = parent.create_child(path);
        counters.nodes_created += 1;
        self.report(result)
    }

    pub fn set_value(
        &self,
        handle: &StoreHandle,
        name: Option<&str>,
        value: StoreValue,
        counters: &mut ChangeCounters,
    ) -> Result<()> {
        self.check_disposed()?;
        self.trace_op(
            "SetValue",
            handle,
            &format!("{} = {}", name.unwrap_or("(default)"), value),
        );
        self.report(handle.set_value(name, value))?;
        counters.values_set += 1;
        Ok(())
    }

    pub fn delete_value(
        &self,
        handle: &StoreHandle,
        name: Option<&str>,
        throw_on_missing: bool,
        counters: &mut ChangeCounters,
    ) -> Result<()> {
        self.check_disposed()?;
        self.trace_op("DeleteValue", handle, name.unwrap_or("(default)"));
        self.report(handle.delete_value(name, throw_on_missing))?;
        counters.values_deleted += 1;
        Ok(())
    }

    pub fn delete_child(
        &self,
        parent: &StoreHandle,
        path: &str,
        throw_on_missing: bool,
        counters: &mut ChangeCounters,
    ) -> Result<()> {
        self.check_disposed()?;
        self.trace_op("DeleteSubKey", parent, path);
        self.report(parent.delete_child(path, throw_on_missing))?;
        counters.nodes_deleted += 1;
        Ok(())
    }

    pub fn delete_subtree(
        &self,
        parent: &StoreHandle,
        path: &str,
        counters: &mut ChangeCounters,
    ) -> Result<()> {
        self.check_disposed()?;
        self.trace_op("DeleteSubKeyTree", parent, path);
        self.report(parent.delete_subtree(path))?;
        counters.nodes_deleted += 1;
        Ok(())
    }

    // ========================================
    // Merge and tolerant-removal helpers
    // ========================================

    /// Open `path` writable, creating it only if it is absent.
    ///
    /// Returns the handle and whether a create was issued.
    pub fn ensure_child(
        &self,
        parent: &StoreHandle,
        path: &str,
        counters: &mut ChangeCounters,
    ) -> Result<(StoreHandle, bool)> {
        if let Some(existing) = self.open_child(parent, path, true)? {
            return Ok((existing, false));
        }
        Ok((self.create_child(parent, path, counters)?, true))
    }

    /// Set a value only when the current value differs. Returns whether a set
    /// was issued.
    pub fn ensure_value(
        &self,
        handle: &StoreHandle,
        name: Option<&str>,
        value: impl Into<StoreValue>,
        counters: &mut ChangeCounters,
    ) -> Result<bool> {
        let value = value.into();
        if self.get_value(handle, name)?.as_ref() == Some(&value) {
            return Ok(false);
        }
        self.set_value(handle, name, value, counters)?;
        Ok(true)
    }

    /// Delete a child subtree if present. Returns whether a delete was issued.
    ///
    /// A missing child is skipped, or reported as [`SetupError::NodeMissing`]
    /// when `throw_on_missing` is set.
    pub fn remove_child_tree(
        &self,
        parent: &StoreHandle,
        path: &str,
        throw_on_missing: bool,
        counters: &mut ChangeCounters,
    ) -> Result<bool> {
        if self.open_child(parent, path, false)?.is_none() {
            if throw_on_missing {
                return Err(SetupError::NodeMissing {
                    path: join_path(parent.name()?, path),
                });
            }
            return Ok(false);
        }
        self.delete_subtree(parent, path, counters)?;
        Ok(true)
    }

    /// Delete a value if present. Returns whether a delete was issued.
    pub fn remove_value(
        &self,
        handle: &StoreHandle,
        name: Option<&str>,
        throw_on_missing: bool,
        counters: &mut ChangeCounters,
    ) -> Result<bool> {
        if self.get_value(handle, name)?.is_none() {
            if throw_on_missing {
                return Err(SetupError::ValueMissing {
                    path: handle.name()?.to_string(),
                    name: name.unwrap_or("(default)").to_string(),
                });
            }
            return Ok(false);
        }
        self.delete_value(handle, name, throw_on_missing, counters)?;
        Ok(true)
    }

    /// Close both root handles. Safe to call more than once.
    pub fn close(&mut self) {
        self.current_user.close();
        self.local_machine.close();
        self.closed = true;
    }
}

impl Drop for ConfigurationStore {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryHive;

    fn store(hive: &Arc<MemoryHive>, policy: StorePolicy) -> ConfigurationStore {
        ConfigurationStore::new(hive.clone(), policy).unwrap()
    }

    #[test]
    fn test_roots_are_supported() {
        let hive = Arc::new(MemoryHive::new());
        let store = store(&hive, StorePolicy::default());
        let root = store.root(RootScope::LocalMachine).unwrap();
        assert!(store.is_supported_root(root));
        assert_eq!(store.scope_of(root), Some(RootScope::LocalMachine));

        let child = store
            .create_child(root, "Software", &mut ChangeCounters::default())
            .unwrap();
        assert!(!store.is_supported_root(&child));
    }

    #[test]
    fn test_counters_match_between_real_and_simulated_runs() {
        fn run(store: &ConfigurationStore) -> ChangeCounters {
            let mut counters = ChangeCounters::default();
            let root = store.root(RootScope::CurrentUser).unwrap();
            let (key, _) = store.ensure_child(root, "Software\\Vendor", &mut counters).unwrap();
            store.ensure_value(&key, None, "dir", &mut counters).unwrap();
            store.ensure_value(&key, Some("ID"), 400u32, &mut counters).unwrap();
            store
                .remove_child_tree(root, "Software\\Legacy", false, &mut counters)
                .unwrap();
            counters
        }

        let real_hive = Arc::new(MemoryHive::new());
        let real = run(&store(&real_hive, StorePolicy::for_run(false)));

        let sim_hive = Arc::new(MemoryHive::new());
        let simulated = run(&store(&sim_hive, StorePolicy::for_run(true)));

        assert_eq!(real, simulated);
        assert_eq!(real.nodes_created, 1);
        assert_eq!(real.values_set, 2);
        assert_eq!(sim_hive.snapshot().unwrap(), MemoryHive::new().snapshot().unwrap());
    }

    #[test]
    fn test_ensure_value_skips_equal_values() {
        let hive = Arc::new(MemoryHive::new());
        hive.seed_value(RootScope::CurrentUser, "Software", "Name", "same")
            .unwrap();
        let store = store(&hive, StorePolicy::default());
        let root = store.root(RootScope::CurrentUser).unwrap();
        let mut counters = ChangeCounters::default();

        let (key, created) = store.ensure_child(root, "Software", &mut counters).unwrap();
        assert!(!created);
        assert!(!store.ensure_value(&key, Some("name"), "same", &mut counters).unwrap());
        assert!(store.ensure_value(&key, Some("name"), "other", &mut counters).unwrap());
        assert_eq!(counters.values_set, 1);
    }

    #[test]
    fn test_create_failure_is_still_counted() {
        let hive = Arc::new(MemoryHive::new());
        let store = store(&hive, StorePolicy::new(false, true, false));
        let root = store.root(RootScope::CurrentUser).unwrap();
        let mut counters = ChangeCounters::default();

        let err = store.create_child(root, "Software", &mut counters).unwrap_err();
        assert!(matches!(err, SetupError::ReadOnlyViolation { .. }));
        assert_eq!(counters.nodes_created, 1);

        let err = store
            .set_value(root, Some("x"), 1u32.into(), &mut counters)
            .unwrap_err();
        assert!(matches!(err, SetupError::ReadOnlyViolation { .. }));
        assert_eq!(counters.values_set, 0);
    }

    #[test]
    fn test_tolerant_removal() {
        let hive = Arc::new(MemoryHive::new());
        let store = store(&hive, StorePolicy::default());
        let root = store.root(RootScope::CurrentUser).unwrap();
        let mut counters = ChangeCounters::default();

        assert!(!store
            .remove_child_tree(root, "Missing", false, &mut counters)
            .unwrap());
        assert!(!store.remove_value(root, Some("Missing"), false, &mut counters).unwrap());
        assert!(counters.is_empty());

        assert!(matches!(
            store.remove_child_tree(root, "Missing", true, &mut counters),
            Err(SetupError::NodeMissing { .. })
        ));
        assert!(matches!(
            store.remove_value(root, Some("Missing"), true, &mut counters),
            Err(SetupError::ValueMissing { .. })
        ));
    }

    #[test]
    fn test_closed_store_is_disposed() {
        let hive = Arc::new(MemoryHive::new());
        let mut store = store(&hive, StorePolicy::default());
        store.close();
        store.close();

        assert!(matches!(
            store.root(RootScope::CurrentUser),
            Err(SetupError::Disposed { .. })
        ));
        assert_eq!(hive.open_handle_count().unwrap(), 0);
    }
}
