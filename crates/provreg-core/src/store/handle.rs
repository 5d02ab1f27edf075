//! Policy-carrying handle to one node of the store.

use super::backend::{HiveBackend, DEFAULT_VALUE_NAME};
use super::value::{join_path, NodeId, StorePolicy, StoreValue};
use crate::error::{Result, SetupError};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Open(NodeId),
    /// Stand-in for a node that a simulated run would have created.
    Virtual,
    Closed,
}

/// RAII handle to a single store node.
///
/// Every handle carries the policy of the store that produced it. Writes are
/// refused under read-only policy and silently skipped under simulate policy.
/// After [`close`](StoreHandle::close) every other method fails with
/// [`SetupError::Disposed`]. Dropping the handle closes it.
pub struct StoreHandle {
    backend: Arc<dyn HiveBackend>,
    state: HandleState,
    name: String,
    policy: StorePolicy,
}

impl StoreHandle {
    pub(crate) fn open(
        backend: Arc<dyn HiveBackend>,
        node: NodeId,
        name: String,
        policy: StorePolicy,
    ) -> Self {
        Self {
            backend,
            state: HandleState::Open(node),
            name,
            policy,
        }
    }

    fn fabricate(&self, path: &str) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            state: HandleState::Virtual,
            name: join_path(&self.name, path),
            policy: self.policy,
        }
    }

    fn check_disposed(&self) -> Result<()> {
        if self.state == HandleState::Closed {
            return Err(SetupError::Disposed {
                what: "StoreHandle",
            });
        }
        Ok(())
    }

    fn check_writable(&self, operation: &'static str) -> Result<()> {
        self.check_disposed()?;
        if self.policy.read_only {
            return Err(SetupError::ReadOnlyViolation {
                operation,
                path: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Backend node for a write, or `None` when the write must be skipped.
    fn write_target(&self, operation: &'static str) -> Result<Option<NodeId>> {
        self.check_writable(operation)?;
        if self.policy.simulate {
            return Ok(None);
        }
        Ok(self.node())
    }

    pub(crate) fn node(&self) -> Option<NodeId> {
        match self.state {
            HandleState::Open(node) => Some(node),
            _ => None,
        }
    }

    /// Display name: the parent's name and the child path joined with `\`.
    pub fn name(&self) -> Result<&str> {
        self.check_disposed()?;
        Ok(&self.name)
    }

    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    /// True for handles fabricated by a simulated create of a missing node.
    pub fn is_virtual(&self) -> bool {
        self.state == HandleState::Virtual
    }

    pub fn is_closed(&self) -> bool {
        self.state == HandleState::Closed
    }

    /// Open an existing child. `None` if it does not exist.
    ///
    /// Simulate policy always opens read-only.
    pub fn open_child(&self, path: &str, writable: bool) -> Result<Option<StoreHandle>> {
        self.check_disposed()?;
        let Some(node) = self.node() else {
            return Ok(None);
        };

        let writable = writable && !self.policy.simulate;
        Ok(self.backend.open_node(node, path, writable)?.map(|child| {
            StoreHandle::open(
                Arc::clone(&self.backend),
                child,
                join_path(&self.name, path),
                self.policy,
            )
        }))
    }

    /// Create a child, or open it if it already exists.
    ///
    /// Under simulate policy an existing child is opened read-only and a
    /// missing one is represented by a virtual handle.
    pub fn create_child(&self, path: &str) -> Result<StoreHandle> {
        self.check_writable("create node")?;

        if self.policy.simulate {
            return Ok(match self.open_child(path, false)? {
                Some(existing) => existing,
                None => self.fabricate(path),
            });
        }

        let node = self.node().ok_or_else(|| SetupError::Store {
            message: "cannot create a node below a virtual node".to_string(),
            path: self.name.clone(),
        })?;
        let child = self.backend.create_node(node, path)?;
        Ok(StoreHandle::open(
            Arc::clone(&self.backend),
            child,
            join_path(&self.name, path),
            self.policy,
        ))
    }

    /// Read a value; `None` names the default value.
    pub fn get_value(&self, name: Option<&str>) -> Result<Option<StoreValue>> {
        self.check_disposed()?;
        match self.node() {
            Some(node) => self
                .backend
                .get_value(node, name.unwrap_or(DEFAULT_VALUE_NAME)),
            None => Ok(None),
        }
    }

    pub fn child_names(&self) -> Result<Vec<String>> {
        self.check_disposed()?;
        match self.node() {
            Some(node) => self.backend.child_names(node),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_value(&self, name: Option<&str>, value: StoreValue) -> Result<()> {
        match self.write_target("set value")? {
            Some(node) => self
                .backend
                .set_value(node, name.unwrap_or(DEFAULT_VALUE_NAME), value),
            None => Ok(()),
        }
    }

    pub fn delete_value(&self, name: Option<&str>, throw_on_missing: bool) -> Result<()> {
        match self.write_target("delete value")? {
            Some(node) => self.backend.delete_value(
                node,
                name.unwrap_or(DEFAULT_VALUE_NAME),
                throw_on_missing,
            ),
            None => Ok(()),
        }
    }

    /// Delete a childless child node.
    pub fn delete_child(&self, path: &str, throw_on_missing: bool) -> Result<()> {
        match self.write_target("delete node")? {
            Some(node) => self.backend.delete_node(node, path, throw_on_missing),
            None => Ok(()),
        }
    }

    /// Delete a child node and everything below it.
    pub fn delete_subtree(&self, path: &str) -> Result<()> {
        match self.write_target("delete tree")? {
            Some(node) => self.backend.delete_tree(node, path),
            None => Ok(()),
        }
    }

    /// Raw backend node, for callers that must bypass the modeled operations.
    ///
    /// Refused under restricted policy. Virtual handles have no node.
    pub fn native_unguarded(&self) -> Result<Option<NodeId>> {
        self.check_disposed()?;
        if self.policy.restricted {
            return Err(SetupError::RestrictedAccess {
                path: self.name.clone(),
            });
        }
        Ok(self.node())
    }

    /// Release the backend node. Safe to call more than once.
    pub fn close(&mut self) {
        if let HandleState::Open(node) = self.state {
            self.backend.close_node(node);
        }
        self.state = HandleState::Closed;
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("policy", &self.policy)
            .finish()
    }
}
