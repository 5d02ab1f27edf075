//! Native hierarchical key/value store boundary.
//!
//! A backend hands out [`NodeId`] handles the way an operating system hands
//! out key handles: every handle returned by `root`, `open_node` or
//! `create_node` must eventually be passed to `close_node`. Backends do not
//! enforce simulate or read-only policy; that is the job of
//! [`StoreHandle`](super::StoreHandle) and
//! [`ConfigurationStore`](super::ConfigurationStore).

use super::value::{NodeId, RootScope, StoreValue};
use crate::error::Result;

/// Name used for a node's default (unnamed) value.
pub const DEFAULT_VALUE_NAME: &str = "";

/// Generic hierarchical store backend.
///
/// Paths are relative to the parent handle and use `\` as the separator.
/// Names (both node and value names) compare case-insensitively.
pub trait HiveBackend: Send + Sync {
    /// Short backend description for diagnostics.
    fn describe(&self) -> String;

    /// Open a writable handle on one of the two root scopes.
    fn root(&self, scope: RootScope) -> Result<NodeId>;

    /// Open an existing node below `parent`.
    ///
    /// Returns `None` if the path does not exist.
    fn open_node(&self, parent: NodeId, path: &str, writable: bool) -> Result<Option<NodeId>>;

    /// Create (or open, if it already exists) a node below `parent`.
    ///
    /// The parent must have been opened writable. The returned handle is writable.
    fn create_node(&self, parent: NodeId, path: &str) -> Result<NodeId>;

    /// Release a handle. Closing an unknown handle is a no-op.
    fn close_node(&self, node: NodeId);

    /// Full display path of the node behind a handle.
    fn node_path(&self, node: NodeId) -> Result<String>;

    /// Names of the direct children, in display case, sorted case-insensitively.
    fn child_names(&self, node: NodeId) -> Result<Vec<String>>;

    /// Read a value. `None` if the value does not exist.
    fn get_value(&self, node: NodeId, name: &str) -> Result<Option<StoreValue>>;

    /// Write a value, replacing any previous value with the same name.
    fn set_value(&self, node: NodeId, name: &str, value: StoreValue) -> Result<()>;

    /// Delete a value. Missing values are an error only if `throw_on_missing`.
    fn delete_value(&self, node: NodeId, name: &str, throw_on_missing: bool) -> Result<()>;

    /// Delete a childless node. Missing nodes are an error only if `throw_on_missing`.
    fn delete_node(&self, parent: NodeId, path: &str, throw_on_missing: bool) -> Result<()>;

    /// Delete a node and everything below it. The node must exist.
    fn delete_tree(&self, parent: NodeId, path: &str) -> Result<()>;
}
