//! In-memory hive backend.
//!
//! `MemoryHive` keeps both root scopes as plain trees behind a mutex. It is the
//! backend used by simulate-purity tests (take a [`HiveSnapshot`] before and
//! after a run and compare) and the storage engine underneath
//! [`FileHive`](super::FileHive).

use super::backend::HiveBackend;
use super::value::{join_path, split_path, NodeId, RootScope, StoreValue};
use crate::error::{Result, SetupError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// A named value as stored in a node, keeping its display-case name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: StoreValue,
}

/// One node of the hive tree.
///
/// Maps are keyed by the lowercased name so lookups are case-insensitive while
/// the display-case name is preserved alongside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiveNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, NamedValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, HiveNode>,
}

impl HiveNode {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&HiveNode> {
        self.children.get(&fold(name))
    }

    /// Look up a descendant by `\`-separated relative path.
    pub fn descendant(&self, path: &str) -> Option<&HiveNode> {
        split_path(path)
            .into_iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    fn descendant_mut(&mut self, segments: &[String]) -> Option<&mut HiveNode> {
        let mut node = self;
        for segment in segments {
            node = node.children.get_mut(&fold(segment))?;
        }
        Some(node)
    }

    /// Look up a value by name. The empty name is the default value.
    pub fn value(&self, name: &str) -> Option<&StoreValue> {
        self.values.get(&fold(name)).map(|v| &v.value)
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(HiveNode::node_count).sum::<usize>()
    }
}

/// Complete copy of both root scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiveSnapshot {
    pub current_user: HiveNode,
    pub local_machine: HiveNode,
}

impl Default for HiveSnapshot {
    fn default() -> Self {
        Self {
            current_user: HiveNode::named(RootScope::CurrentUser.as_str()),
            local_machine: HiveNode::named(RootScope::LocalMachine.as_str()),
        }
    }
}

impl HiveSnapshot {
    pub fn scope(&self, scope: RootScope) -> &HiveNode {
        match scope {
            RootScope::CurrentUser => &self.current_user,
            RootScope::LocalMachine => &self.local_machine,
        }
    }

    fn scope_mut(&mut self, scope: RootScope) -> &mut HiveNode {
        match scope {
            RootScope::CurrentUser => &mut self.current_user,
            RootScope::LocalMachine => &mut self.local_machine,
        }
    }

    /// Look up a node by scope and relative path.
    pub fn node(&self, scope: RootScope, path: &str) -> Option<&HiveNode> {
        self.scope(scope).descendant(path)
    }
}

#[derive(Debug, Clone)]
struct OpenNode {
    scope: RootScope,
    segments: Vec<String>,
    writable: bool,
}

impl OpenNode {
    fn display_path(&self) -> String {
        self.segments
            .iter()
            .fold(self.scope.as_str().to_string(), |acc, s| join_path(&acc, s))
    }
}

#[derive(Debug, Default)]
struct HiveState {
    tree: HiveSnapshot,
    handles: HashMap<u64, OpenNode>,
    next_handle: u64,
}

impl HiveState {
    fn handle(&self, node: NodeId) -> Result<&OpenNode> {
        self.handles.get(&node.0).ok_or_else(|| SetupError::Store {
            message: "invalid handle".to_string(),
            path: node.to_string(),
        })
    }

    fn writable_handle(&self, node: NodeId) -> Result<OpenNode> {
        let open = self.handle(node)?.clone();
        if !open.writable {
            return Err(SetupError::AccessDenied {
                path: open.display_path(),
            });
        }
        Ok(open)
    }

    fn resolve(&self, open: &OpenNode) -> Result<&HiveNode> {
        let mut node = self.tree.scope(open.scope);
        for segment in &open.segments {
            node = node.child(segment).ok_or_else(|| deleted(open))?;
        }
        Ok(node)
    }

    fn resolve_mut(&mut self, open: &OpenNode) -> Result<&mut HiveNode> {
        self.tree
            .scope_mut(open.scope)
            .descendant_mut(&open.segments)
            .ok_or_else(|| deleted(open))
    }

    fn allocate(&mut self, open: OpenNode) -> NodeId {
        self.next_handle += 1;
        let id = self.next_handle;
        self.handles.insert(id, open);
        NodeId(id)
    }
}

fn deleted(open: &OpenNode) -> SetupError {
    SetupError::Store {
        message: "illegal operation on a key that has been deleted".to_string(),
        path: open.display_path(),
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

/// In-memory implementation of [`HiveBackend`].
#[derive(Debug, Default)]
pub struct MemoryHive {
    state: Mutex<HiveState>,
}

impl MemoryHive {
    /// Create an empty hive with both root scopes present.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hive pre-populated from a snapshot.
    pub fn from_snapshot(snapshot: HiveSnapshot) -> Self {
        Self {
            state: Mutex::new(HiveState {
                tree: snapshot,
                ..Default::default()
            }),
        }
    }

    /// Copy the current contents of both scopes.
    pub fn snapshot(&self) -> Result<HiveSnapshot> {
        Ok(self.lock_state()?.tree.clone())
    }

    /// Replace the tree with `snapshot`, keeping open handles.
    pub(crate) fn restore(&self, snapshot: HiveSnapshot) -> Result<()> {
        self.lock_state()?.tree = snapshot;
        Ok(())
    }

    /// Number of handles that have been opened and not yet closed.
    pub fn open_handle_count(&self) -> Result<usize> {
        Ok(self.lock_state()?.handles.len())
    }

    /// Seed a string or integer value, creating intermediate nodes.
    ///
    /// Convenience for test fixtures and for preparing a hive file by hand.
    pub fn seed_value(
        &self,
        scope: RootScope,
        path: &str,
        name: &str,
        value: impl Into<StoreValue>,
    ) -> Result<()> {
        let mut state = self.lock_state()?;
        let mut node = state.tree.scope_mut(scope);
        for segment in split_path(path) {
            node = node
                .children
                .entry(fold(segment))
                .or_insert_with(|| HiveNode::named(segment));
        }
        node.values.insert(
            fold(name),
            NamedValue {
                name: name.to_string(),
                value: value.into(),
            },
        );
        Ok(())
    }

    /// Seed an empty node, creating intermediate nodes.
    pub fn seed_node(&self, scope: RootScope, path: &str) -> Result<()> {
        let mut state = self.lock_state()?;
        let mut node = state.tree.scope_mut(scope);
        for segment in split_path(path) {
            node = node
                .children
                .entry(fold(segment))
                .or_insert_with(|| HiveNode::named(segment));
        }
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, HiveState>> {
        self.state.lock().map_err(|_| SetupError::Store {
            message: "Failed to acquire hive lock".to_string(),
            path: String::new(),
        })
    }

    /// Split a relative path into the parent segments and the final name.
    fn split_target(path: &str) -> Result<(Vec<String>, String)> {
        let mut segments: Vec<String> = split_path(path).into_iter().map(String::from).collect();
        let last = segments.pop().ok_or_else(|| SetupError::Store {
            message: "empty key name".to_string(),
            path: path.to_string(),
        })?;
        Ok((segments, last))
    }

    fn remove_node(&self, parent: NodeId, path: &str, recursive: bool, throw: bool) -> Result<()> {
        let mut state = self.lock_state()?;
        let open = state.writable_handle(parent)?;
        let (intermediate, last) = Self::split_target(path)?;
        let display = join_path(&open.display_path(), path);

        let node = state.resolve_mut(&open)?;
        let Some(container) = node.descendant_mut(&intermediate) else {
            return if throw {
                Err(SetupError::NodeMissing { path: display })
            } else {
                Ok(())
            };
        };

        let key = fold(&last);
        let has_children = container.children.get(&key).map(|t| !t.children.is_empty());
        match has_children {
            None if throw => Err(SetupError::NodeMissing { path: display }),
            None => Ok(()),
            Some(true) if !recursive => Err(SetupError::Store {
                message: "cannot delete a key that has subkeys".to_string(),
                path: display,
            }),
            Some(_) => {
                container.children.remove(&key);
                Ok(())
            }
        }
    }
}

impl HiveBackend for MemoryHive {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn root(&self, scope: RootScope) -> Result<NodeId> {
        let mut state = self.lock_state()?;
        Ok(state.allocate(OpenNode {
            scope,
            segments: Vec::new(),
            writable: true,
        }))
    }

    fn open_node(&self, parent: NodeId, path: &str, writable: bool) -> Result<Option<NodeId>> {
        let mut state = self.lock_state()?;
        let open = state.handle(parent)?.clone();
        let mut node = state.resolve(&open)?;
        let mut segments = open.segments.clone();
        for segment in split_path(path) {
            match node.child(segment) {
                Some(child) => {
                    segments.push(child.name.clone());
                    node = child;
                }
                None => return Ok(None),
            }
        }
        Ok(Some(state.allocate(OpenNode {
            scope: open.scope,
            segments,
            writable,
        })))
    }

    fn create_node(&self, parent: NodeId, path: &str) -> Result<NodeId> {
        let mut state = self.lock_state()?;
        let open = state.writable_handle(parent)?;
        let mut segments = open.segments.clone();
        let mut node = state.resolve_mut(&open)?;
        for segment in split_path(path) {
            node = node
                .children
                .entry(fold(segment))
                .or_insert_with(|| HiveNode::named(segment));
            segments.push(node.name.clone());
        }
        Ok(state.allocate(OpenNode {
            scope: open.scope,
            segments,
            writable: true,
        }))
    }

    fn close_node(&self, node: NodeId) {
        if let Ok(mut state) = self.lock_state() {
            state.handles.remove(&node.0);
        }
    }

    fn node_path(&self, node: NodeId) -> Result<String> {
        Ok(self.lock_state()?.handle(node)?.display_path())
    }

    fn child_names(&self, node: NodeId) -> Result<Vec<String>> {
        let state = self.lock_state()?;
        let open = state.handle(node)?;
        let resolved = state.resolve(open)?;
        Ok(resolved.children.values().map(|c| c.name.clone()).collect())
    }

    fn get_value(&self, node: NodeId, name: &str) -> Result<Option<StoreValue>> {
        let state = self.lock_state()?;
        let open = state.handle(node)?;
        Ok(state.resolve(open)?.value(name).cloned())
    }

    fn set_value(&self, node: NodeId, name: &str, value: StoreValue) -> Result<()> {
        let mut state = self.lock_state()?;
        let open = state.writable_handle(node)?;
        state.resolve_mut(&open)?.values.insert(
            fold(name),
            NamedValue {
                name: name.to_string(),
                value,
            },
        );
        Ok(())
    }

    fn delete_value(&self, node: NodeId, name: &str, throw_on_missing: bool) -> Result<()> {
        let mut state = self.lock_state()?;
        let open = state.writable_handle(node)?;
        let removed = state.resolve_mut(&open)?.values.remove(&fold(name));
        if removed.is_none() && throw_on_missing {
            return Err(SetupError::ValueMissing {
                path: open.display_path(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn delete_node(&self, parent: NodeId, path: &str, throw_on_missing: bool) -> Result<()> {
        self.remove_node(parent, path, false, throw_on_missing)
    }

    fn delete_tree(&self, parent: NodeId, path: &str) -> Result<()> {
        self.remove_node(parent, path, true, true)
    }
}
