//! Value types shared by every store layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two root scopes a registration may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootScope {
    CurrentUser,
    LocalMachine,
}

impl RootScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootScope::CurrentUser => "HKEY_CURRENT_USER",
            RootScope::LocalMachine => "HKEY_LOCAL_MACHINE",
        }
    }

    /// Select the scope for a run.
    pub fn for_user(per_user: bool) -> Self {
        if per_user {
            RootScope::CurrentUser
        } else {
            RootScope::LocalMachine
        }
    }
}

impl fmt::Display for RootScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed value stored under a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StoreValue {
    String(String),
    Integer(u32),
    Bytes(Vec<u8>),
}

impl StoreValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoreValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::String(s) => write!(f, "\"{}\"", s),
            StoreValue::Integer(v) => write!(f, "{}", v),
            StoreValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        StoreValue::String(value.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        StoreValue::String(value)
    }
}

impl From<u32> for StoreValue {
    fn from(value: u32) -> Self {
        StoreValue::Integer(value)
    }
}

impl From<Vec<u8>> for StoreValue {
    fn from(value: Vec<u8>) -> Self {
        StoreValue::Bytes(value)
    }
}

/// The three independent policy flags every store layer enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorePolicy {
    /// No persistent mutation; writes report success without reaching the backend.
    pub simulate: bool,
    /// Any write is a contract violation.
    pub read_only: bool,
    /// Direct access to backend nodes is refused.
    pub restricted: bool,
}

impl StorePolicy {
    pub fn new(simulate: bool, read_only: bool, restricted: bool) -> Self {
        Self {
            simulate,
            read_only,
            restricted,
        }
    }

    /// Policy for a normal registration run.
    pub fn for_run(simulate: bool) -> Self {
        Self::new(simulate, false, false)
    }
}

/// Opaque backend node reference, comparable to a native key handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Join a parent display path and a child name the way the store displays them.
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        parent.to_string()
    } else {
        format!("{}\\{}", parent, child)
    }
}

/// Split a `\`-separated relative path into its non-empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('\\').filter(|s| !s.is_empty()).collect()
}
