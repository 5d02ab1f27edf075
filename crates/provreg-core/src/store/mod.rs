//! Safe configuration-store abstraction.
//!
//! Layers, bottom up:
//! - [`HiveBackend`]: the native hierarchical key/value store ([`MemoryHive`], [`FileHive`])
//! - [`StoreHandle`]: one open node carrying the run policy
//! - [`ConfigurationStore`]: root handles, policy enforcement, tracing and counters

mod backend;
mod counters;
mod facade;
mod file;
mod handle;
mod memory;
mod value;

pub use backend::{HiveBackend, DEFAULT_VALUE_NAME};
pub use counters::ChangeCounters;
pub use facade::ConfigurationStore;
pub use file::FileHive;
pub use handle::StoreHandle;
pub use memory::{HiveNode, HiveSnapshot, MemoryHive, NamedValue};
pub use value::{join_path, split_path, NodeId, RootScope, StorePolicy, StoreValue};
