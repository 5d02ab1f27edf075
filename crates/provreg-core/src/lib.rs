//! provreg core - simulate-aware registration of a database provider.
//!
//! Registers (or unregisters) the provider with every installed runtime and
//! IDE version found on the machine, through a policy-enforcing wrapper over a
//! hierarchical configuration store.
//!
//! # Example
//!
//! ```rust,ignore
//! use provreg_core::{Configuration, ConfigurationStore, FileHive, Installer, StorePolicy};
//! use std::sync::Arc;
//!
//! fn main() -> provreg_core::Result<()> {
//!     let mut config = Configuration::default();
//!     config.confirm = true;
//!     config.simulate = true;
//!     config.core_image_runtime = Some("v4.0.30319".into());
//!     config.finalize()?;
//!
//!     let hive = Arc::new(FileHive::open("hive.json")?);
//!     let store = ConfigurationStore::new(hive, StorePolicy::for_run(config.simulate))?;
//!     let summary = Installer::new(config).run(&store)?;
//!     println!("{}", summary.counters);
//!     Ok(())
//! }
//! ```

pub mod atomic;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod orchestrator;
pub mod platform;
pub mod probe;
pub mod publish;
pub mod settings;
pub mod store;
pub mod surfaces;

// Re-export commonly used types
pub use catalog::{IdeTarget, IdeVersion, RuntimeTarget, TargetCatalog, TargetVersion};
pub use engine::{
    MatrixEngine, MatrixOptions, OperationCallback, OperationOutcome, RunReport, SharedContext,
};
pub use error::{Result, SetupError};
pub use layout::KeyLayout;
pub use orchestrator::{InstallSummary, Installer, SurfaceReport};
pub use probe::{
    IdeInstallProbe, Presence, PresenceProbe, RuntimeConfigProbe, RuntimeDirectoryProbe,
    RuntimeRegistryProbe,
};
pub use publish::{DirectoryCache, SharedCache};
pub use settings::{Configuration, Suppression, Surface};
pub use store::{
    ChangeCounters, ConfigurationStore, FileHive, HiveBackend, HiveSnapshot, MemoryHive,
    RootScope, StoreHandle, StorePolicy, StoreValue,
};
