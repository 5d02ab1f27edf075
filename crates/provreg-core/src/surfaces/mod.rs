//! Registration surfaces.
//!
//! Each surface is an [`OperationCallback`](crate::engine::OperationCallback)
//! over one kind of target. Install callbacks merge: they only create and set
//! what differs, so a second install reports no change. Uninstall callbacks
//! remove subtrees and tolerate paths that are already gone.

mod assembly_folders;
mod ide_data_provider;
mod ide_data_source;
mod ide_package;
mod ide_setup;
mod provider_factory;

pub use assembly_folders::AssemblyFoldersSurface;
pub use ide_data_provider::IdeDataProviderSurface;
pub use ide_data_source::IdeDataSourceSurface;
pub use ide_package::IdePackageSurface;
pub use ide_setup::{DevenvLauncher, ExtensionCacheRefresher, IdeSetupSurface};
pub use provider_factory::{
    FactoryEntry, FactoryTable, ProviderConfigDocument, ProviderFactorySurface, RuntimeConfigStore,
};

use crate::engine::SharedContext;
use crate::error::{Result, SetupError};
use crate::store::{join_path, ConfigurationStore, StoreHandle};
use std::path::Path;
use tracing::debug;

/// Open a parent key that a surface writes below.
///
/// A missing parent fails an install with `could not open registry key`, and
/// turns an uninstall into a no-op (`Ok(None)`).
pub(crate) fn open_parent(
    store: &ConfigurationStore,
    root: &StoreHandle,
    key_name: &str,
    ctx: &SharedContext,
) -> Result<Option<StoreHandle>> {
    match store.open_child(root, key_name, true)? {
        Some(handle) => Ok(Some(handle)),
        None if ctx.install => Err(SetupError::operation(format!(
            "could not open registry key: {}",
            join_path(root.name()?, key_name)
        ))),
        None => {
            debug!(
                "Registry key {} does not exist, nothing to remove.",
                join_path(root.name()?, key_name)
            );
            Ok(None)
        }
    }
}

/// Store form of a file path.
pub(crate) fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
