//! Assembly lookup folder registration, one per runtime target.

use super::{open_parent, path_value};
use crate::catalog::RuntimeTarget;
use crate::config::ProviderConfig;
use crate::engine::{OperationCallback, OperationOutcome, SharedContext};
use crate::error::Result;
use crate::store::{ChangeCounters, ConfigurationStore, StoreHandle};
use std::path::{Path, PathBuf};
use tracing::info;

/// Points `AssemblyFoldersEx\System.Data.SQLite` at the provider directory.
#[derive(Debug, Clone)]
pub struct AssemblyFoldersSurface {
    directory: PathBuf,
}

impl AssemblyFoldersSurface {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl OperationCallback<RuntimeTarget> for AssemblyFoldersSurface {
    fn invoke(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &RuntimeTarget,
        _install_dir: Option<&Path>,
        ctx: &SharedContext,
    ) -> Result<OperationOutcome> {
        let key_name = ctx.layout.assembly_folders_key_name(target);
        let Some(key) = open_parent(store, root, &key_name, ctx)? else {
            return Ok(OperationOutcome::unchanged());
        };

        let mut counters = ChangeCounters::default();
        if ctx.install {
            store.remove_child_tree(&key, ProviderConfig::LEGACY_PROJECT_NAME, false, &mut counters)?;
            let (folder, _) = store.ensure_child(&key, ProviderConfig::PROJECT_NAME, &mut counters)?;
            store.ensure_value(&folder, None, path_value(&self.directory), &mut counters)?;
        } else {
            store.remove_child_tree(
                &key,
                ProviderConfig::PROJECT_NAME,
                ctx.throw_on_missing,
                &mut counters,
            )?;
        }

        if !counters.is_empty() {
            info!(
                "{} assembly folder for {}.",
                if ctx.install { "Registered" } else { "Removed" },
                target
            );
        }
        Ok(OperationOutcome::from_counters(counters))
    }
}
