//! Designer data source registration.

use super::open_parent;
use crate::catalog::IdeTarget;
use crate::config::{DesignerConfig, DesignerIds};
use crate::engine::{OperationCallback, OperationOutcome, SharedContext};
use crate::error::Result;
use crate::store::{join_path, ChangeCounters, ConfigurationStore, StoreHandle};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct IdeDataSourceSurface;

impl IdeDataSourceSurface {
    pub fn new() -> Self {
        Self
    }
}

impl OperationCallback<IdeTarget> for IdeDataSourceSurface {
    fn invoke(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &IdeTarget,
        _install_dir: Option<&Path>,
        ctx: &SharedContext,
    ) -> Result<OperationOutcome> {
        let key_name = join_path(&ctx.layout.ide_key_name(target), DesignerConfig::DATA_SOURCES_KEY);
        let Some(sources) = open_parent(store, root, &key_name, ctx)? else {
            return Ok(OperationOutcome::unchanged());
        };

        let source_id = DesignerIds::format(&DesignerIds::DATA_SOURCE);
        let provider_id = DesignerIds::format(&DesignerIds::DATA_PROVIDER);
        let mut counters = ChangeCounters::default();

        if ctx.install {
            let (source, _) = store.ensure_child(&sources, &source_id, &mut counters)?;
            store.ensure_value(&source, None, DesignerConfig::DATA_SOURCE_NAME, &mut counters)?;
            store.ensure_value(&source, Some("DefaultProvider"), provider_id.as_str(), &mut counters)?;
            store.ensure_child(
                &source,
                &join_path(DesignerConfig::SUPPORTING_PROVIDERS_KEY, &provider_id),
                &mut counters,
            )?;
        } else {
            store.remove_child_tree(&sources, &source_id, ctx.throw_on_missing, &mut counters)?;
        }

        if !counters.is_empty() {
            info!(
                "{} data source for Visual Studio {}.",
                if ctx.install { "Registered" } else { "Removed" },
                target.version
            );
        }
        Ok(OperationOutcome::from_counters(counters))
    }
}
