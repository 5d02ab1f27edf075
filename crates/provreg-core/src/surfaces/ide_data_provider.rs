//! Designer data provider registration.

use super::{open_parent, path_value};
use crate::catalog::IdeTarget;
use crate::config::{DesignerConfig, DesignerIds, ProviderConfig};
use crate::engine::{OperationCallback, OperationOutcome, SharedContext};
use crate::error::Result;
use crate::store::{join_path, ChangeCounters, ConfigurationStore, StoreHandle};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct IdeDataProviderSurface {
    designer_file: PathBuf,
    /// Written as `Assembly` only when the designer is published to the shared
    /// cache; otherwise any earlier `Assembly` value is removed.
    designer_assembly_name: Option<String>,
}

impl IdeDataProviderSurface {
    pub fn new(designer_file: impl Into<PathBuf>, designer_assembly_name: Option<String>) -> Self {
        Self {
            designer_file: designer_file.into(),
            designer_assembly_name,
        }
    }

    fn install(
        &self,
        store: &ConfigurationStore,
        providers: &StoreHandle,
        counters: &mut ChangeCounters,
    ) -> Result<()> {
        let provider_id = DesignerIds::format(&DesignerIds::DATA_PROVIDER);
        let (provider, _) = store.ensure_child(providers, &provider_id, counters)?;

        store.ensure_value(&provider, None, ProviderConfig::DESCRIPTION, counters)?;
        match &self.designer_assembly_name {
            Some(assembly) => {
                store.ensure_value(&provider, Some("Assembly"), assembly.as_str(), counters)?;
            }
            None => {
                store.remove_value(&provider, Some("Assembly"), false, counters)?;
            }
        }
        store.ensure_value(
            &provider,
            Some("AssociatedSource"),
            DesignerIds::format(&DesignerIds::DATA_SOURCE),
            counters,
        )?;
        store.ensure_value(
            &provider,
            Some("InvariantName"),
            ProviderConfig::INVARIANT_NAME,
            counters,
        )?;
        store.ensure_value(
            &provider,
            Some("Technology"),
            DesignerIds::format(&DesignerIds::ADO_NET_TECHNOLOGY),
            counters,
        )?;
        store.ensure_value(&provider, Some("CodeBase"), path_value(&self.designer_file), counters)?;
        store.ensure_value(
            &provider,
            Some("FactoryService"),
            DesignerIds::format(&DesignerIds::SERVICE),
            counters,
        )?;

        for object in DesignerConfig::SUPPORTED_OBJECTS {
            store.ensure_child(&provider, object, counters)?;
        }
        Ok(())
    }
}

impl OperationCallback<IdeTarget> for IdeDataProviderSurface {
    fn invoke(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &IdeTarget,
        _install_dir: Option<&Path>,
        ctx: &SharedContext,
    ) -> Result<OperationOutcome> {
        let key_name =
            join_path(&ctx.layout.ide_key_name(target), DesignerConfig::DATA_PROVIDERS_KEY);
        let Some(providers) = open_parent(store, root, &key_name, ctx)? else {
            return Ok(OperationOutcome::unchanged());
        };

        let mut counters = ChangeCounters::default();
        if ctx.install {
            self.install(store, &providers, &mut counters)?;
        } else {
            store.remove_child_tree(
                &providers,
                &DesignerIds::format(&DesignerIds::DATA_PROVIDER),
                ctx.throw_on_missing,
                &mut counters,
            )?;
        }

        if !counters.is_empty() {
            info!(
                "{} data provider for Visual Studio {}.",
                if ctx.install { "Registered" } else { "Removed" },
                target.version
            );
        }
        Ok(OperationOutcome::from_counters(counters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IdeVersion;
    use crate::error::SetupError;
    use crate::store::{MemoryHive, RootScope, StoreValue};
    use crate::surfaces::test_support::{ctx, store};
    use std::sync::Arc;

    const PROVIDERS: &str = "Software\\Microsoft\\VisualStudio\\11.0\\DataProviders";
    const PROVIDER: &str = "{0ebaab6e-ca80-4b4a-8ddf-cbe6bf058c70}";

    fn target() -> IdeTarget {
        IdeTarget {
            version: IdeVersion::new(11, 0),
            suffix: None,
        }
    }

    #[test]
    fn test_assembly_value_only_when_designer_is_cached() {
        for assembly in [None, Some("SQLite.Designer, Version=1.0.0.0".to_string())] {
            let hive = Arc::new(MemoryHive::new());
            hive.seed_node(RootScope::LocalMachine, PROVIDERS).unwrap();
            let store = store(&hive, false);
            let root = store.root(RootScope::LocalMachine).unwrap();

            let outcome = IdeDataProviderSurface::new("/d/SQLite.Designer.dll", assembly.clone())
                .invoke(&store, root, &target(), None, &ctx(true))
                .unwrap();
            assert_eq!(outcome.counters.nodes_created, 6);

            let snapshot = hive.snapshot().unwrap();
            let provider = snapshot
                .node(RootScope::LocalMachine, &format!("{}\\{}", PROVIDERS, PROVIDER))
                .unwrap();
            assert_eq!(
                provider.value("Assembly").is_some(),
                assembly.is_some()
            );
            assert_eq!(
                provider.value("InvariantName"),
                Some(&StoreValue::from("System.Data.SQLite"))
            );
            assert_eq!(
                provider.value("Technology"),
                Some(&StoreValue::from("{77ab9a9d-78b9-4ba7-91ac-873f5338f1d2}"))
            );
            assert!(provider
                .descendant("SupportedObjects\\DataViewSupport")
                .is_some());
        }
    }

    #[test]
    fn test_reinstall_without_designer_cache_drops_assembly() {
        let hive = Arc::new(MemoryHive::new());
        hive.seed_node(RootScope::LocalMachine, PROVIDERS).unwrap();
        let store = store(&hive, false);
        let root = store.root(RootScope::LocalMachine).unwrap();
        let provider_path = format!("{}\\{}", PROVIDERS, PROVIDER);

        IdeDataProviderSurface::new("/d.dll", Some("SQLite.Designer".to_string()))
            .invoke(&store, root, &target(), None, &ctx(true))
            .unwrap();
        let snapshot = hive.snapshot().unwrap();
        let provider = snapshot.node(RootScope::LocalMachine, &provider_path).unwrap();
        assert_eq!(provider.value("Assembly"), Some(&StoreValue::from("SQLite.Designer")));

        let outcome = IdeDataProviderSurface::new("/d.dll", None)
            .invoke(&store, root, &target(), None, &ctx(true))
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.counters.values_deleted, 1);
        let snapshot = hive.snapshot().unwrap();
        let provider = snapshot.node(RootScope::LocalMachine, &provider_path).unwrap();
        assert!(provider.value("Assembly").is_none());

        let again = IdeDataProviderSurface::new("/d.dll", None)
            .invoke(&store, root, &target(), None, &ctx(true))
            .unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_simulated_install_leaves_store_untouched() {
        let hive = Arc::new(MemoryHive::new());
        hive.seed_node(RootScope::LocalMachine, PROVIDERS).unwrap();
        let before = hive.snapshot().unwrap();
        let store = store(&hive, true);
        let root = store.root(RootScope::LocalMachine).unwrap();

        let outcome = IdeDataProviderSurface::new("/d.dll", None)
            .invoke(&store, root, &target(), None, &ctx(true))
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(hive.snapshot().unwrap(), before);
    }

    #[test]
    fn test_throw_on_missing_uninstall() {
        let hive = Arc::new(MemoryHive::new());
        hive.seed_node(RootScope::LocalMachine, PROVIDERS).unwrap();
        let store = store(&hive, false);
        let root = store.root(RootScope::LocalMachine).unwrap();
        let mut strict = ctx(false);
        strict.throw_on_missing = true;

        let err = IdeDataProviderSurface::new("/d.dll", None)
            .invoke(&store, root, &target(), None, &strict)
            .unwrap_err();
        assert!(matches!(err, SetupError::NodeMissing { .. }));
    }
}
