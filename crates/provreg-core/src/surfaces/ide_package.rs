//! Designer package, menu and service registration.

use super::{open_parent, path_value};
use crate::catalog::IdeTarget;
use crate::config::{DesignerConfig, DesignerIds};
use crate::engine::{OperationCallback, OperationOutcome, SharedContext};
use crate::error::Result;
use crate::store::{join_path, ChangeCounters, ConfigurationStore, StoreHandle};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct IdePackageSurface {
    designer_file: PathBuf,
    /// Directory holding the in-process server library.
    system_dir: Option<PathBuf>,
}

impl IdePackageSurface {
    pub fn new(designer_file: impl Into<PathBuf>, system_dir: Option<PathBuf>) -> Self {
        Self {
            designer_file: designer_file.into(),
            system_dir,
        }
    }

    fn inproc_server(&self) -> PathBuf {
        match &self.system_dir {
            Some(dir) => dir.join(DesignerConfig::INPROC_SERVER_FILE),
            None => PathBuf::from(DesignerConfig::INPROC_SERVER_FILE),
        }
    }

    fn install_package(
        &self,
        store: &ConfigurationStore,
        packages: &StoreHandle,
        counters: &mut ChangeCounters,
    ) -> Result<()> {
        let package_id = DesignerIds::format(&DesignerIds::PACKAGE);
        let (package, _) = store.ensure_child(packages, &package_id, counters)?;

        store.ensure_value(&package, None, DesignerConfig::PACKAGE_NAME, counters)?;
        store.ensure_value(&package, Some("Class"), DesignerConfig::PACKAGE_CLASS, counters)?;
        store.ensure_value(&package, Some("CodeBase"), path_value(&self.designer_file), counters)?;
        store.ensure_value(&package, Some("ID"), DesignerConfig::PACKAGE_RESOURCE_ID, counters)?;
        store.ensure_value(
            &package,
            Some("InprocServer32"),
            path_value(&self.inproc_server()),
            counters,
        )?;
        store.ensure_value(&package, Some("CompanyName"), DesignerConfig::COMPANY_NAME, counters)?;
        store.ensure_value(&package, Some("MinEdition"), DesignerConfig::MIN_EDITION, counters)?;
        store.ensure_value(&package, Some("ProductName"), DesignerConfig::PACKAGE_NAME, counters)?;
        store.ensure_value(
            &package,
            Some("ProductVersion"),
            DesignerConfig::PRODUCT_VERSION,
            counters,
        )?;

        let (toolbox, _) = store.ensure_child(&package, DesignerConfig::TOOLBOX_KEY, counters)?;
        store.ensure_value(
            &toolbox,
            Some("Default Items"),
            DesignerConfig::TOOLBOX_DEFAULT_ITEMS,
            counters,
        )?;
        Ok(())
    }

    fn install_service(
        &self,
        store: &ConfigurationStore,
        services: &StoreHandle,
        counters: &mut ChangeCounters,
    ) -> Result<()> {
        let service_id = DesignerIds::format(&DesignerIds::SERVICE);
        let (service, _) = store.ensure_child(services, &service_id, counters)?;
        store.ensure_value(
            &service,
            None,
            DesignerIds::format(&DesignerIds::PACKAGE),
            counters,
        )?;
        store.ensure_value(&service, Some("Name"), DesignerConfig::SERVICE_NAME, counters)?;
        Ok(())
    }
}

impl OperationCallback<IdeTarget> for IdePackageSurface {
    fn invoke(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &IdeTarget,
        _install_dir: Option<&Path>,
        ctx: &SharedContext,
    ) -> Result<OperationOutcome> {
        let ide_key = ctx.layout.ide_key_name(target);
        let package_id = DesignerIds::format(&DesignerIds::PACKAGE);
        let service_id = DesignerIds::format(&DesignerIds::SERVICE);
        let mut counters = ChangeCounters::default();

        if let Some(packages) =
            open_parent(store, root, &join_path(&ide_key, DesignerConfig::PACKAGES_KEY), ctx)?
        {
            if ctx.install {
                self.install_package(store, &packages, &mut counters)?;
            } else {
                store.remove_child_tree(&packages, &package_id, ctx.throw_on_missing, &mut counters)?;
            }
        }

        if let Some(menus) =
            open_parent(store, root, &join_path(&ide_key, DesignerConfig::MENUS_KEY), ctx)?
        {
            if ctx.install {
                store.ensure_value(
                    &menus,
                    Some(&package_id),
                    DesignerConfig::MENU_RESOURCE,
                    &mut counters,
                )?;
            } else {
                store.remove_value(&menus, Some(&package_id), ctx.throw_on_missing, &mut counters)?;
            }
        }

        if let Some(services) =
            open_parent(store, root, &join_path(&ide_key, DesignerConfig::SERVICES_KEY), ctx)?
        {
            if ctx.install {
                self.install_service(store, &services, &mut counters)?;
            } else {
                store.remove_child_tree(&services, &service_id, ctx.throw_on_missing, &mut counters)?;
            }
        }

        if !counters.is_empty() {
            info!(
                "{} designer package for Visual Studio {}.",
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

    const IDE: &str = "Software\\Microsoft\\VisualStudio\\10.0";

    fn target() -> IdeTarget {
        IdeTarget {
            version: IdeVersion::new(10, 0),
            suffix: None,
        }
    }

    fn seeded() -> Arc<MemoryHive> {
        let hive = Arc::new(MemoryHive::new());
        for key in ["Packages", "Menus", "Services"] {
            hive.seed_node(RootScope::LocalMachine, &format!("{}\\{}", IDE, key))
                .unwrap();
        }
        hive
    }

    #[test]
    fn test_install_writes_package_menu_and_service() {
        let hive = seeded();
        let store = store(&hive, false);
        let root = store.root(RootScope::LocalMachine).unwrap();
        let surface = IdePackageSurface::new("/opt/SQLite.Designer.dll", Some("/sys".into()));

        let outcome = surface.invoke(&store, root, &target(), None, &ctx(true)).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.counters.nodes_created, 3);
        assert_eq!(outcome.counters.values_set, 13);

        let snapshot = hive.snapshot().unwrap();
        let package = snapshot
            .node(
                RootScope::LocalMachine,
                &format!("{}\\Packages\\{{dcbe6c8d-0e57-4099-a183-98ff74c64d9c}}", IDE),
            )
            .unwrap();
        assert_eq!(package.value("ID"), Some(&StoreValue::Integer(400)));
        assert_eq!(
            package.value("inprocserver32"),
            Some(&StoreValue::from(path_value(&Path::new("/sys").join("mscoree.dll"))))
        );
        assert_eq!(
            package.child("Toolbox").unwrap().value("Default Items"),
            Some(&StoreValue::Integer(3))
        );
        let menus = snapshot
            .node(RootScope::LocalMachine, &format!("{}\\Menus", IDE))
            .unwrap();
        assert_eq!(
            menus.value("{dcbe6c8d-0e57-4099-a183-98ff74c64d9c}"),
            Some(&StoreValue::from(", 1000, 3"))
        );

        let again = surface.invoke(&store, root, &target(), None, &ctx(true)).unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_install_fails_without_menus_key() {
        let hive = Arc::new(MemoryHive::new());
        hive.seed_node(RootScope::LocalMachine, &format!("{}\\Packages", IDE))
            .unwrap();
        let store = store(&hive, false);
        let root = store.root(RootScope::LocalMachine).unwrap();

        let err = IdePackageSurface::new("/d.dll", None)
            .invoke(&store, root, &target(), None, &ctx(true))
            .unwrap_err();
        assert!(matches!(err, SetupError::Operation { .. }));
        assert!(err.to_string().ends_with("VisualStudio\\10.0\\Menus"));
    }

    #[test]
    fn test_uninstall_removes_everything_and_tolerates_absence() {
        let hive = seeded();
        let store = store(&hive, false);
        let root = store.root(RootScope::LocalMachine).unwrap();
        let surface = IdePackageSurface::new("/d.dll", None);

        surface.invoke(&store, root, &target(), None, &ctx(true)).unwrap();
        let removed = surface.invoke(&store, root, &target(), None, &ctx(false)).unwrap();
        assert!(removed.changed);
        assert_eq!(removed.counters.nodes_deleted, 2);
        assert_eq!(removed.counters.values_deleted, 1);

        let before = hive.snapshot().unwrap();
        let again = surface.invoke(&store, root, &target(), None, &ctx(false)).unwrap();
        assert!(!again.changed);
        assert_eq!(hive.snapshot().unwrap(), before);

        let empty = Arc::new(MemoryHive::new());
        let store = crate::surfaces::test_support::store(&empty, false);
        let root = store.root(RootScope::LocalMachine).unwrap();
        assert!(!surface
            .invoke(&store, root, &target(), None, &ctx(false))
            .unwrap()
            .changed);
    }
}
