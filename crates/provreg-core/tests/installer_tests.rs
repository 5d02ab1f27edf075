//! End-to-end runs of the installer against a seeded hive and a temp file tree.
//!
//! The fixture machine has the 4.0 desktop runtime (with a machine
//! configuration file), the 2.0 runtime (suppressed by the v4 image runtime)
//! and one IDE, 10.0. Nothing else is installed.

use provreg_core::atomic::atomic_write_json;
use provreg_core::surfaces::{
    ExtensionCacheRefresher, FactoryTable, ProviderConfigDocument, RuntimeConfigStore,
};
use provreg_core::{
    Configuration, ConfigurationStore, DirectoryCache, FileHive, HiveSnapshot, IdeTarget,
    IdeVersion, InstallSummary, Installer, KeyLayout, MemoryHive, Result, RootScope, StorePolicy,
    StoreValue, Surface,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const INVARIANT: &str = "System.Data.SQLite";
const PACKAGE: &str = "{dcbe6c8d-0e57-4099-a183-98ff74c64d9c}";

struct Machine {
    temp: TempDir,
}

impl Machine {
    fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let machine = Self { temp };

        for version in ["v2.0.50727", "v4.0.30319"] {
            let config_dir = machine.runtime_root().join(version).join("Config");
            std::fs::create_dir_all(&config_dir).unwrap();
            std::fs::write(config_dir.join("machine.config"), "<configuration/>").unwrap();
        }
        std::fs::create_dir_all(machine.ide_dir()).unwrap();

        std::fs::create_dir_all(machine.provider_dir()).unwrap();
        for file in [
            "System.Data.SQLite.dll",
            "System.Data.SQLite.Linq.dll",
            "SQLite.Designer.dll",
        ] {
            std::fs::write(machine.provider_dir().join(file), file.as_bytes()).unwrap();
        }
        machine
    }

    fn runtime_root(&self) -> PathBuf {
        self.temp.path().join("Framework")
    }

    fn ide_dir(&self) -> PathBuf {
        self.temp.path().join("IDE10")
    }

    fn provider_dir(&self) -> PathBuf {
        self.temp.path().join("provider")
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    fn ide_key() -> String {
        KeyLayout::for_ide(false, false).ide_key_name(&IdeTarget {
            version: IdeVersion::new(10, 0),
            suffix: None,
        })
    }

    fn seed(&self, hive: &MemoryHive) {
        let scope = RootScope::LocalMachine;
        hive.seed_value(
            scope,
            "Software\\Microsoft\\.NETFramework",
            "InstallRoot",
            self.runtime_root().to_string_lossy().to_string(),
        )
        .unwrap();
        for version in ["v2.0.50727", "v4.0.30319"] {
            hive.seed_node(
                scope,
                &format!("Software\\Microsoft\\.NETFramework\\{}\\AssemblyFoldersEx", version),
            )
            .unwrap();
        }

        let ide_key = Self::ide_key();
        hive.seed_value(
            scope,
            &ide_key,
            "InstallDir",
            self.ide_dir().to_string_lossy().to_string(),
        )
        .unwrap();
        for key in ["Packages", "Menus", "Services", "DataSources", "DataProviders"] {
            hive.seed_node(scope, &format!("{}\\{}", ide_key, key)).unwrap();
        }
    }

    fn hive(&self) -> Arc<MemoryHive> {
        let hive = Arc::new(MemoryHive::new());
        self.seed(&hive);
        hive
    }

    fn config(&self, install: bool, simulate: bool) -> Configuration {
        let mut config = Configuration::default();
        config.install = install;
        config.simulate = simulate;
        config.confirm = true;
        config.set_directory(self.provider_dir());
        config.core_image_runtime = Some("v4.0.30319".to_string());
        config.finalize().unwrap();
        config
    }
}

#[derive(Default)]
struct TableEditor {
    tables: Mutex<HashMap<PathBuf, FactoryTable>>,
}

impl TableEditor {
    fn entries(&self) -> usize {
        self.tables
            .lock()
            .unwrap()
            .values()
            .map(|t| t.entries.len())
            .sum()
    }
}

impl RuntimeConfigStore for TableEditor {
    fn load(&self, path: &Path) -> Result<Box<dyn ProviderConfigDocument>> {
        let tables = self.tables.lock().unwrap();
        Ok(Box::new(tables.get(path).cloned().unwrap_or_default()))
    }

    fn save(&self, path: &Path, document: &dyn ProviderConfigDocument) -> Result<()> {
        let mut table = FactoryTable::default();
        if let Some(entry) = document.entry(INVARIANT) {
            table.set_entry(&entry);
        }
        self.tables.lock().unwrap().insert(path.to_path_buf(), table);
        Ok(())
    }
}

#[derive(Default)]
struct Recorder {
    programs: Mutex<Vec<PathBuf>>,
}

impl ExtensionCacheRefresher for Recorder {
    fn refresh(&self, program: &Path, _args: &[&str]) -> Result<()> {
        self.programs.lock().unwrap().push(program.to_path_buf());
        Ok(())
    }
}

struct Run {
    editor: Arc<TableEditor>,
    recorder: Arc<Recorder>,
}

impl Run {
    fn new() -> Self {
        Self {
            editor: Arc::new(TableEditor::default()),
            recorder: Arc::new(Recorder::default()),
        }
    }

    fn execute(
        &self,
        machine: &Machine,
        hive: Arc<MemoryHive>,
        config: Configuration,
        cache: &str,
    ) -> InstallSummary {
        let store = ConfigurationStore::new(hive, StorePolicy::for_run(config.simulate)).unwrap();
        Installer::new(config)
            .with_cache(Arc::new(DirectoryCache::new(machine.cache_dir(cache))))
            .with_config_editor(self.editor.clone())
            .with_refresher(self.recorder.clone())
            .run(&store)
            .unwrap()
    }
}

#[test]
fn test_install_registers_every_present_target() {
    let machine = Machine::new();
    let hive = machine.hive();
    let run = Run::new();

    let summary = run.execute(&machine, hive.clone(), machine.config(true, false), "cache");

    assert!(summary.changed());
    let folders = summary.report_for(Surface::AssemblyFolders).unwrap();
    assert_eq!(folders.invoked, 1);
    assert_eq!(summary.report_for(Surface::ProviderFactory).unwrap().invoked, 1);
    assert_eq!(summary.report_for(Surface::IdePackage).unwrap().invoked, 1);
    assert_eq!(summary.report_for(Surface::IdePackage).unwrap().skipped, 2);
    assert_eq!(summary.counters.files_created, 3);
    assert_eq!(summary.counters.files_modified, 1);

    let snapshot = hive.snapshot().unwrap();
    let folder = snapshot
        .node(
            RootScope::LocalMachine,
            "Software\\Microsoft\\.NETFramework\\v4.0.30319\\AssemblyFoldersEx\\System.Data.SQLite",
        )
        .unwrap();
    assert_eq!(
        folder.value(""),
        Some(&StoreValue::from(machine.provider_dir().to_string_lossy().to_string()))
    );
    assert!(snapshot
        .node(
            RootScope::LocalMachine,
            "Software\\Microsoft\\.NETFramework\\v2.0.50727\\AssemblyFoldersEx\\System.Data.SQLite",
        )
        .is_none());
    assert!(snapshot
        .node(
            RootScope::LocalMachine,
            &format!("{}\\Packages\\{}", Machine::ide_key(), PACKAGE),
        )
        .is_some());

    assert_eq!(run.editor.entries(), 1);
    assert_eq!(
        *run.recorder.programs.lock().unwrap(),
        [machine.ide_dir().join("devenv.exe")]
    );
    assert!(machine
        .cache_dir("cache")
        .join("System.Data.SQLite")
        .join("System.Data.SQLite.dll")
        .is_file());
}

#[test]
fn test_second_install_changes_nothing() {
    let machine = Machine::new();
    let hive = machine.hive();
    let run = Run::new();

    run.execute(&machine, hive.clone(), machine.config(true, false), "cache");
    let after_first = hive.snapshot().unwrap();

    let second = run.execute(&machine, hive.clone(), machine.config(true, false), "cache");

    assert!(!second.changed());
    assert!(second.counters.is_empty());
    assert!(second.report_for(Surface::IdeSetup).is_none());
    assert_eq!(hive.snapshot().unwrap(), after_first);
    assert_eq!(run.recorder.programs.lock().unwrap().len(), 1);
}

#[test]
fn test_simulated_install_is_pure_and_counts_like_a_real_one() {
    let machine = Machine::new();

    let sim_hive = machine.hive();
    let before = sim_hive.snapshot().unwrap();
    let sim_run = Run::new();
    let simulated = sim_run.execute(&machine, sim_hive.clone(), machine.config(true, true), "sim-cache");

    assert!(simulated.simulate);
    assert_eq!(sim_hive.snapshot().unwrap(), before);
    assert!(!machine.cache_dir("sim-cache").exists());
    assert_eq!(sim_run.editor.entries(), 0);
    assert!(sim_run.recorder.programs.lock().unwrap().is_empty());

    let real = Run::new().execute(&machine, machine.hive(), machine.config(true, false), "real-cache");
    assert_eq!(simulated.counters, real.counters);
    assert_eq!(simulated.changed(), real.changed());
}

#[test]
fn test_simulated_reinstall_counts_like_a_real_reinstall() {
    let machine = Machine::new();
    let hive = machine.hive();
    let run = Run::new();
    run.execute(&machine, hive.clone(), machine.config(true, false), "cache");
    let installed = hive.snapshot().unwrap();

    let simulated = run.execute(&machine, hive.clone(), machine.config(true, true), "cache");
    assert_eq!(hive.snapshot().unwrap(), installed);
    let real = run.execute(&machine, hive.clone(), machine.config(true, false), "cache");

    assert_eq!(simulated.counters, real.counters);
    assert_eq!(simulated.changed(), real.changed());
    assert!(!simulated.changed());
    assert_eq!(simulated.counters.files_created, 0);
    assert_eq!(
        simulated.report_for(Surface::SharedCache),
        real.report_for(Surface::SharedCache)
    );
}

#[test]
fn test_simulated_uninstall_on_bare_machine_counts_nothing() {
    let machine = Machine::new();

    let simulated = Run::new().execute(
        &machine,
        Arc::new(MemoryHive::new()),
        machine.config(false, true),
        "cache",
    );
    let real = Run::new().execute(
        &machine,
        Arc::new(MemoryHive::new()),
        machine.config(false, false),
        "cache",
    );

    assert_eq!(simulated.counters, real.counters);
    assert_eq!(simulated.counters.files_deleted, 0);
    assert!(!simulated.changed());
}

#[test]
fn test_uninstall_restores_seeded_state_and_tolerates_repeats() {
    let machine = Machine::new();
    let hive = machine.hive();
    let seeded = hive.snapshot().unwrap();
    let run = Run::new();

    run.execute(&machine, hive.clone(), machine.config(true, false), "cache");
    let removed = run.execute(&machine, hive.clone(), machine.config(false, false), "cache");

    assert!(removed.changed());
    assert_eq!(removed.counters.files_deleted, 3);
    assert_eq!(hive.snapshot().unwrap(), seeded);
    assert_eq!(run.editor.entries(), 0);
    assert!(!machine.cache_dir("cache").join("System.Data.SQLite").exists());

    let again = run.execute(&machine, hive.clone(), machine.config(false, false), "cache");
    assert!(!again.changed());
    assert!(again.counters.is_empty());
    assert_eq!(hive.snapshot().unwrap(), seeded);
}

#[test]
fn test_uninstall_on_bare_machine_succeeds() {
    let machine = Machine::new();
    let hive = Arc::new(MemoryHive::new());

    let summary = Run::new().execute(&machine, hive.clone(), machine.config(false, false), "cache");

    assert!(!summary.changed());
    assert_eq!(hive.snapshot().unwrap(), HiveSnapshot::default());
}

#[test]
fn test_file_hive_persists_across_reopen() {
    let machine = Machine::new();
    let path = machine.temp.path().join("hive.json");
    atomic_write_json(&path, &machine.hive().snapshot().unwrap(), false).unwrap();

    let hive = Arc::new(FileHive::open(&path).unwrap());
    let config = machine.config(true, false);
    let store = ConfigurationStore::new(hive.clone(), StorePolicy::for_run(false)).unwrap();
    let mut config_only = config.clone();
    config_only.surfaces = [Surface::AssemblyFolders, Surface::IdeDataSource]
        .into_iter()
        .collect();
    let summary = Installer::new(config_only).run(&store).unwrap();
    assert!(summary.changed());
    drop(store);

    let reopened = FileHive::open(&path).unwrap();
    assert_eq!(reopened.snapshot().unwrap(), hive.snapshot().unwrap());
    assert!(reopened
        .snapshot()
        .unwrap()
        .node(
            RootScope::LocalMachine,
            "Software\\Microsoft\\.NETFramework\\v4.0.30319\\AssemblyFoldersEx\\System.Data.SQLite",
        )
        .is_some());
}

#[test]
fn test_failure_stops_later_surfaces() {
    let machine = Machine::new();
    let hive = machine.hive();
    hive.seed_value(
        RootScope::LocalMachine,
        "Software\\Microsoft\\.NETFramework\\v4.5.50709",
        "",
        "",
    )
    .unwrap();
    let before = hive.snapshot().unwrap();
    let run = Run::new();
    let store = ConfigurationStore::new(hive.clone(), StorePolicy::for_run(false)).unwrap();

    let mut config = machine.config(true, false);
    config.surfaces.remove(&Surface::SharedCache);
    let err = Installer::new(config)
        .with_config_editor(run.editor.clone())
        .run(&store)
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "could not open registry key: HKEY_LOCAL_MACHINE\\Software\\Microsoft\\.NETFramework\\v4.5.50709\\AssemblyFoldersEx"
    );
    assert_eq!(run.editor.entries(), 0);
    // The 4.0 target ran before the failing 4.5 target; nothing is rolled back.
    assert_ne!(hive.snapshot().unwrap(), before);
}
