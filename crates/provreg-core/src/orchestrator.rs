//! Runs every selected registration surface, in order, for one configuration.

use crate::catalog::{IdeTarget, TargetCatalog};
use crate::engine::{MatrixEngine, MatrixOptions, OperationCallback, RunReport, SharedContext};
use crate::error::Result;
use crate::layout::KeyLayout;
use crate::platform;
use crate::probe::{IdeInstallProbe, RuntimeConfigProbe, RuntimeRegistryProbe};
use crate::publish::{self, SharedCache};
use crate::settings::{Configuration, Surface};
use crate::store::{ChangeCounters, ConfigurationStore, RootScope};
use crate::surfaces::{
    AssemblyFoldersSurface, DevenvLauncher, ExtensionCacheRefresher, IdeDataProviderSurface,
    IdeDataSourceSurface, IdePackageSurface, IdeSetupSurface, ProviderFactorySurface,
    RuntimeConfigStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceReport {
    pub surface: Surface,
    pub report: RunReport,
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallSummary {
    pub install: bool,
    pub simulate: bool,
    pub scope: RootScope,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub surfaces: Vec<SurfaceReport>,
    pub counters: ChangeCounters,
}

impl InstallSummary {
    /// Any surface produced a persistent change.
    pub fn changed(&self) -> bool {
        self.surfaces.iter().any(|s| s.report.changed)
    }

    pub fn report_for(&self, surface: Surface) -> Option<&RunReport> {
        self.surfaces
            .iter()
            .find(|s| s.surface == surface)
            .map(|s| &s.report)
    }
}

/// Drives the surfaces of one configuration against a store.
pub struct Installer {
    config: Configuration,
    cache: Option<Arc<dyn SharedCache>>,
    config_editor: Option<Arc<dyn RuntimeConfigStore>>,
    refresher: Arc<dyn ExtensionCacheRefresher>,
    engine: MatrixEngine,
}

impl Installer {
    /// Create an installer for a finalized configuration.
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            cache: None,
            config_editor: None,
            refresher: Arc::new(DevenvLauncher),
            engine: MatrixEngine::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn SharedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_config_editor(mut self, editor: Arc<dyn RuntimeConfigStore>) -> Self {
        self.config_editor = Some(editor);
        self
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn ExtensionCacheRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    fn context(&self, layout: KeyLayout) -> SharedContext {
        SharedContext {
            install: self.config.install,
            throw_on_missing: self.config.throw_on_missing,
            layout,
        }
    }

    /// Run every selected surface. Stops at the first error.
    pub fn run(&self, store: &ConfigurationStore) -> Result<InstallSummary> {
        let config = &self.config;
        let started_at = Utc::now();
        let scope = RootScope::for_user(config.per_user);
        let root = store.root(scope)?;
        let catalog = TargetCatalog::from_configuration(config);

        let runtime_ctx = self.context(KeyLayout::for_runtime(config.per_user, config.wow64));
        let ide_ctx = self.context(KeyLayout::for_ide(config.per_user, config.wow64));

        info!(
            "{} provider using {} ({})",
            if config.install { "Installing" } else { "Uninstalling" },
            store.describe(),
            scope
        );

        let mut surfaces = Vec::new();

        if config.has_surface(Surface::SharedCache) {
            match &self.cache {
                Some(cache) => {
                    let files = publish::cache_files(config);
                    let outcome =
                        publish::publish(cache.as_ref(), &files, config.install, store.is_simulate())?;
                    surfaces.push(SurfaceReport {
                        surface: Surface::SharedCache,
                        report: RunReport {
                            changed: outcome.changed,
                            invoked: files.len() as u32,
                            skipped: 0,
                            counters: outcome.counters,
                        },
                    });
                }
                None => warn!("No shared cache configured, skipping shared cache surface"),
            }
        }

        if config.has_surface(Surface::AssemblyFolders) {
            let options = MatrixOptions {
                runtime_override: config.registry_version.clone(),
                ..Default::default()
            };
            let report = self.engine.run_runtime(
                store,
                root,
                &catalog,
                &options,
                &RuntimeRegistryProbe::new(runtime_ctx.layout),
                &AssemblyFoldersSurface::new(&config.directory),
                &runtime_ctx,
            )?;
            surfaces.push(SurfaceReport {
                surface: Surface::AssemblyFolders,
                report,
            });
        }

        if config.has_surface(Surface::ProviderFactory) {
            match &self.config_editor {
                Some(editor) => {
                    let options = MatrixOptions {
                        desktop_only: true,
                        runtime_override: config.config_version.clone(),
                        ..Default::default()
                    };
                    let report = self.engine.run_runtime(
                        store,
                        root,
                        &catalog,
                        &options,
                        &RuntimeConfigProbe::new(runtime_ctx.layout),
                        &ProviderFactorySurface::new(Arc::clone(editor), &config.core_assembly_name),
                        &runtime_ctx,
                    )?;
                    surfaces.push(SurfaceReport {
                        surface: Surface::ProviderFactory,
                        report,
                    });
                }
                None => warn!(
                    "No runtime configuration editor available, skipping provider factory surface"
                ),
            }
        }

        let designer_assembly = config
            .designer_in_cache()
            .then(|| config.designer_assembly_name.clone());
        let ide_surfaces: [(Surface, Box<dyn OperationCallback<IdeTarget>>); 3] = [
            (
                Surface::IdePackage,
                Box::new(IdePackageSurface::new(
                    &config.designer_file,
                    platform::system_directory(config.wow64),
                )),
            ),
            (Surface::IdeDataSource, Box::new(IdeDataSourceSurface::new())),
            (
                Surface::IdeDataProvider,
                Box::new(IdeDataProviderSurface::new(
                    &config.designer_file,
                    designer_assembly,
                )),
            ),
        ];

        let ide_options = MatrixOptions {
            ide_override: config.ide_version,
            ..Default::default()
        };
        let ide_probe = IdeInstallProbe::new(ide_ctx.layout);
        let mut ide_changed = false;
        for (surface, callback) in ide_surfaces {
            if !config.has_surface(surface) {
                continue;
            }
            let report = self.engine.run_ide(
                store,
                root,
                &catalog,
                &ide_options,
                &ide_probe,
                callback.as_ref(),
                &ide_ctx,
            )?;
            ide_changed |= report.changed;
            surfaces.push(SurfaceReport { surface, report });
        }

        if config.has_surface(Surface::IdeSetup) && ide_changed {
            let report = self.engine.run_ide(
                store,
                root,
                &catalog,
                &ide_options,
                &ide_probe,
                &IdeSetupSurface::new(Arc::clone(&self.refresher)),
                &ide_ctx,
            )?;
            surfaces.push(SurfaceReport {
                surface: Surface::IdeSetup,
                report,
            });
        }

        let mut counters = ChangeCounters::default();
        for surface in &surfaces {
            counters += &surface.report.counters;
        }
        info!("{}", counters);
        info!("Success.");

        Ok(InstallSummary {
            install: config.install,
            simulate: store.is_simulate(),
            scope,
            started_at,
            finished_at: Utc::now(),
            surfaces,
            counters,
        })
    }
}
