//! Run configuration.
//!
//! A `Configuration` is assembled by the caller (command line, settings file
//! or code), then [`finalize`](Configuration::finalize)d once. After that it
//! is only read.

use crate::catalog::{IdeVersion, TargetVersion};
use crate::config::{ProviderConfig, RuntimeImageConfig};
use crate::error::{Result, SetupError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Per-family and per-version suppression flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Suppression {
    pub desktop: bool,
    pub compact: bool,
    pub netfx20: bool,
    pub netfx35: bool,
    pub netfx40: bool,
    pub netfx45: bool,
    pub netfx451: bool,
    pub vs2005: bool,
    pub vs2008: bool,
    pub vs2010: bool,
    pub vs2012: bool,
    pub vs2013: bool,
}

/// A registration surface, in the order the installer runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Publish the provider files to the shared component cache.
    SharedCache,
    /// Per-runtime assembly lookup folders.
    AssemblyFolders,
    /// Provider factory entry in each runtime's machine configuration file.
    ProviderFactory,
    IdePackage,
    IdeDataSource,
    IdeDataProvider,
    /// Refresh the IDE extension cache.
    IdeSetup,
    /// Put the designer file in the shared cache as well.
    DesignerCache,
}

impl Surface {
    pub const ALL: [Surface; 8] = [
        Surface::SharedCache,
        Surface::AssemblyFolders,
        Surface::ProviderFactory,
        Surface::IdePackage,
        Surface::IdeDataSource,
        Surface::IdeDataProvider,
        Surface::IdeSetup,
        Surface::DesignerCache,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::SharedCache => "shared_cache",
            Surface::AssemblyFolders => "assembly_folders",
            Surface::ProviderFactory => "provider_factory",
            Surface::IdePackage => "ide_package",
            Surface::IdeDataSource => "ide_data_source",
            Surface::IdeDataProvider => "ide_data_provider",
            Surface::IdeSetup => "ide_setup",
            Surface::DesignerCache => "designer_cache",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('-', "_").to_lowercase();
        Surface::ALL
            .into_iter()
            .find(|surface| surface.as_str() == wanted)
            .ok_or_else(|| SetupError::Validation {
                field: "surfaces".to_string(),
                message: format!("unknown surface \"{}\"", s),
            })
    }
}

/// Everything one run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Install when true, uninstall when false.
    pub install: bool,
    /// Must be set explicitly before anything runs.
    pub confirm: bool,
    /// No persistent mutation.
    pub simulate: bool,
    /// Use the current-user scope instead of local-machine.
    pub per_user: bool,
    /// Target the 32-bit view of machine-wide keys.
    pub wow64: bool,
    /// Uninstall fails when the node or value to delete is missing.
    pub throw_on_missing: bool,
    pub suppress: Suppression,

    pub registry_version: Option<TargetVersion>,
    pub config_version: Option<TargetVersion>,
    pub ide_version: Option<IdeVersion>,
    pub ide_suffix: Option<String>,

    pub surfaces: BTreeSet<Surface>,

    pub directory: PathBuf,
    pub core_file: PathBuf,
    pub linq_file: PathBuf,
    pub ef6_file: PathBuf,
    pub designer_file: PathBuf,
    pub core_assembly_name: String,
    pub designer_assembly_name: String,

    /// Image runtime the core file was compiled for (`v2.0.50727` or `v4.0.30319`).
    pub core_image_runtime: Option<String>,
    pub skip_runtime_check: bool,
    pub ef6_available: bool,

    pub verbose: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for Configuration {
    fn default() -> Self {
        let mut config = Self {
            install: true,
            confirm: false,
            simulate: false,
            per_user: false,
            wow64: false,
            throw_on_missing: false,
            suppress: Suppression::default(),
            registry_version: None,
            config_version: None,
            ide_version: None,
            ide_suffix: None,
            surfaces: Surface::ALL.into_iter().collect(),
            directory: PathBuf::new(),
            core_file: PathBuf::new(),
            linq_file: PathBuf::new(),
            ef6_file: PathBuf::new(),
            designer_file: PathBuf::new(),
            core_assembly_name: ProviderConfig::CORE_ASSEMBLY_NAME.to_string(),
            designer_assembly_name: ProviderConfig::DESIGNER_ASSEMBLY_NAME.to_string(),
            core_image_runtime: None,
            skip_runtime_check: false,
            ef6_available: false,
            verbose: false,
            log_file: None,
        };
        config.set_directory(default_directory());
        config
    }
}

fn default_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Configuration {
    /// Load a configuration from a JSON settings file.
    ///
    /// Fields missing from the file keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SetupError::io_with_path(e, path))?;
        serde_json::from_str(&text).map_err(|e| SetupError::Config {
            message: format!("Failed to parse settings {}: {}", path.display(), e),
        })
    }

    /// Point the provider directory somewhere else and re-derive the file names.
    pub fn set_directory(&mut self, directory: impl Into<PathBuf>) {
        let directory = directory.into();
        self.core_file = directory.join(ProviderConfig::CORE_FILE_NAME);
        self.linq_file = directory.join(ProviderConfig::LINQ_FILE_NAME);
        self.ef6_file = directory.join(ProviderConfig::EF6_FILE_NAME);
        self.designer_file = directory.join(ProviderConfig::DESIGNER_FILE_NAME);
        self.directory = directory;
    }

    pub fn has_surface(&self, surface: Surface) -> bool {
        self.surfaces.contains(&surface)
    }

    /// True when any runtime able to load the LINQ assembly is in scope.
    pub fn is_linq_supported(&self) -> bool {
        !self.suppress.netfx35
            || !self.suppress.netfx40
            || !self.suppress.netfx45
            || !self.suppress.netfx451
    }

    /// True when a 4.x runtime is in scope and the EF6 assembly is resolvable.
    pub fn is_ef6_supported(&self) -> bool {
        (!self.suppress.netfx40 || !self.suppress.netfx45 || !self.suppress.netfx451)
            && self.ef6_available
    }

    /// True when the designer file is published to the shared cache, which is
    /// also when the data provider registration names its assembly.
    pub fn designer_in_cache(&self) -> bool {
        self.has_surface(Surface::SharedCache) && self.has_surface(Surface::DesignerCache)
    }

    /// Narrow the suppression flags to what the core file's image runtime can
    /// serve.
    pub fn apply_runtime_check(&mut self) -> Result<()> {
        let image = self.core_image_runtime.clone().unwrap_or_default();

        if self.skip_runtime_check {
            info!(
                "Assembly is compiled for the .NET Framework {}; however, installation \
                 restrictions based on this fact have been disabled via the command line.",
                image
            );
            return Ok(());
        }

        match image.as_str() {
            "" => Err(SetupError::Config {
                message: "invalid core file image runtime version".to_string(),
            }),
            RuntimeImageConfig::CLR_V2 => {
                self.suppress.netfx40 = true;
                self.suppress.netfx45 = true;
                self.suppress.netfx451 = true;
                self.suppress.vs2010 = true;
                self.suppress.vs2012 = true;
                self.suppress.vs2013 = true;
                info!(
                    "Assembly is compiled for the .NET Framework {}, support for the .NET \
                     Framework {} is now disabled.",
                    RuntimeImageConfig::CLR_V2,
                    RuntimeImageConfig::CLR_V4
                );
                Ok(())
            }
            RuntimeImageConfig::CLR_V4 => {
                self.suppress.netfx20 = true;
                self.suppress.netfx35 = true;
                self.suppress.vs2005 = true;
                self.suppress.vs2008 = true;
                info!(
                    "Assembly is compiled for the .NET Framework {}, support for the .NET \
                     Framework {} is now disabled.",
                    RuntimeImageConfig::CLR_V4,
                    RuntimeImageConfig::CLR_V2
                );
                Ok(())
            }
            other => Err(SetupError::Config {
                message: format!(
                    "unsupported core file image runtime version {}, must be {} or {}",
                    other,
                    RuntimeImageConfig::CLR_V2,
                    RuntimeImageConfig::CLR_V4
                ),
            }),
        }
    }

    /// Validate and narrow the configuration. Call once, before any store is opened.
    pub fn finalize(&mut self) -> Result<()> {
        self.dump();

        if self.simulate {
            info!("No actual changes will be made to this system because \"what-if\" mode is enabled.");
        }

        if !self.confirm {
            return Err(SetupError::Config {
                message: "Cannot continue, the \"confirm\" option is not enabled.".to_string(),
            });
        }

        if self.surfaces.is_empty() {
            return Err(SetupError::Validation {
                field: "surfaces".to_string(),
                message: "at least one surface must be selected".to_string(),
            });
        }

        self.apply_runtime_check()
    }

    /// Log every field at debug level.
    pub fn dump(&self) {
        debug!("Install = {}", self.install);
        debug!("Confirm = {}", self.confirm);
        debug!("Simulate = {}", self.simulate);
        debug!("PerUser = {}", self.per_user);
        debug!("Wow64 = {}", self.wow64);
        debug!("ThrowOnMissing = {}", self.throw_on_missing);
        debug!("Suppress = {:?}", self.suppress);
        debug!("RegistryVersion = {}", display_opt(&self.registry_version));
        debug!("ConfigVersion = {}", display_opt(&self.config_version));
        debug!("IdeVersion = {}", display_opt(&self.ide_version));
        debug!("IdeSuffix = {}", display_opt(&self.ide_suffix));
        debug!(
            "Surfaces = {}",
            self.surfaces
                .iter()
                .map(Surface::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        debug!("Directory = {}", self.directory.display());
        debug!("CoreFileName = {}", self.core_file.display());
        debug!("LinqFileName = {}", self.linq_file.display());
        debug!("Ef6FileName = {}", self.ef6_file.display());
        debug!("DesignerFileName = {}", self.designer_file.display());
        debug!("CoreAssemblyName = {}", self.core_assembly_name);
        debug!("DesignerAssemblyName = {}", self.designer_assembly_name);
        debug!("CoreImageRuntime = {}", display_opt(&self.core_image_runtime));
        debug!("SkipRuntimeCheck = {}", self.skip_runtime_check);
        debug!("Ef6Available = {}", self.ef6_available);
        debug!("IsLinqSupported = {}", self.is_linq_supported());
        debug!("IsEf6Supported = {}", self.is_ef6_supported());
        debug!("Verbose = {}", self.verbose);
        debug!(
            "LogFile = {}",
            display_opt(&self.log_file.as_ref().map(|p| p.display().to_string()))
        );
    }
}

fn display_opt<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => format!("\"{}\"", v),
        None => "<null>".to_string(),
    }
}
