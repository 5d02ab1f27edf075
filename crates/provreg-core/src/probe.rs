//! Presence probes: is a target actually installed on this machine?
//!
//! Absence is an expected outcome and is never an error. Probes only read the
//! store and the file system, so they behave identically under simulate policy.

use crate::catalog::{IdeTarget, RuntimeTarget};
use crate::config::StoreLayoutConfig;
use crate::error::Result;
use crate::layout::KeyLayout;
use crate::store::{ConfigurationStore, StoreHandle, StoreValue};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of probing one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Absent,
    /// Installed, with its install directory when the probe determines one.
    Present(Option<PathBuf>),
}

impl Presence {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present(_))
    }

    pub fn install_dir(&self) -> Option<&Path> {
        match self {
            Presence::Present(dir) => dir.as_deref(),
            Presence::Absent => None,
        }
    }
}

/// Decides whether a target is present.
pub trait PresenceProbe<T: ?Sized> {
    fn probe(&self, store: &ConfigurationStore, root: &StoreHandle, target: &T) -> Result<Presence>;
}

impl<T: ?Sized, F> PresenceProbe<T> for F
where
    F: Fn(&ConfigurationStore, &StoreHandle, &T) -> Result<Presence>,
{
    fn probe(&self, store: &ConfigurationStore, root: &StoreHandle, target: &T) -> Result<Presence> {
        self(store, root, target)
    }
}

fn string_value(value: Option<StoreValue>) -> Option<String> {
    match value {
        Some(StoreValue::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Present when the runtime's key exists.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeRegistryProbe {
    layout: KeyLayout,
}

impl RuntimeRegistryProbe {
    pub fn new(layout: KeyLayout) -> Self {
        Self { layout }
    }
}

impl PresenceProbe<RuntimeTarget> for RuntimeRegistryProbe {
    fn probe(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &RuntimeTarget,
    ) -> Result<Presence> {
        let key_name = self.layout.runtime_key_name(target);
        if store.open_child(root, &key_name, false)?.is_none() {
            return Ok(Presence::Absent);
        }
        if target.is_desktop() {
            debug!(
                ".NET Framework {} found via registry {}.",
                target.version, key_name
            );
        }
        Ok(Presence::Present(None))
    }
}

/// Present when the runtime's key exists and, for the desktop runtime, its
/// versioned directory below `InstallRoot` exists.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeDirectoryProbe {
    layout: KeyLayout,
}

impl RuntimeDirectoryProbe {
    pub fn new(layout: KeyLayout) -> Self {
        Self { layout }
    }

    /// `{InstallRoot}\v{version}`, if `InstallRoot` is set.
    fn runtime_directory(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &RuntimeTarget,
    ) -> Result<Option<PathBuf>> {
        let Some(key) = store.open_child(root, &self.layout.runtime_root_key_name(), false)? else {
            return Ok(None);
        };
        let install_root =
            string_value(store.get_value(&key, Some(StoreLayoutConfig::INSTALL_ROOT_VALUE))?);
        Ok(install_root.map(|dir| PathBuf::from(dir).join(format!("v{}", target.version))))
    }
}

impl PresenceProbe<RuntimeTarget> for RuntimeDirectoryProbe {
    fn probe(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &RuntimeTarget,
    ) -> Result<Presence> {
        if store
            .open_child(root, &self.layout.runtime_key_name(target), false)?
            .is_none()
        {
            return Ok(Presence::Absent);
        }

        if !target.is_desktop() {
            return Ok(Presence::Present(None));
        }

        match self.runtime_directory(store, root, target)? {
            Some(directory) if directory.is_dir() => {
                debug!(
                    ".NET Framework {} found via directory {}.",
                    target.version,
                    directory.display()
                );
                Ok(Presence::Present(Some(directory)))
            }
            _ => Ok(Presence::Absent),
        }
    }
}

/// Present when the desktop runtime directory holds `Config\machine.config`.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfigProbe {
    directory: RuntimeDirectoryProbe,
}

impl RuntimeConfigProbe {
    pub fn new(layout: KeyLayout) -> Self {
        Self {
            directory: RuntimeDirectoryProbe::new(layout),
        }
    }

    /// Path of the machine configuration file below a runtime directory.
    pub fn config_file(install_dir: &Path) -> PathBuf {
        install_dir
            .join(StoreLayoutConfig::CONFIG_DIR_NAME)
            .join(StoreLayoutConfig::MACHINE_CONFIG_FILE)
    }
}

impl PresenceProbe<RuntimeTarget> for RuntimeConfigProbe {
    fn probe(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &RuntimeTarget,
    ) -> Result<Presence> {
        let presence = self.directory.probe(store, root, target)?;
        let Some(install_dir) = presence.install_dir() else {
            return Ok(Presence::Absent);
        };

        let config_dir = install_dir.join(StoreLayoutConfig::CONFIG_DIR_NAME);
        if !config_dir.is_dir() {
            debug!(
                ".NET Framework {} directory {} does not exist, skipping...",
                target.version,
                config_dir.display()
            );
            return Ok(Presence::Absent);
        }

        let file = Self::config_file(install_dir);
        if !file.is_file() {
            debug!(
                ".NET Framework {} file {} does not exist, skipping...",
                target.version,
                file.display()
            );
            return Ok(Presence::Absent);
        }

        Ok(presence)
    }
}

/// Present when the IDE key names an existing `InstallDir`.
#[derive(Debug, Clone, Copy)]
pub struct IdeInstallProbe {
    layout: KeyLayout,
}

impl IdeInstallProbe {
    pub fn new(layout: KeyLayout) -> Self {
        Self { layout }
    }
}

impl PresenceProbe<IdeTarget> for IdeInstallProbe {
    fn probe(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &IdeTarget,
    ) -> Result<Presence> {
        let Some(key) = store.open_child(root, &self.layout.ide_key_name(target), false)? else {
            return Ok(Presence::Absent);
        };

        let Some(directory) =
            string_value(store.get_value(&key, Some(StoreLayoutConfig::INSTALL_DIR_VALUE))?)
        else {
            return Ok(Presence::Absent);
        };

        let directory = PathBuf::from(directory);
        if !directory.is_dir() {
            return Ok(Presence::Absent);
        }

        debug!(
            "Visual Studio {} found in directory {}.",
            target.version,
            directory.display()
        );
        Ok(Presence::Present(Some(directory)))
    }
}
