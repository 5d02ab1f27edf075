//! Provider factory entries in each runtime's machine configuration file.
//!
//! The configuration file format is opaque to this crate. Callers plug in a
//! [`RuntimeConfigStore`] that knows how to load and save it; the surface only
//! decides what the provider-factory section should contain.

use crate::catalog::RuntimeTarget;
use crate::config::ProviderConfig;
use crate::engine::{OperationCallback, OperationOutcome, SharedContext};
use crate::error::Result;
use crate::probe::RuntimeConfigProbe;
use crate::store::{ChangeCounters, ConfigurationStore, StoreHandle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// One `add` element of the provider-factory section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryEntry {
    pub name: String,
    pub invariant: String,
    pub description: String,
    pub type_name: String,
}

impl FactoryEntry {
    /// Entry registering the provider factory from `core_assembly_name`.
    pub fn for_provider(core_assembly_name: &str) -> Self {
        Self {
            name: ProviderConfig::PROVIDER_NAME.to_string(),
            invariant: ProviderConfig::INVARIANT_NAME.to_string(),
            description: ProviderConfig::DESCRIPTION.to_string(),
            type_name: format!("{}, {}", ProviderConfig::FACTORY_TYPE_NAME, core_assembly_name),
        }
    }
}

/// The provider-factory section of a loaded configuration file.
pub trait ProviderConfigDocument {
    /// Drop a `remove` marker for `invariant`. Returns whether one existed.
    fn remove_marker(&mut self, invariant: &str) -> bool;

    /// The `add` entry for `invariant`, if present.
    fn entry(&self, invariant: &str) -> Option<FactoryEntry>;

    /// Insert the entry, or overwrite the attributes of an existing one.
    fn set_entry(&mut self, entry: &FactoryEntry);

    /// Drop the `add` entry for `invariant`. Returns whether one existed.
    fn remove_entry(&mut self, invariant: &str) -> bool;
}

/// Loads and saves runtime configuration files.
pub trait RuntimeConfigStore: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn ProviderConfigDocument>>;
    fn save(&self, path: &Path, document: &dyn ProviderConfigDocument) -> Result<()>;
}

/// Plain in-memory provider-factory section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryTable {
    pub entries: Vec<FactoryEntry>,
    pub removed: Vec<String>,
}

impl ProviderConfigDocument for FactoryTable {
    fn remove_marker(&mut self, invariant: &str) -> bool {
        let before = self.removed.len();
        self.removed.retain(|r| !r.eq_ignore_ascii_case(invariant));
        self.removed.len() != before
    }

    fn entry(&self, invariant: &str) -> Option<FactoryEntry> {
        self.entries
            .iter()
            .find(|e| e.invariant.eq_ignore_ascii_case(invariant))
            .cloned()
    }

    fn set_entry(&mut self, entry: &FactoryEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.invariant.eq_ignore_ascii_case(&entry.invariant))
        {
            Some(existing) => *existing = entry.clone(),
            None => self.entries.push(entry.clone()),
        }
    }

    fn remove_entry(&mut self, invariant: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !e.invariant.eq_ignore_ascii_case(invariant));
        self.entries.len() != before
    }
}

/// Registers the provider factory in every desktop runtime's machine
/// configuration file.
#[derive(Clone)]
pub struct ProviderFactorySurface {
    editor: Arc<dyn RuntimeConfigStore>,
    entry: FactoryEntry,
}

impl ProviderFactorySurface {
    pub fn new(editor: Arc<dyn RuntimeConfigStore>, core_assembly_name: &str) -> Self {
        Self {
            editor,
            entry: FactoryEntry::for_provider(core_assembly_name),
        }
    }

    pub fn entry(&self) -> &FactoryEntry {
        &self.entry
    }

    fn apply(&self, document: &mut dyn ProviderConfigDocument, install: bool) -> bool {
        let invariant = self.entry.invariant.as_str();
        let mut dirty = document.remove_marker(invariant);

        if install {
            if document.entry(invariant).as_ref() != Some(&self.entry) {
                document.set_entry(&self.entry);
                dirty = true;
            }
        } else {
            dirty |= document.remove_entry(invariant);
        }
        dirty
    }
}

impl OperationCallback<RuntimeTarget> for ProviderFactorySurface {
    fn invoke(
        &self,
        store: &ConfigurationStore,
        _root: &StoreHandle,
        target: &RuntimeTarget,
        install_dir: Option<&Path>,
        ctx: &SharedContext,
    ) -> Result<OperationOutcome> {
        let Some(install_dir) = install_dir else {
            debug!("No runtime directory for {}, skipping...", target);
            return Ok(OperationOutcome::unchanged());
        };
        let file = RuntimeConfigProbe::config_file(install_dir);

        let mut document = self.editor.load(&file)?;
        let dirty = self.apply(document.as_mut(), ctx.install);

        let mut counters = ChangeCounters::default();
        if dirty {
            counters.files_modified += 1;
            if store.is_simulate() {
                info!("Would update {}.", file.display());
            } else {
                self.editor.save(&file, document.as_ref())?;
                info!("Updated {}.", file.display());
            }
        }

        Ok(OperationOutcome::new(dirty, counters))
    }
}
