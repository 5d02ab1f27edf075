//! Target-matrix traversal.
//!
//! For each target of a catalog, in catalog order: probe presence, skip absent
//! targets, and dispatch present ones to a registration callback. The first
//! callback error aborts the whole run.

use crate::catalog::{IdeTarget, IdeVersion, RuntimeTarget, TargetCatalog, TargetVersion};
use crate::error::{Result, SetupError};
use crate::layout::KeyLayout;
use crate::probe::{Presence, PresenceProbe};
use crate::store::{ChangeCounters, ConfigurationStore, StoreHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, trace};

/// State shared by every callback invocation of one surface run.
#[derive(Debug, Clone, Copy)]
pub struct SharedContext {
    /// Install when true, uninstall when false.
    pub install: bool,
    pub throw_on_missing: bool,
    pub layout: KeyLayout,
}

/// What one callback invocation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Whether persistent state changed (or would have, when simulating).
    pub changed: bool,
    pub counters: ChangeCounters,
}

impl OperationOutcome {
    pub fn new(changed: bool, counters: ChangeCounters) -> Self {
        Self { changed, counters }
    }

    /// Outcome whose `changed` flag is derived from the counters.
    pub fn from_counters(counters: ChangeCounters) -> Self {
        Self {
            changed: !counters.is_empty(),
            counters,
        }
    }

    pub fn unchanged() -> Self {
        Self::default()
    }
}

/// A per-target registration operation.
pub trait OperationCallback<T: ?Sized> {
    fn invoke(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &T,
        install_dir: Option<&Path>,
        ctx: &SharedContext,
    ) -> Result<OperationOutcome>;
}

impl<T: ?Sized, F> OperationCallback<T> for F
where
    F: Fn(&ConfigurationStore, &StoreHandle, &T, Option<&Path>, &SharedContext) -> Result<OperationOutcome>,
{
    fn invoke(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        target: &T,
        install_dir: Option<&Path>,
        ctx: &SharedContext,
    ) -> Result<OperationOutcome> {
        self(store, root, target, install_dir, ctx)
    }
}

/// Per-run traversal options.
#[derive(Debug, Clone, Default)]
pub struct MatrixOptions {
    /// Skip every non-desktop runtime target.
    pub desktop_only: bool,
    /// Replaces every runtime family's version list.
    pub runtime_override: Option<TargetVersion>,
    /// Replaces the IDE version list.
    pub ide_override: Option<IdeVersion>,
}

/// Aggregate result of one surface run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Any target produced a persistent change.
    pub changed: bool,
    /// Targets whose callback was invoked.
    pub invoked: u32,
    /// Targets skipped because they are not installed.
    pub skipped: u32,
    pub counters: ChangeCounters,
}

impl RunReport {
    fn record(&mut self, outcome: &OperationOutcome) {
        self.invoked += 1;
        self.changed |= outcome.changed;
        self.counters.merge(&outcome.counters);
    }
}

/// Stateless matrix traversal engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixEngine;

impl MatrixEngine {
    pub fn new() -> Self {
        Self
    }

    fn validate_root(store: &ConfigurationStore, root: &StoreHandle, catalog: &TargetCatalog) -> Result<()> {
        if root.is_closed() || root.is_virtual() {
            return Err(SetupError::contract("invalid root key"));
        }
        match store.scope_of(root) {
            None => Err(SetupError::contract("root key must be per-user or per-machine")),
            Some(scope) if scope != catalog.scope() => Err(SetupError::contract(format!(
                "root key {} does not match catalog scope {}",
                scope,
                catalog.scope()
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Walk the runtime targets of `catalog`.
    #[allow(clippy::too_many_arguments)]
    pub fn run_runtime<P, C>(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        catalog: &TargetCatalog,
        options: &MatrixOptions,
        probe: &P,
        callback: &C,
        ctx: &SharedContext,
    ) -> Result<RunReport>
    where
        P: PresenceProbe<RuntimeTarget> + ?Sized,
        C: OperationCallback<RuntimeTarget> + ?Sized,
    {
        Self::validate_root(store, root, catalog)?;
        if !catalog.is_paired() {
            return Err(SetupError::contract(format!(
                "framework name count {} does not match platform name count {}",
                catalog.family_names().len(),
                catalog.platform_names().len()
            )));
        }

        let targets = catalog
            .runtime_targets(options.runtime_override.as_ref())
            .into_iter()
            .filter(|target| !options.desktop_only || target.is_desktop());

        Self::traverse(store, root, targets, probe, callback, ctx, |t: &RuntimeTarget| {
            format!(".NET Framework {}", t.version)
        })
    }

    /// Walk the IDE targets of `catalog`.
    #[allow(clippy::too_many_arguments)]
    pub fn run_ide<P, C>(
        &self,
        store: &ConfigurationStore,
        root: &StoreHandle,
        catalog: &TargetCatalog,
        options: &MatrixOptions,
        probe: &P,
        callback: &C,
        ctx: &SharedContext,
    ) -> Result<RunReport>
    where
        P: PresenceProbe<IdeTarget> + ?Sized,
        C: OperationCallback<IdeTarget> + ?Sized,
    {
        Self::validate_root(store, root, catalog)?;

        let targets = catalog.ide_targets(options.ide_override);
        Self::traverse(store, root, targets, probe, callback, ctx, |t: &IdeTarget| {
            format!("Visual Studio {}", t.version)
        })
    }

    fn traverse<T, I, P, C, L>(
        store: &ConfigurationStore,
        root: &StoreHandle,
        targets: I,
        probe: &P,
        callback: &C,
        ctx: &SharedContext,
        label: L,
    ) -> Result<RunReport>
    where
        T: fmt::Display,
        I: IntoIterator<Item = T>,
        P: PresenceProbe<T> + ?Sized,
        C: OperationCallback<T> + ?Sized,
        L: Fn(&T) -> String,
    {
        let mut report = RunReport::default();

        for target in targets {
            trace!("{}", target);

            let install_dir = match probe.probe(store, root, &target)? {
                Presence::Absent => {
                    debug!("{} not found, skipping...", label(&target));
                    report.skipped += 1;
                    continue;
                }
                Presence::Present(dir) => dir,
            };

            let outcome = callback.invoke(store, root, &target, install_dir.as_deref(), ctx)?;
            report.record(&outcome);
        }

        Ok(report)
    }
}
