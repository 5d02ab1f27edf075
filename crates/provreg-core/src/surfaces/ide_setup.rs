//! IDE extension cache refresh.
//!
//! After the designer keys change, the IDE must rebuild its package cache
//! before it will load the new registration.

use crate::catalog::IdeTarget;
use crate::config::DesignerConfig;
use crate::engine::{OperationCallback, OperationOutcome, SharedContext};
use crate::error::{Result, SetupError};
use crate::store::{ConfigurationStore, StoreHandle};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs the IDE's cache rebuild.
pub trait ExtensionCacheRefresher: Send + Sync {
    fn refresh(&self, program: &Path, args: &[&str]) -> Result<()>;
}

impl<T: ExtensionCacheRefresher + ?Sized> ExtensionCacheRefresher for Arc<T> {
    fn refresh(&self, program: &Path, args: &[&str]) -> Result<()> {
        (**self).refresh(program, args)
    }
}

/// Launches the IDE executable and waits for it to exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevenvLauncher;

impl ExtensionCacheRefresher for DevenvLauncher {
    fn refresh(&self, program: &Path, args: &[&str]) -> Result<()> {
        debug!("Launching {} {}", program.display(), args.join(" "));

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| SetupError::Launch {
                program: program.display().to_string(),
                message: e.to_string(),
            })?;

        if !status.success() {
            warn!("{} exited with {}", program.display(), status);
        }
        Ok(())
    }
}

pub struct IdeSetupSurface<R: ExtensionCacheRefresher> {
    refresher: R,
}

impl<R: ExtensionCacheRefresher> IdeSetupSurface<R> {
    pub fn new(refresher: R) -> Self {
        Self { refresher }
    }
}

impl<R: ExtensionCacheRefresher> OperationCallback<IdeTarget> for IdeSetupSurface<R> {
    fn invoke(
        &self,
        store: &ConfigurationStore,
        _root: &StoreHandle,
        target: &IdeTarget,
        install_dir: Option<&Path>,
        ctx: &SharedContext,
    ) -> Result<OperationOutcome> {
        // The cache is machine-wide; a per-user run cannot rebuild it.
        if ctx.layout.per_user() {
            debug!("Skipping Visual Studio {} setup for per-user run.", target.version);
            return Ok(OperationOutcome::unchanged());
        }
        let Some(install_dir) = install_dir else {
            return Ok(OperationOutcome::unchanged());
        };

        let program = install_dir.join(DesignerConfig::DEVENV_FILE_NAME);
        if store.is_simulate() {
            info!(
                "Would run {} {}",
                program.display(),
                DesignerConfig::DEVENV_SETUP_ARG
            );
        } else {
            info!(
                "Running {} {}, this may take some time...",
                program.display(),
                DesignerConfig::DEVENV_SETUP_ARG
            );
            self.refresher
                .refresh(&program, &[DesignerConfig::DEVENV_SETUP_ARG])?;
        }

        Ok(OperationOutcome::new(true, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IdeVersion;
    use crate::layout::KeyLayout;
    use crate::store::{MemoryHive, RootScope};
    use crate::surfaces::test_support::{ctx, store};
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    }

    impl ExtensionCacheRefresher for &Recorder {
        fn refresh(&self, program: &Path, args: &[&str]) -> Result<()> {
            self.calls.lock().unwrap().push((
                program.to_path_buf(),
                args.iter().map(|a| a.to_string()).collect(),
            ));
            Ok(())
        }
    }

    fn target() -> IdeTarget {
        IdeTarget {
            version: IdeVersion::new(12, 0),
            suffix: None,
        }
    }

    #[test]
    fn test_runs_setup_for_machine_scope() {
        let hive = Arc::new(MemoryHive::new());
        let store = store(&hive, false);
        let root = store.root(RootScope::LocalMachine).unwrap();
        let recorder = Recorder::default();
        let surface = IdeSetupSurface::new(&recorder);

        let outcome = surface
            .invoke(&store, root, &target(), Some(Path::new("/ide")), &ctx(true))
            .unwrap();
        assert!(outcome.changed);
        assert!(outcome.counters.is_empty());

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Path::new("/ide").join("devenv.exe"));
        assert_eq!(calls[0].1, ["/setup"]);
    }

    #[test]
    fn test_simulate_and_per_user_never_launch() {
        let hive = Arc::new(MemoryHive::new());
        let recorder = Recorder::default();
        let surface = IdeSetupSurface::new(&recorder);

        let simulated = store(&hive, true);
        let root = simulated.root(RootScope::LocalMachine).unwrap();
        let outcome = surface
            .invoke(&simulated, root, &target(), Some(Path::new("/ide")), &ctx(true))
            .unwrap();
        assert!(outcome.changed);

        let real = store(&hive, false);
        let root = real.root(RootScope::CurrentUser).unwrap();
        let per_user = SharedContext {
            layout: KeyLayout::with_process_bitness(true, true, true),
            ..ctx(true)
        };
        let outcome = surface
            .invoke(&real, root, &target(), Some(Path::new("/ide")), &per_user)
            .unwrap();
        assert!(!outcome.changed);

        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_launch_failure_is_reported() {
        let err = DevenvLauncher
            .refresh(Path::new("/nonexistent/provreg/devenv.exe"), &["/setup"])
            .unwrap_err();
        assert!(matches!(err, SetupError::Launch { .. }));
    }
}
