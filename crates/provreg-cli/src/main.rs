//! provreg - register or unregister the provider on this machine.
//!
//! Nothing runs unless `--confirm` is given. Use `--simulate` to see what
//! would change without touching the store.

use anyhow::{Context, Result};
use clap::Parser;
use provreg_core::platform;
use provreg_core::{
    Configuration, ConfigurationStore, DirectoryCache, FileHive, IdeVersion, Installer,
    SetupError, StorePolicy, Surface, TargetVersion,
};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Parser, Debug)]
#[command(name = "provreg")]
#[command(about = "Register a database provider with installed runtimes and IDEs")]
struct Args {
    /// Load settings from a JSON file before applying the flags below
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Install the provider (default)
    #[arg(long, conflicts_with = "uninstall")]
    install: bool,

    /// Uninstall the provider
    #[arg(long)]
    uninstall: bool,

    /// Required before anything runs
    #[arg(long)]
    confirm: bool,

    /// Report what would change without changing anything
    #[arg(long)]
    simulate: bool,

    /// Register for the current user instead of the whole machine
    #[arg(long)]
    per_user: bool,

    /// Use the 32-bit view of machine-wide keys
    #[arg(long)]
    wow64: bool,

    /// Fail an uninstall when something to remove is already gone
    #[arg(long)]
    throw_on_missing: bool,

    #[arg(long)]
    no_desktop: bool,
    #[arg(long)]
    no_compact: bool,
    #[arg(long)]
    no_netfx20: bool,
    #[arg(long)]
    no_netfx35: bool,
    #[arg(long)]
    no_netfx40: bool,
    #[arg(long)]
    no_netfx45: bool,
    #[arg(long)]
    no_netfx451: bool,
    #[arg(long)]
    no_vs2005: bool,
    #[arg(long)]
    no_vs2008: bool,
    #[arg(long)]
    no_vs2010: bool,
    #[arg(long)]
    no_vs2012: bool,
    #[arg(long)]
    no_vs2013: bool,

    /// Only register the assembly folders for this runtime version
    #[arg(long)]
    registry_version: Option<TargetVersion>,

    /// Only register the provider factory for this runtime version
    #[arg(long)]
    config_version: Option<TargetVersion>,

    /// Only register with this IDE version (e.g. 10.0)
    #[arg(long)]
    ide_version: Option<IdeVersion>,

    /// IDE hive suffix (e.g. Exp)
    #[arg(long)]
    ide_suffix: Option<String>,

    /// Comma-separated surfaces to run (default: all)
    #[arg(long, value_delimiter = ',')]
    surfaces: Vec<Surface>,

    /// Directory holding the provider files (default: executable directory)
    #[arg(long)]
    directory: Option<PathBuf>,

    #[arg(long)]
    core_file: Option<PathBuf>,
    #[arg(long)]
    linq_file: Option<PathBuf>,
    #[arg(long)]
    ef6_file: Option<PathBuf>,
    #[arg(long)]
    designer_file: Option<PathBuf>,
    #[arg(long)]
    core_assembly_name: Option<String>,
    #[arg(long)]
    designer_assembly_name: Option<String>,

    /// JSON hive file to operate on
    #[arg(long)]
    hive: Option<PathBuf>,

    /// Keep a .bak copy of the hive file on every rewrite
    #[arg(long)]
    keep_backup: bool,

    /// Root of the shared component cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Image runtime the core file targets (v2.0.50727 or v4.0.30319)
    #[arg(long)]
    runtime_image: Option<String>,

    #[arg(long)]
    skip_runtime_check: bool,

    /// The EF6 assembly is available to the 4.x runtimes
    #[arg(long)]
    ef6_available: bool,

    /// Trace every store operation
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Also write JSON log lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    /// Overlay the command line onto `config`. Flags only ever switch things on.
    fn apply(&self, config: &mut Configuration) {
        if self.uninstall {
            config.install = false;
        } else if self.install {
            config.install = true;
        }
        config.confirm |= self.confirm;
        config.simulate |= self.simulate;
        config.per_user |= self.per_user;
        config.wow64 |= self.wow64;
        config.throw_on_missing |= self.throw_on_missing;

        let suppress = &mut config.suppress;
        suppress.desktop |= self.no_desktop;
        suppress.compact |= self.no_compact;
        suppress.netfx20 |= self.no_netfx20;
        suppress.netfx35 |= self.no_netfx35;
        suppress.netfx40 |= self.no_netfx40;
        suppress.netfx45 |= self.no_netfx45;
        suppress.netfx451 |= self.no_netfx451;
        suppress.vs2005 |= self.no_vs2005;
        suppress.vs2008 |= self.no_vs2008;
        suppress.vs2010 |= self.no_vs2010;
        suppress.vs2012 |= self.no_vs2012;
        suppress.vs2013 |= self.no_vs2013;

        if self.registry_version.is_some() {
            config.registry_version = self.registry_version.clone();
        }
        if self.config_version.is_some() {
            config.config_version = self.config_version.clone();
        }
        if self.ide_version.is_some() {
            config.ide_version = self.ide_version;
        }
        if self.ide_suffix.is_some() {
            config.ide_suffix = self.ide_suffix.clone();
        }
        if !self.surfaces.is_empty() {
            config.surfaces = self.surfaces.iter().copied().collect();
        }

        if let Some(directory) = &self.directory {
            config.set_directory(directory);
        }
        if let Some(file) = &self.core_file {
            config.core_file = file.clone();
        }
        if let Some(file) = &self.linq_file {
            config.linq_file = file.clone();
        }
        if let Some(file) = &self.ef6_file {
            config.ef6_file = file.clone();
        }
        if let Some(file) = &self.designer_file {
            config.designer_file = file.clone();
        }
        if let Some(name) = &self.core_assembly_name {
            config.core_assembly_name = name.clone();
        }
        if let Some(name) = &self.designer_assembly_name {
            config.designer_assembly_name = name.clone();
        }

        if self.runtime_image.is_some() {
            config.core_image_runtime = self.runtime_image.clone();
        }
        config.skip_runtime_check |= self.skip_runtime_check;
        config.ef6_available |= self.ef6_available;
        config.verbose |= self.verbose;
        if self.log_file.is_some() {
            config.log_file = self.log_file.clone();
        }
    }

    fn log_level(&self) -> Level {
        if self.verbose {
            Level::TRACE
        } else if self.debug {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

fn init_logging(level: Level, log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![Box::new(
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false),
    )];

    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        layers.push(Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ));
    }

    Registry::default().with(layers).with(filter).init();
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.settings {
        Some(path) => Configuration::from_json_file(path)?,
        None => Configuration::default(),
    };
    args.apply(&mut config);
    config.finalize()?;

    let hive_path = match &args.hive {
        Some(path) => path.clone(),
        None => platform::default_hive_path()?,
    };
    let cache_dir = match &args.cache_dir {
        Some(path) => path.clone(),
        None => platform::default_cache_dir()?,
    };
    info!("Hive: {}", hive_path.display());
    info!("Shared cache: {}", cache_dir.display());

    let hive = Arc::new(FileHive::open(&hive_path)?.with_backup(args.keep_backup));
    let mut store = ConfigurationStore::new(hive, StorePolicy::for_run(config.simulate))?
        .with_verbose(config.verbose);

    let installer = Installer::new(config).with_cache(Arc::new(DirectoryCache::new(cache_dir)));
    let summary = installer.run(&store);
    store.close();
    let summary = summary?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_file = args.log_file.clone();
    if let Err(e) = init_logging(args.log_level(), log_file.as_ref()) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<SetupError>()
                .map(SetupError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
