//! Centralized configuration for provreg.
//!
//! Compile-time constants: provider identity, file names, store key
//! fragments, designer package identifiers and the bitness policy of the
//! runtime and IDE surfaces.

use uuid::{uuid, Uuid};

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "provreg";
    pub const DEFAULT_HIVE_FILE: &'static str = "hive.json";
    pub const DEFAULT_CACHE_DIR: &'static str = "assembly-cache";
}

/// Identity of the provider being registered.
pub struct ProviderConfig;

impl ProviderConfig {
    pub const CORE_FILE_NAME: &'static str = "System.Data.SQLite.dll";
    pub const LINQ_FILE_NAME: &'static str = "System.Data.SQLite.Linq.dll";
    pub const EF6_FILE_NAME: &'static str = "System.Data.SQLite.EF6.dll";
    pub const DESIGNER_FILE_NAME: &'static str = "SQLite.Designer.dll";

    pub const PROVIDER_NAME: &'static str = "SQLite Data Provider";
    pub const PROJECT_NAME: &'static str = "System.Data.SQLite";
    pub const LEGACY_PROJECT_NAME: &'static str = "SQLite";
    pub const INVARIANT_NAME: &'static str = "System.Data.SQLite";
    pub const FACTORY_TYPE_NAME: &'static str = "System.Data.SQLite.SQLiteFactory";
    pub const DESCRIPTION: &'static str = ".NET Framework Data Provider for SQLite";

    pub const CORE_ASSEMBLY_NAME: &'static str =
        "System.Data.SQLite, Version=1.0.0.0, Culture=neutral, PublicKeyToken=db937bc2d44ff139";
    pub const DESIGNER_ASSEMBLY_NAME: &'static str =
        "SQLite.Designer, Version=1.0.0.0, Culture=neutral, PublicKeyToken=db937bc2d44ff139";
}

/// Image runtime versions a core file may be compiled for.
pub struct RuntimeImageConfig;

impl RuntimeImageConfig {
    pub const CLR_V2: &'static str = "v2.0.50727";
    pub const CLR_V4: &'static str = "v4.0.30319";
}

/// Key and value names used to address the store.
pub struct StoreLayoutConfig;

impl StoreLayoutConfig {
    pub const ROOT_KEY_NAME: &'static str = "Software";
    pub const WOW64_SUB_KEY_NAME: &'static str = "Wow6432Node";
    pub const VENDOR_KEY_NAME: &'static str = "Microsoft";

    pub const DESKTOP_FAMILY: &'static str = ".NETFramework";
    pub const COMPACT_FAMILY: &'static str = ".NETCompactFramework";
    pub const COMPACT_PLATFORMS: [&'static str; 3] = ["PocketPC", "Smartphone", "WindowsCE"];

    pub const INSTALL_ROOT_VALUE: &'static str = "InstallRoot";
    pub const ASSEMBLY_FOLDERS_KEY: &'static str = "AssemblyFoldersEx";
    pub const CONFIG_DIR_NAME: &'static str = "Config";
    pub const MACHINE_CONFIG_FILE: &'static str = "machine.config";

    pub const IDE_FAMILY: &'static str = "VisualStudio";
    pub const INSTALL_DIR_VALUE: &'static str = "InstallDir";
}

/// Which surfaces only exist as 32-bit installations.
pub struct BitnessConfig;

impl BitnessConfig {
    /// The runtime has both 32-bit and 64-bit editions.
    pub const RUNTIME_IS_32BIT_ONLY: bool = false;
    /// The IDE is always a 32-bit application.
    pub const IDE_IS_32BIT_ONLY: bool = true;
}

/// Values written by the IDE designer surfaces.
pub struct DesignerConfig;

impl DesignerConfig {
    pub const PACKAGES_KEY: &'static str = "Packages";
    pub const MENUS_KEY: &'static str = "Menus";
    pub const SERVICES_KEY: &'static str = "Services";
    pub const DATA_SOURCES_KEY: &'static str = "DataSources";
    pub const DATA_PROVIDERS_KEY: &'static str = "DataProviders";
    pub const SUPPORTING_PROVIDERS_KEY: &'static str = "SupportingProviders";
    pub const TOOLBOX_KEY: &'static str = "Toolbox";

    pub const PACKAGE_NAME: &'static str = "System.Data.SQLite Designer Package";
    pub const PACKAGE_CLASS: &'static str = "SQLite.Designer.SQLitePackage";
    pub const PACKAGE_RESOURCE_ID: u32 = 400;
    pub const COMPANY_NAME: &'static str = "http://system.data.sqlite.org/";
    pub const MIN_EDITION: &'static str = "standard";
    pub const PRODUCT_VERSION: &'static str = "1.0";
    pub const TOOLBOX_DEFAULT_ITEMS: u32 = 3;
    pub const MENU_RESOURCE: &'static str = ", 1000, 3";
    pub const SERVICE_NAME: &'static str = "System.Data.SQLite Designer Service";
    pub const DATA_SOURCE_NAME: &'static str = "System.Data.SQLite Database File";
    pub const INPROC_SERVER_FILE: &'static str = "mscoree.dll";

    pub const SUPPORTED_OBJECTS: [&'static str; 5] = [
        "SupportedObjects\\DataConnectionUIControl",
        "SupportedObjects\\DataConnectionProperties",
        "SupportedObjects\\DataConnectionSupport",
        "SupportedObjects\\DataObjectSupport",
        "SupportedObjects\\DataViewSupport",
    ];

    pub const DEVENV_FILE_NAME: &'static str = "devenv.exe";
    pub const DEVENV_SETUP_ARG: &'static str = "/setup";
}

/// Fixed identifiers of the designer package, data source and provider.
pub struct DesignerIds;

impl DesignerIds {
    pub const ADO_NET_TECHNOLOGY: Uuid = uuid!("77AB9A9D-78B9-4BA7-91AC-873F5338F1D2");
    pub const PACKAGE: Uuid = uuid!("DCBE6C8D-0E57-4099-A183-98FF74C64D9C");
    pub const SERVICE: Uuid = uuid!("DCBE6C8D-0E57-4099-A183-98FF74C64D9D");
    pub const DATA_SOURCE: Uuid = uuid!("0EBAAB6E-CA80-4B4A-8DDF-CBE6BF058C71");
    pub const DATA_PROVIDER: Uuid = uuid!("0EBAAB6E-CA80-4B4A-8DDF-CBE6BF058C70");

    /// Braced lowercase form used for key and value names.
    pub fn format(id: &Uuid) -> String {
        id.braced().to_string()
    }
}
