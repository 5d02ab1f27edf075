//! Key names for every registration surface.

use crate::catalog::{IdeTarget, RuntimeTarget, TargetVersion};
use crate::config::{BitnessConfig, StoreLayoutConfig};
use crate::platform;

/// Computes store paths relative to a root scope.
///
/// The `Wow6432Node` segment is only inserted for machine-wide scope, when
/// the 32-bit view is requested and the process itself is 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLayout {
    per_user: bool,
    wow64: bool,
    process_is_64bit: bool,
}

impl KeyLayout {
    pub fn new(per_user: bool, wow64: bool) -> Self {
        Self::with_process_bitness(per_user, wow64, platform::is_64bit_process())
    }

    /// Layout with an explicit process bitness.
    pub fn with_process_bitness(per_user: bool, wow64: bool, process_is_64bit: bool) -> Self {
        Self {
            per_user,
            wow64,
            process_is_64bit,
        }
    }

    /// Layout for runtime surfaces.
    pub fn for_runtime(per_user: bool, wow64: bool) -> Self {
        Self::new(per_user, BitnessConfig::RUNTIME_IS_32BIT_ONLY || wow64)
    }

    /// Layout for IDE surfaces.
    pub fn for_ide(per_user: bool, wow64: bool) -> Self {
        Self::new(per_user, BitnessConfig::IDE_IS_32BIT_ONLY || wow64)
    }

    pub fn per_user(&self) -> bool {
        self.per_user
    }

    pub fn wow64(&self) -> bool {
        self.wow64
    }

    /// `Software` or `Software\Wow6432Node`.
    pub fn root_key_name(&self) -> String {
        if !self.per_user && self.wow64 && self.process_is_64bit {
            format!(
                "{}\\{}",
                StoreLayoutConfig::ROOT_KEY_NAME,
                StoreLayoutConfig::WOW64_SUB_KEY_NAME
            )
        } else {
            StoreLayoutConfig::ROOT_KEY_NAME.to_string()
        }
    }

    /// `{root}\Microsoft\.NETFramework`, which holds `InstallRoot`.
    pub fn runtime_root_key_name(&self) -> String {
        format!(
            "{}\\{}\\{}",
            self.root_key_name(),
            StoreLayoutConfig::VENDOR_KEY_NAME,
            StoreLayoutConfig::DESKTOP_FAMILY
        )
    }

    fn runtime_key(&self, family: &str, version: &TargetVersion, platform: Option<&str>) -> String {
        let base = format!(
            "{}\\{}\\{}\\v{}",
            self.root_key_name(),
            StoreLayoutConfig::VENDOR_KEY_NAME,
            family,
            version
        );
        match platform {
            Some(platform) if !platform.is_empty() => format!("{}\\{}", base, platform),
            _ => base,
        }
    }

    /// `{root}\Microsoft\{family}\v{version}[\{platform}]`.
    pub fn runtime_key_name(&self, target: &RuntimeTarget) -> String {
        self.runtime_key(&target.family, &target.version, target.platform.as_deref())
    }

    /// `{root}\Microsoft\{family}\v{version}[\{platform}]\AssemblyFoldersEx`.
    pub fn assembly_folders_key_name(&self, target: &RuntimeTarget) -> String {
        format!(
            "{}\\{}",
            self.runtime_key_name(target),
            StoreLayoutConfig::ASSEMBLY_FOLDERS_KEY
        )
    }

    /// `{root}\Microsoft\VisualStudio\{version}{suffix}`.
    pub fn ide_key_name(&self, target: &IdeTarget) -> String {
        format!(
            "{}\\{}\\{}\\{}{}",
            self.root_key_name(),
            StoreLayoutConfig::VENDOR_KEY_NAME,
            StoreLayoutConfig::IDE_FAMILY,
            target.version,
            target.suffix.as_deref().unwrap_or("")
        )
    }
}
