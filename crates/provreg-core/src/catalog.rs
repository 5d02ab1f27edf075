//! Target descriptors and the catalog of everything that could need registering.
//!
//! The catalog is built from a [`Configuration`] once per run and never
//! consults the machine: presence is decided later, per target, by a probe.

use crate::config::StoreLayoutConfig;
use crate::error::{Result, SetupError};
use crate::settings::{Configuration, Suppression};
use crate::store::RootScope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Ordered runtime version with two to four numeric components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetVersion {
    parts: Vec<u32>,
}

impl TargetVersion {
    /// Build a version from its components.
    pub fn from_parts(parts: &[u32]) -> Result<Self> {
        if !(2..=4).contains(&parts.len()) {
            return Err(SetupError::InvalidVersion {
                value: parts
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join("."),
            });
        }
        Ok(Self::known(parts))
    }

    fn known(parts: &[u32]) -> Self {
        Self {
            parts: parts.to_vec(),
        }
    }

    pub fn major(&self) -> u32 {
        self.parts[0]
    }

    pub fn minor(&self) -> u32 {
        self.parts[1]
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl FromStr for TargetVersion {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SetupError::InvalidVersion {
            value: s.to_string(),
        };
        let parts = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        if !(2..=4).contains(&parts.len()) {
            return Err(invalid());
        }
        Ok(Self { parts })
    }
}

impl TryFrom<String> for TargetVersion {
    type Error = SetupError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TargetVersion> for String {
    fn from(value: TargetVersion) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .parts
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&text)
    }
}

/// IDE release number, `major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdeVersion {
    pub major: u32,
    pub minor: u32,
}

impl IdeVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl FromStr for IdeVersion {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SetupError::InvalidVersion {
            value: s.to_string(),
        };
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for IdeVersion {
    type Error = SetupError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<IdeVersion> for String {
    fn from(value: IdeVersion) -> Self {
        value.to_string()
    }
}

impl fmt::Display for IdeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One runtime cell of the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTarget {
    pub family: String,
    pub version: TargetVersion,
    /// `None` is the desktop runtime.
    pub platform: Option<String>,
}

impl RuntimeTarget {
    pub fn is_desktop(&self) -> bool {
        self.platform.is_none()
    }
}

impl fmt::Display for RuntimeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frameworkName = {}, frameworkVersion = {}, platformName = {}",
            self.family,
            self.version,
            self.platform.as_deref().unwrap_or("<null>")
        )
    }
}

/// One IDE cell of the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdeTarget {
    pub version: IdeVersion,
    pub suffix: Option<String>,
}

impl fmt::Display for IdeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vsVersion = {}{}", self.version, self.suffix.as_deref().unwrap_or(""))
    }
}

/// Everything that could possibly need registering, independent of what is
/// installed.
///
/// `family_names[i]` is paired with `platform_names[i]`. Suppressed targets
/// are omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCatalog {
    scope: RootScope,
    family_names: Vec<String>,
    platform_names: Vec<Option<String>>,
    versions: BTreeMap<String, Vec<TargetVersion>>,
    ide_versions: Vec<IdeVersion>,
    ide_suffix: Option<String>,
}

impl TargetCatalog {
    /// Known desktop runtime versions, oldest first.
    fn desktop_versions(suppress: &Suppression) -> Vec<TargetVersion> {
        [
            (suppress.netfx20, &[2, 0, 50727][..]),
            (suppress.netfx35, &[3, 5][..]),
            (suppress.netfx40, &[4, 0, 30319][..]),
            (suppress.netfx45, &[4, 5, 50709][..]),
            (suppress.netfx451, &[4, 5, 1][..]),
        ]
        .into_iter()
        .filter(|(suppressed, _)| !suppressed)
        .map(|(_, parts)| TargetVersion::known(parts))
        .collect()
    }

    fn compact_versions() -> Vec<TargetVersion> {
        vec![
            TargetVersion::known(&[2, 0, 0, 0]),
            TargetVersion::known(&[3, 5, 0, 0]),
        ]
    }

    /// Known IDE release numbers, oldest first.
    fn known_ide_versions(suppress: &Suppression) -> Vec<IdeVersion> {
        [
            (suppress.vs2005, IdeVersion::new(8, 0)),
            (suppress.vs2008, IdeVersion::new(9, 0)),
            (suppress.vs2010, IdeVersion::new(10, 0)),
            (suppress.vs2012, IdeVersion::new(11, 0)),
            (suppress.vs2013, IdeVersion::new(12, 0)),
        ]
        .into_iter()
        .filter(|(suppressed, _)| !suppressed)
        .map(|(_, version)| version)
        .collect()
    }

    /// Derive the catalog from a finalized configuration.
    pub fn from_configuration(config: &Configuration) -> Self {
        let suppress = &config.suppress;
        let mut family_names = Vec::new();
        let mut platform_names = Vec::new();
        let mut versions = BTreeMap::new();

        if !suppress.desktop {
            family_names.push(StoreLayoutConfig::DESKTOP_FAMILY.to_string());
            platform_names.push(None);
            versions.insert(
                StoreLayoutConfig::DESKTOP_FAMILY.to_string(),
                Self::desktop_versions(suppress),
            );
        }

        if !suppress.compact {
            for platform in StoreLayoutConfig::COMPACT_PLATFORMS {
                family_names.push(StoreLayoutConfig::COMPACT_FAMILY.to_string());
                platform_names.push(Some(platform.to_string()));
            }
            versions.insert(
                StoreLayoutConfig::COMPACT_FAMILY.to_string(),
                Self::compact_versions(),
            );
        }

        let ide_versions = match config.ide_version {
            Some(version) => vec![version],
            None => Self::known_ide_versions(suppress),
        };

        Self {
            scope: RootScope::for_user(config.per_user),
            family_names,
            platform_names,
            versions,
            ide_versions,
            ide_suffix: config.ide_suffix.clone(),
        }
    }

    /// Build a catalog from explicit lists. Pairing is checked by the engine.
    pub fn from_parts(
        scope: RootScope,
        family_names: Vec<String>,
        platform_names: Vec<Option<String>>,
        versions: BTreeMap<String, Vec<TargetVersion>>,
        ide_versions: Vec<IdeVersion>,
        ide_suffix: Option<String>,
    ) -> Self {
        Self {
            scope,
            family_names,
            platform_names,
            versions,
            ide_versions,
            ide_suffix,
        }
    }

    pub fn scope(&self) -> RootScope {
        self.scope
    }

    pub fn family_names(&self) -> &[String] {
        &self.family_names
    }

    pub fn platform_names(&self) -> &[Option<String>] {
        &self.platform_names
    }

    pub fn versions_of(&self, family: &str) -> Option<&[TargetVersion]> {
        self.versions.get(family).map(Vec::as_slice)
    }

    pub fn ide_versions(&self) -> &[IdeVersion] {
        &self.ide_versions
    }

    pub fn ide_suffix(&self) -> Option<&str> {
        self.ide_suffix.as_deref()
    }

    pub fn is_paired(&self) -> bool {
        self.family_names.len() == self.platform_names.len()
    }

    /// Runtime targets in catalog order.
    ///
    /// An override replaces every family's version list. Families without a
    /// version list are skipped.
    pub fn runtime_targets(&self, version_override: Option<&TargetVersion>) -> Vec<RuntimeTarget> {
        let mut targets = Vec::new();
        for (family, platform) in self.family_names.iter().zip(&self.platform_names) {
            let versions: Vec<TargetVersion> = match version_override {
                Some(version) => vec![version.clone()],
                None => match self.versions.get(family) {
                    Some(list) => list.clone(),
                    None => continue,
                },
            };
            targets.extend(versions.into_iter().map(|version| RuntimeTarget {
                family: family.clone(),
                version,
                platform: platform.clone(),
            }));
        }
        targets
    }

    /// IDE targets in catalog order, or the single override.
    pub fn ide_targets(&self, version_override: Option<IdeVersion>) -> Vec<IdeTarget> {
        let versions = match version_override {
            Some(version) => vec![version],
            None => self.ide_versions.clone(),
        };
        versions
            .into_iter()
            .map(|version| IdeTarget {
                version,
                suffix: self.ide_suffix.clone(),
            })
            .collect()
    }
}
