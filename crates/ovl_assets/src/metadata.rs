//! Package metadata service boundary.
//!
//! Install-time metadata (source paths, overlay target lists, icon ids) comes
//! from an external lookup service. The overlay layer only consumes the
//! [`PackageMetadataService`] trait; hosts wire in their own implementation
//! or use the in-memory [`MemoryPackageService`].

use crate::error::Result;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Application-level metadata relevant to icon substitution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
    /// Resource id of the application's default icon (0 if none).
    #[serde(default)]
    pub icon_id: u32,
    /// Resource id of an explicit themed-icon override (0 if none).
    #[serde(default)]
    pub themed_icon_id: u32,
}

/// Per-activity metadata relevant to icon substitution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInfo {
    pub name: String,
    #[serde(default)]
    pub icon_id: u32,
    #[serde(default)]
    pub themed_icon_id: u32,
}

/// Install-time metadata for one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub package_name: String,
    /// Install location of the package archive.
    pub source_path: Utf8PathBuf,
    /// World-readable install location (may equal `source_path`).
    pub public_source_path: Utf8PathBuf,
    /// Package names this package declares itself an overlay for.
    #[serde(default)]
    pub overlay_targets: Vec<String>,
    /// The package is itself an overlay-only package and must not be
    /// overlaid in turn.
    #[serde(default)]
    pub is_theme_package: bool,
    /// Legacy icon pack carrying everything in its own archive.
    #[serde(default)]
    pub is_legacy_icon_pack: bool,
    #[serde(default)]
    pub application: Option<ApplicationInfo>,
    #[serde(default)]
    pub activities: Vec<ActivityInfo>,
}

/// Install-time package metadata lookup.
///
/// `Ok(None)` means the package is unknown; `Err` means the service itself
/// was unreachable. Callers treat transport errors as fatal to the current
/// attach/detach attempt only.
pub trait PackageMetadataService: Send + Sync {
    fn package_info(&self, package_name: &str) -> Result<Option<PackageInfo>>;
}

/// In-memory metadata service backed by a map. Suitable for hosts that
/// already hold their package table, and for tests.
#[derive(Debug, Default)]
pub struct MemoryPackageService {
    packages: HashMap<String, PackageInfo>,
}

impl MemoryPackageService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package, replacing any previous entry with the same name.
    pub fn insert(&mut self, info: PackageInfo) {
        self.packages.insert(info.package_name.clone(), info);
    }

    /// Drop a package's entry, if present.
    pub fn remove(&mut self, package_name: &str) {
        self.packages.remove(package_name);
    }
}

impl PackageMetadataService for MemoryPackageService {
    fn package_info(&self, package_name: &str) -> Result<Option<PackageInfo>> {
        Ok(self.packages.get(package_name).cloned())
    }
}
