//! Resource overlay composition and identifier resolution.
//!
//! An [`AssetManager`] maintains an ordered stack of resource packages (the
//! framework and platform defaults, the application's own package, and any
//! attached theme overlays, common-resource companions and icon packs) and
//! resolves numeric resource identifiers, pooled strings and raw asset
//! entries across it.
//!
//! Parsing and identifier redirection are delegated to a [`ResourceTable`]
//! engine behind a trait; the crate ships [`JsonResourceTable`], which reads
//! packages from filesystem directories. Install-time package metadata comes
//! in through the [`PackageMetadataService`] boundary.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ovl_assets::{
//!     AssetManager, JsonResourceTable, ManagerConfig, MemoryPackageService, ThemeDescriptor,
//! };
//!
//! # fn main() -> ovl_assets::Result<()> {
//! let manager = AssetManager::new(
//!     Box::new(JsonResourceTable::new()),
//!     Arc::new(MemoryPackageService::new()),
//!     ManagerConfig::default(),
//! );
//! manager.add_package("/packages/framework".into())?;
//! manager.add_package("/packages/com.example.app".into())?;
//!
//! let report = manager.attach_theme_assets(&ThemeDescriptor::new("my.theme"))?;
//! if report.any_attached() {
//!     let _title = manager.resource_text(0x7f01_0001)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod icons;
pub mod json_table;
pub mod manager;
pub mod metadata;
pub mod overlay;
pub mod registry;
pub mod stream;
pub mod table;

mod refs;
mod strings;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{Error, Result};
pub use icons::{ComponentInfo, IconResourceMap};
pub use json_table::JsonResourceTable;
pub use manager::{AssetManager, ManagerConfig, ResourceValue, DEFAULT_PACKAGE_SLOTS};
pub use metadata::{
    ActivityInfo, ApplicationInfo, MemoryPackageService, PackageInfo, PackageMetadataService,
};
pub use overlay::{
    AttachReport, OverlayTarget, TargetAttachment, TargetOutcome, ThemeDescriptor,
    ICON_PACKAGE_ID,
};
pub use registry::{AddRequest, Cookie, CookieRegistry, PackageEntry, PackageRole};
pub use stream::{AssetStream, ThemeHandle, XmlBlock};
pub use table::{ResolvedValue, ResourceTable, TypedValue};
