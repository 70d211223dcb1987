//! Theme overlay attachment and detachment.
//!
//! A theme is applied by attaching up to three idmap-backed overlays (one per
//! overlayable target: the application, the platform SDK and the framework),
//! an idmap-free common-resources companion package, and optionally an icon
//! pack under a reserved package id. Attachment is best effort per target:
//! one target failing never blocks the others, and common assets are always
//! attempted last. Only a failure to read the theme package's own metadata
//! aborts the whole operation with nothing attached.

use crate::error::{Error, Result};
use crate::icons::IconResourceMap;
use crate::manager::{AssetManager, Inner, DEFAULT_PACKAGE_SLOTS};
use crate::metadata::PackageInfo;
use crate::registry::{AddRequest, Cookie};
use std::fmt;

/// Reserved package id under which icon pack resources are re-keyed.
pub const ICON_PACKAGE_ID: u8 = 0x61;

/// What a host asks to have attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeDescriptor {
    /// Package name of the theme (the overlay package).
    ///
    /// One overlay package covers every target. Callers whose themes ship
    /// per-application overlay packages resolve the right name for the
    /// manager's base package before building the descriptor.
    pub theme_package: String,
    /// Package name of the icon pack to attach alongside, if any.
    pub icon_pack: Option<String>,
}

impl ThemeDescriptor {
    pub fn new(theme_package: impl Into<String>) -> Self {
        Self {
            theme_package: theme_package.into(),
            icon_pack: None,
        }
    }

    pub fn with_icon_pack(mut self, icon_pack: impl Into<String>) -> Self {
        self.icon_pack = Some(icon_pack.into());
        self
    }
}

/// The three packages a theme may overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTarget {
    Application,
    Platform,
    Framework,
}

impl fmt::Display for OverlayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverlayTarget::Application => "application",
            OverlayTarget::Platform => "platform",
            OverlayTarget::Framework => "framework",
        };
        f.write_str(name)
    }
}

/// Outcome of one target's attachment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// The overlay attached under this cookie.
    Attached(Cookie),
    /// The target is not overlaid by this theme (or must not be overlaid).
    Skipped,
    /// The attachment was attempted and failed.
    Failed(String),
}

/// One row of an [`AttachReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAttachment {
    pub target: OverlayTarget,
    pub target_package: String,
    pub outcome: TargetOutcome,
}

/// Per-target result of [`AssetManager::attach_theme_assets`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachReport {
    pub targets: Vec<TargetAttachment>,
    pub common_attached: bool,
}

impl AttachReport {
    /// Cookies of the overlays that attached, in attachment order.
    pub fn attached_cookies(&self) -> Vec<Cookie> {
        self.targets
            .iter()
            .filter_map(|t| match t.outcome {
                TargetOutcome::Attached(cookie) => Some(cookie),
                _ => None,
            })
            .collect()
    }

    pub fn any_attached(&self) -> bool {
        self.targets
            .iter()
            .any(|t| matches!(t.outcome, TargetOutcome::Attached(_)))
    }
}

/// Which overlay packages are currently attached, and under which cookies.
#[derive(Debug, Default)]
pub(crate) struct ResourceOverlayState {
    /// Set exactly when `theme_cookies` is non-empty.
    pub(crate) theme_package: Option<String>,
    pub(crate) theme_cookies: Vec<Cookie>,
    pub(crate) icon_pack: Option<(String, Cookie)>,
    pub(crate) common: Option<(String, Cookie)>,
}

impl ResourceOverlayState {
    pub(crate) fn has_themed_assets(&self) -> bool {
        self.theme_package.is_some() || self.icon_pack.is_some() || self.common.is_some()
    }
}

impl AssetManager {
    /// Attach a theme's overlays.
    ///
    /// Any previously attached theme is detached first. The attempt fails
    /// closed, with nothing attached, unless the base package resolves and
    /// metadata for all four packages involved (theme, base, platform,
    /// framework) is available. Each target is then attempted independently
    /// and its outcome recorded in the returned report; common assets are
    /// attempted last regardless of how the targets fared. When the
    /// descriptor names an icon pack it is attached as well, best effort.
    pub fn attach_theme_assets(&self, theme: &ThemeDescriptor) -> Result<AttachReport> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        if inner.overlay.has_themed_assets() {
            Self::detach_locked(&mut inner);
        }

        // Nothing has touched the package stack yet, so `?` below aborts
        // with no cookies retained.
        let base_package = inner
            .config
            .app_name
            .clone()
            .or_else(|| Self::base_package_name(&inner))
            .ok_or(Error::NoBasePackage)?;

        let theme_info = self
            .metadata
            .package_info(&theme.theme_package)?
            .ok_or_else(|| {
                Error::Metadata(format!("unknown theme package '{}'", theme.theme_package))
            })?;
        let base_info = self
            .base_metadata(&inner, &base_package)?
            .ok_or_else(|| Error::Metadata(format!("unknown base package '{base_package}'")))?;
        let platform_package = inner.config.platform_package.clone();
        let platform_info = self
            .metadata
            .package_info(&platform_package)?
            .ok_or_else(|| {
                Error::Metadata(format!("unknown platform package '{platform_package}'"))
            })?;
        let framework_package = inner.config.framework_package.clone();
        let framework_info = self
            .metadata
            .package_info(&framework_package)?
            .ok_or_else(|| {
                Error::Metadata(format!("unknown framework package '{framework_package}'"))
            })?;

        let mut report = AttachReport::default();
        let mut cookies = Vec::new();
        for (target, target_info) in [
            (OverlayTarget::Application, &base_info),
            (OverlayTarget::Platform, &platform_info),
            (OverlayTarget::Framework, &framework_info),
        ] {
            let outcome = self.attach_target_locked(
                &mut inner,
                target,
                target_info,
                &base_info,
                theme,
                &theme_info,
                &mut cookies,
            );
            if let TargetOutcome::Failed(reason) = &outcome {
                tracing::warn!("theme overlay for {target} target not attached: {reason}");
            }
            report.targets.push(TargetAttachment {
                target,
                target_package: target_info.package_name.clone(),
                outcome,
            });
        }

        if !cookies.is_empty() {
            inner.overlay.theme_package = Some(theme.theme_package.clone());
            inner.overlay.theme_cookies = cookies;
        }

        report.common_attached = self.attach_common_locked(&mut inner, &theme.theme_package);
        drop(inner);

        if theme.icon_pack.is_some() {
            if let Err(e) = self.attach_icon_assets(theme.icon_pack.as_deref()) {
                tracing::warn!("icon pack not attached: {e}");
            }
        }
        Ok(report)
    }

    fn attach_target_locked(
        &self,
        inner: &mut Inner,
        target: OverlayTarget,
        target_info: &PackageInfo,
        base_info: &PackageInfo,
        theme: &ThemeDescriptor,
        theme_info: &PackageInfo,
        cookies: &mut Vec<Cookie>,
    ) -> TargetOutcome {
        // A base application that is itself a theme package is never
        // overlaid, on any target.
        if base_info.is_theme_package {
            return TargetOutcome::Skipped;
        }
        // When the base package *is* a default-package target, it already
        // got its chance as the application target.
        if target != OverlayTarget::Application
            && target_info.package_name == base_info.package_name
        {
            return TargetOutcome::Skipped;
        }
        // A theme does not overlay itself, and must declare the target.
        if target_info.package_name == theme.theme_package
            || !theme_info
                .overlay_targets
                .iter()
                .any(|t| *t == target_info.package_name)
        {
            return TargetOutcome::Skipped;
        }

        let cache = inner.config.cache_root.clone();
        let request = AddRequest::Overlay {
            idmap: Some(ovl_paths::idmap_path_in(
                &cache,
                &target_info.package_name,
                &theme.theme_package,
            )),
            source: theme_info.public_source_path.clone(),
            resolved: ovl_paths::resolved_package_path_in(
                &cache,
                &target_info.package_name,
                &theme.theme_package,
            ),
            target: Some(target_info.public_source_path.clone()),
            prefix: ovl_paths::overlay_prefix_for_target(&target_info.package_name),
        };
        match Self::add_locked(inner, &request) {
            0 => TargetOutcome::Failed(format!(
                "engine rejected overlay of '{}' by '{}'",
                target_info.package_name, theme.theme_package
            )),
            cookie => {
                cookies.push(cookie);
                TargetOutcome::Attached(cookie)
            }
        }
    }

    /// Metadata lookup for the base package, falling back to the resource
    /// package name when the application package was renamed on upgrade.
    fn base_metadata(&self, inner: &Inner, name: &str) -> Result<Option<PackageInfo>> {
        if let Some(info) = self.metadata.package_info(name)? {
            return Ok(Some(info));
        }
        if let Some(table) = inner.table.as_deref() {
            let slot = Self::base_package_slot(table.package_count());
            if let Some(renamed) = table.resource_package_name(slot) {
                if renamed != name {
                    return self.metadata.package_info(&renamed);
                }
            }
        }
        Ok(None)
    }

    fn base_package_slot(package_count: usize) -> usize {
        if package_count > DEFAULT_PACKAGE_SLOTS {
            DEFAULT_PACKAGE_SLOTS
        } else {
            0
        }
    }

    /// Package name of the application's own package: the first slot after
    /// the default packages, or the very first slot for managers without
    /// defaults attached.
    fn base_package_name(inner: &Inner) -> Option<String> {
        let table = inner.table.as_deref()?;
        let count = table.package_count();
        if count == 0 {
            return None;
        }
        table.package_name(Self::base_package_slot(count))
    }

    /// Attach the theme's common-resources companion package, if installed.
    fn attach_common_locked(&self, inner: &mut Inner, theme_package: &str) -> bool {
        let Some(common_name) = ovl_paths::common_package_name(theme_package) else {
            return false;
        };
        let info = match self.metadata.package_info(&common_name) {
            Ok(Some(info)) => info,
            Ok(None) => {
                tracing::debug!("theme '{theme_package}' has no common package");
                return false;
            }
            Err(e) => {
                tracing::warn!("metadata for common package '{common_name}' unavailable: {e}");
                return false;
            }
        };

        let cache = inner.config.cache_root.clone();
        let request = AddRequest::Overlay {
            idmap: None,
            source: info.public_source_path.clone(),
            resolved: ovl_paths::resolved_package_path_in(
                &cache,
                ovl_paths::COMMON_RES_TARGET,
                theme_package,
            ),
            target: None,
            prefix: ovl_paths::COMMON_RES_PREFIX.to_string(),
        };
        match Self::add_locked(inner, &request) {
            0 => false,
            cookie => {
                inner.overlay.common = Some((common_name, cookie));
                true
            }
        }
    }

    /// Attach an icon pack, replacing any previously attached one, and
    /// rebuild the icon resolution map.
    ///
    /// `None` detaches the current pack and clears the map, returning
    /// `Ok(false)`. `Ok(false)` is also returned when the engine rejects the
    /// pack. Unknown pack names and metadata transport failures are errors.
    pub fn attach_icon_assets(&self, icon_pack: Option<&str>) -> Result<bool> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;

        if let Some((name, cookie)) = inner.overlay.icon_pack.take() {
            Self::remove_locked(&mut inner, &name, cookie);
        }
        let Some(pack) = icon_pack else {
            inner.icons = IconResourceMap::default();
            return Ok(false);
        };

        let info = self
            .metadata
            .package_info(pack)?
            .ok_or_else(|| Error::Metadata(format!("unknown icon pack '{pack}'")))?;

        let request = if info.is_legacy_icon_pack {
            AddRequest::IconPack {
                source: info.public_source_path.clone(),
                resolved: None,
                prefix: None,
                package_id_override: ICON_PACKAGE_ID,
                legacy: true,
            }
        } else {
            AddRequest::IconPack {
                source: info.public_source_path.clone(),
                resolved: Some(ovl_paths::icon_pack_resolved_path_in(
                    &inner.config.cache_root,
                    pack,
                )),
                prefix: Some(ovl_paths::ICONS_PREFIX.to_string()),
                package_id_override: ICON_PACKAGE_ID,
                legacy: false,
            }
        };

        let cookie = Self::add_locked(&mut inner, &request);
        if cookie == 0 {
            inner.icons = IconResourceMap::default();
            return Ok(false);
        }
        inner.overlay.icon_pack = Some((pack.to_string(), cookie));
        self.rebuild_icon_map_locked(&mut inner, pack)?;
        Ok(true)
    }

    fn rebuild_icon_map_locked(&self, inner: &mut Inner, icon_pack: &str) -> Result<()> {
        let Some(app) = inner.config.app_name.clone() else {
            inner.icons = IconResourceMap::default();
            return Ok(());
        };
        let info = self.metadata.package_info(&app)?;
        inner.icons = IconResourceMap::build(info.as_ref(), Some(icon_pack));
        Ok(())
    }

    /// Detach everything a theme attached. Idempotent: with nothing
    /// attached this is a no-op.
    pub fn detach_theme_assets(&self) -> Result<()> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        Self::detach_locked(&mut inner);
        Ok(())
    }

    pub(crate) fn detach_locked(inner: &mut Inner) {
        if let Some((name, cookie)) = inner.overlay.icon_pack.take() {
            Self::remove_locked(inner, &name, cookie);
        }
        inner.icons = IconResourceMap::default();

        if let Some((name, cookie)) = inner.overlay.common.take() {
            Self::remove_locked(inner, &name, cookie);
        }

        let theme = inner.overlay.theme_package.take();
        let cookies: Vec<Cookie> = inner.overlay.theme_cookies.drain(..).collect();
        if let Some(theme) = theme {
            // Reverse attachment order, mirroring how they stacked up.
            for cookie in cookies.into_iter().rev() {
                Self::remove_locked(inner, &theme, cookie);
            }
        }
    }
}
