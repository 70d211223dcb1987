//! Path and naming conventions for resource overlay packages.
//!
//! The overlay layer never invents filesystem layout on its own: every cache
//! directory, idmap location and namespace prefix is derived through the
//! functions in this crate so that the resolver, the precompiler that fills
//! the caches, and external tooling all agree on where things live.
//!
//! Each path rule comes in two forms: a `*_in` function taking an explicit
//! cache root, and a convenience wrapper rooted at
//! [`RESOURCE_CACHE_ROOT`].

use camino::{Utf8Path, Utf8PathBuf};

/// Package name of the base framework resources. Always attached first.
pub const FRAMEWORK_PACKAGE: &str = "framework";

/// Package name of the shared platform SDK resources (second default slot).
pub const PLATFORM_PACKAGE: &str = "platform.sdk";

/// Namespace prefix under which common overlay resources are packaged.
///
/// Common resources live outside the standard application namespace and are
/// attached without an idmap.
pub const COMMON_RES_PREFIX: &str = "assets/overlays/common";

/// Pseudo target-package name used when caching common overlay resources.
pub const COMMON_RES_TARGET: &str = "common";

/// Namespace prefix under which icon pack resources are packaged.
pub const ICONS_PREFIX: &str = "assets/icons";

/// Default root directory for precompiled overlay resource caches.
pub const RESOURCE_CACHE_ROOT: &str = "/data/resource-cache";

/// Name of the precompiled resource package inside a cache directory.
const RESOLVED_PACKAGE_NAME: &str = "resources.pkg";

/// Cache directory holding precompiled resources for one (target, overlay)
/// pair, e.g. `<root>/my.theme/com.example.app`.
pub fn target_cache_dir_in(
    root: &Utf8Path,
    target_package: &str,
    overlay_package: &str,
) -> Utf8PathBuf {
    root.join(overlay_package).join(target_package)
}

/// [`target_cache_dir_in`] rooted at [`RESOURCE_CACHE_ROOT`].
pub fn target_cache_dir(target_package: &str, overlay_package: &str) -> Utf8PathBuf {
    target_cache_dir_in(
        Utf8Path::new(RESOURCE_CACHE_ROOT),
        target_package,
        overlay_package,
    )
}

/// Path of the precompiled resource package for one (target, overlay) pair.
pub fn resolved_package_path_in(
    root: &Utf8Path,
    target_package: &str,
    overlay_package: &str,
) -> Utf8PathBuf {
    target_cache_dir_in(root, target_package, overlay_package).join(RESOLVED_PACKAGE_NAME)
}

/// [`resolved_package_path_in`] rooted at [`RESOURCE_CACHE_ROOT`].
pub fn resolved_package_path(target_package: &str, overlay_package: &str) -> Utf8PathBuf {
    resolved_package_path_in(
        Utf8Path::new(RESOURCE_CACHE_ROOT),
        target_package,
        overlay_package,
    )
}

/// Path of the precomputed idmap correlating an overlay's resource ids with
/// the ids of its target package.
pub fn idmap_path_in(root: &Utf8Path, target_package: &str, overlay_package: &str) -> Utf8PathBuf {
    target_cache_dir_in(root, target_package, overlay_package).join("idmap.json")
}

/// [`idmap_path_in`] rooted at [`RESOURCE_CACHE_ROOT`].
pub fn idmap_path(target_package: &str, overlay_package: &str) -> Utf8PathBuf {
    idmap_path_in(
        Utf8Path::new(RESOURCE_CACHE_ROOT),
        target_package,
        overlay_package,
    )
}

/// Namespace prefix under which an overlay stores its redirected resources
/// for a given target package.
pub fn overlay_prefix_for_target(target_package: &str) -> String {
    format!("assets/overlays/{target_package}")
}

/// Derive the name of the common-resources companion package for an overlay
/// package, e.g. `my.theme` -> `my.theme.common`.
///
/// Returns `None` for an empty overlay package name.
pub fn common_package_name(overlay_package: &str) -> Option<String> {
    if overlay_package.is_empty() {
        return None;
    }
    Some(format!("{overlay_package}.common"))
}

/// Directory holding the precompiled resources of an icon pack.
pub fn icon_pack_dir_in(root: &Utf8Path, icon_package: &str) -> Utf8PathBuf {
    root.join("icons").join(icon_package)
}

/// [`icon_pack_dir_in`] rooted at [`RESOURCE_CACHE_ROOT`].
pub fn icon_pack_dir(icon_package: &str) -> Utf8PathBuf {
    icon_pack_dir_in(Utf8Path::new(RESOURCE_CACHE_ROOT), icon_package)
}

/// Path of the precompiled resource package for an icon pack.
pub fn icon_pack_resolved_path_in(root: &Utf8Path, icon_package: &str) -> Utf8PathBuf {
    icon_pack_dir_in(root, icon_package).join(RESOLVED_PACKAGE_NAME)
}

/// [`icon_pack_resolved_path_in`] rooted at [`RESOURCE_CACHE_ROOT`].
pub fn icon_pack_resolved_path(icon_package: &str) -> Utf8PathBuf {
    icon_pack_resolved_path_in(Utf8Path::new(RESOURCE_CACHE_ROOT), icon_package)
}
