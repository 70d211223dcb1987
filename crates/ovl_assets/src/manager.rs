//! The asset manager: one coarse lock over the package stack, string block
//! cache, overlay state and handle reference counts.
//!
//! Every public operation acquires the instance lock for its duration; all
//! underlying work is synchronous local computation or local-disk I/O through
//! the resource-table engine, so nothing ever suspends while holding it.
//! Rebuilds of the string block cache are therefore atomic from any caller's
//! perspective.
//!
//! A process-wide *system* manager can be installed once via
//! [`AssetManager::init_system`]; it is immutable after installation and its
//! string blocks are shared (not copied) into other managers as cache seeds.

use crate::error::{Error, Result};
use crate::icons::{ComponentInfo, IconResourceMap};
use crate::metadata::PackageMetadataService;
use crate::overlay::ResourceOverlayState;
use crate::refs::{RefAction, RefTable, MANAGER_REF};
use crate::registry::{AddRequest, Cookie, CookieRegistry};
use crate::strings::{self, BlockTable};
use crate::stream::{AssetStream, ThemeHandle, XmlBlock};
use crate::table::{ResourceTable, TypedValue};
use camino::Utf8PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::sync::Arc;

/// Number of default packages implicitly attached before the application's
/// own package (the framework and platform SDK resources).
pub const DEFAULT_PACKAGE_SLOTS: usize = 2;

static SYSTEM: OnceLock<AssetManager> = OnceLock::new();

/// Construction-time configuration for a manager instance.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Package name of the hosting application, used to build the icon
    /// resolution map. `None` for managers not bound to an application.
    pub app_name: Option<String>,
    /// Package name of the framework resources.
    pub framework_package: String,
    /// Package name of the shared platform SDK resources.
    pub platform_package: String,
    /// Root of the precompiled overlay resource cache.
    pub cache_root: Utf8PathBuf,
    /// Seed string blocks from the system manager when one is installed.
    pub seed_from_system: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            app_name: None,
            framework_package: ovl_paths::FRAMEWORK_PACKAGE.to_string(),
            platform_package: ovl_paths::PLATFORM_PACKAGE.to_string(),
            cache_root: Utf8PathBuf::from(ovl_paths::RESOURCE_CACHE_ROOT),
            seed_from_system: true,
        }
    }
}

/// A resolved resource value with its string payload materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceValue {
    /// Cookie of the package the value came from.
    pub cookie: Cookie,
    pub value: TypedValue,
    /// The pooled string for [`TypedValue::String`] values.
    pub string: Option<String>,
}

pub(crate) struct Inner {
    /// `None` after teardown. Nothing may touch engine state past that.
    pub(crate) table: Option<Box<dyn ResourceTable>>,
    pub(crate) registry: CookieRegistry,
    pub(crate) blocks: Option<BlockTable>,
    pub(crate) refs: RefTable,
    pub(crate) open: bool,
    pub(crate) overlay: ResourceOverlayState,
    pub(crate) icons: IconResourceMap,
    pub(crate) config: ManagerConfig,
}

/// State shared between a manager and its outstanding handles.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release a handle's reference (stream or xml block close).
    pub(crate) fn release_handle(&self, id: u64) {
        let mut inner = self.lock();
        AssetManager::release_locked(&mut inner, id);
    }

    /// Destroy a theme handle in the engine, then release its reference.
    pub(crate) fn destroy_theme(&self, raw: u64, id: u64) {
        let mut inner = self.lock();
        if let Some(table) = inner.table.as_deref_mut() {
            table.destroy_theme(raw);
        }
        AssetManager::release_locked(&mut inner, id);
    }
}

/// Manages an ordered stack of resource packages and resolves identifiers,
/// pooled strings and icon substitutions across it.
pub struct AssetManager {
    pub(crate) shared: Arc<Shared>,
    pub(crate) metadata: Arc<dyn PackageMetadataService>,
}

impl AssetManager {
    /// Create a manager with no packages attached.
    ///
    /// Hosts attach the default framework and platform packages first (see
    /// [`DEFAULT_PACKAGE_SLOTS`]), then the application's own package.
    pub fn new(
        table: Box<dyn ResourceTable>,
        metadata: Arc<dyn PackageMetadataService>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    table: Some(table),
                    registry: CookieRegistry::new(),
                    blocks: None,
                    refs: RefTable::new(),
                    open: true,
                    overlay: ResourceOverlayState::default(),
                    icons: IconResourceMap::default(),
                    config,
                }),
            }),
            metadata,
        }
    }

    /// Install the process-wide system manager.
    ///
    /// The first call wins; later calls return the already-installed manager
    /// and drop (close) their argument. The installed manager is never
    /// mutated afterwards except to have its string blocks read as seeds.
    pub fn init_system(manager: AssetManager) -> &'static AssetManager {
        SYSTEM.get_or_init(move || manager)
    }

    /// The installed system manager, if any.
    pub fn system() -> Option<&'static AssetManager> {
        SYSTEM.get()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.lock()
    }

    pub(crate) fn ensure_open(inner: &Inner) -> Result<()> {
        if inner.open && inner.table.is_some() {
            Ok(())
        } else {
            Err(Error::Closed)
        }
    }

    pub(crate) fn release_locked(inner: &mut Inner, id: u64) {
        if inner.refs.release(id) == RefAction::Teardown {
            tracing::debug!("last reference released; tearing down native resource set");
            inner.table = None;
            inner.blocks = None;
        }
    }

    // ---- package stack -------------------------------------------------

    /// Attach a package through the typed entry point.
    ///
    /// Returns the assigned cookie, or `0` when the engine rejects the
    /// package. Any successful add invalidates the string block cache.
    pub fn add(&self, request: AddRequest) -> Result<Cookie> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        Ok(Self::add_locked(&mut inner, &request))
    }

    pub(crate) fn add_locked(inner: &mut Inner, request: &AddRequest) -> Cookie {
        let Inner {
            registry,
            table,
            blocks,
            ..
        } = inner;
        let Some(table) = table.as_deref_mut() else {
            return 0;
        };
        let cookie = registry.add(table, request);
        if cookie != 0 {
            *blocks = None;
        }
        cookie
    }

    /// Attach a package directly from its path.
    pub fn add_package(&self, path: Utf8PathBuf) -> Result<Cookie> {
        self.add(AddRequest::Standard {
            path,
            shared_library: false,
        })
    }

    /// Attach a package loaded as a shared library.
    pub fn add_package_as_shared_library(&self, path: Utf8PathBuf) -> Result<Cookie> {
        self.add(AddRequest::Standard {
            path,
            shared_library: true,
        })
    }

    /// Attach several packages at once, returning one cookie per path
    /// (`0` marks the paths that failed).
    pub fn add_packages(&self, paths: &[Utf8PathBuf]) -> Result<Vec<Cookie>> {
        paths
            .iter()
            .map(|path| self.add_package(path.clone()))
            .collect()
    }

    /// Detach the package behind `cookie`. Invalidates the string block
    /// cache on success.
    pub fn remove_package(&self, name: &str, cookie: Cookie) -> Result<bool> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        Ok(Self::remove_locked(&mut inner, name, cookie))
    }

    pub(crate) fn remove_locked(inner: &mut Inner, name: &str, cookie: Cookie) -> bool {
        let Inner {
            registry,
            table,
            blocks,
            ..
        } = inner;
        let Some(table) = table.as_deref_mut() else {
            return false;
        };
        let removed = registry.remove(table, name, cookie);
        if removed {
            *blocks = None;
        }
        removed
    }

    /// Path of the package behind a cookie.
    pub fn cookie_name(&self, cookie: Cookie) -> Result<Option<Utf8PathBuf>> {
        let inner = self.lock();
        Self::ensure_open(&inner)?;
        Ok(inner.registry.get(cookie).map(|entry| entry.path.clone()))
    }

    // ---- string blocks -------------------------------------------------

    fn ensure_blocks_locked(&self, inner: &mut Inner) -> Result<()> {
        if inner.blocks.is_some() {
            return Ok(());
        }
        let seed = self.system_seed(inner);
        let table = inner.table.as_deref().ok_or(Error::Closed)?;
        let blocks = strings::make_blocks(table, &inner.registry, seed.as_ref())?;
        inner.blocks = Some(blocks);
        Ok(())
    }

    /// Clone the system manager's block table for seeding, when applicable.
    fn system_seed(&self, inner: &Inner) -> Option<BlockTable> {
        if !inner.config.seed_from_system {
            return None;
        }
        let system = Self::system()?;
        if Arc::ptr_eq(&self.shared, &system.shared) {
            return None;
        }
        let mut sys_inner = system.lock();
        if system.ensure_blocks_locked(&mut sys_inner).is_err() {
            return None;
        }
        sys_inner.blocks.clone()
    }

    /// Force the string block table to be built for the current stack.
    pub fn ensure_string_blocks(&self) -> Result<()> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        self.ensure_blocks_locked(&mut inner)
    }

    /// Look up one pooled string. Cookies map to blocks starting at 1.
    pub fn pooled_string(&self, cookie: Cookie, index: usize) -> Result<String> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        self.ensure_blocks_locked(&mut inner)?;
        let blocks = inner.blocks.as_ref().ok_or(Error::Closed)?;
        strings::pooled_string(blocks, cookie, index)
    }

    // ---- resolution ----------------------------------------------------

    /// Resolve a resource identifier to a typed value, materializing the
    /// pooled string for string-typed values. `Ok(None)` when the id is not
    /// found in any attached package.
    pub fn resource_value(
        &self,
        id: u32,
        density: u16,
        resolve_refs: bool,
    ) -> Result<Option<ResourceValue>> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        let table = inner.table.as_deref().ok_or(Error::Closed)?;
        let Some(resolved) = table.load_value(id, density, resolve_refs) else {
            return Ok(None);
        };
        self.materialize(&mut inner, resolved.cookie, resolved.value)
            .map(Some)
    }

    /// The string form of a resource value, coercing non-string types.
    pub fn resource_text(&self, id: u32) -> Result<Option<String>> {
        let value = self.resource_value(id, 0, true)?;
        Ok(value.and_then(|v| v.string.clone().or_else(|| v.value.coerce_to_string())))
    }

    /// Resolve a theme attribute against a theme handle of this manager.
    pub fn theme_value(&self, theme: &ThemeHandle, id: u32) -> Result<Option<ResourceValue>> {
        if !Arc::ptr_eq(&self.shared, theme.shared()) {
            return Err(Error::Engine(
                "theme handle belongs to a different manager".to_string(),
            ));
        }
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        let table = inner.table.as_deref().ok_or(Error::Closed)?;
        let Some(resolved) = table.load_theme_value(theme.raw(), id) else {
            return Ok(None);
        };
        self.materialize(&mut inner, resolved.cookie, resolved.value)
            .map(Some)
    }

    /// Merge a style resource's attributes into a theme handle.
    pub fn apply_style(&self, theme: &ThemeHandle, style_id: u32) -> Result<()> {
        if !Arc::ptr_eq(&self.shared, theme.shared()) {
            return Err(Error::Engine(
                "theme handle belongs to a different manager".to_string(),
            ));
        }
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        let table = inner.table.as_deref_mut().ok_or(Error::Closed)?;
        table.apply_style(theme.raw(), style_id)
    }

    fn materialize(
        &self,
        inner: &mut Inner,
        cookie: Cookie,
        value: TypedValue,
    ) -> Result<ResourceValue> {
        let string = match &value {
            TypedValue::String { index } => {
                self.ensure_blocks_locked(inner)?;
                let blocks = inner.blocks.as_ref().ok_or(Error::Closed)?;
                Some(strings::pooled_string(blocks, cookie, *index)?)
            }
            _ => None,
        };
        Ok(ResourceValue {
            cookie,
            value,
            string,
        })
    }

    // ---- open handles --------------------------------------------------

    /// Open a named entry from any attached package.
    ///
    /// Unlike identifier lookups, a missing entry here is a hard
    /// [`Error::EntryNotFound`].
    pub fn open_asset(&self, name: &str) -> Result<AssetStream> {
        self.open_asset_in(None, name)
    }

    /// Open a named entry, restricted to one package when `cookie` is given.
    pub fn open_asset_in(&self, cookie: Option<Cookie>, name: &str) -> Result<AssetStream> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        let table = inner.table.as_deref().ok_or(Error::Closed)?;
        let data = table.open_entry(cookie, name)?;
        let ref_id = inner.refs.acquire();
        Ok(AssetStream::new(Arc::clone(&self.shared), ref_id, data))
    }

    /// Open a compiled-XML entry as an opaque block handle.
    pub fn open_xml_block(&self, cookie: Option<Cookie>, name: &str) -> Result<XmlBlock> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        let table = inner.table.as_deref().ok_or(Error::Closed)?;
        let data = table.open_entry(cookie, name)?;
        let ref_id = inner.refs.acquire();
        Ok(XmlBlock::new(Arc::clone(&self.shared), ref_id, data))
    }

    /// List entry names directly under `path` across all attached packages.
    pub fn list_assets(&self, path: &str) -> Result<Vec<String>> {
        let inner = self.lock();
        Self::ensure_open(&inner)?;
        let table = inner.table.as_deref().ok_or(Error::Closed)?;
        table.list_entries(path)
    }

    /// Create a theme handle for attribute resolution.
    pub fn create_theme(&self) -> Result<ThemeHandle> {
        let mut inner = self.lock();
        Self::ensure_open(&inner)?;
        let raw = {
            let table = inner.table.as_deref_mut().ok_or(Error::Closed)?;
            table.create_theme()
        };
        let ref_id = inner.refs.acquire();
        Ok(ThemeHandle::new(Arc::clone(&self.shared), raw, ref_id))
    }

    // ---- overlay state accessors ---------------------------------------

    pub fn app_name(&self) -> Option<String> {
        self.lock().config.app_name.clone()
    }

    pub fn set_app_name(&self, name: impl Into<String>) {
        self.lock().config.app_name = Some(name.into());
    }

    /// Package name of the attached theme, if any.
    pub fn theme_package_name(&self) -> Option<String> {
        self.lock().overlay.theme_package.clone()
    }

    /// Cookies of the attached theme overlays, in attachment order.
    pub fn theme_cookies(&self) -> Vec<Cookie> {
        self.lock().overlay.theme_cookies.clone()
    }

    /// Cookie of the attached icon pack (`0` when none).
    pub fn icon_pack_cookie(&self) -> Cookie {
        self.lock().overlay.icon_pack.as_ref().map_or(0, |p| p.1)
    }

    pub fn icon_package_name(&self) -> Option<String> {
        self.lock().overlay.icon_pack.as_ref().map(|p| p.0.clone())
    }

    /// Cookie of the attached common-resources overlay (`0` when none).
    pub fn common_res_cookie(&self) -> Cookie {
        self.lock().overlay.common.as_ref().map_or(0, |p| p.1)
    }

    pub fn common_res_package_name(&self) -> Option<String> {
        self.lock().overlay.common.as_ref().map(|p| p.0.clone())
    }

    pub fn has_themed_assets(&self) -> bool {
        self.lock().overlay.has_themed_assets()
    }

    /// The owning component for an icon resource id, when an icon map has
    /// been built by a successful icon pack attachment.
    pub fn icon_info_for(&self, resource_id: u32) -> Option<ComponentInfo> {
        self.lock().icons.resolve(resource_id).cloned()
    }

    // ---- lifecycle -----------------------------------------------------

    /// Close this manager. Outstanding streams and theme handles keep the
    /// engine alive until the last of them closes; further manager calls
    /// fail with [`Error::Closed`].
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.open {
            inner.open = false;
            Self::release_locked(&mut inner, MANAGER_REF);
        }
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.close();
    }
}
