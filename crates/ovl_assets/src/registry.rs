//! Cookie registry: the ordered stack of attached resource packages.
//!
//! Every attached package gets a stable integer handle (its *cookie*) that
//! stays valid for the lifetime of the attachment. Cookie `0` is the sentinel
//! for "not attached / failure". Cookies are assigned in insertion order;
//! removing a package never renumbers the survivors, and a slot is reused
//! only after it has been explicitly cleared.
//!
//! The registry tracks *which* packages exist and their roles. How an overlay
//! redirects identifiers into its target is resolved by the
//! [`ResourceTable`](crate::table::ResourceTable) engine, not here.

use crate::table::ResourceTable;
use camino::{Utf8Path, Utf8PathBuf};

/// Stable integer handle identifying one attached package. `0` means
/// "not attached / failure".
pub type Cookie = u32;

/// Role of a package within the overlay stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageRole {
    /// An application or framework package attached by path.
    Base,
    /// A package loaded as a shared library.
    SharedLibrary,
    /// An idmap-backed theme overlay for a specific target package.
    ThemeOverlay,
    /// An icon pack using a reserved package-id range instead of an idmap.
    IconPack,
    /// An idmap-free overlay carrying common resources in their own
    /// namespace prefix.
    CommonResources,
}

/// A typed package-add request dispatched through one entry point.
///
/// The variants replace the ad hoc boolean flags of older designs: each one
/// carries exactly the inputs its role needs.
#[derive(Debug, Clone)]
pub enum AddRequest {
    /// Attach a package directly from its path.
    Standard {
        path: Utf8PathBuf,
        /// Load the package as a shared library.
        shared_library: bool,
    },
    /// Attach an overlay. `idmap: None` attaches the overlay without
    /// identifier redirection (common resources in their own namespace).
    Overlay {
        idmap: Option<Utf8PathBuf>,
        /// The overlay package itself.
        source: Utf8PathBuf,
        /// Precompiled resources for the (target, overlay) pair.
        resolved: Utf8PathBuf,
        /// The target package being overlaid, when redirection applies.
        target: Option<Utf8PathBuf>,
        /// Namespace prefix the overlay's entries live under.
        prefix: String,
    },
    /// Attach an icon pack under a reserved package id.
    ///
    /// Legacy icon packs carry everything in their own archive: the
    /// `resolved`/`prefix` indirection is skipped entirely and `source` is
    /// used as the resource source.
    IconPack {
        source: Utf8PathBuf,
        resolved: Option<Utf8PathBuf>,
        prefix: Option<String>,
        package_id_override: u8,
        legacy: bool,
    },
}

impl AddRequest {
    /// Role implied by the request shape.
    pub fn role(&self) -> PackageRole {
        match self {
            AddRequest::Standard {
                shared_library: false,
                ..
            } => PackageRole::Base,
            AddRequest::Standard {
                shared_library: true,
                ..
            } => PackageRole::SharedLibrary,
            AddRequest::Overlay { idmap: Some(_), .. } => PackageRole::ThemeOverlay,
            AddRequest::Overlay { idmap: None, .. } => PackageRole::CommonResources,
            AddRequest::IconPack { .. } => PackageRole::IconPack,
        }
    }

    /// The package path recorded against the cookie (the source archive,
    /// not any precompiled indirection).
    pub fn source_path(&self) -> &Utf8Path {
        match self {
            AddRequest::Standard { path, .. } => path,
            AddRequest::Overlay { source, .. } => source,
            AddRequest::IconPack { source, .. } => source,
        }
    }
}

/// One live slot in the package stack.
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub cookie: Cookie,
    pub path: Utf8PathBuf,
    pub role: PackageRole,
    pub package_id_override: Option<u8>,
    pub legacy: bool,
}

/// Assigns and tracks cookies for the ordered package stack.
///
/// Slot `i` holds the package with cookie `i + 1`; a removed package leaves a
/// cleared slot behind so surviving cookies keep their values. Trailing
/// cleared slots are compacted, which is the only way a cookie value is ever
/// reissued.
#[derive(Debug, Default)]
pub struct CookieRegistry {
    slots: Vec<Option<PackageEntry>>,
}

impl CookieRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a package through the engine and assign it the next cookie.
    ///
    /// Returns `0` when the engine rejects the package (unreadable path,
    /// malformed descriptor); the registry is left unchanged in that case.
    pub fn add(&mut self, table: &mut dyn ResourceTable, request: &AddRequest) -> Cookie {
        let cookie = self.slots.len() as Cookie + 1;
        if let Err(e) = table.add_package(cookie, request) {
            tracing::warn!(
                "Failed to add package '{}': {}",
                request.source_path(),
                e
            );
            return 0;
        }

        let (package_id_override, legacy) = match request {
            AddRequest::IconPack {
                package_id_override,
                legacy,
                ..
            } => (Some(*package_id_override), *legacy),
            _ => (None, false),
        };

        self.slots.push(Some(PackageEntry {
            cookie,
            path: request.source_path().to_path_buf(),
            role: request.role(),
            package_id_override,
            legacy,
        }));
        tracing::debug!(
            "Attached package '{}' role={:?} cookie={}",
            request.source_path(),
            request.role(),
            cookie
        );
        cookie
    }

    /// Detach the package behind `cookie`. Returns `false` if the cookie is
    /// not live or the engine refuses the removal.
    pub fn remove(&mut self, table: &mut dyn ResourceTable, name: &str, cookie: Cookie) -> bool {
        let Some(slot) = self.slot_index(cookie) else {
            tracing::debug!("Remove of '{name}' ignored: cookie {cookie} not live");
            return false;
        };

        if let Err(e) = table.remove_package(cookie) {
            tracing::warn!("Engine refused removal of '{name}' (cookie {cookie}): {e}");
            return false;
        }

        self.slots[slot] = None;
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        tracing::debug!("Detached package '{name}' cookie={cookie}");
        true
    }

    /// The live entry behind a cookie, if any.
    pub fn get(&self, cookie: Cookie) -> Option<&PackageEntry> {
        self.slot_index(cookie)
            .and_then(|i| self.slots[i].as_ref())
    }

    pub fn is_live(&self, cookie: Cookie) -> bool {
        self.get(cookie).is_some()
    }

    /// Number of slots including cleared ones; cookies range `1..=slot_count`.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of live packages.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Iterate live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageEntry> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    fn slot_index(&self, cookie: Cookie) -> Option<usize> {
        if cookie == 0 || cookie as usize > self.slots.len() {
            return None;
        }
        let i = cookie as usize - 1;
        self.slots[i].as_ref().map(|_| i)
    }
}
