//! Resource-table engine boundary.
//!
//! This module defines the [`ResourceTable`] trait that decouples the overlay
//! layer from any particular resource-table implementation. The engine owns
//! the parsed per-package tables and answers identifier lookups; the overlay
//! layer only tracks *which* packages exist (their cookies) and materializes
//! string values through its own block cache.
//!
//! Idmap redirection semantics — including how two overlays with overlapping
//! target ids stack — are engine behavior and deliberately unspecified here.
//!
//! The crate ships [`JsonResourceTable`](crate::json_table::JsonResourceTable)
//! for reading packages from filesystem directories.

use crate::error::Result;
use crate::registry::{AddRequest, Cookie};
use serde::{Deserialize, Serialize};

/// A typed resource value as stored in a package's resource table.
///
/// String values carry an index into the owning package's interned string
/// pool; the actual text is materialized by the manager through its string
/// block cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypedValue {
    /// Index into the owning package's string pool.
    String { index: usize },
    /// Plain integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Packed ARGB color.
    Color(u32),
    /// Reference to another resource identifier.
    Reference(u32),
}

impl TypedValue {
    /// Coerce a non-string value to its display form.
    ///
    /// Returns `None` for [`TypedValue::String`] — those require the owning
    /// package's string pool and are materialized by the manager.
    pub fn coerce_to_string(&self) -> Option<String> {
        match self {
            TypedValue::String { .. } => None,
            TypedValue::Int(v) => Some(v.to_string()),
            TypedValue::Float(v) => Some(v.to_string()),
            TypedValue::Bool(v) => Some(v.to_string()),
            TypedValue::Color(v) => Some(format!("#{v:08x}")),
            TypedValue::Reference(id) => Some(format!("@{id:#010x}")),
        }
    }
}

/// A value resolved by the engine, tagged with the cookie of the package it
/// was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    /// Cookie of the package that supplied the value.
    pub cookie: Cookie,
    /// The raw typed value.
    pub value: TypedValue,
}

/// Opaque resource-table engine queried by the overlay layer.
///
/// Implementations parse package contents on [`add_package`](Self::add_package)
/// and answer lookups keyed by numeric resource identifier. The cookie passed
/// to `add_package` is assigned by the
/// [`CookieRegistry`](crate::registry::CookieRegistry) and identifies the
/// package in all later calls.
///
/// Implementations must be [`Send`] so a manager can be shared across
/// threads behind its instance lock.
pub trait ResourceTable: Send {
    /// Parse and attach a package. Failure leaves the engine unchanged.
    fn add_package(&mut self, cookie: Cookie, request: &AddRequest) -> Result<()>;

    /// Detach a previously added package.
    fn remove_package(&mut self, cookie: Cookie) -> Result<()>;

    /// Number of live packages, in insertion order slots.
    fn package_count(&self) -> usize;

    /// Declared package name of the package in the given insertion slot.
    fn package_name(&self, slot: usize) -> Option<String>;

    /// Resource-table package name for the slot, when it differs from the
    /// declared name (system packages renamed during an upgrade).
    fn resource_package_name(&self, slot: usize) -> Option<String>;

    /// Resolve an identifier to a typed value, honoring overlay redirection.
    ///
    /// `density` selects a density bucket where the engine supports more
    /// than one; `resolve_refs` follows [`TypedValue::Reference`] chains.
    fn load_value(&self, id: u32, density: u16, resolve_refs: bool) -> Option<ResolvedValue>;

    /// Resolve a theme attribute against a theme handle created by
    /// [`create_theme`](Self::create_theme).
    fn load_theme_value(&self, theme: u64, id: u32) -> Option<ResolvedValue>;

    /// The interned string pool of one package.
    fn string_pool(&self, cookie: Cookie) -> Result<Vec<String>>;

    /// Read the raw bytes of a named entry. `cookie` restricts the search to
    /// one package; `None` searches all attached packages.
    fn open_entry(&self, cookie: Option<Cookie>, name: &str) -> Result<Vec<u8>>;

    /// List entry names directly under `path` across all attached packages.
    fn list_entries(&self, path: &str) -> Result<Vec<String>>;

    /// Create a theme handle for attribute resolution.
    fn create_theme(&mut self) -> u64;

    /// Destroy a theme handle. Unknown handles are ignored.
    fn destroy_theme(&mut self, theme: u64);

    /// Merge the attributes of a style resource into a theme handle.
    fn apply_style(&mut self, theme: u64, style_id: u32) -> Result<()>;
}
