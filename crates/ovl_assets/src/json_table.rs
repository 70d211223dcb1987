//! Filesystem-backed reference resource-table engine.
//!
//! A package is a directory holding a `resources.json` descriptor (package
//! name and id, interned string pool, id-to-value entries, style bags) and an
//! `assets/` tree of raw entries. Overlays are attached together with an
//! idmap JSON that correlates target ids with overlay ids; icon packs are
//! re-keyed under their reserved package id at load time.
//!
//! Overlap ordering: when two attached overlays redirect the same target id,
//! the **last-attached** overlay wins — lookups scan overlays in reverse
//! insertion order.

use crate::error::{Error, Result};
use crate::registry::{AddRequest, Cookie};
use crate::table::{ResolvedValue, ResourceTable, TypedValue};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use walkdir::WalkDir;

/// Name of the package descriptor inside a package directory.
pub const DESCRIPTOR_FILE: &str = "resources.json";

/// Default subdirectory holding raw asset entries.
const ENTRY_DIR: &str = "assets";

/// Maximum reference-chain length before a lookup gives up.
const MAX_REFERENCE_HOPS: usize = 20;

/// One resource entry in a package descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDescriptor {
    pub id: u32,
    pub value: TypedValue,
}

/// A style bag: attribute id to value, mergeable into a theme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDescriptor {
    pub id: u32,
    #[serde(default)]
    pub attrs: Vec<EntryDescriptor>,
}

/// On-disk package descriptor (`resources.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    pub package_name: String,
    /// Resource-table name when it differs from the declared package name
    /// (system packages renamed during an upgrade).
    #[serde(default)]
    pub resource_package_name: Option<String>,
    pub package_id: u8,
    #[serde(default)]
    pub strings: Vec<String>,
    #[serde(default)]
    pub entries: Vec<EntryDescriptor>,
    #[serde(default)]
    pub styles: Vec<StyleDescriptor>,
}

/// One target-to-overlay identifier mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdmapEntry {
    pub target_id: u32,
    pub overlay_id: u32,
}

/// On-disk idmap descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdmapDescriptor {
    pub target_package: String,
    pub overlay_package: String,
    #[serde(default)]
    pub mappings: Vec<IdmapEntry>,
}

#[derive(Debug)]
struct LoadedPackage {
    cookie: Cookie,
    name: String,
    resource_name: Option<String>,
    strings: Vec<String>,
    entries: HashMap<u32, TypedValue>,
    styles: HashMap<u32, Vec<(u32, TypedValue)>>,
    /// Target id -> overlay id redirection, present for idmap overlays.
    idmap: Option<HashMap<u32, u32>>,
    root: Utf8PathBuf,
    /// Namespace prefix for raw entries; `None` uses the default
    /// `assets/` subdirectory.
    prefix: Option<String>,
}

impl LoadedPackage {
    fn entry_root(&self) -> Utf8PathBuf {
        match &self.prefix {
            Some(prefix) => self.root.join(prefix),
            None => self.root.join(ENTRY_DIR),
        }
    }
}

/// Reference engine reading packages from filesystem directories.
#[derive(Debug, Default)]
pub struct JsonResourceTable {
    packages: Vec<LoadedPackage>,
    themes: HashMap<u64, HashMap<u32, ResolvedValue>>,
    next_theme: u64,
}

impl JsonResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_descriptor(root: &Utf8Path) -> Result<PackageDescriptor> {
        let path = root.join(DESCRIPTOR_FILE);
        if !path.as_std_path().exists() {
            return Err(Error::InvalidPackage(root.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path.as_std_path())?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn read_idmap(path: &Utf8Path) -> Result<HashMap<u32, u32>> {
        let contents = std::fs::read_to_string(path.as_std_path())?;
        let descriptor: IdmapDescriptor = serde_json::from_str(&contents)?;
        Ok(descriptor
            .mappings
            .into_iter()
            .map(|m| (m.target_id, m.overlay_id))
            .collect())
    }

    fn package(&self, cookie: Cookie) -> Option<&LoadedPackage> {
        self.packages.iter().find(|p| p.cookie == cookie)
    }

    /// Single lookup step: overlays (reverse insertion order) first, then
    /// base packages in insertion order.
    fn lookup(&self, id: u32) -> Option<ResolvedValue> {
        for pkg in self.packages.iter().rev() {
            if let Some(idmap) = &pkg.idmap {
                if let Some(overlay_id) = idmap.get(&id) {
                    if let Some(value) = pkg.entries.get(overlay_id) {
                        return Some(ResolvedValue {
                            cookie: pkg.cookie,
                            value: value.clone(),
                        });
                    }
                }
            }
        }
        for pkg in &self.packages {
            if let Some(value) = pkg.entries.get(&id) {
                return Some(ResolvedValue {
                    cookie: pkg.cookie,
                    value: value.clone(),
                });
            }
        }
        None
    }

    fn resolve_references(&self, mut found: ResolvedValue) -> Option<ResolvedValue> {
        for _ in 0..MAX_REFERENCE_HOPS {
            match found.value {
                TypedValue::Reference(next) => found = self.lookup(next)?,
                _ => return Some(found),
            }
        }
        tracing::warn!("reference chain exceeded {MAX_REFERENCE_HOPS} hops");
        None
    }
}

/// Re-key a resource id under an overriding package id.
fn rekey(id: u32, package_id_override: u8) -> u32 {
    (u32::from(package_id_override) << 24) | (id & 0x00ff_ffff)
}

impl ResourceTable for JsonResourceTable {
    fn add_package(&mut self, cookie: Cookie, request: &AddRequest) -> Result<()> {
        let (root, prefix, idmap_path, id_override) = match request {
            AddRequest::Standard { path, .. } => (path.clone(), None, None, None),
            AddRequest::Overlay {
                idmap,
                resolved,
                prefix,
                ..
            } => (
                resolved.clone(),
                Some(prefix.clone()),
                idmap.clone(),
                None,
            ),
            AddRequest::IconPack {
                source,
                resolved,
                prefix,
                package_id_override,
                legacy,
            } => {
                let root = if *legacy {
                    source.clone()
                } else {
                    resolved
                        .clone()
                        .ok_or_else(|| Error::InvalidPackage(source.clone()))?
                };
                (root, prefix.clone(), None, Some(*package_id_override))
            }
        };

        let descriptor = Self::read_descriptor(&root)?;
        let idmap = match idmap_path {
            Some(path) => Some(Self::read_idmap(&path)?),
            None => None,
        };

        let entries = descriptor
            .entries
            .into_iter()
            .map(|e| match id_override {
                Some(pkg_id) => (rekey(e.id, pkg_id), e.value),
                None => (e.id, e.value),
            })
            .collect();
        let styles = descriptor
            .styles
            .into_iter()
            .map(|s| {
                let id = id_override.map_or(s.id, |pkg_id| rekey(s.id, pkg_id));
                (id, s.attrs.into_iter().map(|a| (a.id, a.value)).collect())
            })
            .collect();

        tracing::debug!(
            "Loaded package '{}' from {} (cookie {})",
            descriptor.package_name,
            root,
            cookie
        );
        self.packages.push(LoadedPackage {
            cookie,
            name: descriptor.package_name,
            resource_name: descriptor.resource_package_name,
            strings: descriptor.strings,
            entries,
            styles,
            idmap,
            root,
            prefix,
        });
        Ok(())
    }

    fn remove_package(&mut self, cookie: Cookie) -> Result<()> {
        let index = self
            .packages
            .iter()
            .position(|p| p.cookie == cookie)
            .ok_or(Error::InvalidCookie(cookie))?;
        let removed = self.packages.remove(index);
        tracing::debug!("Unloaded package '{}' (cookie {})", removed.name, cookie);
        Ok(())
    }

    fn package_count(&self) -> usize {
        self.packages.len()
    }

    fn package_name(&self, slot: usize) -> Option<String> {
        self.packages.get(slot).map(|p| p.name.clone())
    }

    fn resource_package_name(&self, slot: usize) -> Option<String> {
        self.packages.get(slot).and_then(|p| p.resource_name.clone())
    }

    fn load_value(&self, id: u32, _density: u16, resolve_refs: bool) -> Option<ResolvedValue> {
        let found = self.lookup(id)?;
        if resolve_refs {
            self.resolve_references(found)
        } else {
            Some(found)
        }
    }

    fn load_theme_value(&self, theme: u64, id: u32) -> Option<ResolvedValue> {
        let found = self.themes.get(&theme)?.get(&id)?.clone();
        self.resolve_references(found)
    }

    fn string_pool(&self, cookie: Cookie) -> Result<Vec<String>> {
        self.package(cookie)
            .map(|p| p.strings.clone())
            .ok_or(Error::InvalidCookie(cookie))
    }

    fn open_entry(&self, cookie: Option<Cookie>, name: &str) -> Result<Vec<u8>> {
        match cookie {
            Some(cookie) => {
                let pkg = self.package(cookie).ok_or(Error::InvalidCookie(cookie))?;
                let path = pkg.entry_root().join(name);
                if !path.as_std_path().is_file() {
                    return Err(Error::EntryNotFound(name.to_string()));
                }
                Ok(std::fs::read(path.as_std_path())?)
            }
            None => {
                // Later packages shadow earlier ones.
                for pkg in self.packages.iter().rev() {
                    let path = pkg.entry_root().join(name);
                    if path.as_std_path().is_file() {
                        return Ok(std::fs::read(path.as_std_path())?);
                    }
                }
                Err(Error::EntryNotFound(name.to_string()))
            }
        }
    }

    fn list_entries(&self, path: &str) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for pkg in &self.packages {
            let dir = pkg.entry_root().join(path);
            if !dir.as_std_path().is_dir() {
                continue;
            }
            for entry in WalkDir::new(dir.as_std_path())
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if let Some(name) = entry.file_name().to_str() {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    fn create_theme(&mut self) -> u64 {
        self.next_theme += 1;
        self.themes.insert(self.next_theme, HashMap::new());
        self.next_theme
    }

    fn destroy_theme(&mut self, theme: u64) {
        self.themes.remove(&theme);
    }

    fn apply_style(&mut self, theme: u64, style_id: u32) -> Result<()> {
        let mut applied = None;
        for pkg in self.packages.iter().rev() {
            if let Some(attrs) = pkg.styles.get(&style_id) {
                applied = Some((pkg.cookie, attrs.clone()));
                break;
            }
        }
        let (cookie, attrs) =
            applied.ok_or_else(|| Error::Engine(format!("style {style_id:#010x} not found")))?;
        let map = self
            .themes
            .get_mut(&theme)
            .ok_or_else(|| Error::Engine(format!("unknown theme handle {theme}")))?;
        for (attr, value) in attrs {
            map.insert(attr, ResolvedValue { cookie, value });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_add_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let root = fixtures::utf8(dir.path()).join("app");
        fixtures::write_package(
            &root,
            &fixtures::app_descriptor("com.example.app", 0x7f, &["first", "second"]),
        );

        let mut table = JsonResourceTable::new();
        table
            .add_package(
                1,
                &AddRequest::Standard {
                    path: root,
                    shared_library: false,
                },
            )
            .unwrap();

        assert_eq!(table.package_count(), 1);
        assert_eq!(table.package_name(0).as_deref(), Some("com.example.app"));

        let value = table.load_value(0x7f010001, 0, true).unwrap();
        assert_eq!(value.cookie, 1);
        assert_eq!(value.value, TypedValue::String { index: 0 });
    }

    #[test]
    fn test_missing_descriptor_is_invalid_package() {
        let dir = tempfile::tempdir().unwrap();
        let root = fixtures::utf8(dir.path()).join("empty");
        std::fs::create_dir_all(root.as_std_path()).unwrap();

        let mut table = JsonResourceTable::new();
        let err = table
            .add_package(
                1,
                &AddRequest::Standard {
                    path: root,
                    shared_library: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPackage(_)));
    }

    #[test]
    fn test_overlay_redirects_target_id() {
        let dir = tempfile::tempdir().unwrap();
        let world = fixtures::World::new(fixtures::utf8(dir.path()));
        let mut table = JsonResourceTable::new();
        table
            .add_package(
                1,
                &AddRequest::Standard {
                    path: world.app_dir.clone(),
                    shared_library: false,
                },
            )
            .unwrap();

        // Without the overlay the base value resolves.
        let base = table.load_value(0x7f010001, 0, true).unwrap();
        assert_eq!(base.cookie, 1);

        table
            .add_package(2, &world.theme_overlay_request())
            .unwrap();
        let themed = table.load_value(0x7f010001, 0, true).unwrap();
        assert_eq!(themed.cookie, 2);
        assert_eq!(themed.value, TypedValue::String { index: 0 });
    }

    #[test]
    fn test_last_attached_overlay_wins() {
        let dir = tempfile::tempdir().unwrap();
        let world = fixtures::World::new(fixtures::utf8(dir.path()));
        let second = fixtures::utf8(dir.path()).join("theme2");
        fixtures::write_package(
            &second,
            &fixtures::overlay_descriptor("my.theme2", &["late wins"]),
        );
        let second_idmap = fixtures::utf8(dir.path()).join("idmap2.json");
        fixtures::write_idmap(&second_idmap, "com.example.app", "my.theme2");

        let mut table = JsonResourceTable::new();
        table
            .add_package(
                1,
                &AddRequest::Standard {
                    path: world.app_dir.clone(),
                    shared_library: false,
                },
            )
            .unwrap();
        table
            .add_package(2, &world.theme_overlay_request())
            .unwrap();
        table
            .add_package(
                3,
                &AddRequest::Overlay {
                    idmap: Some(second_idmap),
                    source: second.clone(),
                    resolved: second,
                    target: Some(world.app_dir.clone()),
                    prefix: "assets/overlays/com.example.app".to_string(),
                },
            )
            .unwrap();

        let value = table.load_value(0x7f010001, 0, true).unwrap();
        assert_eq!(value.cookie, 3);
    }

    #[test]
    fn test_icon_pack_rekeyed_under_override_id() {
        let dir = tempfile::tempdir().unwrap();
        let root = fixtures::utf8(dir.path()).join("icons");
        fixtures::write_package(
            &root,
            &fixtures::app_descriptor("my.icons", 0x7f, &["icon"]),
        );

        let mut table = JsonResourceTable::new();
        table
            .add_package(
                1,
                &AddRequest::IconPack {
                    source: root,
                    resolved: None,
                    prefix: None,
                    package_id_override: 0x61,
                    legacy: true,
                },
            )
            .unwrap();

        assert!(table.load_value(0x7f010001, 0, true).is_none());
        let value = table.load_value(0x61010001, 0, true).unwrap();
        assert_eq!(value.value, TypedValue::String { index: 0 });
    }

    #[test]
    fn test_reference_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let root = fixtures::utf8(dir.path()).join("app");
        let mut descriptor = fixtures::app_descriptor("com.example.app", 0x7f, &["target"]);
        descriptor.entries.push(EntryDescriptor {
            id: 0x7f010099,
            value: TypedValue::Reference(0x7f010001),
        });
        fixtures::write_package(&root, &descriptor);

        let mut table = JsonResourceTable::new();
        table
            .add_package(
                1,
                &AddRequest::Standard {
                    path: root,
                    shared_library: false,
                },
            )
            .unwrap();

        let unresolved = table.load_value(0x7f010099, 0, false).unwrap();
        assert_eq!(unresolved.value, TypedValue::Reference(0x7f010001));

        let resolved = table.load_value(0x7f010099, 0, true).unwrap();
        assert_eq!(resolved.value, TypedValue::String { index: 0 });
    }

    #[test]
    fn test_open_entry_and_shadowing() {
        let dir = tempfile::tempdir().unwrap();
        let base = fixtures::utf8(dir.path()).join("base");
        fixtures::write_package(&base, &fixtures::app_descriptor("a", 0x7f, &[]));
        fixtures::write_entry(&base.join("assets"), "logo.bin", b"base");

        let top = fixtures::utf8(dir.path()).join("top");
        fixtures::write_package(&top, &fixtures::app_descriptor("b", 0x02, &[]));
        fixtures::write_entry(&top.join("assets"), "logo.bin", b"top");

        let mut table = JsonResourceTable::new();
        for (cookie, path) in [(1, &base), (2, &top)] {
            table
                .add_package(
                    cookie,
                    &AddRequest::Standard {
                        path: path.clone(),
                        shared_library: false,
                    },
                )
                .unwrap();
        }

        assert_eq!(table.open_entry(None, "logo.bin").unwrap(), b"top");
        assert_eq!(table.open_entry(Some(1), "logo.bin").unwrap(), b"base");
        assert!(matches!(
            table.open_entry(None, "missing.bin"),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_list_entries_merges_packages() {
        let dir = tempfile::tempdir().unwrap();
        let base = fixtures::utf8(dir.path()).join("base");
        fixtures::write_package(&base, &fixtures::app_descriptor("a", 0x7f, &[]));
        fixtures::write_entry(&base.join("assets/docs"), "readme.txt", b"r");

        let top = fixtures::utf8(dir.path()).join("top");
        fixtures::write_package(&top, &fixtures::app_descriptor("b", 0x02, &[]));
        fixtures::write_entry(&top.join("assets/docs"), "extra.txt", b"e");

        let mut table = JsonResourceTable::new();
        for (cookie, path) in [(1, &base), (2, &top)] {
            table
                .add_package(
                    cookie,
                    &AddRequest::Standard {
                        path: path.clone(),
                        shared_library: false,
                    },
                )
                .unwrap();
        }

        let names = table.list_entries("docs").unwrap();
        assert_eq!(names, vec!["extra.txt".to_string(), "readme.txt".to_string()]);
    }

    #[test]
    fn test_theme_styles() {
        let dir = tempfile::tempdir().unwrap();
        let root = fixtures::utf8(dir.path()).join("app");
        let mut descriptor = fixtures::app_descriptor("com.example.app", 0x7f, &["styled"]);
        descriptor.styles.push(StyleDescriptor {
            id: 0x7f020001,
            attrs: vec![EntryDescriptor {
                id: 0x7f030001,
                value: TypedValue::String { index: 0 },
            }],
        });
        fixtures::write_package(&root, &descriptor);

        let mut table = JsonResourceTable::new();
        table
            .add_package(
                1,
                &AddRequest::Standard {
                    path: root,
                    shared_library: false,
                },
            )
            .unwrap();

        let theme = table.create_theme();
        assert!(table.load_theme_value(theme, 0x7f030001).is_none());

        table.apply_style(theme, 0x7f020001).unwrap();
        let value = table.load_theme_value(theme, 0x7f030001).unwrap();
        assert_eq!(value.value, TypedValue::String { index: 0 });

        table.destroy_theme(theme);
        assert!(table.load_theme_value(theme, 0x7f030001).is_none());
    }
}
