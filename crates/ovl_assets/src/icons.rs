//! Icon resolution map.
//!
//! When an icon pack is attached, render-time icon lookups consult a mapping
//! from resource id to the most specific owning component. The map is built
//! from the application's install metadata: the application-level icon first,
//! then each activity's icon. First-seen wins, unless a later entry carries
//! an explicit themed-icon override flag — the override replaces the existing
//! mapping regardless of enumeration order.

use crate::metadata::PackageInfo;
use std::collections::HashMap;

/// The component that owns an icon resource id.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInfo {
    pub package_name: String,
    /// Activity name, or `None` for the application-level entry.
    pub component: Option<String>,
    pub icon_id: u32,
    pub themed_icon_id: u32,
}

impl ComponentInfo {
    fn has_override(&self) -> bool {
        self.themed_icon_id != 0
    }
}

/// Mapping from icon resource id to owning component.
#[derive(Debug, Default)]
pub struct IconResourceMap {
    entries: HashMap<u32, ComponentInfo>,
}

impl IconResourceMap {
    /// Build the map for the application described by `package`.
    ///
    /// `icon_pack` is the package name of the active icon pack; when the
    /// application *is* the icon pack, the map is intentionally left empty —
    /// an icon pack must not re-theme itself.
    pub fn build(package: Option<&PackageInfo>, icon_pack: Option<&str>) -> Self {
        let mut map = Self::default();
        let Some(package) = package else {
            return map;
        };
        if icon_pack.is_some_and(|pack| pack == package.package_name) {
            return map;
        }

        let app = package.application.as_ref();
        if let Some(app) = app {
            if app.icon_id != 0 {
                map.insert(ComponentInfo {
                    package_name: package.package_name.clone(),
                    component: None,
                    icon_id: app.icon_id,
                    themed_icon_id: app.themed_icon_id,
                });
            }
        }

        for activity in &package.activities {
            if activity.icon_id != 0 {
                map.insert(ComponentInfo {
                    package_name: package.package_name.clone(),
                    component: Some(activity.name.clone()),
                    icon_id: activity.icon_id,
                    themed_icon_id: activity.themed_icon_id,
                });
            } else if let Some(app) = app {
                // Activities without their own icon fall back to the app
                // icon id, still honoring their own override flag.
                if app.icon_id != 0 {
                    map.insert(ComponentInfo {
                        package_name: package.package_name.clone(),
                        component: Some(activity.name.clone()),
                        icon_id: app.icon_id,
                        themed_icon_id: activity.themed_icon_id,
                    });
                }
            }
        }

        map
    }

    /// First-seen wins; an entry with the override flag always wins.
    fn insert(&mut self, info: ComponentInfo) {
        if info.has_override() || !self.entries.contains_key(&info.icon_id) {
            self.entries.insert(info.icon_id, info);
        }
    }

    pub fn resolve(&self, resource_id: u32) -> Option<&ComponentInfo> {
        self.entries.get(&resource_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
