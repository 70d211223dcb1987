//! Shared test fixtures: a small on-disk world with default packages, an
//! application, a theme (with precompiled cache), a common companion package
//! and an icon pack.

use crate::json_table::{
    EntryDescriptor, IdmapDescriptor, IdmapEntry, JsonResourceTable, PackageDescriptor,
    StyleDescriptor, DESCRIPTOR_FILE,
};
use crate::manager::{AssetManager, ManagerConfig};
use crate::metadata::{
    ActivityInfo, ApplicationInfo, MemoryPackageService, PackageInfo, PackageMetadataService,
};
use crate::registry::AddRequest;
use crate::table::TypedValue;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;

pub(crate) fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

pub(crate) fn write_package(root: &Utf8Path, descriptor: &PackageDescriptor) {
    std::fs::create_dir_all(root.as_std_path()).unwrap();
    let json = serde_json::to_string_pretty(descriptor).unwrap();
    std::fs::write(root.join(DESCRIPTOR_FILE).as_std_path(), json).unwrap();
}

pub(crate) fn write_entry(dir: &Utf8Path, name: &str, bytes: &[u8]) {
    std::fs::create_dir_all(dir.as_std_path()).unwrap();
    std::fs::write(dir.join(name).as_std_path(), bytes).unwrap();
}

pub(crate) fn write_idmap(path: &Utf8Path, target_package: &str, overlay_package: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent.as_std_path()).unwrap();
    }
    let descriptor = IdmapDescriptor {
        target_package: target_package.to_string(),
        overlay_package: overlay_package.to_string(),
        mappings: vec![IdmapEntry {
            target_id: 0x7f01_0001,
            overlay_id: 0x0a01_0001,
        }],
    };
    let json = serde_json::to_string_pretty(&descriptor).unwrap();
    std::fs::write(path.as_std_path(), json).unwrap();
}

/// Descriptor with one string entry per pooled string, ids starting at
/// `<package_id>010001`.
pub(crate) fn app_descriptor(name: &str, package_id: u8, strings: &[&str]) -> PackageDescriptor {
    PackageDescriptor {
        package_name: name.to_string(),
        resource_package_name: None,
        package_id,
        strings: strings.iter().map(|s| s.to_string()).collect(),
        entries: strings
            .iter()
            .enumerate()
            .map(|(i, _)| EntryDescriptor {
                id: (u32::from(package_id) << 24) | (0x0001_0001 + i as u32),
                value: TypedValue::String { index: i },
            })
            .collect(),
        styles: Vec::new(),
    }
}

/// An overlay package descriptor under the conventional overlay id `0x0a`.
pub(crate) fn overlay_descriptor(name: &str, strings: &[&str]) -> PackageDescriptor {
    app_descriptor(name, 0x0a, strings)
}

/// On-disk world used across the integration-style tests.
pub(crate) struct World {
    pub(crate) root: Utf8PathBuf,
    pub(crate) cache_root: Utf8PathBuf,
    pub(crate) framework_dir: Utf8PathBuf,
    pub(crate) platform_dir: Utf8PathBuf,
    pub(crate) app_dir: Utf8PathBuf,
    pub(crate) theme_dir: Utf8PathBuf,
    pub(crate) common_dir: Utf8PathBuf,
    pub(crate) icons_dir: Utf8PathBuf,
}

impl World {
    pub(crate) fn new(root: Utf8PathBuf) -> Self {
        let packages = root.join("packages");
        let cache_root = root.join("cache");

        let framework_dir = packages.join("framework");
        write_package(
            &framework_dir,
            &app_descriptor("framework", 0x01, &["framework string"]),
        );

        let platform_dir = packages.join("platform");
        write_package(
            &platform_dir,
            &app_descriptor("platform.sdk", 0x02, &["platform string"]),
        );

        let app_dir = packages.join("app");
        write_package(
            &app_dir,
            &app_descriptor("com.example.app", 0x7f, &["base one", "base two"]),
        );

        let theme_dir = packages.join("theme");
        write_package(
            &theme_dir,
            &overlay_descriptor("my.theme", &["theme source"]),
        );

        let common_dir = packages.join("common");
        write_package(
            &common_dir,
            &app_descriptor("my.theme.common", 0x0b, &["common source"]),
        );

        let icons_dir = packages.join("icons");
        write_package(&icons_dir, &app_descriptor("my.icons", 0x7f, &["icon one"]));

        // Precompiled cache: app overlay with idmap, common companion, and
        // the resolved icon pack.
        write_package(
            &ovl_paths::resolved_package_path_in(&cache_root, "com.example.app", "my.theme"),
            &overlay_descriptor("my.theme", &["themed one"]),
        );
        write_idmap(
            &ovl_paths::idmap_path_in(&cache_root, "com.example.app", "my.theme"),
            "com.example.app",
            "my.theme",
        );
        write_package(
            &ovl_paths::resolved_package_path_in(
                &cache_root,
                ovl_paths::COMMON_RES_TARGET,
                "my.theme",
            ),
            &app_descriptor("my.theme.common", 0x0b, &["common one"]),
        );
        write_package(
            &ovl_paths::icon_pack_resolved_path_in(&cache_root, "my.icons"),
            &app_descriptor("my.icons", 0x7f, &["icon resolved"]),
        );

        Self {
            root,
            cache_root,
            framework_dir,
            platform_dir,
            app_dir,
            theme_dir,
            common_dir,
            icons_dir,
        }
    }

    pub(crate) fn app_info(&self) -> PackageInfo {
        PackageInfo {
            package_name: "com.example.app".to_string(),
            source_path: self.app_dir.clone(),
            public_source_path: self.app_dir.clone(),
            application: Some(ApplicationInfo {
                icon_id: 100,
                themed_icon_id: 0,
            }),
            activities: vec![ActivityInfo {
                name: "Main".to_string(),
                icon_id: 200,
                themed_icon_id: 0,
            }],
            ..Default::default()
        }
    }

    pub(crate) fn theme_info(&self) -> PackageInfo {
        PackageInfo {
            package_name: "my.theme".to_string(),
            source_path: self.theme_dir.clone(),
            public_source_path: self.theme_dir.clone(),
            overlay_targets: vec!["com.example.app".to_string()],
            is_theme_package: true,
            ..Default::default()
        }
    }

    pub(crate) fn icons_info(&self) -> PackageInfo {
        PackageInfo {
            package_name: "my.icons".to_string(),
            source_path: self.icons_dir.clone(),
            public_source_path: self.icons_dir.clone(),
            ..Default::default()
        }
    }

    pub(crate) fn metadata(&self) -> MemoryPackageService {
        let mut service = MemoryPackageService::new();
        service.insert(PackageInfo {
            package_name: "framework".to_string(),
            source_path: self.framework_dir.clone(),
            public_source_path: self.framework_dir.clone(),
            ..Default::default()
        });
        service.insert(PackageInfo {
            package_name: "platform.sdk".to_string(),
            source_path: self.platform_dir.clone(),
            public_source_path: self.platform_dir.clone(),
            ..Default::default()
        });
        service.insert(self.app_info());
        service.insert(self.theme_info());
        service.insert(PackageInfo {
            package_name: "my.theme.common".to_string(),
            source_path: self.common_dir.clone(),
            public_source_path: self.common_dir.clone(),
            ..Default::default()
        });
        service.insert(self.icons_info());
        service
    }

    /// A manager with the default package stack attached: framework (1),
    /// platform (2), application (3).
    pub(crate) fn manager(&self) -> AssetManager {
        self.manager_with(self.metadata())
    }

    pub(crate) fn manager_with(&self, metadata: MemoryPackageService) -> AssetManager {
        self.manager_with_service(Arc::new(metadata))
    }

    pub(crate) fn manager_with_service(
        &self,
        metadata: Arc<dyn PackageMetadataService>,
    ) -> AssetManager {
        let config = ManagerConfig {
            app_name: Some("com.example.app".to_string()),
            cache_root: self.cache_root.clone(),
            seed_from_system: false,
            ..ManagerConfig::default()
        };
        let manager = AssetManager::new(Box::new(JsonResourceTable::new()), metadata, config);
        for dir in [&self.framework_dir, &self.platform_dir, &self.app_dir] {
            assert_ne!(manager.add_package(dir.clone()).unwrap(), 0);
        }
        manager
    }

    /// [`World::manager`] plus a fourth package declaring one style.
    pub(crate) fn manager_with_styles(&self) -> AssetManager {
        let styles_dir = self.root.join("packages/styles");
        let mut descriptor = app_descriptor("com.example.styles", 0x7f, &["styled"]);
        descriptor.styles.push(StyleDescriptor {
            id: 0x7f02_0001,
            attrs: vec![EntryDescriptor {
                id: 0x7f03_0001,
                value: TypedValue::String { index: 0 },
            }],
        });
        write_package(&styles_dir, &descriptor);

        let manager = self.manager();
        assert_ne!(manager.add_package(styles_dir).unwrap(), 0);
        manager
    }

    /// [`World::manager`] plus a fourth package holding a reference entry
    /// pointing at the application's first string.
    pub(crate) fn manager_with_reference_entry(&self) -> AssetManager {
        let refs_dir = self.root.join("packages/refs");
        let mut descriptor = app_descriptor("com.example.refs", 0x03, &[]);
        descriptor.entries.push(EntryDescriptor {
            id: 0x7f01_0099,
            value: TypedValue::Reference(0x7f01_0001),
        });
        write_package(&refs_dir, &descriptor);

        let manager = self.manager();
        assert_ne!(manager.add_package(refs_dir).unwrap(), 0);
        manager
    }

    /// The add request the overlay attach path would build for the theme's
    /// application target.
    pub(crate) fn theme_overlay_request(&self) -> AddRequest {
        AddRequest::Overlay {
            idmap: Some(ovl_paths::idmap_path_in(
                &self.cache_root,
                "com.example.app",
                "my.theme",
            )),
            source: self.theme_dir.clone(),
            resolved: ovl_paths::resolved_package_path_in(
                &self.cache_root,
                "com.example.app",
                "my.theme",
            ),
            target: Some(self.app_dir.clone()),
            prefix: ovl_paths::overlay_prefix_for_target("com.example.app"),
        }
    }
}
