use std::collections::HashMap;

use serde::Serialize;

use crate::catalog::CatalogItem;
use crate::instance::{ContentEntry, ContentType, Instance, LoaderKind};

/// Install status of a catalog item relative to one instance snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    NotInstalled,
    Latest,
    Outdated,
    Incompatible,
}

/// What a search result row shows about the local install.
#[derive(Debug, Clone, Serialize)]
pub struct ContentStatus {
    pub status: InstallStatus,
    pub enabled: bool,
    pub file_name: Option<String>,
}

impl ContentStatus {
    fn not_installed() -> Self {
        Self {
            status: InstallStatus::NotInstalled,
            enabled: false,
            file_name: None,
        }
    }
}

/// Id-indexed snapshot of everything installed on an instance.
///
/// Built once per search page, then queried per item; `classify` does no I/O
/// and allocates nothing beyond the returned file name.
pub struct InstalledIndex<'a> {
    game_version: &'a str,
    loader: Option<LoaderKind>,
    entries: HashMap<u64, &'a ContentEntry>,
}

impl<'a> InstalledIndex<'a> {
    pub fn new(instance: &'a Instance) -> Self {
        let mut entries = HashMap::new();
        for content_type in ContentType::ALL {
            for entry in instance.collection(content_type) {
                entries.insert(entry.id, entry);
            }
        }
        Self {
            game_version: &instance.version,
            loader: instance.loader.as_ref().map(|l| l.kind),
            entries,
        }
    }

    pub fn classify(&self, item: &CatalogItem) -> ContentStatus {
        // Without a configured loader there is no notion of compatibility
        // to classify against.
        let Some(loader) = self.loader else {
            return ContentStatus::not_installed();
        };
        let Some(installed) = self.entries.get(&item.id) else {
            return ContentStatus::not_installed();
        };

        // "Latest match": the newest file the catalog lists for exactly this
        // (game version, loader) pair.
        let latest_match = item
            .latest_files_indexes
            .iter()
            .find(|f| f.game_version == self.game_version && f.loader == Some(loader));

        let status = match latest_match {
            Some(latest) if latest.file_id == installed.file_id => InstallStatus::Latest,
            Some(_) => InstallStatus::Outdated,
            None => InstallStatus::Incompatible,
        };

        ContentStatus {
            status,
            enabled: installed.enabled,
            file_name: Some(installed.file_name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileIndex;
    use crate::instance::Loader;

    fn instance_with_mod(file_id: u64) -> Instance {
        let mut instance = Instance::new(
            Some("alpha".to_string()),
            "Alpha".to_string(),
            "1.20.1".to_string(),
            Some(Loader {
                kind: LoaderKind::Fabric,
                version: "0.15.0".to_string(),
            }),
        );
        instance.mods.push(ContentEntry {
            id: 100,
            name: "Installed Mod".to_string(),
            file_id,
            file_name: "installed.jar".to_string(),
            file_url: "https://files.example/installed".to_string(),
            file_size: 1,
            enabled: false,
            dependencies: Vec::new(),
        });
        instance
    }

    fn item_with_index(indexes: Vec<FileIndex>) -> CatalogItem {
        CatalogItem {
            id: 100,
            name: "Some Mod".to_string(),
            class_id: Some(6),
            latest_files_indexes: indexes,
        }
    }

    fn fabric_index(game_version: &str, file_id: u64) -> FileIndex {
        FileIndex {
            game_version: game_version.to_string(),
            file_id,
            loader: Some(LoaderKind::Fabric),
        }
    }

    #[test]
    fn installed_file_matching_latest_is_latest() {
        let instance = instance_with_mod(1000);
        let index = InstalledIndex::new(&instance);
        let item = item_with_index(vec![fabric_index("1.20.1", 1000)]);

        let status = index.classify(&item);
        assert_eq!(status.status, InstallStatus::Latest);
        assert!(!status.enabled);
        assert_eq!(status.file_name.as_deref(), Some("installed.jar"));
    }

    #[test]
    fn installed_file_behind_latest_is_outdated() {
        let instance = instance_with_mod(900);
        let index = InstalledIndex::new(&instance);
        let item = item_with_index(vec![fabric_index("1.20.1", 1000)]);

        assert_eq!(index.classify(&item).status, InstallStatus::Outdated);
    }

    #[test]
    fn installed_without_any_match_is_incompatible() {
        let instance = instance_with_mod(900);
        let index = InstalledIndex::new(&instance);
        // Indexes exist, but none for this exact (version, loader) pair.
        let item = item_with_index(vec![
            fabric_index("1.19.2", 800),
            FileIndex {
                game_version: "1.20.1".to_string(),
                file_id: 1000,
                loader: Some(LoaderKind::Forge),
            },
        ]);

        assert_eq!(index.classify(&item).status, InstallStatus::Incompatible);
    }

    #[test]
    fn missing_entry_is_not_installed() {
        let instance = instance_with_mod(900);
        let index = InstalledIndex::new(&instance);
        let mut item = item_with_index(vec![fabric_index("1.20.1", 1000)]);
        item.id = 555;

        let status = index.classify(&item);
        assert_eq!(status.status, InstallStatus::NotInstalled);
        assert!(status.file_name.is_none());
    }

    #[test]
    fn no_loader_configured_is_not_installed() {
        let mut instance = instance_with_mod(1000);
        instance.loader = None;
        let index = InstalledIndex::new(&instance);
        let item = item_with_index(vec![fabric_index("1.20.1", 1000)]);

        assert_eq!(index.classify(&item).status, InstallStatus::NotInstalled);
    }

    #[test]
    fn index_spans_all_collections() {
        let mut instance = instance_with_mod(1000);
        instance.worlds.push(ContentEntry {
            id: 200,
            name: "Installed World".to_string(),
            file_id: 2000,
            file_name: "world.zip".to_string(),
            file_url: "https://files.example/world".to_string(),
            file_size: 1,
            enabled: true,
            dependencies: Vec::new(),
        });
        let index = InstalledIndex::new(&instance);

        let mut item = item_with_index(vec![FileIndex {
            game_version: "1.20.1".to_string(),
            file_id: 2000,
            loader: Some(LoaderKind::Fabric),
        }]);
        item.id = 200;

        assert_eq!(index.classify(&item).status, InstallStatus::Latest);
    }
}
