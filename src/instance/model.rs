use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Supported mod loaders — strongly typed, no magic strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    Forge,
    Fabric,
    NeoForge,
    Quilt,
}

impl std::fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderKind::Forge => write!(f, "forge"),
            LoaderKind::Fabric => write!(f, "fabric"),
            LoaderKind::NeoForge => write!(f, "neoforge"),
            LoaderKind::Quilt => write!(f, "quilt"),
        }
    }
}

/// Loader configured on an instance: runtime variant plus its version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Loader {
    #[serde(rename = "type")]
    pub kind: LoaderKind,
    pub version: String,
}

/// The five content collections an instance tracks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Mods,
    Resourcepacks,
    Shaderpacks,
    Datapacks,
    Worlds,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Mods,
        ContentType::Resourcepacks,
        ContentType::Shaderpacks,
        ContentType::Datapacks,
        ContentType::Worlds,
    ];

    /// Map a catalog category class id to a collection.
    pub fn from_class_id(class_id: u32) -> Option<Self> {
        match class_id {
            6 => Some(ContentType::Mods),
            12 => Some(ContentType::Resourcepacks),
            6552 => Some(ContentType::Shaderpacks),
            6945 => Some(ContentType::Datapacks),
            17 => Some(ContentType::Worlds),
            _ => None,
        }
    }

    /// Directory this collection's files live in, relative to the instance
    /// directory. Datapacks are scoped to a world and need its folder name;
    /// world archives land directly in `saves/`.
    pub fn content_dir(&self, instance_dir: &Path, world: Option<&str>) -> CoreResult<PathBuf> {
        match self {
            ContentType::Mods => Ok(instance_dir.join("mods")),
            ContentType::Resourcepacks => Ok(instance_dir.join("resourcepacks")),
            ContentType::Shaderpacks => Ok(instance_dir.join("shaderpacks")),
            ContentType::Datapacks => {
                let world = world.ok_or_else(|| {
                    CoreError::BadRequest("World name is required for datapacks".into())
                })?;
                Ok(instance_dir.join("saves").join(world).join("datapacks"))
            }
            ContentType::Worlds => Ok(instance_dir.join("saves")),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Mods => write!(f, "mods"),
            ContentType::Resourcepacks => write!(f, "resourcepacks"),
            ContentType::Shaderpacks => write!(f, "shaderpacks"),
            ContentType::Datapacks => write!(f, "datapacks"),
            ContentType::Worlds => write!(f, "worlds"),
        }
    }
}

/// One tracked piece of installed content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentEntry {
    pub id: u64,
    pub name: String,
    pub file_id: u64,
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub enabled: bool,
    #[serde(default)]
    pub dependencies: Vec<u64>,
}

impl ContentEntry {
    /// On-disk name carrying the disabled suffix.
    pub fn disabled_file_name(&self) -> String {
        format!("{}.disabled", self.file_name)
    }
}

/// Full instance record persisted to disk as `instance.json`.
///
/// Each instance has its own folder under the configured root with:
/// - `mods/`, `resourcepacks/`, `shaderpacks/` — flat content files
/// - `saves/`           — worlds, each a folder after extraction
/// - `saves/<world>/datapacks/` — per-world datapacks
/// - `instance.json`    — this serialized struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    /// Target game version, e.g. "1.20.1".
    pub version: String,
    pub loader: Option<Loader>,
    #[serde(default)]
    pub mods: Vec<ContentEntry>,
    #[serde(default)]
    pub resourcepacks: Vec<ContentEntry>,
    #[serde(default)]
    pub shaderpacks: Vec<ContentEntry>,
    #[serde(default)]
    pub datapacks: Vec<ContentEntry>,
    #[serde(default)]
    pub worlds: Vec<ContentEntry>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Instance {
    /// Create an empty instance record. A fresh id is generated when the
    /// caller does not supply one.
    pub fn new(
        id: Option<String>,
        name: String,
        version: String,
        loader: Option<Loader>,
    ) -> Self {
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name,
            version,
            loader,
            mods: Vec::new(),
            resourcepacks: Vec::new(),
            shaderpacks: Vec::new(),
            datapacks: Vec::new(),
            worlds: Vec::new(),
            last_updated: Some(Utc::now()),
        }
    }

    pub fn collection(&self, content_type: ContentType) -> &Vec<ContentEntry> {
        match content_type {
            ContentType::Mods => &self.mods,
            ContentType::Resourcepacks => &self.resourcepacks,
            ContentType::Shaderpacks => &self.shaderpacks,
            ContentType::Datapacks => &self.datapacks,
            ContentType::Worlds => &self.worlds,
        }
    }

    pub fn collection_mut(&mut self, content_type: ContentType) -> &mut Vec<ContentEntry> {
        match content_type {
            ContentType::Mods => &mut self.mods,
            ContentType::Resourcepacks => &mut self.resourcepacks,
            ContentType::Shaderpacks => &mut self.shaderpacks,
            ContentType::Datapacks => &mut self.datapacks,
            ContentType::Worlds => &mut self.worlds,
        }
    }

    /// Look for an entry by catalog id across all five collections.
    pub fn find_entry(&self, content_id: u64) -> Option<(ContentType, &ContentEntry)> {
        ContentType::ALL.iter().find_map(|&t| {
            self.collection(t)
                .iter()
                .find(|e| e.id == content_id)
                .map(|e| (t, e))
        })
    }

    pub fn contains(&self, content_id: u64) -> bool {
        self.find_entry(content_id).is_some()
    }

    /// Path to this instance's record file inside `instance_dir`.
    pub fn record_path(instance_dir: &Path) -> PathBuf {
        instance_dir.join(INSTANCE_FILE)
    }
}

pub const INSTANCE_FILE: &str = "instance.json";

/// Partial top-level update. Fields left as `None` keep the current value;
/// content collections present in the patch replace the stored ones
/// wholesale — they are never deep-merged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstancePatch {
    pub name: Option<String>,
    pub version: Option<String>,
    pub loader: Option<Loader>,
    pub mods: Option<Vec<ContentEntry>>,
    pub resourcepacks: Option<Vec<ContentEntry>>,
    pub shaderpacks: Option<Vec<ContentEntry>>,
    pub datapacks: Option<Vec<ContentEntry>>,
    pub worlds: Option<Vec<ContentEntry>>,
}

impl InstancePatch {
    pub fn apply(self, instance: &mut Instance) {
        if let Some(name) = self.name {
            instance.name = name;
        }
        if let Some(version) = self.version {
            instance.version = version;
        }
        if let Some(loader) = self.loader {
            instance.loader = Some(loader);
        }
        if let Some(mods) = self.mods {
            instance.mods = mods;
        }
        if let Some(resourcepacks) = self.resourcepacks {
            instance.resourcepacks = resourcepacks;
        }
        if let Some(shaderpacks) = self.shaderpacks {
            instance.shaderpacks = shaderpacks;
        }
        if let Some(datapacks) = self.datapacks {
            instance.datapacks = datapacks;
        }
        if let Some(worlds) = self.worlds {
            instance.worlds = worlds;
        }
        instance.last_updated = Some(Utc::now());
    }
}
