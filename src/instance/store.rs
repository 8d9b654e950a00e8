use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use super::locks::{LockAction, LockMap};
use super::model::{Instance, InstancePatch, INSTANCE_FILE};
use crate::error::{CoreError, CoreResult};

/// How many record files are read at once during a full scan. Independent
/// from the download width pool.
const SCAN_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Name,
    Version,
    LastUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    Asc,
    Desc,
}

/// Manages instance records on disk: one directory per instance holding an
/// `instance.json` plus the content subdirectories.
pub struct InstanceStore {
    root: PathBuf,
    locks: LockMap,
}

impl InstanceStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: LockMap::new(),
        }
    }

    /// Shared lock map; content operations take their own actions on it.
    pub fn locks(&self) -> &LockMap {
        &self.locks
    }

    pub fn instance_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Read every instance record under the root. Unreadable or corrupt
    /// records are skipped with a warning — one broken instance must never
    /// take down the whole listing.
    pub async fn find_all(&self, sort_by: SortBy, sort_dir: SortDir) -> CoreResult<Vec<Instance>> {
        let mut dirs = Vec::new();
        match tokio::fs::read_dir(&self.root).await {
            Ok(mut entries) => {
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| CoreError::io(&self.root, e))?
                {
                    let file_type = entry
                        .file_type()
                        .await
                        .map_err(|e| CoreError::io(entry.path(), e))?;
                    if file_type.is_dir() {
                        dirs.push(entry.path());
                    }
                }
            }
            Err(_) => return Ok(Vec::new()),
        }

        let mut instances: Vec<Instance> = stream::iter(dirs)
            .map(|dir| async move { read_record(&dir).await })
            .buffer_unordered(SCAN_CONCURRENCY)
            .filter_map(|res| async move { res })
            .collect()
            .await;

        instances.sort_by(|a, b| {
            let ordering = match sort_by {
                SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortBy::Version => a.version.cmp(&b.version),
                SortBy::LastUpdated => a.last_updated.cmp(&b.last_updated),
            };
            match sort_dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });

        Ok(instances)
    }

    /// Load one record. Missing or unparseable records are a NotFound — the
    /// caller cannot distinguish the two and should not need to.
    pub async fn find_one(&self, id: &str) -> CoreResult<Instance> {
        if id.is_empty() {
            return Err(CoreError::InstanceNotFound(id.to_string()));
        }
        let record = Instance::record_path(&self.instance_dir(id));
        let json = tokio::fs::read_to_string(&record)
            .await
            .map_err(|_| CoreError::InstanceNotFound(id.to_string()))?;
        serde_json::from_str(&json).map_err(|_| CoreError::InstanceNotFound(id.to_string()))
    }

    /// Create a new instance: record file plus the content directory
    /// skeleton, so first downloads never race directory creation.
    pub async fn create(&self, instance: Instance) -> CoreResult<Instance> {
        let _guard = self.locks.acquire(&instance.id, LockAction::Default).await;

        if self.find_one(&instance.id).await.is_ok() {
            return Err(CoreError::InstanceAlreadyExists(instance.id.clone()));
        }

        let dir = self.instance_dir(&instance.id);
        let mods = dir.join("mods");
        let resourcepacks = dir.join("resourcepacks");
        let shaderpacks = dir.join("shaderpacks");
        let saves = dir.join("saves");
        tokio::try_join!(
            create_dir_safe(&mods),
            create_dir_safe(&resourcepacks),
            create_dir_safe(&shaderpacks),
            create_dir_safe(&saves),
        )?;

        self.save(&instance).await?;
        info!("Created instance '{}' ({})", instance.name, instance.id);
        Ok(instance)
    }

    /// Apply a partial top-level update and rewrite the whole record.
    /// Content collections present in the patch replace the stored ones.
    pub async fn update(&self, id: &str, patch: InstancePatch) -> CoreResult<Instance> {
        let _guard = self.locks.acquire(id, LockAction::Default).await;

        let mut instance = self.find_one(id).await?;
        patch.apply(&mut instance);
        self.save(&instance).await?;
        Ok(instance)
    }

    /// Remove the instance directory recursively.
    pub async fn delete(&self, id: &str) -> CoreResult<Instance> {
        let _guard = self.locks.acquire(id, LockAction::Default).await;

        let existing = self.find_one(id).await?;
        let dir = self.instance_dir(id);
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| CoreError::io(dir, e))?;
        info!("Deleted instance {}", id);
        Ok(existing)
    }

    /// Full-record rewrite through a temp file so a crash mid-write can
    /// never leave a truncated record behind.
    pub async fn save(&self, instance: &Instance) -> CoreResult<()> {
        let dir = self.instance_dir(&instance.id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::io(&dir, e))?;

        let record = Instance::record_path(&dir);
        let tmp = dir.join(format!(".{INSTANCE_FILE}.tmp"));
        let json = serde_json::to_string_pretty(instance)?;

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &record)
            .await
            .map_err(|e| CoreError::io(&record, e))?;
        Ok(())
    }
}

async fn read_record(dir: &Path) -> Option<Instance> {
    let record = Instance::record_path(dir);
    match tokio::fs::read_to_string(&record).await {
        Ok(json) => match serde_json::from_str(&json) {
            Ok(instance) => Some(instance),
            Err(e) => {
                warn!("Corrupt instance record at {:?}: {}", record, e);
                None
            }
        },
        Err(e) => {
            warn!("Cannot read {:?}: {}", record, e);
            None
        }
    }
}

async fn create_dir_safe(path: &Path) -> CoreResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| CoreError::io(path, e))
}
