use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::resolver::{DependencyResolver, ResolvedContent};
use crate::catalog::CatalogClient;
use crate::downloader::{DownloadBatch, DownloadEntry, Downloader};
use crate::error::{CoreError, CoreResult};
use crate::instance::{ContentType, Instance, InstanceStore, LockAction};

/// Result of a dependents check. `allowed` is false whenever any other
/// entry still requires the content.
#[derive(Debug, Clone, Serialize)]
pub struct RemovalCheck {
    pub allowed: bool,
    /// Display names of the entries that depend on the checked content.
    pub dependents: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovedContent {
    pub id: u64,
    pub file_name: String,
}

/// Content operations on an instance: install with dependency resolution,
/// removal gated by a dependents check, and enable/disable toggling.
///
/// Wired once at startup over the store, the catalog client and the
/// downloader; all mutation goes through the store's lock map.
pub struct ContentManager {
    store: Arc<InstanceStore>,
    catalog: Arc<dyn CatalogClient>,
    downloader: Arc<Downloader>,
}

impl ContentManager {
    pub fn new(
        store: Arc<InstanceStore>,
        catalog: Arc<dyn CatalogClient>,
        downloader: Arc<Downloader>,
    ) -> Self {
        Self {
            store,
            catalog,
            downloader,
        }
    }

    /// Install a catalog item and everything it requires. Resolves the full
    /// new-content set, persists the updated record, then hands the missing
    /// files to the downloader. Returns `None` when every file was already
    /// on disk — no batch is started in that case.
    ///
    /// `file_id` pins the root to an exact file version; `None` takes the
    /// catalog's best match for the instance's game version and loader.
    pub async fn add(
        &self,
        instance_id: &str,
        content_type: ContentType,
        content_id: u64,
        file_id: Option<u64>,
        worlds: &[String],
    ) -> CoreResult<Option<DownloadBatch>> {
        let _guard = self
            .store
            .locks()
            .acquire(instance_id, LockAction::AddContent)
            .await;

        let mut instance = self.store.find_one(instance_id).await?;
        self.install_into(&mut instance, content_type, content_id, file_id, worlds)
            .await
    }

    /// Wholesale-replace an installed entry with a freshly resolved one.
    /// The stale entry is dropped first so the resolver cannot treat it as
    /// already satisfied.
    pub async fn update_entry(
        &self,
        instance_id: &str,
        content_type: ContentType,
        content_id: u64,
        file_id: Option<u64>,
        worlds: &[String],
    ) -> CoreResult<Option<DownloadBatch>> {
        let _guard = self
            .store
            .locks()
            .acquire(instance_id, LockAction::AddContent)
            .await;

        let mut instance = self.store.find_one(instance_id).await?;
        if !instance.contains(content_id) {
            return Err(CoreError::ContentNotFound {
                instance_id: instance_id.to_string(),
                content_id,
            });
        }
        for t in ContentType::ALL {
            instance.collection_mut(t).retain(|e| e.id != content_id);
        }

        self.install_into(&mut instance, content_type, content_id, file_id, worlds)
            .await
    }

    async fn install_into(
        &self,
        instance: &mut Instance,
        content_type: ContentType,
        content_id: u64,
        file_id: Option<u64>,
        worlds: &[String],
    ) -> CoreResult<Option<DownloadBatch>> {
        let resolver = DependencyResolver::new(self.catalog.as_ref());
        let groups = resolver
            .resolve(instance, content_id, content_type, file_id)
            .await?;

        merge_groups(instance, &groups);
        // Plan before persisting: a rejected plan must not leave a record
        // claiming content whose files were never scheduled.
        let entries = self.plan_downloads(instance, &groups, worlds)?;

        instance.last_updated = Some(Utc::now());
        self.store.save(instance).await?;
        self.downloader.start(entries).await
    }

    /// Check whether other entries still require this content. Reads only,
    /// never deletes.
    pub async fn can_remove(&self, instance_id: &str, content_id: u64) -> CoreResult<RemovalCheck> {
        let _guard = self
            .store
            .locks()
            .acquire(instance_id, LockAction::Default)
            .await;

        let instance = self.store.find_one(instance_id).await?;
        if !instance.contains(content_id) {
            return Err(CoreError::ContentNotFound {
                instance_id: instance_id.to_string(),
                content_id,
            });
        }

        let mut dependents = Vec::new();
        for t in ContentType::ALL {
            for entry in instance.collection(t) {
                if entry.id != content_id && entry.dependencies.contains(&content_id) {
                    dependents.push(entry.name.clone());
                }
            }
        }

        Ok(RemovalCheck {
            allowed: dependents.is_empty(),
            dependents,
        })
    }

    /// Delete the given entries' files (both the enabled and the `.disabled`
    /// variant — at most one exists) and drop them from the record. A file
    /// already gone is not an error; any other IO failure is.
    pub async fn remove(
        &self,
        instance_id: &str,
        content_type: ContentType,
        content_ids: &[u64],
        world: Option<&str>,
    ) -> CoreResult<Vec<RemovedContent>> {
        let _guard = self
            .store
            .locks()
            .acquire(instance_id, LockAction::RemoveContent)
            .await;

        let mut instance = self.store.find_one(instance_id).await?;
        let dir = content_type.content_dir(&self.store.instance_dir(instance_id), world)?;

        let targets: HashSet<u64> = content_ids.iter().copied().collect();
        let to_remove: Vec<_> = instance
            .collection(content_type)
            .iter()
            .filter(|e| targets.contains(&e.id))
            .cloned()
            .collect();

        if to_remove.is_empty() {
            return Err(CoreError::ContentNotFound {
                instance_id: instance_id.to_string(),
                content_id: content_ids.first().copied().unwrap_or_default(),
            });
        }

        for entry in &to_remove {
            remove_if_present(dir.join(&entry.file_name)).await?;
            remove_if_present(dir.join(entry.disabled_file_name())).await?;
        }

        instance
            .collection_mut(content_type)
            .retain(|e| !targets.contains(&e.id));
        instance.last_updated = Some(Utc::now());
        self.store.save(&instance).await?;

        info!(
            "Removed {} entr{} from instance {}",
            to_remove.len(),
            if to_remove.len() == 1 { "y" } else { "ies" },
            instance_id
        );

        Ok(to_remove
            .into_iter()
            .map(|e| RemovedContent {
                id: e.id,
                file_name: e.file_name,
            })
            .collect())
    }

    /// Enable or disable entries by renaming the file suffix:
    /// `<file>.disabled` ⇄ `<file>`. With `enable == None` each entry flips.
    ///
    /// Unlike `remove`, a missing rename source is a hard `ToggleConflict`:
    /// the record and the disk disagree, and papering over that would hide a
    /// real bug. Every source is checked up front, so a conflict aborts
    /// before any rename happens and nothing is persisted; the caller
    /// recovers by re-reading the record.
    pub async fn toggle(
        &self,
        instance_id: &str,
        content_type: ContentType,
        content_ids: &[u64],
        enable: Option<bool>,
        world: Option<&str>,
    ) -> CoreResult<()> {
        let _guard = self
            .store
            .locks()
            .acquire(instance_id, LockAction::ToggleContent)
            .await;

        let mut instance = self.store.find_one(instance_id).await?;
        let dir = content_type.content_dir(&self.store.instance_dir(instance_id), world)?;
        let targets: HashSet<u64> = content_ids.iter().copied().collect();

        let mut planned: Vec<(u64, PathBuf, PathBuf, bool)> = Vec::new();
        for entry in instance.collection(content_type) {
            if !targets.contains(&entry.id) {
                continue;
            }

            let should_enable = enable.unwrap_or(!entry.enabled);
            if should_enable == entry.enabled {
                // Already in the requested state; force-enabling an enabled
                // entry is a no-op, not a conflict.
                continue;
            }

            let enabled_path = dir.join(&entry.file_name);
            let disabled_path = dir.join(entry.disabled_file_name());
            let (source, dest) = if should_enable {
                (disabled_path, enabled_path)
            } else {
                (enabled_path, disabled_path)
            };

            match tokio::fs::try_exists(&source).await {
                Ok(true) => planned.push((entry.id, source, dest, should_enable)),
                Ok(false) => {
                    return Err(CoreError::ToggleConflict {
                        instance_id: instance_id.to_string(),
                        content_id: entry.id,
                        reason: format!("rename source {:?} does not exist", source),
                    });
                }
                Err(e) => return Err(CoreError::io(source, e)),
            }
        }

        for (id, source, dest, should_enable) in planned {
            if let Err(e) = tokio::fs::rename(&source, &dest).await {
                // A source validated above vanished underneath us. Persist
                // the flips that did land so record and disk stay in step.
                instance.last_updated = Some(Utc::now());
                self.store.save(&instance).await?;
                return Err(CoreError::io(source, e));
            }
            if let Some(entry) = instance
                .collection_mut(content_type)
                .iter_mut()
                .find(|e| e.id == id)
            {
                entry.enabled = should_enable;
            }
        }

        instance.last_updated = Some(Utc::now());
        self.store.save(&instance).await?;
        Ok(())
    }

    /// Turn resolved groups into transfer descriptors. Datapacks fan out
    /// into each named world's `datapacks/` folder; everything else goes to
    /// its collection directory.
    fn plan_downloads(
        &self,
        instance: &Instance,
        groups: &ResolvedContent,
        worlds: &[String],
    ) -> CoreResult<Vec<DownloadEntry>> {
        let instance_dir = self.store.instance_dir(&instance.id);
        let mut entries = Vec::new();

        for (&content_type, contents) in groups {
            let dirs: Vec<PathBuf> = if content_type == ContentType::Datapacks {
                if worlds.is_empty() {
                    return Err(CoreError::BadRequest(
                        "World name is required for datapacks".into(),
                    ));
                }
                worlds
                    .iter()
                    .map(|w| content_type.content_dir(&instance_dir, Some(w)))
                    .collect::<CoreResult<_>>()?
            } else {
                vec![content_type.content_dir(&instance_dir, None)?]
            };

            for dir in dirs {
                for content in contents {
                    entries.push(DownloadEntry {
                        url: content.file_url.clone(),
                        path: dir.join(&content.file_name),
                        folder: dir.clone(),
                        size: content.file_size,
                        kind: content_type,
                    });
                }
            }
        }

        Ok(entries)
    }
}

/// Merge newly resolved entries into the record: an entry with the same id
/// is replaced, the rest of the collection is left alone.
fn merge_groups(instance: &mut Instance, groups: &ResolvedContent) {
    for (&content_type, new_entries) in groups {
        let collection = instance.collection_mut(content_type);
        collection.retain(|existing| !new_entries.iter().any(|n| n.id == existing.id));
        collection.extend(new_entries.iter().cloned());
    }
}

async fn remove_if_present(path: PathBuf) -> CoreResult<()> {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoreError::io(path, e)),
    }
}
