use std::collections::{BTreeMap, HashMap};

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::catalog::{CatalogClient, Relation};
use crate::error::CoreResult;
use crate::instance::{ContentEntry, ContentType, Instance};

/// Newly resolved entries, grouped by the collection they belong to.
pub type ResolvedContent = BTreeMap<ContentType, Vec<ContentEntry>>;

/// Expands a root catalog id into the minimal set of *new* entries the
/// instance needs, following required-dependency edges.
pub struct DependencyResolver<'a> {
    catalog: &'a dyn CatalogClient,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(catalog: &'a dyn CatalogClient) -> Self {
        Self { catalog }
    }

    /// Depth-first resolution with a per-call memo keyed by catalog id.
    /// The memo both prevents reprocessing and guarantees termination on
    /// cyclic dependency graphs. `requested_type` is the collection the
    /// caller asked for; it is the classification fallback of last resort.
    ///
    /// `pinned_file_id` fixes the root's file to an exact version instead
    /// of the catalog's best match. Dependencies are never pinned.
    pub async fn resolve(
        &self,
        instance: &Instance,
        root_id: u64,
        requested_type: ContentType,
        pinned_file_id: Option<u64>,
    ) -> CoreResult<ResolvedContent> {
        let mut task = ResolveTask {
            catalog: self.catalog,
            instance,
            requested_type,
            visited: HashMap::new(),
            groups: BTreeMap::new(),
        };
        task.resolve_id(root_id, None, pinned_file_id).await?;
        Ok(task.groups)
    }
}

/// Call-scoped state. Never shared across resolve calls or instances.
struct ResolveTask<'a> {
    catalog: &'a dyn CatalogClient,
    instance: &'a Instance,
    requested_type: ContentType,
    /// id -> resolved id, or None when the id was dropped (no matching file).
    visited: HashMap<u64, Option<u64>>,
    groups: ResolvedContent,
}

impl ResolveTask<'_> {
    /// Resolve one id, returning the id usable as a dependency reference, or
    /// `None` when the branch is dropped. Recursion is boxed; the visited
    /// map is populated before descending so cycles bottom out.
    fn resolve_id<'b>(
        &'b mut self,
        id: u64,
        parent_type: Option<ContentType>,
        pinned_file: Option<u64>,
    ) -> BoxFuture<'b, CoreResult<Option<u64>>> {
        Box::pin(async move {
            if let Some(&cached) = self.visited.get(&id) {
                return Ok(cached);
            }

            // Present anywhere in the instance — satisfied, emits no new
            // entry but still counts as a dependency reference. The check is
            // instance-wide on purpose, not per-collection.
            if self.instance.contains(id) {
                self.visited.insert(id, Some(id));
                return Ok(Some(id));
            }

            let Some(item) = self.catalog.get_items(&[id]).await?.into_iter().next() else {
                self.visited.insert(id, None);
                return Ok(None);
            };

            // Classify the target collection from the catalog category;
            // on ambiguity fall back to the referring parent, then to the
            // type the caller requested.
            let content_type = item
                .class_id
                .and_then(ContentType::from_class_id)
                .or(parent_type)
                .unwrap_or(self.requested_type);

            // The loader constraint only applies to mods — packs and worlds
            // are loader-agnostic.
            let loader = match content_type {
                ContentType::Mods => self.instance.loader.as_ref().map(|l| l.kind),
                _ => None,
            };

            let fetched = match pinned_file {
                Some(file_id) => self.catalog.get_file_by_id(id, file_id).await?,
                None => {
                    self.catalog
                        .get_file(id, &self.instance.version, loader)
                        .await?
                }
            };
            let file = match fetched {
                Some(file) => file,
                None => {
                    // No file for this version/loader: drop the branch
                    // silently so optional or incompatible dependencies
                    // never block the root.
                    debug!(
                        "No matching file for content {} ({} / {:?}), skipping",
                        id, self.instance.version, loader
                    );
                    self.visited.insert(id, None);
                    return Ok(None);
                }
            };

            self.visited.insert(id, Some(id));

            let entry = ContentEntry {
                id: item.id,
                name: item.name,
                file_id: file.id,
                file_name: file.file_name,
                file_url: file.download_url,
                file_size: file.file_length,
                enabled: true,
                dependencies: Vec::new(),
            };

            // Append before recursing so a parent precedes its dependencies
            // within the group; children of the same type land after it.
            let group = self.groups.entry(content_type).or_default();
            group.push(entry);
            let index = group.len() - 1;

            let dependencies = self.catalog.get_dependencies(file.id).await?;
            let mut resolved_children = Vec::new();
            for dep in dependencies {
                if dep.relation != Relation::Required {
                    continue;
                }
                if let Some(child_id) = self
                    .resolve_id(dep.content_id, Some(content_type), None)
                    .await?
                {
                    resolved_children.push(child_id);
                }
            }

            if let Some(slot) = self
                .groups
                .get_mut(&content_type)
                .and_then(|g| g.get_mut(index))
            {
                slot.dependencies = resolved_children;
            }

            Ok(Some(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::testutil::FakeCatalog;
    use crate::instance::{Loader, LoaderKind};

    fn empty_instance() -> Instance {
        Instance::new(
            Some("alpha".to_string()),
            "Alpha".to_string(),
            "1.20.1".to_string(),
            Some(Loader {
                kind: LoaderKind::Fabric,
                version: "0.15.0".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn root_with_required_dependency_resolves_both() {
        let mut catalog = FakeCatalog::default();
        catalog.item(100, "Root Mod", Some(6)).file(100, 1000);
        catalog.item(200, "Library Mod", Some(6)).file(200, 2000);
        catalog.requires(1000, 200);

        let instance = empty_instance();
        let resolver = DependencyResolver::new(&catalog);
        let groups = resolver
            .resolve(&instance, 100, ContentType::Mods, None)
            .await
            .unwrap();

        let mods = &groups[&ContentType::Mods];
        assert_eq!(mods.len(), 2);
        assert_eq!(mods[0].id, 100);
        assert_eq!(mods[0].dependencies, vec![200]);
        assert_eq!(mods[1].id, 200);
        assert!(mods[1].dependencies.is_empty());
    }

    #[tokio::test]
    async fn cyclic_graph_terminates_with_one_entry_per_id() {
        let mut catalog = FakeCatalog::default();
        catalog.item(1, "A", Some(6)).file(1, 10);
        catalog.item(2, "B", Some(6)).file(2, 20);
        catalog.requires(10, 2);
        catalog.requires(20, 1);

        let instance = empty_instance();
        let resolver = DependencyResolver::new(&catalog);
        let groups = resolver
            .resolve(&instance, 1, ContentType::Mods, None)
            .await
            .unwrap();

        let mods = &groups[&ContentType::Mods];
        assert_eq!(mods.len(), 2);
        // Both edges survive despite the cycle.
        assert_eq!(mods[0].dependencies, vec![2]);
        assert_eq!(mods[1].dependencies, vec![1]);
    }

    #[tokio::test]
    async fn dependency_without_matching_file_is_dropped_silently() {
        let mut catalog = FakeCatalog::default();
        catalog.item(100, "Root Mod", Some(6)).file(100, 1000);
        catalog.item(300, "No File Mod", Some(6)); // no file registered
        catalog.requires(1000, 300);

        let instance = empty_instance();
        let resolver = DependencyResolver::new(&catalog);
        let groups = resolver
            .resolve(&instance, 100, ContentType::Mods, None)
            .await
            .unwrap();

        let mods = &groups[&ContentType::Mods];
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].id, 100);
        // The failed child id is filtered out of the dependency list.
        assert!(mods[0].dependencies.is_empty());
    }

    #[tokio::test]
    async fn optional_dependencies_are_not_followed() {
        let mut catalog = FakeCatalog::default();
        catalog.item(100, "Root Mod", Some(6)).file(100, 1000);
        catalog.item(400, "Nice To Have", Some(6)).file(400, 4000);
        catalog.optional(1000, 400);

        let instance = empty_instance();
        let resolver = DependencyResolver::new(&catalog);
        let groups = resolver
            .resolve(&instance, 100, ContentType::Mods, None)
            .await
            .unwrap();

        assert_eq!(groups[&ContentType::Mods].len(), 1);
    }

    #[tokio::test]
    async fn already_present_entry_satisfies_without_new_entry() {
        let mut catalog = FakeCatalog::default();
        catalog.item(100, "Root Mod", Some(6)).file(100, 1000);
        catalog.requires(1000, 200);

        // 200 already installed — in a *different* collection; the presence
        // check is instance-wide.
        let mut instance = empty_instance();
        instance.resourcepacks.push(ContentEntry {
            id: 200,
            name: "Installed Pack".to_string(),
            file_id: 2000,
            file_name: "pack.zip".to_string(),
            file_url: "https://files.example/2000".to_string(),
            file_size: 10,
            enabled: true,
            dependencies: Vec::new(),
        });

        let resolver = DependencyResolver::new(&catalog);
        let groups = resolver
            .resolve(&instance, 100, ContentType::Mods, None)
            .await
            .unwrap();

        let mods = &groups[&ContentType::Mods];
        assert_eq!(mods.len(), 1);
        // Still referenced as a dependency.
        assert_eq!(mods[0].dependencies, vec![200]);
    }

    #[tokio::test]
    async fn classification_falls_back_to_parent_type() {
        let mut catalog = FakeCatalog::default();
        catalog.item(100, "Root Mod", Some(6)).file(100, 1000);
        // Unknown class id: classification falls back to the parent's type.
        catalog.item(500, "Odd Category", Some(999999)).file(500, 5000);
        catalog.requires(1000, 500);

        let instance = empty_instance();
        let resolver = DependencyResolver::new(&catalog);
        let groups = resolver
            .resolve(&instance, 100, ContentType::Mods, None)
            .await
            .unwrap();

        assert_eq!(groups[&ContentType::Mods].len(), 2);
    }

    #[tokio::test]
    async fn pinned_root_uses_the_exact_file() {
        let mut catalog = FakeCatalog::default();
        catalog.item(100, "Root Mod", Some(6)).file(100, 1000);
        catalog.older_file(100, 900);
        catalog.requires(1000, 200);

        let instance = empty_instance();
        let resolver = DependencyResolver::new(&catalog);
        let groups = resolver
            .resolve(&instance, 100, ContentType::Mods, Some(900))
            .await
            .unwrap();

        let mods = &groups[&ContentType::Mods];
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].file_id, 900);
        assert_eq!(mods[0].file_name, "content-100-900.jar");
        // Dependency edges of the best-match file do not apply to the
        // pinned one.
        assert!(mods[0].dependencies.is_empty());
    }

    #[tokio::test]
    async fn resolve_groups_by_classified_type() {
        let mut catalog = FakeCatalog::default();
        catalog.item(100, "Root Mod", Some(6)).file(100, 1000);
        catalog.item(700, "Paired Pack", Some(12)).file(700, 7000);
        catalog.requires(1000, 700);

        let instance = empty_instance();
        let resolver = DependencyResolver::new(&catalog);
        let groups = resolver
            .resolve(&instance, 100, ContentType::Mods, None)
            .await
            .unwrap();

        assert_eq!(groups[&ContentType::Mods].len(), 1);
        assert_eq!(groups[&ContentType::Resourcepacks].len(), 1);
        assert_eq!(groups[&ContentType::Resourcepacks][0].id, 700);
    }
}
