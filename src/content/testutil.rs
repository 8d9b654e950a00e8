use std::collections::HashMap;

use async_trait::async_trait;

use crate::catalog::{
    CatalogClient, CatalogFile, CatalogItem, FileDependency, Relation, SearchPage, SearchQuery,
};
use crate::error::CoreResult;
use crate::instance::LoaderKind;

/// In-memory catalog for tests: items, one file per item (or none), and
/// per-file dependency edges.
#[derive(Default)]
pub(crate) struct FakeCatalog {
    items: HashMap<u64, CatalogItem>,
    files: HashMap<u64, CatalogFile>,
    files_by_id: HashMap<(u64, u64), CatalogFile>,
    dependencies: HashMap<u64, Vec<FileDependency>>,
}

impl FakeCatalog {
    pub fn item(&mut self, id: u64, name: &str, class_id: Option<u32>) -> &mut Self {
        self.items.insert(
            id,
            CatalogItem {
                id,
                name: name.to_string(),
                class_id,
                latest_files_indexes: Vec::new(),
            },
        );
        self
    }

    pub fn file(&mut self, content_id: u64, file_id: u64) -> &mut Self {
        self.file_sized(content_id, file_id, 4096)
    }

    pub fn file_sized(&mut self, content_id: u64, file_id: u64, file_length: u64) -> &mut Self {
        let file = CatalogFile {
            id: file_id,
            file_name: format!("content-{content_id}.jar"),
            download_url: format!("https://files.example/{file_id}"),
            file_length,
        };
        self.files_by_id
            .insert((content_id, file_id), file.clone());
        self.files.insert(content_id, file);
        self
    }

    /// A file reachable only by explicit id, never via the best-match
    /// lookup. Stands in for a superseded version of the item.
    pub fn older_file(&mut self, content_id: u64, file_id: u64) -> &mut Self {
        self.files_by_id.insert(
            (content_id, file_id),
            CatalogFile {
                id: file_id,
                file_name: format!("content-{content_id}-{file_id}.jar"),
                download_url: format!("https://files.example/{file_id}"),
                file_length: 4096,
            },
        );
        self
    }

    pub fn requires(&mut self, file_id: u64, dep_content_id: u64) -> &mut Self {
        self.dependencies
            .entry(file_id)
            .or_default()
            .push(FileDependency {
                content_id: dep_content_id,
                relation: Relation::Required,
            });
        self
    }

    pub fn optional(&mut self, file_id: u64, dep_content_id: u64) -> &mut Self {
        self.dependencies
            .entry(file_id)
            .or_default()
            .push(FileDependency {
                content_id: dep_content_id,
                relation: Relation::Optional,
            });
        self
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn search(&self, _query: &SearchQuery) -> CoreResult<SearchPage> {
        unimplemented!("search is not exercised through the fake")
    }

    async fn get_items(&self, ids: &[u64]) -> CoreResult<Vec<CatalogItem>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.items.get(id).cloned())
            .collect())
    }

    async fn get_file(
        &self,
        id: u64,
        _game_version: &str,
        _loader: Option<LoaderKind>,
    ) -> CoreResult<Option<CatalogFile>> {
        Ok(self.files.get(&id).cloned())
    }

    async fn get_file_by_id(
        &self,
        content_id: u64,
        file_id: u64,
    ) -> CoreResult<Option<CatalogFile>> {
        Ok(self.files_by_id.get(&(content_id, file_id)).cloned())
    }

    async fn get_dependencies(&self, file_id: u64) -> CoreResult<Vec<FileDependency>> {
        Ok(self.dependencies.get(&file_id).cloned().unwrap_or_default())
    }
}
