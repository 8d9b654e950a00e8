// ─── Catalog Interface ───
// The remote content directory is an external collaborator. The engine only
// defines the client trait and the slice of catalog data it consumes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::instance::LoaderKind;

/// One entry in an item's `latest_files_indexes` table: the newest file the
/// catalog offers for a (game version, loader) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIndex {
    pub game_version: String,
    pub file_id: u64,
    pub loader: Option<LoaderKind>,
}

/// Catalog item metadata, trimmed to what the engine needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: u64,
    pub name: String,
    /// Category class the catalog assigns (mods, resource packs, ...).
    pub class_id: Option<u32>,
    #[serde(default)]
    pub latest_files_indexes: Vec<FileIndex>,
}

/// A concrete downloadable file for a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub id: u64,
    pub file_name: String,
    pub download_url: String,
    pub file_length: u64,
}

/// How a file relates to another catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    EmbeddedLibrary,
    Optional,
    Required,
    Tool,
    Incompatible,
    Include,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDependency {
    /// Catalog id of the referenced item.
    pub content_id: u64,
    pub relation: Relation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub class_id: Option<u32>,
    pub game_version: Option<String>,
    pub loader: Option<LoaderKind>,
    pub page_index: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub index: u32,
    pub page_size: u32,
    pub result_count: u32,
    pub total_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<CatalogItem>,
    pub pagination: Pagination,
}

/// Client for the remote catalog API. Implemented by the host application;
/// the engine only consumes it.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> CoreResult<SearchPage>;

    async fn get_items(&self, ids: &[u64]) -> CoreResult<Vec<CatalogItem>>;

    /// Best matching file for an item given the target game version and,
    /// where it applies, the loader. `None` means the catalog has nothing
    /// compatible — callers treat that as "skip", not as an error.
    async fn get_file(
        &self,
        id: u64,
        game_version: &str,
        loader: Option<LoaderKind>,
    ) -> CoreResult<Option<CatalogFile>>;

    /// One specific file of an item, by file id. Used when the caller pins
    /// an exact version instead of taking the best match.
    async fn get_file_by_id(&self, content_id: u64, file_id: u64)
        -> CoreResult<Option<CatalogFile>>;

    async fn get_dependencies(&self, file_id: u64) -> CoreResult<Vec<FileDependency>>;
}
