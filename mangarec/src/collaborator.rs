//! Narrow interfaces to the systems the engine depends on.
//!
//! The engine never talks to storage or the catalogue API directly; the
//! surrounding application supplies implementations of these traits.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{RecError, Result};
use crate::model::{CatalogueItem, InteractionRecord, ItemId};

/// Source of the raw item feature dataset, read once at startup.
#[async_trait]
pub trait DatasetLoader: Send + Sync {
    /// Return the raw delimited dataset text.
    async fn read_feature_dataset(&self) -> Result<String>;
}

/// Bulk source of every user's list, used to populate the collaborative scorer.
#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Return one record per (user, item) pair.
    async fn load_all_user_interactions(&self) -> Result<Vec<InteractionRecord>>;
}

/// Catalogue lookup used to hydrate recommendations with display metadata.
///
/// # Example
///
/// ```rust,ignore
/// use mangarec::CatalogueLookup;
///
/// let item = catalogue.get_item_by_id(30002).await?;
/// println!("{} ({:?})", item.title, item.average_score);
/// ```
#[async_trait]
pub trait CatalogueLookup: Send + Sync {
    /// Fetch display metadata for one item.
    async fn get_item_by_id(&self, id: ItemId) -> Result<CatalogueItem>;
}

/// Reads the dataset from a file on disk.
#[derive(Debug, Clone)]
pub struct FileDatasetLoader {
    path: PathBuf,
}

impl FileDatasetLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DatasetLoader for FileDatasetLoader {
    async fn read_feature_dataset(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path).await.map_err(RecError::from)
    }
}

/// Serves a dataset held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticDatasetLoader {
    data: String,
}

impl StaticDatasetLoader {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl DatasetLoader for StaticDatasetLoader {
    async fn read_feature_dataset(&self) -> Result<String> {
        Ok(self.data.clone())
    }
}
