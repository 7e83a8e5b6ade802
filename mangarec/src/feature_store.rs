//! Immutable in-memory store of item feature vectors.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collaborator::DatasetLoader;
use crate::dataset::{DatasetLayout, RowIssue, parse_dataset};
use crate::error::{RecError, Result};
use crate::model::{ItemFeatures, ItemId};
use crate::retry::RetryPolicy;

/// Number of row issues echoed at `warn` level after a load.
const ISSUES_TO_REPORT: usize = 5;

/// Summary of a loaded [`FeatureStore`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct FeatureStats {
    pub total_items: usize,
    /// Rows that were skipped or adjusted while parsing.
    pub row_issues: usize,
    pub feature_dimension: usize,
}

/// Read-only map from item id to [`ItemFeatures`].
///
/// Built once at startup and shared by reference (usually behind an `Arc`)
/// across requests. Every item has the same feature dimension.
///
/// # Example
///
/// ```rust,ignore
/// use mangarec::{DatasetLayout, FeatureStore, FileDatasetLoader, RetryPolicy};
///
/// let loader = FileDatasetLoader::new("data/manga_features.csv");
/// let layout = DatasetLayout::default();
/// let store = FeatureStore::load(&loader, &layout, &RetryPolicy::default()).await?;
/// println!("{} items of dimension {}", store.len(), store.feature_dimension()?);
/// ```
#[derive(Debug, Default)]
pub struct FeatureStore {
    items: HashMap<ItemId, ItemFeatures>,
    ids: Vec<ItemId>,
    issues: Vec<RowIssue>,
}

impl FeatureStore {
    /// Build a store from already-parsed items.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Config`] if `items` is empty, contains a duplicate or
    /// zero id, or mixes feature dimensions.
    pub fn from_items(items: Vec<ItemFeatures>) -> Result<Self> {
        Self::with_issues(items, Vec::new())
    }

    /// Parse a raw dataset into a store.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Config`] if no valid row could be loaded.
    pub fn parse(raw: &str, layout: &DatasetLayout) -> Result<Self> {
        let parsed = parse_dataset(raw, layout)?;
        let store = Self::with_issues(parsed.items, parsed.issues)?;
        store.log_summary();
        Ok(store)
    }

    /// Read the dataset through `loader` and build the store.
    ///
    /// Transient read failures are retried according to `policy`. Parse
    /// failures are not retried.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Config`] once reads are exhausted or if the dataset
    /// yields no valid rows.
    pub async fn load(
        loader: &dyn DatasetLoader,
        layout: &DatasetLayout,
        policy: &RetryPolicy,
    ) -> Result<Self> {
        let raw = policy
            .run("read_feature_dataset", |_| loader.read_feature_dataset())
            .await
            .map_err(|e| {
                warn!(error = %e, "giving up on reading the feature dataset");
                RecError::Config(format!("failed to read feature dataset: {e}"))
            })?;
        Self::parse(&raw, layout)
    }

    fn with_issues(items: Vec<ItemFeatures>, issues: Vec<RowIssue>) -> Result<Self> {
        let Some(dimension) = items.first().map(|item| item.features.len()) else {
            return Err(RecError::Config("no valid items loaded".to_string()));
        };
        let mut map = HashMap::with_capacity(items.len());
        for item in items {
            if item.id == 0 {
                return Err(RecError::Config("item ids must be positive".to_string()));
            }
            if item.features.len() != dimension {
                return Err(RecError::Config(format!(
                    "item {} has {} features, expected {dimension}",
                    item.id,
                    item.features.len()
                )));
            }
            if map.insert(item.id, item).is_some() {
                return Err(RecError::Config("duplicate item id".to_string()));
            }
        }
        let mut ids: Vec<ItemId> = map.keys().copied().collect();
        ids.sort_unstable();
        Ok(Self { items: map, ids, issues })
    }

    fn log_summary(&self) {
        for issue in &self.issues {
            debug!(line = issue.line, reason = %issue.reason, "dataset row issue");
        }
        if !self.issues.is_empty() {
            let first: Vec<String> = self
                .issues
                .iter()
                .take(ISSUES_TO_REPORT)
                .map(|i| format!("line {}: {}", i.line, i.reason))
                .collect();
            warn!(count = self.issues.len(), first = ?first, "dataset had row issues");
        }
        info!(items = self.items.len(), rejected = self.issues.len(), "feature store loaded");
    }

    /// Look up one item.
    pub fn get(&self, id: ItemId) -> Option<&ItemFeatures> {
        self.items.get(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    /// All item ids in ascending order.
    pub fn all_ids(&self) -> &[ItemId] {
        &self.ids
    }

    /// Items in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemFeatures> {
        self.ids.iter().filter_map(|id| self.items.get(id))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Length of every feature vector in the store.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Config`] if the store is empty.
    pub fn feature_dimension(&self) -> Result<usize> {
        self.iter()
            .next()
            .map(|item| item.features.len())
            .ok_or_else(|| RecError::Config("feature store is empty".to_string()))
    }

    /// Rows skipped or adjusted while parsing.
    pub fn issues(&self) -> &[RowIssue] {
        &self.issues
    }

    pub fn stats(&self) -> FeatureStats {
        FeatureStats {
            total_items: self.len(),
            row_issues: self.issues.len(),
            feature_dimension: self.feature_dimension().unwrap_or(0),
        }
    }
}
