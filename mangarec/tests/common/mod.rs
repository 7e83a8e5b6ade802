//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mangarec::{
    CatalogueItem, CatalogueLookup, Clock, DatasetLoader, FeatureStore, InteractionRecord,
    InteractionSource, ItemFeatures, ItemId, LikeStatus, ReadingStatus, RecError, Result,
    UserInteraction,
};

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn item(id: ItemId, features: Vec<f64>) -> ItemFeatures {
    ItemFeatures {
        id,
        title: format!("Manga {id}"),
        average_score: 0.0,
        genres: BTreeSet::new(),
        features,
    }
}

pub fn item_with_genres(id: ItemId, features: Vec<f64>, genres: &[&str]) -> ItemFeatures {
    ItemFeatures { genres: genres.iter().map(|g| g.to_string()).collect(), ..item(id, features) }
}

pub fn store(items: Vec<ItemFeatures>) -> Arc<FeatureStore> {
    Arc::new(FeatureStore::from_items(items).unwrap())
}

/// A = [1,0,0,0], B = [1,0,0,0], C = [0,1,0,0].
pub fn three_item_store() -> Arc<FeatureStore> {
    store(vec![
        item(1, vec![1.0, 0.0, 0.0, 0.0]),
        item(2, vec![1.0, 0.0, 0.0, 0.0]),
        item(3, vec![0.0, 1.0, 0.0, 0.0]),
    ])
}

pub fn liked(item_id: ItemId) -> UserInteraction {
    UserInteraction::new(item_id, LikeStatus::Like, ReadingStatus::Completed)
}

pub fn disliked(item_id: ItemId) -> UserInteraction {
    UserInteraction::new(item_id, LikeStatus::Dislike, ReadingStatus::Completed)
}

pub fn record(user_id: &str, interaction: UserInteraction) -> InteractionRecord {
    InteractionRecord { user_id: user_id.to_string(), interaction }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(Utc::now()) })
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Catalogue that serves every id except the ones marked as failing.
#[derive(Debug, Default)]
pub struct FakeCatalogue {
    pub failing: HashSet<ItemId>,
}

impl FakeCatalogue {
    pub fn failing(ids: impl IntoIterator<Item = ItemId>) -> Self {
        Self { failing: ids.into_iter().collect() }
    }
}

#[async_trait]
impl CatalogueLookup for FakeCatalogue {
    async fn get_item_by_id(&self, id: ItemId) -> Result<CatalogueItem> {
        if self.failing.contains(&id) {
            return Err(RecError::collaborator("catalogue", format!("lookup of {id} timed out")));
        }
        Ok(CatalogueItem {
            id,
            title: format!("Catalogue title {id}"),
            cover_image: Some(format!("https://covers.example/{id}.jpg")),
            ..CatalogueItem::default()
        })
    }
}

/// Interaction source that fails a fixed number of times before succeeding.
#[derive(Debug, Default)]
pub struct FlakyInteractions {
    pub records: Vec<InteractionRecord>,
    pub failures: u32,
    pub calls: AtomicU32,
}

impl FlakyInteractions {
    pub fn new(records: Vec<InteractionRecord>, failures: u32) -> Self {
        Self { records, failures, calls: AtomicU32::new(0) }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InteractionSource for FlakyInteractions {
    async fn load_all_user_interactions(&self) -> Result<Vec<InteractionRecord>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(RecError::collaborator("interactions", "database unavailable"));
        }
        Ok(self.records.clone())
    }
}

/// Dataset loader that fails a fixed number of times before serving `data`.
#[derive(Debug, Default)]
pub struct FlakyLoader {
    pub data: String,
    pub failures: u32,
    pub calls: AtomicU32,
}

impl FlakyLoader {
    pub fn new(data: impl Into<String>, failures: u32) -> Self {
        Self { data: data.into(), failures, calls: AtomicU32::new(0) }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetLoader for FlakyLoader {
    async fn read_feature_dataset(&self) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(RecError::collaborator("dataset", "storage unavailable"));
        }
        Ok(self.data.clone())
    }
}

pub const DATASET: &str = "\
id,title,average_score,popularity,Action,Comedy,Romance,4-koma,f1,f2,f3
1,Berserk,92,100,1,0,0,0,0.9,0.1,0.0
2,Vagabond,90,80,1,0,0,0,0.8,0.2,0.1
3,Yotsuba&!,88,70,0,1,0,1,0.0,0.9,0.2
4,Nana,85,60,0,0,1,0,0.1,0.3,0.9
";
