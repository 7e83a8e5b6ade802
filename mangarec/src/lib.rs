//! # mangarec
//!
//! Personalized manga recommendations from a user's reading list.
//!
//! ## Overview
//!
//! The crate turns a user's list (likes, dislikes, reading progress) into a
//! ranked page of unseen catalogue items. It is a library boundary: storage,
//! the catalogue API and the transport layer are supplied by the caller
//! through [`DatasetLoader`], [`InteractionSource`] and [`CatalogueLookup`].
//!
//! - [`FeatureStore`] - immutable item feature vectors parsed from a dataset
//! - [`ContentBasedScorer`] - cosine similarity to a weighted user profile
//! - [`CollaborativeScorer`] - neighbor ratings from a live user × item matrix
//! - [`RecommendationCache`] - per-user result cache with TTL and seen history
//! - [`RecommendationEngine`] - orchestrates the above behind one entry point
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mangarec::{
//!     DatasetLayout, FeatureStore, FileDatasetLoader, RecommendationEngine,
//!     RecommendationRequest, RetryPolicy,
//! };
//!
//! let loader = FileDatasetLoader::new("data/manga_features.csv");
//! let store =
//!     FeatureStore::load(&loader, &DatasetLayout::default(), &RetryPolicy::default()).await?;
//!
//! let engine = RecommendationEngine::builder().feature_store(Arc::new(store)).build()?;
//! let page = engine
//!     .get_recommendations(RecommendationRequest::new("user-1", interactions))
//!     .await?;
//! for rec in &page.items {
//!     println!("{} ({:.2})", rec.item.title, rec.score);
//! }
//! ```
//!
//! ## Errors
//!
//! Every request-level failure is a [`RecError`]. "Nothing matched" is
//! [`RecError::NoMatch`], never an empty success.

mod cache;
mod collaborative;
mod collaborator;
mod config;
mod content;
mod dataset;
mod engine;
mod error;
mod feature_store;
mod model;
mod retry;
mod scorer;
mod similarity;

pub use cache::{CacheEntry, Clock, RecommendationCache, RequestSignature, SystemClock};
pub use collaborative::CollaborativeScorer;
pub use collaborator::{
    CatalogueLookup, DatasetLoader, FileDatasetLoader, InteractionSource, StaticDatasetLoader,
};
pub use config::{
    BlendWeights, CacheConfig, CollaborativeConfig, ExperienceWeights, ReadingMultipliers,
    RecommenderConfig, RecommenderConfigBuilder, RecommenderConfigOverrides,
};
pub use content::ContentBasedScorer;
pub use dataset::{DatasetLayout, ParsedDataset, RowIssue, parse_dataset};
pub use engine::{
    DEFAULT_LIMIT, RecommendationEngine, RecommendationEngineBuilder, RecommendationRequest,
    Strategy,
};
pub use error::{RecError, Result};
pub use feature_store::{FeatureStats, FeatureStore};
pub use model::{
    CatalogueItem, ClearHistoryResult, ExperienceLevel, InteractionRecord, ItemFeatures, ItemId,
    LikeStatus, MatchDetails, ReadingStatus, Recommendation, RecommendationPage, ScoredItem,
    Source, UserId, UserInteraction, UserProfile, UserSimilarity, UserSimilarityInfo,
};
pub use retry::RetryPolicy;
pub use scorer::{Scorer, ScoringRequest};
pub use similarity::{cosine_similarity, genre_overlap, magnitude};
