//! Data types for catalogue items, user interactions, and scored output.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identifier of a catalogue item. Always positive.
pub type ItemId = u64;

/// Identifier of a user, as issued by the surrounding application.
pub type UserId = String;

/// Numeric features and metadata for one catalogue item.
///
/// Every item in a [`FeatureStore`](crate::FeatureStore) carries a feature
/// vector of the same length, and dimension `k` means the same signal for
/// every item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemFeatures {
    /// Unique identifier of the item.
    pub id: ItemId,
    /// Display title.
    pub title: String,
    /// Community average score in `[0, 100]`.
    pub average_score: f64,
    /// Genre tags set on the item.
    pub genres: BTreeSet<String>,
    /// Fixed-length feature vector.
    pub features: Vec<f64>,
}

/// Like/dislike signal a user attached to an item.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LikeStatus {
    Like,
    Dislike,
    /// No signal recorded.
    #[default]
    #[serde(rename = "none")]
    Neutral,
}

/// Progress of a user through an item.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingStatus {
    Reading,
    Completed,
    #[default]
    PlanToRead,
}

/// One entry of a user's list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UserInteraction {
    pub item_id: ItemId,
    #[serde(default)]
    pub like_status: LikeStatus,
    #[serde(default)]
    pub reading_status: ReadingStatus,
}

impl UserInteraction {
    pub fn new(item_id: ItemId, like_status: LikeStatus, reading_status: ReadingStatus) -> Self {
        Self { item_id, like_status, reading_status }
    }
}

/// A [`UserInteraction`] tagged with its owner, as returned by a bulk
/// [`InteractionSource`](crate::InteractionSource).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    pub user_id: UserId,
    #[serde(flatten)]
    pub interaction: UserInteraction,
}

/// Self-reported reading experience of a user.
///
/// Unrecognized values deserialize as [`ExperienceLevel::Intermediate`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ExperienceLevel {
    New,
    #[default]
    Intermediate,
    Experienced,
}

impl From<&str> for ExperienceLevel {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Self::New,
            "experienced" => Self::Experienced,
            _ => Self::Intermediate,
        }
    }
}

impl From<String> for ExperienceLevel {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

/// Caller-supplied preferences used by the content-based scorer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub favorite_genres: BTreeSet<String>,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
}

impl UserProfile {
    pub fn new<I, S>(favorite_genres: I, experience_level: ExperienceLevel) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            favorite_genres: favorite_genres.into_iter().map(Into::into).collect(),
            experience_level,
        }
    }
}

/// Sub-score breakdown attached to content-based candidates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchDetails {
    /// Overlap between the item's genres and the user's favorites.
    pub genre_match: f64,
    /// Similarity over the theme slice of the feature vector.
    pub theme_match: f64,
    /// Average score normalized to `[0, 1]`.
    pub score_match: f64,
    /// Final adjusted similarity.
    pub overall_score: f64,
}

/// A candidate produced by a [`Scorer`](crate::Scorer).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredItem {
    pub item_id: ItemId,
    /// Ranking score (higher is better).
    pub score: f64,
    /// Set by the content-based scorer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_details: Option<MatchDetails>,
    /// Set by the collaborative scorer: how many users in the whole matrix rated the item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbor_count: Option<usize>,
}

/// Display metadata for an item, as returned by the catalogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogueItem {
    pub id: ItemId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub creators: Vec<String>,
}

impl From<&ItemFeatures> for CatalogueItem {
    fn from(item: &ItemFeatures) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            genres: item.genres.iter().cloned().collect(),
            average_score: Some(item.average_score),
            ..Self::default()
        }
    }
}

/// A hydrated recommendation returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    #[serde(flatten)]
    pub item: CatalogueItem,
    /// Final blended score.
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_details: Option<MatchDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbor_count: Option<usize>,
}

/// Where a page of recommendations came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Fresh,
}

/// A page of recommendations, as returned by
/// [`RecommendationEngine::get_recommendations`](crate::RecommendationEngine::get_recommendations).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationPage {
    pub items: Vec<Recommendation>,
    /// More candidates survived filtering than fit in this page.
    ///
    /// Only candidates ranked below the page count. Items dropped during
    /// hydration are neither shown nor counted.
    pub has_more: bool,
    /// Wall-clock time spent serving the request.
    pub timing_ms: u64,
    pub source: Source,
}

impl RecommendationPage {
    /// Ids of the recommended items, in ranking order.
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|r| r.item.id).collect()
    }
}

/// A neighbor of a user in the collaborative matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSimilarity {
    pub user_id: UserId,
    pub similarity: f64,
}

/// Diagnostic view of a user's position in the collaborative matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSimilarityInfo {
    pub similar_users: Vec<UserSimilarity>,
    pub total_users: usize,
    pub user_item_count: usize,
}

/// Response of [`RecommendationEngine::clear_history`](crate::RecommendationEngine::clear_history).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearHistoryResult {
    pub success: bool,
}
