//! Configuration for scoring, blending, and caching.

use std::ops::Range;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RecError, Result};
use crate::model::{ExperienceLevel, LikeStatus, ReadingStatus};

/// Multiplier applied to the content-based score per [`ExperienceLevel`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExperienceWeights {
    pub new: f64,
    pub intermediate: f64,
    pub experienced: f64,
}

impl ExperienceWeights {
    /// Weight for the given level.
    pub fn weight_for(&self, level: ExperienceLevel) -> f64 {
        match level {
            ExperienceLevel::New => self.new,
            ExperienceLevel::Intermediate => self.intermediate,
            ExperienceLevel::Experienced => self.experienced,
        }
    }
}

impl Default for ExperienceWeights {
    fn default() -> Self {
        RecommenderConfig::DEFAULT.user_experience_weight
    }
}

/// Tuning parameters for the content-based scorer.
///
/// The engine never mutates a config; per-request changes go through
/// [`RecommenderConfig::merge`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommenderConfig {
    /// Candidates with raw similarity below this floor are discarded.
    pub min_similarity: f64,
    /// Weight of liked items when folding them into the user profile.
    pub weight_likes: f64,
    /// Weight of disliked items (usually negative).
    pub weight_dislikes: f64,
    /// Weight of items without a like/dislike signal.
    pub default_weight: f64,
    /// How strongly genre overlap boosts the score.
    pub genre_importance: f64,
    /// How strongly the theme slice is weighted in reporting.
    pub theme_importance: f64,
    /// How strongly the community score boosts the score.
    pub score_importance: f64,
    /// Per-experience multiplier.
    pub user_experience_weight: ExperienceWeights,
    /// Upper bound on the number of candidates one scorer call returns.
    pub max_results: usize,
    /// Feature indices treated as theme signals.
    pub theme_features: Range<usize>,
}

impl RecommenderConfig {
    /// The documented default configuration.
    pub const DEFAULT: RecommenderConfig = RecommenderConfig {
        min_similarity: 0.1,
        weight_likes: 2.0,
        weight_dislikes: -1.0,
        default_weight: 1.0,
        genre_importance: 1.0,
        theme_importance: 0.8,
        score_importance: 0.5,
        user_experience_weight: ExperienceWeights { new: 0.7, intermediate: 1.0, experienced: 1.3 },
        max_results: 20,
        theme_features: 20..30,
    };

    /// Create a new builder for constructing a [`RecommenderConfig`].
    pub fn builder() -> RecommenderConfigBuilder {
        RecommenderConfigBuilder::default()
    }

    /// Profile weight for an item with the given like status.
    pub fn weight_for(&self, status: LikeStatus) -> f64 {
        match status {
            LikeStatus::Like => self.weight_likes,
            LikeStatus::Dislike => self.weight_dislikes,
            LikeStatus::Neutral => self.default_weight,
        }
    }

    /// Apply `overrides` on top of `defaults`. Pure: neither input is modified.
    pub fn merge(defaults: &RecommenderConfig, overrides: &RecommenderConfigOverrides) -> Self {
        Self {
            min_similarity: overrides.min_similarity.unwrap_or(defaults.min_similarity),
            weight_likes: overrides.weight_likes.unwrap_or(defaults.weight_likes),
            weight_dislikes: overrides.weight_dislikes.unwrap_or(defaults.weight_dislikes),
            default_weight: overrides.default_weight.unwrap_or(defaults.default_weight),
            genre_importance: overrides.genre_importance.unwrap_or(defaults.genre_importance),
            theme_importance: overrides.theme_importance.unwrap_or(defaults.theme_importance),
            score_importance: overrides.score_importance.unwrap_or(defaults.score_importance),
            user_experience_weight: overrides
                .user_experience_weight
                .unwrap_or(defaults.user_experience_weight),
            max_results: overrides.max_results.unwrap_or(defaults.max_results),
            theme_features: overrides
                .theme_features
                .clone()
                .unwrap_or_else(|| defaults.theme_features.clone()),
        }
    }

    /// Validate caller-supplied settings.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Validation`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(RecError::Validation)
    }

    /// Resolve the settings blob a user has stored.
    ///
    /// Missing or invalid settings fall back to [`RecommenderConfig::DEFAULT`].
    pub fn resolve_stored(stored: Option<&serde_json::Value>) -> Self {
        let Some(value) = stored else {
            return Self::default();
        };
        let resolved = serde_json::from_value::<RecommenderConfigOverrides>(value.clone())
            .map_err(RecError::from)
            .and_then(|overrides| {
                let config = Self::merge(&Self::DEFAULT, &overrides);
                config.validate().map(|()| config)
            });
        match resolved {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "stored recommendation settings are invalid, using defaults");
                Self::default()
            }
        }
    }

    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        let weights = [
            ("min_similarity", self.min_similarity),
            ("weight_likes", self.weight_likes),
            ("weight_dislikes", self.weight_dislikes),
            ("default_weight", self.default_weight),
            ("genre_importance", self.genre_importance),
            ("theme_importance", self.theme_importance),
            ("score_importance", self.score_importance),
            ("user_experience_weight.new", self.user_experience_weight.new),
            ("user_experience_weight.intermediate", self.user_experience_weight.intermediate),
            ("user_experience_weight.experienced", self.user_experience_weight.experienced),
        ];
        if let Some((name, value)) = weights.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("{name} must be finite (got {value})"));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(format!("min_similarity must be in [0, 1] (got {})", self.min_similarity));
        }
        if self.weight_likes < 0.0 {
            return Err(format!("weight_likes must be non-negative (got {})", self.weight_likes));
        }
        for (name, value) in [
            ("genre_importance", self.genre_importance),
            ("theme_importance", self.theme_importance),
            ("score_importance", self.score_importance),
        ] {
            if value < 0.0 {
                return Err(format!("{name} must be non-negative (got {value})"));
            }
        }
        if self.max_results == 0 {
            return Err("max_results must be greater than zero".to_string());
        }
        if self.theme_features.start > self.theme_features.end {
            return Err(format!(
                "theme_features start ({}) must not exceed end ({})",
                self.theme_features.start, self.theme_features.end
            ));
        }
        Ok(())
    }
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Builder for constructing a validated [`RecommenderConfig`].
#[derive(Debug, Clone, Default)]
pub struct RecommenderConfigBuilder {
    config: RecommenderConfig,
}

impl RecommenderConfigBuilder {
    /// Set the minimum raw similarity a candidate needs.
    pub fn min_similarity(mut self, value: f64) -> Self {
        self.config.min_similarity = value;
        self
    }

    /// Set the profile weight of liked items.
    pub fn weight_likes(mut self, value: f64) -> Self {
        self.config.weight_likes = value;
        self
    }

    /// Set the profile weight of disliked items.
    pub fn weight_dislikes(mut self, value: f64) -> Self {
        self.config.weight_dislikes = value;
        self
    }

    /// Set the profile weight of items without a like/dislike signal.
    pub fn default_weight(mut self, value: f64) -> Self {
        self.config.default_weight = value;
        self
    }

    /// Set the genre-overlap boost.
    pub fn genre_importance(mut self, value: f64) -> Self {
        self.config.genre_importance = value;
        self
    }

    /// Set the theme weighting.
    pub fn theme_importance(mut self, value: f64) -> Self {
        self.config.theme_importance = value;
        self
    }

    /// Set the community-score boost.
    pub fn score_importance(mut self, value: f64) -> Self {
        self.config.score_importance = value;
        self
    }

    /// Set the per-experience multipliers.
    pub fn user_experience_weight(mut self, weights: ExperienceWeights) -> Self {
        self.config.user_experience_weight = weights;
        self
    }

    /// Set the per-call result cap.
    pub fn max_results(mut self, value: usize) -> Self {
        self.config.max_results = value;
        self
    }

    /// Set the feature indices treated as theme signals.
    pub fn theme_features(mut self, range: Range<usize>) -> Self {
        self.config.theme_features = range;
        self
    }

    /// Build the [`RecommenderConfig`], validating every field.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Config`] if:
    /// - `min_similarity` is outside `[0, 1]`
    /// - `weight_likes` or any importance is negative
    /// - any weight is NaN or infinite
    /// - `max_results == 0`
    pub fn build(self) -> Result<RecommenderConfig> {
        self.config.check().map_err(RecError::Config)?;
        Ok(self.config)
    }
}

/// Partial settings layered over a base [`RecommenderConfig`].
///
/// This is the shape the surrounding application persists per user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecommenderConfigOverrides {
    pub min_similarity: Option<f64>,
    pub weight_likes: Option<f64>,
    pub weight_dislikes: Option<f64>,
    pub default_weight: Option<f64>,
    pub genre_importance: Option<f64>,
    pub theme_importance: Option<f64>,
    pub score_importance: Option<f64>,
    pub user_experience_weight: Option<ExperienceWeights>,
    pub max_results: Option<usize>,
    pub theme_features: Option<Range<usize>>,
}

/// Linear blend applied when both scorers contribute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BlendWeights {
    pub content: f64,
    pub collaborative: f64,
}

impl BlendWeights {
    /// Check that both weights are finite and non-negative and not both zero.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Config`] otherwise.
    pub fn validate(&self) -> Result<()> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if !valid(self.content) || !valid(self.collaborative) {
            return Err(RecError::Config(format!(
                "blend weights must be finite and non-negative (content {}, collaborative {})",
                self.content, self.collaborative
            )));
        }
        if self.content + self.collaborative == 0.0 {
            return Err(RecError::Config("blend weights must not both be zero".to_string()));
        }
        Ok(())
    }
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self { content: 0.6, collaborative: 0.4 }
    }
}

/// Per-[`ReadingStatus`] scaling of collaborative ratings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReadingMultipliers {
    pub completed: f64,
    pub reading: f64,
    pub plan_to_read: f64,
}

impl ReadingMultipliers {
    pub fn multiplier_for(&self, status: ReadingStatus) -> f64 {
        match status {
            ReadingStatus::Completed => self.completed,
            ReadingStatus::Reading => self.reading,
            ReadingStatus::PlanToRead => self.plan_to_read,
        }
    }
}

impl Default for ReadingMultipliers {
    fn default() -> Self {
        Self { completed: 1.0, reading: 0.8, plan_to_read: 0.5 }
    }
}

/// Tuning parameters for the collaborative scorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollaborativeConfig {
    /// Neighbors must be strictly more similar than this.
    pub min_similarity: f64,
    /// Minimum number of co-rated items before two users are compared.
    pub min_common_items: usize,
    /// Rating of a liked item before reading-status scaling; dislikes use its negation.
    pub like_value: f64,
    pub reading_multipliers: ReadingMultipliers,
}

impl CollaborativeConfig {
    /// # Errors
    ///
    /// Returns [`RecError::Config`] if `min_common_items < 2`, `like_value` is not
    /// positive, or any value is not finite.
    pub fn validate(&self) -> Result<()> {
        if self.min_common_items < 2 {
            return Err(RecError::Config(format!(
                "min_common_items must be at least 2 (got {})",
                self.min_common_items
            )));
        }
        if !self.like_value.is_finite() || self.like_value <= 0.0 {
            return Err(RecError::Config(format!(
                "like_value must be positive (got {})",
                self.like_value
            )));
        }
        let m = &self.reading_multipliers;
        if !self.min_similarity.is_finite()
            || ![m.completed, m.reading, m.plan_to_read].iter().all(|v| v.is_finite())
        {
            return Err(RecError::Config("collaborative weights must be finite".to_string()));
        }
        Ok(())
    }
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.1,
            min_common_items: 2,
            like_value: 1.0,
            reading_multipliers: ReadingMultipliers::default(),
        }
    }
}

/// Lifetimes of cached pages and of the per-user seen history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: TimeDelta,
    pub history_retention: TimeDelta,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: TimeDelta::minutes(30), history_retention: TimeDelta::hours(24) }
    }
}
