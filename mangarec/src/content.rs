//! Content-based scoring over item feature vectors.
//!
//! The user's list is folded into a single profile vector, weighted by each
//! item's like status. Every unexcluded catalogue item is then ranked by
//! cosine similarity to that profile, adjusted by experience level, genre
//! overlap, and community score.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::RecommenderConfig;
use crate::error::{RecError, Result};
use crate::feature_store::FeatureStore;
use crate::model::{ItemFeatures, ItemId, MatchDetails, ScoredItem, UserInteraction, UserProfile};
use crate::scorer::{Scorer, ScoringRequest, sort_by_score};
use crate::similarity::{cosine_similarity, genre_overlap};

/// Number of catalogue items scored per batch.
const BATCH_SIZE: usize = 1000;

/// Raw similarity of a candidate and the experience multiplier applied to it.
#[derive(Debug, Clone, Copy)]
struct Adjustment {
    similarity: f64,
    experience_weight: f64,
}

/// Ranks items by similarity to a weighted profile of the user's list.
///
/// # Example
///
/// ```rust,ignore
/// use mangarec::{ContentBasedScorer, Scorer};
///
/// let scorer = ContentBasedScorer::new(store.clone());
/// let ranked = scorer.score(&request).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ContentBasedScorer {
    store: Arc<FeatureStore>,
}

impl ContentBasedScorer {
    pub fn new(store: Arc<FeatureStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    /// Build the user's feature profile.
    ///
    /// Each listed item contributes its feature vector scaled by the weight for
    /// its like status; the sum is divided by the total absolute weight. A
    /// zero total weight yields the zero vector.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Validation`] if none of `interactions` is in the
    /// store, and [`RecError::Internal`] on a feature dimension mismatch.
    pub fn user_profile(
        &self,
        interactions: &[UserInteraction],
        config: &RecommenderConfig,
    ) -> Result<Vec<f64>> {
        let rated: Vec<(&ItemFeatures, f64)> = interactions
            .iter()
            .filter_map(|i| {
                self.store.get(i.item_id).map(|item| (item, config.weight_for(i.like_status)))
            })
            .collect();
        if rated.is_empty() {
            return Err(RecError::Validation(
                "none of the user's items are in the catalogue".to_string(),
            ));
        }

        let dimension = self.store.feature_dimension()?;
        let mut profile = vec![0.0; dimension];
        let mut total_weight = 0.0;
        for (item, weight) in rated {
            if item.features.len() != dimension {
                return Err(RecError::Internal(format!(
                    "item {} has {} features, expected {dimension}",
                    item.id,
                    item.features.len()
                )));
            }
            for (acc, value) in profile.iter_mut().zip(&item.features) {
                *acc += value * weight;
            }
            total_weight += weight.abs();
        }
        if total_weight > 0.0 {
            for value in &mut profile {
                *value /= total_weight;
            }
        }
        Ok(profile)
    }

    /// Rank unexcluded items against the user's profile.
    ///
    /// Returns at most `min(request.limit, config.max_results)` candidates.
    ///
    /// # Errors
    ///
    /// See [`user_profile`](Self::user_profile).
    pub fn recommend(&self, request: &ScoringRequest<'_>) -> Result<Vec<ScoredItem>> {
        let config = request.config;
        let profile = self.user_profile(request.interactions, config)?;
        let experience_weight =
            config.user_experience_weight.weight_for(request.profile.experience_level);

        let mut scored = Vec::new();
        for batch in self.store.all_ids().chunks(BATCH_SIZE) {
            for id in batch.iter().filter(|id| !request.exclude.contains(*id)) {
                let Some(item) = self.store.get(*id) else { continue };
                let similarity = cosine_similarity(&item.features, &profile)?;
                if similarity < config.min_similarity {
                    continue;
                }
                let adjust = Adjustment { similarity, experience_weight };
                let details = self.match_details(item, &profile, request.profile, config, adjust)?;
                scored.push(ScoredItem {
                    item_id: item.id,
                    score: details.overall_score,
                    match_details: Some(details),
                    neighbor_count: None,
                });
            }
        }

        let candidates = scored.len();
        sort_by_score(&mut scored);
        scored.truncate(request.limit.min(config.max_results));
        debug!(
            user_id = request.user_id,
            candidates,
            returned = scored.len(),
            "content scoring complete"
        );
        Ok(scored)
    }

    /// Whether any catalogue item lies outside `exclude`.
    pub fn has_more_candidates(&self, exclude: &HashSet<ItemId>) -> bool {
        self.store.all_ids().iter().any(|id| !exclude.contains(id))
    }

    fn match_details(
        &self,
        item: &ItemFeatures,
        profile: &[f64],
        user: &UserProfile,
        config: &RecommenderConfig,
        adjust: Adjustment,
    ) -> Result<MatchDetails> {
        let Adjustment { similarity, experience_weight } = adjust;
        let genre_match = genre_overlap(&item.genres, &user.favorite_genres);
        let score_match = item.average_score / 100.0;

        let mut adjusted = similarity * experience_weight;
        if config.genre_importance > 0.0 {
            adjusted *= 1.0 + genre_match * config.genre_importance;
        }
        if config.score_importance > 0.0 && item.average_score != 0.0 {
            adjusted *= 1.0 + score_match * config.score_importance;
        }

        let end = config.theme_features.end.min(profile.len());
        let start = config.theme_features.start.min(end);
        let theme_match = cosine_similarity(&item.features[start..end], &profile[start..end])?;

        Ok(MatchDetails {
            genre_match,
            theme_match,
            score_match,
            overall_score: adjusted.clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
impl Scorer for ContentBasedScorer {
    fn name(&self) -> &str {
        "content"
    }

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<Vec<ScoredItem>> {
        self.recommend(request)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::model::{ExperienceLevel, LikeStatus, ReadingStatus};

    fn item(id: ItemId, features: Vec<f64>) -> ItemFeatures {
        ItemFeatures {
            id,
            title: format!("Item {id}"),
            average_score: 0.0,
            genres: BTreeSet::new(),
            features,
        }
    }

    fn scorer() -> ContentBasedScorer {
        let store = FeatureStore::from_items(vec![
            item(1, vec![1.0, 0.0]),
            item(2, vec![0.0, 1.0]),
            item(3, vec![1.0, 1.0]),
        ])
        .unwrap();
        ContentBasedScorer::new(Arc::new(store))
    }

    fn listed(id: ItemId, like: LikeStatus) -> UserInteraction {
        UserInteraction::new(id, like, ReadingStatus::Completed)
    }

    #[test]
    fn profile_is_weighted_mean() {
        let config = RecommenderConfig::DEFAULT;
        let profile = scorer()
            .user_profile(&[listed(1, LikeStatus::Like), listed(2, LikeStatus::Dislike)], &config)
            .unwrap();
        // (2*[1,0] + -1*[0,1]) / 3
        assert!((profile[0] - 2.0 / 3.0).abs() < 1e-10);
        assert!((profile[1] + 1.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn zero_total_weight_gives_zero_profile() {
        let config = RecommenderConfig::builder().default_weight(0.0).build().unwrap();
        let profile =
            scorer().user_profile(&[listed(3, LikeStatus::Neutral)], &config).unwrap();
        assert_eq!(profile, vec![0.0, 0.0]);
    }

    #[test]
    fn unknown_items_only_is_a_validation_error() {
        let err = scorer()
            .user_profile(&[listed(99, LikeStatus::Like)], &RecommenderConfig::DEFAULT)
            .unwrap_err();
        assert!(matches!(err, RecError::Validation(_)));
        assert!(scorer().user_profile(&[], &RecommenderConfig::DEFAULT).is_err());
    }

    fn tagged(id: ItemId, features: Vec<f64>, genres: &[&str], average_score: f64) -> ItemFeatures {
        ItemFeatures {
            genres: genres.iter().map(|g| g.to_string()).collect(),
            average_score,
            ..item(id, features)
        }
    }

    /// Item 1 is the liked item; 2 and 3 point the same way with different metadata.
    fn boost_scorer() -> ContentBasedScorer {
        let store = FeatureStore::from_items(vec![
            tagged(1, vec![1.0, 0.0], &["Action"], 0.0),
            tagged(2, vec![1.0, 0.0], &["Action", "Drama"], 80.0),
            tagged(3, vec![1.0, 0.0], &[], 0.0),
        ])
        .unwrap();
        ContentBasedScorer::new(Arc::new(store))
    }

    /// Score a single item for a user who liked item 1.
    fn scored_item(
        scorer: &ContentBasedScorer,
        profile: &UserProfile,
        config: &RecommenderConfig,
        id: ItemId,
    ) -> ScoredItem {
        let interactions = [listed(1, LikeStatus::Like)];
        let exclude = HashSet::from([1]);
        let request = ScoringRequest {
            user_id: "u",
            interactions: &interactions,
            profile,
            config,
            exclude: &exclude,
            limit: 10,
        };
        scorer.recommend(&request).unwrap().into_iter().find(|s| s.item_id == id).unwrap()
    }

    fn user(genres: &[&str], level: ExperienceLevel) -> UserProfile {
        UserProfile::new(genres.iter().copied(), level)
    }

    #[test]
    fn experience_level_scales_similarity() {
        let scorer = boost_scorer();
        let config = RecommenderConfig::DEFAULT;

        let new = scored_item(&scorer, &user(&[], ExperienceLevel::New), &config, 3);
        assert!((new.score - 0.7).abs() < 1e-10);
        let mid = scored_item(&scorer, &user(&[], ExperienceLevel::Intermediate), &config, 3);
        assert!((mid.score - 1.0).abs() < 1e-10);
        let details = mid.match_details.unwrap();
        assert_eq!(details.genre_match, 0.0);
        assert_eq!(details.score_match, 0.0);
        assert_eq!(details.overall_score, mid.score);
    }

    #[test]
    fn genre_and_score_boosts_multiply() {
        let scorer = boost_scorer();
        let config = RecommenderConfig::builder()
            .genre_importance(0.2)
            .score_importance(0.25)
            .build()
            .unwrap();
        let fan = user(&["Action"], ExperienceLevel::New);

        let boosted = scored_item(&scorer, &fan, &config, 2);
        // 0.7 * (1 + 0.5 * 0.2) * (1 + 0.8 * 0.25)
        assert!((boosted.score - 0.924).abs() < 1e-10, "score = {}", boosted.score);
        let details = boosted.match_details.unwrap();
        assert!((details.genre_match - 0.5).abs() < 1e-10);
        assert!((details.score_match - 0.8).abs() < 1e-10);

        let plain = scored_item(&scorer, &fan, &config, 3);
        assert!((plain.score - 0.7).abs() < 1e-10);
    }

    #[test]
    fn zero_importance_disables_boosts() {
        let scorer = boost_scorer();
        let config = RecommenderConfig::builder()
            .genre_importance(0.0)
            .score_importance(0.0)
            .build()
            .unwrap();
        let fan = user(&["Action"], ExperienceLevel::New);
        let scored = scored_item(&scorer, &fan, &config, 2);
        assert!((scored.score - 0.7).abs() < 1e-10);
    }

    #[test]
    fn adjusted_score_is_clamped_to_one() {
        let scorer = boost_scorer();
        let config = RecommenderConfig::DEFAULT;

        // 1.0 * 1.5 * 1.4 before clamping.
        let fan = user(&["Action"], ExperienceLevel::Intermediate);
        let boosted = scored_item(&scorer, &fan, &config, 2);
        assert_eq!(boosted.score, 1.0);
        assert_eq!(boosted.match_details.unwrap().overall_score, 1.0);

        let veteran = scored_item(&scorer, &user(&[], ExperienceLevel::Experienced), &config, 3);
        assert_eq!(veteran.score, 1.0);
    }

    #[test]
    fn theme_match_uses_configured_slice() {
        let store = FeatureStore::from_items(vec![
            item(1, vec![1.0, 0.5, 0.5, 0.0]),
            item(2, vec![0.0, 1.0, 1.0, 0.0]),
        ])
        .unwrap();
        let scorer = ContentBasedScorer::new(Arc::new(store));
        let profile = UserProfile::default();

        let config = RecommenderConfig::builder().theme_features(1..3).build().unwrap();
        let scored = scored_item(&scorer, &profile, &config, 2);
        let details = scored.match_details.unwrap();
        assert!((details.theme_match - 1.0).abs() < 1e-10);
        // Theme does not feed into the score: 1 / sqrt(3).
        assert!((scored.score - 1.0 / 3f64.sqrt()).abs() < 1e-10);

        // The default 20..30 slice lies past a 4-wide vector.
        let scored = scored_item(&scorer, &profile, &RecommenderConfig::DEFAULT, 2);
        assert_eq!(scored.match_details.unwrap().theme_match, 0.0);
    }

    #[test]
    fn has_more_candidates_respects_exclusions() {
        let scorer = scorer();
        assert!(scorer.has_more_candidates(&HashSet::from([1, 2])));
        assert!(!scorer.has_more_candidates(&HashSet::from([1, 2, 3])));
    }
}
