//! User-based collaborative filtering.
//!
//! Keeps a live user × item matrix of every user's list. Users are compared
//! by cosine similarity over the ratings of the items they share, and a
//! user's candidates are the mean similarity-weighted ratings their
//! neighbors gave to items the user has not listed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::collaborator::InteractionSource;
use crate::config::CollaborativeConfig;
use crate::error::{RecError, Result};
use crate::model::{
    InteractionRecord, ItemId, LikeStatus, ScoredItem, UserId, UserInteraction, UserSimilarity,
    UserSimilarityInfo,
};
use crate::scorer::{Scorer, ScoringRequest, sort_by_score};
use crate::similarity::cosine_similarity;

type UserRow = HashMap<ItemId, UserInteraction>;

#[derive(Debug, Default)]
struct Matrix {
    users: HashMap<UserId, UserRow>,
    /// Number of users whose list contains each item.
    item_raters: HashMap<ItemId, usize>,
}

impl Matrix {
    fn remove_user(&mut self, user_id: &str) {
        let Some(row) = self.users.remove(user_id) else { return };
        for item_id in row.keys() {
            if let Some(count) = self.item_raters.get_mut(item_id) {
                *count -= 1;
                if *count == 0 {
                    self.item_raters.remove(item_id);
                }
            }
        }
    }

    fn insert_user(&mut self, user_id: UserId, row: UserRow) {
        for item_id in row.keys() {
            *self.item_raters.entry(*item_id).or_default() += 1;
        }
        self.users.insert(user_id, row);
    }
}

/// Recommends items liked by users with similar lists.
///
/// The matrix and the per-user neighbor cache are guarded separately. Locks
/// are always taken matrix first, then cache.
///
/// # Example
///
/// ```rust,ignore
/// use mangarec::{CollaborativeConfig, CollaborativeScorer};
///
/// let scorer = CollaborativeScorer::new(CollaborativeConfig::default())?;
/// scorer.load_all(&interaction_source).await?;
/// let info = scorer.user_similarity_info("user-1").await?;
/// ```
#[derive(Debug)]
pub struct CollaborativeScorer {
    config: CollaborativeConfig,
    matrix: RwLock<Matrix>,
    neighbors: Mutex<HashMap<UserId, Arc<Vec<UserSimilarity>>>>,
}

impl CollaborativeScorer {
    /// # Errors
    ///
    /// Returns [`RecError::Config`] if `config` fails validation.
    pub fn new(config: CollaborativeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, matrix: RwLock::default(), neighbors: Mutex::default() })
    }

    pub fn config(&self) -> &CollaborativeConfig {
        &self.config
    }

    /// Scalar rating of one interaction.
    ///
    /// Like and dislike map to `±like_value`, scaled by the reading-status
    /// multiplier. Items without a like status rate 0.
    pub fn rating_value(&self, interaction: &UserInteraction) -> f64 {
        let base = match interaction.like_status {
            LikeStatus::Like => self.config.like_value,
            LikeStatus::Dislike => -self.config.like_value,
            LikeStatus::Neutral => 0.0,
        };
        base * self.config.reading_multipliers.multiplier_for(interaction.reading_status)
    }

    /// Replace one user's row. An empty list removes the user.
    pub async fn update_user_interactions(
        &self,
        user_id: &str,
        interactions: Vec<UserInteraction>,
    ) {
        let row: UserRow = interactions.into_iter().map(|i| (i.item_id, i)).collect();
        let item_count = row.len();

        let mut matrix = self.matrix.write().await;
        matrix.remove_user(user_id);
        if !row.is_empty() {
            matrix.insert_user(user_id.to_string(), row);
        }
        // Other users' neighbor lists may include this user.
        self.neighbors.lock().await.clear();
        debug!(user_id, item_count, "updated user interactions");
    }

    /// Replace the whole matrix with `records`. Returns the number of users loaded.
    pub async fn replace_all(&self, records: Vec<InteractionRecord>) -> usize {
        let record_count = records.len();
        let mut rows: HashMap<UserId, UserRow> = HashMap::new();
        for record in records {
            rows.entry(record.user_id)
                .or_default()
                .insert(record.interaction.item_id, record.interaction);
        }

        let mut matrix = self.matrix.write().await;
        *matrix = Matrix::default();
        for (user_id, row) in rows {
            matrix.insert_user(user_id, row);
        }
        self.neighbors.lock().await.clear();

        let users = matrix.users.len();
        info!(users, records = record_count, "loaded user interaction matrix");
        users
    }

    /// Fetch every user's list from `source` and replace the matrix.
    ///
    /// # Errors
    ///
    /// Propagates the source's error; the existing matrix is left untouched.
    pub async fn load_all(&self, source: &dyn InteractionSource) -> Result<usize> {
        let records = source.load_all_user_interactions().await?;
        Ok(self.replace_all(records).await)
    }

    pub async fn user_count(&self) -> usize {
        self.matrix.read().await.users.len()
    }

    pub async fn contains_user(&self, user_id: &str) -> bool {
        self.matrix.read().await.users.contains_key(user_id)
    }

    /// Similarity between two users in the matrix; 0 if either is absent.
    pub async fn user_similarity(&self, a: &str, b: &str) -> f64 {
        let matrix = self.matrix.read().await;
        match (matrix.users.get(a), matrix.users.get(b)) {
            (Some(a), Some(b)) => self.row_similarity(a, b),
            _ => 0.0,
        }
    }

    /// Neighbors of `user_id` above the similarity floor, most similar first.
    pub async fn similar_users(&self, user_id: &str) -> Arc<Vec<UserSimilarity>> {
        let matrix = self.matrix.read().await;
        self.neighbors_of(&matrix, user_id).await
    }

    /// Diagnostic view of a user's neighborhood.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::NotFound`] if the user is not in the matrix.
    pub async fn user_similarity_info(&self, user_id: &str) -> Result<UserSimilarityInfo> {
        let matrix = self.matrix.read().await;
        let row = matrix.users.get(user_id).ok_or_else(|| RecError::not_found("user", user_id))?;
        let user_item_count = row.len();
        let similar_users = self.neighbors_of(&matrix, user_id).await.as_ref().clone();
        Ok(UserSimilarityInfo { similar_users, total_users: matrix.users.len(), user_item_count })
    }

    /// Rank items for `user_id`. Unknown users get an empty list.
    pub async fn recommend(
        &self,
        user_id: &str,
        limit: usize,
        exclude: &HashSet<ItemId>,
    ) -> Vec<ScoredItem> {
        let matrix = self.matrix.read().await;
        let Some(own) = matrix.users.get(user_id) else {
            debug!(user_id, "user not in interaction matrix");
            return Vec::new();
        };
        let neighbors = self.neighbors_of(&matrix, user_id).await;

        let mut totals: HashMap<ItemId, (f64, usize)> = HashMap::new();
        for neighbor in neighbors.iter() {
            let Some(row) = matrix.users.get(&neighbor.user_id) else { continue };
            for (item_id, interaction) in row {
                if own.contains_key(item_id) || exclude.contains(item_id) {
                    continue;
                }
                let entry = totals.entry(*item_id).or_default();
                entry.0 += self.rating_value(interaction) * neighbor.similarity;
                entry.1 += 1;
            }
        }

        let mut scored: Vec<ScoredItem> = totals
            .into_iter()
            .map(|(item_id, (sum, count))| ScoredItem {
                item_id,
                score: sum / count as f64,
                match_details: None,
                neighbor_count: Some(matrix.item_raters.get(&item_id).copied().unwrap_or(0)),
            })
            .collect();
        let candidates = scored.len();
        sort_by_score(&mut scored);
        scored.truncate(limit);
        debug!(
            user_id,
            neighbors = neighbors.len(),
            candidates,
            returned = scored.len(),
            "collaborative scoring complete"
        );
        scored
    }

    async fn neighbors_of(&self, matrix: &Matrix, user_id: &str) -> Arc<Vec<UserSimilarity>> {
        let mut cache = self.neighbors.lock().await;
        if let Some(cached) = cache.get(user_id) {
            return Arc::clone(cached);
        }
        let Some(own) = matrix.users.get(user_id) else {
            return Arc::default();
        };

        let mut similar: Vec<UserSimilarity> = matrix
            .users
            .iter()
            .filter(|(other, _)| other.as_str() != user_id)
            .filter_map(|(other, row)| {
                let similarity = self.row_similarity(own, row);
                (similarity > self.config.min_similarity)
                    .then(|| UserSimilarity { user_id: other.clone(), similarity })
            })
            .collect();
        similar.sort_by(|a, b| {
            b.similarity.total_cmp(&a.similarity).then_with(|| a.user_id.cmp(&b.user_id))
        });

        let similar = Arc::new(similar);
        cache.insert(user_id.to_string(), Arc::clone(&similar));
        similar
    }

    fn row_similarity(&self, a: &UserRow, b: &UserRow) -> f64 {
        let (ratings_a, ratings_b): (Vec<f64>, Vec<f64>) = a
            .iter()
            .filter_map(|(item_id, ia)| {
                b.get(item_id).map(|ib| (self.rating_value(ia), self.rating_value(ib)))
            })
            .unzip();
        if ratings_a.len() < self.config.min_common_items {
            return 0.0;
        }
        cosine_similarity(&ratings_a, &ratings_b).unwrap_or(0.0)
    }
}

impl Default for CollaborativeScorer {
    fn default() -> Self {
        Self {
            config: CollaborativeConfig::default(),
            matrix: RwLock::default(),
            neighbors: Mutex::default(),
        }
    }
}

#[async_trait]
impl Scorer for CollaborativeScorer {
    fn name(&self) -> &str {
        "collaborative"
    }

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<Vec<ScoredItem>> {
        Ok(self.recommend(request.user_id, request.limit, request.exclude).await)
    }
}
