//! Scoring strategy trait.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::config::RecommenderConfig;
use crate::error::Result;
use crate::model::{ItemId, ScoredItem, UserInteraction, UserProfile};

/// Everything a scorer needs to rank candidates for one user.
#[derive(Debug, Clone, Copy)]
pub struct ScoringRequest<'a> {
    pub user_id: &'a str,
    /// The user's own list. Content scoring folds it into a profile.
    pub interactions: &'a [UserInteraction],
    pub profile: &'a UserProfile,
    pub config: &'a RecommenderConfig,
    /// Items that must never be returned.
    pub exclude: &'a HashSet<ItemId>,
    /// Maximum number of candidates to return.
    pub limit: usize,
}

/// A strategy that turns a [`ScoringRequest`] into ranked candidates.
///
/// Implementations return candidates sorted by descending score, never
/// include excluded items, and return at most `request.limit` entries.
///
/// # Example
///
/// ```rust,ignore
/// use mangarec::{Scorer, ScoringRequest};
///
/// let candidates = scorer.score(&request).await?;
/// for candidate in &candidates {
///     println!("{} -> {:.3}", candidate.item_id, candidate.score);
/// }
/// ```
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Rank candidates for the request.
    async fn score(&self, request: &ScoringRequest<'_>) -> Result<Vec<ScoredItem>>;
}

/// Sort candidates by descending score, breaking ties by ascending id.
pub(crate) fn sort_by_score(items: &mut [ScoredItem]) {
    items.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.item_id.cmp(&b.item_id)));
}
