//! Recommendation orchestrator.
//!
//! [`RecommendationEngine`] is the public entry point. A request flows
//! through cache lookup, exclusion building, scoring, blending, filtering,
//! hydration, and finally a cache write:
//!
//! ```text
//! request ─► signature ─► cache hit? ──yes──► page (source = cache)
//!                            │ no
//!                            ▼
//!            exclusions = excluded ∪ history ∪ own list
//!                            │
//!              content scorer ─┬─ collaborative scorer
//!                            ▼
//!               blend ─► filter ─► sort ─► hydrate
//!                            │
//!                 cache write + history ─► page (source = fresh)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mangarec::{FeatureStore, RecommendationEngine, RecommendationRequest};
//!
//! let engine = RecommendationEngine::builder()
//!     .feature_store(Arc::new(store))
//!     .catalogue(Arc::new(catalogue))
//!     .build()?;
//!
//! engine.load_interactions(&interaction_source).await?;
//! let page = engine
//!     .get_recommendations(RecommendationRequest::new("user-1", interactions).limit(10))
//!     .await?;
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::{Clock, RecommendationCache, RequestSignature, SystemClock};
use crate::collaborative::CollaborativeScorer;
use crate::collaborator::{CatalogueLookup, InteractionSource};
use crate::config::{BlendWeights, CacheConfig, RecommenderConfig, RecommenderConfigOverrides};
use crate::content::ContentBasedScorer;
use crate::error::{RecError, Result};
use crate::feature_store::FeatureStore;
use crate::model::{
    CatalogueItem, ClearHistoryResult, ItemId, Recommendation, RecommendationPage, ScoredItem,
    Source, UserId, UserInteraction, UserProfile, UserSimilarityInfo,
};
use crate::retry::RetryPolicy;
use crate::scorer::{Scorer, ScoringRequest, sort_by_score};

/// Page size used when a request does not set one.
pub const DEFAULT_LIMIT: usize = 10;

/// Which scorers take part in a request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Content-based scoring only.
    ContentOnly,
    /// Content-based blended with collaborative scoring. Falls back to
    /// content-only when the collaborative scorer has nothing for the user.
    #[default]
    Hybrid,
}

/// Input to [`RecommendationEngine::get_recommendations`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    /// The user's current list.
    pub interactions: Vec<UserInteraction>,
    #[serde(default)]
    pub profile: UserProfile,
    /// Per-request settings layered over the engine's base config.
    #[serde(default)]
    pub overrides: RecommenderConfigOverrides,
    #[serde(default)]
    pub exclude_ids: BTreeSet<ItemId>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub min_score: Option<f64>,
    /// When non-empty, items must carry at least one of these genres.
    #[serde(default)]
    pub include_genres: BTreeSet<String>,
    /// Items carrying any of these genres are dropped.
    #[serde(default)]
    pub exclude_genres: BTreeSet<String>,
    #[serde(default)]
    pub strategy: Strategy,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl RecommendationRequest {
    pub fn new(user_id: impl Into<UserId>, interactions: Vec<UserInteraction>) -> Self {
        Self {
            user_id: user_id.into(),
            interactions,
            profile: UserProfile::default(),
            overrides: RecommenderConfigOverrides::default(),
            exclude_ids: BTreeSet::new(),
            limit: DEFAULT_LIMIT,
            min_score: None,
            include_genres: BTreeSet::new(),
            exclude_genres: BTreeSet::new(),
            strategy: Strategy::default(),
        }
    }

    pub fn profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn overrides(mut self, overrides: RecommenderConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn exclude(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn include_genres<S: Into<String>>(mut self, genres: impl IntoIterator<Item = S>) -> Self {
        self.include_genres.extend(genres.into_iter().map(Into::into));
        self
    }

    pub fn exclude_genres<S: Into<String>>(mut self, genres: impl IntoIterator<Item = S>) -> Self {
        self.exclude_genres.extend(genres.into_iter().map(Into::into));
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Cache key over the filter parameters only.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Serialization`] if the parameters cannot be encoded.
    pub fn signature(&self) -> Result<RequestSignature> {
        RequestSignature::from_params(&SignatureParams {
            limit: self.limit,
            exclude_ids: &self.exclude_ids,
            min_score: self.min_score,
            include_genres: &self.include_genres,
            exclude_genres: &self.exclude_genres,
            strategy: self.strategy,
        })
    }
}

/// Sets serialize in sorted order, so the encoding is canonical.
#[derive(Serialize)]
struct SignatureParams<'a> {
    limit: usize,
    exclude_ids: &'a BTreeSet<ItemId>,
    min_score: Option<f64>,
    include_genres: &'a BTreeSet<String>,
    exclude_genres: &'a BTreeSet<String>,
    strategy: Strategy,
}

/// The recommendation orchestrator.
///
/// Owns the result cache and composes a [`ContentBasedScorer`] with a
/// [`CollaborativeScorer`]. Construct one via [`RecommendationEngine::builder()`]
/// at startup and share it across request handlers.
///
/// The engine assumes at most one in-flight request per user; concurrent
/// requests for the same user may race on the seen history.
pub struct RecommendationEngine {
    store: Arc<FeatureStore>,
    content: Arc<ContentBasedScorer>,
    collaborative: Arc<CollaborativeScorer>,
    catalogue: Option<Arc<dyn CatalogueLookup>>,
    cache: RecommendationCache<RecommendationPage>,
    config: RecommenderConfig,
    blend: BlendWeights,
    retry: RetryPolicy,
    candidate_multiplier: usize,
    max_limit: usize,
}

impl RecommendationEngine {
    /// Create a new [`RecommendationEngineBuilder`].
    pub fn builder() -> RecommendationEngineBuilder {
        RecommendationEngineBuilder::default()
    }

    /// Base config that request overrides are merged over.
    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn feature_store(&self) -> &Arc<FeatureStore> {
        &self.store
    }

    pub fn content_scorer(&self) -> &Arc<ContentBasedScorer> {
        &self.content
    }

    pub fn collaborative_scorer(&self) -> &Arc<CollaborativeScorer> {
        &self.collaborative
    }

    /// Items recently shown to the user.
    pub fn history(&self, user_id: &str) -> Vec<ItemId> {
        self.cache.get_history(user_id)
    }

    /// Produce a page of recommendations for the request.
    ///
    /// Identical filter parameters within the cache TTL replay the cached page
    /// with `source == Source::Cache`. A cached page that shows an item the
    /// request now lists is evicted and recomputed instead. No page contains
    /// the user's own items or explicitly excluded items. Fresh pages also
    /// skip the seen history, and their ids are added to it.
    ///
    /// # Errors
    ///
    /// - [`RecError::Validation`] if the limit is out of range, `min_score` is
    ///   not finite, the merged config is invalid, or none of the user's items
    ///   are in the catalogue.
    /// - [`RecError::NoMatch`] if no candidate survives filtering.
    /// - [`RecError::Collaborator`] if every catalogue lookup fails.
    /// - [`RecError::Internal`] on a broken invariant.
    #[tracing::instrument(skip_all, fields(user_id = %request.user_id))]
    pub async fn get_recommendations(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationPage> {
        let started = Instant::now();
        let config = self.validate(&request)?;
        let user_id = request.user_id.as_str();

        // 1. Cache
        let signature = request.signature()?;
        let mut cached = self.cache.get(user_id, &signature);
        if cached.as_ref().is_some_and(|page| lists_any_of(&request, page)) {
            debug!(signature = %signature, "cached page contains listed items, evicting");
            self.cache.invalidate(user_id, &signature);
            cached = None;
        }
        if let Some(mut page) = cached {
            page.source = Source::Cache;
            page.timing_ms = elapsed_ms(started);
            debug!(signature = %signature, "cache hit");
            info!(
                count = page.items.len(),
                source = "cache",
                timing_ms = page.timing_ms,
                "served recommendations"
            );
            return Ok(page);
        }
        debug!(signature = %signature, "cache miss");

        // 2. Exclusions
        let mut exclude: HashSet<ItemId> = request.exclude_ids.iter().copied().collect();
        exclude.extend(self.cache.get_history(user_id));
        exclude.extend(request.interactions.iter().map(|i| i.item_id));

        // Items failing the genre filters never reach the scorers.
        let mut unscored = exclude.clone();
        if !request.include_genres.is_empty() || !request.exclude_genres.is_empty() {
            unscored.extend(
                self.store
                    .iter()
                    .filter(|item| !admits_genres(&request, &item.genres))
                    .map(|item| item.id),
            );
        }

        // 3. Scoring
        let scoring = ScoringRequest {
            user_id,
            interactions: &request.interactions,
            profile: &request.profile,
            config: &config,
            exclude: &unscored,
            limit: request.limit.saturating_mul(self.candidate_multiplier),
        };
        let candidates = self.score(&scoring, request.strategy).await?;

        if let Some(leak) = candidates.iter().find(|c| unscored.contains(&c.item_id)) {
            error!(item_id = leak.item_id, "scorer returned an excluded item");
            return Err(RecError::Internal(format!(
                "scorer returned excluded item {}",
                leak.item_id
            )));
        }

        // 4. Post-filters
        let mut survivors: Vec<ScoredItem> =
            candidates.into_iter().filter(|c| self.passes_filters(c, &request)).collect();

        // 5. Rank and page
        sort_by_score(&mut survivors);
        // Counted before hydration: items dropped by a failed lookup are not
        // replaced, so this only reports candidates that were never attempted.
        let has_more = survivors.len() > request.limit;
        survivors.truncate(request.limit);
        if survivors.is_empty() {
            let reason = if self.content.has_more_candidates(&exclude) {
                "no candidate passed the filters"
            } else {
                "every catalogue item is already listed, excluded, or recently shown"
            };
            return Err(RecError::NoMatch(reason.to_string()));
        }

        let items = self.hydrate(survivors).await?;

        // 6. Cache and history
        let page = RecommendationPage {
            items,
            has_more,
            timing_ms: elapsed_ms(started),
            source: Source::Fresh,
        };
        self.cache.set(user_id, &signature, page.clone());
        self.cache.add_to_history(user_id, page.item_ids());
        info!(
            count = page.items.len(),
            source = "fresh",
            timing_ms = page.timing_ms,
            "served recommendations"
        );
        Ok(page)
    }

    /// Forget the user's seen history and cached pages.
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub fn clear_history(&self, user_id: &str) -> ClearHistoryResult {
        self.cache.clear_history(user_id);
        debug!("cleared history");
        ClearHistoryResult { success: true }
    }

    /// Diagnostic view of the user's collaborative neighborhood.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::NotFound`] if the user has no interactions loaded.
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn user_similarity_info(&self, user_id: &str) -> Result<UserSimilarityInfo> {
        self.collaborative.user_similarity_info(user_id).await
    }

    /// Replace one user's row in the collaborative matrix.
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn update_user_interactions(
        &self,
        user_id: &str,
        interactions: Vec<UserInteraction>,
    ) {
        self.collaborative.update_user_interactions(user_id, interactions).await;
    }

    /// Populate the collaborative matrix from `source`, retrying transient
    /// failures. Returns the number of users loaded.
    ///
    /// # Errors
    ///
    /// Returns the source's last error once retries are exhausted.
    pub async fn load_interactions(&self, source: &dyn InteractionSource) -> Result<usize> {
        let records = self
            .retry
            .run("load_all_user_interactions", |_| source.load_all_user_interactions())
            .await
            .map_err(|e| {
                error!(error = %e, "failed to load user interactions");
                e
            })?;
        Ok(self.collaborative.replace_all(records).await)
    }

    fn validate(&self, request: &RecommendationRequest) -> Result<RecommenderConfig> {
        if request.limit == 0 || request.limit > self.max_limit {
            return Err(RecError::Validation(format!(
                "limit must be between 1 and {} (got {})",
                self.max_limit, request.limit
            )));
        }
        if request.min_score.is_some_and(|s| !s.is_finite()) {
            return Err(RecError::Validation("min_score must be finite".to_string()));
        }
        let config = RecommenderConfig::merge(&self.config, &request.overrides);
        config.validate()?;
        Ok(config)
    }

    async fn score(
        &self,
        request: &ScoringRequest<'_>,
        strategy: Strategy,
    ) -> Result<Vec<ScoredItem>> {
        let content = self.content.score(request).await?;
        if strategy == Strategy::ContentOnly {
            return Ok(content);
        }

        let collaborative = self.collaborative.score(request).await?;
        if collaborative.is_empty() {
            debug!(
                scorer = self.collaborative.name(),
                "no collaborative candidates, using content scores"
            );
            return Ok(content);
        }
        Ok(blend(&[(content, self.blend.content), (collaborative, self.blend.collaborative)]))
    }

    fn passes_filters(&self, candidate: &ScoredItem, request: &RecommendationRequest) -> bool {
        if request.min_score.is_some_and(|min| candidate.score < min) {
            return false;
        }
        if request.include_genres.is_empty() && request.exclude_genres.is_empty() {
            return true;
        }
        match self.store.get(candidate.item_id) {
            Some(item) => admits_genres(request, &item.genres),
            // No genres known: fails any include filter, passes any exclude filter.
            None => request.include_genres.is_empty(),
        }
    }

    async fn hydrate(&self, ranked: Vec<ScoredItem>) -> Result<Vec<Recommendation>> {
        let Some(catalogue) = &self.catalogue else {
            let items: Vec<Recommendation> = ranked
                .into_iter()
                .filter_map(|scored| match self.store.get(scored.item_id) {
                    Some(features) => Some(recommendation(CatalogueItem::from(features), scored)),
                    None => {
                        warn!(item_id = scored.item_id, "no metadata for item, dropping it");
                        None
                    }
                })
                .collect();
            if items.is_empty() {
                return Err(RecError::NoMatch("no metadata for any candidate".to_string()));
            }
            return Ok(items);
        };

        let requested = ranked.len();
        let lookups = join_all(ranked.iter().map(|s| catalogue.get_item_by_id(s.item_id))).await;
        let mut last_error = None;
        let mut items = Vec::with_capacity(requested);
        for (scored, lookup) in ranked.into_iter().zip(lookups) {
            match lookup {
                Ok(item) => items.push(recommendation(item, scored)),
                Err(e) => {
                    warn!(
                        item_id = scored.item_id,
                        error = %e,
                        "catalogue lookup failed, dropping item"
                    );
                    last_error = Some(e);
                }
            }
        }
        if items.is_empty() {
            let message = last_error.map(|e| e.to_string()).unwrap_or_default();
            error!(requested, "every catalogue lookup failed");
            return Err(RecError::collaborator(
                "catalogue",
                format!("all {requested} lookups failed: {message}"),
            ));
        }
        Ok(items)
    }
}

/// Whether `genres` satisfies the request's include and exclude lists.
fn admits_genres(request: &RecommendationRequest, genres: &BTreeSet<String>) -> bool {
    let included =
        request.include_genres.is_empty() || !genres.is_disjoint(&request.include_genres);
    included && genres.is_disjoint(&request.exclude_genres)
}

/// Whether a cached page shows something the request now lists or excludes.
fn lists_any_of(request: &RecommendationRequest, page: &RecommendationPage) -> bool {
    page.items.iter().any(|r| {
        request.exclude_ids.contains(&r.item.id)
            || request.interactions.iter().any(|i| i.item_id == r.item.id)
    })
}

fn recommendation(item: CatalogueItem, scored: ScoredItem) -> Recommendation {
    Recommendation {
        item,
        score: scored.score,
        match_details: scored.match_details,
        neighbor_count: scored.neighbor_count,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Merge weighted candidate lists by item id.
///
/// Each list is scaled by its maximum score (when positive) so the weights
/// compare like with like, then contributions are summed per item. Sub-score
/// details and neighbor counts are carried over from whichever list had them.
fn blend(lists: &[(Vec<ScoredItem>, f64)]) -> Vec<ScoredItem> {
    let mut merged: HashMap<ItemId, ScoredItem> = HashMap::new();
    for (items, weight) in lists {
        let max = items.iter().map(|i| i.score).fold(f64::NEG_INFINITY, f64::max);
        let scale = if max > 0.0 { 1.0 / max } else { 1.0 };
        for item in items {
            let contribution = item.score * scale * weight;
            let entry = merged.entry(item.item_id).or_insert_with(|| ScoredItem {
                item_id: item.item_id,
                score: 0.0,
                match_details: None,
                neighbor_count: None,
            });
            entry.score += contribution;
            entry.match_details = entry.match_details.or(item.match_details);
            entry.neighbor_count = entry.neighbor_count.or(item.neighbor_count);
        }
    }
    let mut blended: Vec<ScoredItem> = merged.into_values().collect();
    sort_by_score(&mut blended);
    blended
}

/// Builder for constructing a [`RecommendationEngine`].
///
/// Only the feature store is required. Call
/// [`build()`](RecommendationEngineBuilder::build) to validate and produce the
/// engine.
#[derive(Default)]
pub struct RecommendationEngineBuilder {
    store: Option<Arc<FeatureStore>>,
    config: Option<RecommenderConfig>,
    collaborative: Option<Arc<CollaborativeScorer>>,
    catalogue: Option<Arc<dyn CatalogueLookup>>,
    blend: Option<BlendWeights>,
    cache: Option<CacheConfig>,
    clock: Option<Arc<dyn Clock>>,
    retry: Option<RetryPolicy>,
    candidate_multiplier: Option<usize>,
    max_limit: Option<usize>,
}

impl RecommendationEngineBuilder {
    /// Set the feature store.
    pub fn feature_store(mut self, store: Arc<FeatureStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the base scoring config. Defaults to [`RecommenderConfig::DEFAULT`].
    pub fn config(mut self, config: RecommenderConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing collaborative scorer. Defaults to an empty one.
    pub fn collaborative(mut self, scorer: Arc<CollaborativeScorer>) -> Self {
        self.collaborative = Some(scorer);
        self
    }

    /// Set the catalogue used for hydration. Without one, recommendations
    /// carry feature store metadata only.
    pub fn catalogue(mut self, catalogue: Arc<dyn CatalogueLookup>) -> Self {
        self.catalogue = Some(catalogue);
        self
    }

    pub fn blend_weights(mut self, blend: BlendWeights) -> Self {
        self.blend = Some(blend);
        self
    }

    pub fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the clock the cache reads. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Retry policy for bulk interaction loads.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// How many candidates each scorer is asked for, per requested item. Defaults to 2.
    pub fn candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = Some(multiplier);
        self
    }

    /// Largest accepted page size. Defaults to 20.
    pub fn max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = Some(max_limit);
        self
    }

    /// Build the [`RecommendationEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Config`] if the feature store is missing or empty,
    /// the base config or blend weights are invalid, or the multiplier or
    /// limit is zero.
    pub fn build(self) -> Result<RecommendationEngine> {
        let store = self
            .store
            .ok_or_else(|| RecError::Config("feature_store is required".to_string()))?;
        store.feature_dimension()?;

        let config = self.config.unwrap_or_default();
        config.check().map_err(RecError::Config)?;
        let blend = self.blend.unwrap_or_default();
        blend.validate()?;

        let candidate_multiplier = self.candidate_multiplier.unwrap_or(2);
        if candidate_multiplier == 0 {
            return Err(RecError::Config("candidate_multiplier must be at least 1".to_string()));
        }
        let max_limit = self.max_limit.unwrap_or(20);
        if max_limit == 0 {
            return Err(RecError::Config("max_limit must be at least 1".to_string()));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Ok(RecommendationEngine {
            content: Arc::new(ContentBasedScorer::new(Arc::clone(&store))),
            store,
            collaborative: self.collaborative.unwrap_or_default(),
            catalogue: self.catalogue,
            cache: RecommendationCache::with_clock(self.cache.unwrap_or_default(), clock),
            config,
            blend,
            retry: self.retry.unwrap_or_default(),
            candidate_multiplier,
            max_limit,
        })
    }
}
