//! Integration tests for the collaborative scorer.

mod common;

use std::collections::HashSet;

use common::{FlakyInteractions, disliked, liked, record};
use mangarec::{
    CollaborativeConfig, CollaborativeScorer, LikeStatus, ReadingStatus, RecError,
    RecommenderConfig, Scorer, ScoringRequest, UserInteraction, UserProfile,
};

#[tokio::test]
async fn cold_start_user_gets_empty_list() {
    let scorer = CollaborativeScorer::default();
    scorer.update_user_interactions("a", vec![liked(1), liked(2), liked(3)]).await;

    assert!(scorer.recommend("ghost", 10, &HashSet::new()).await.is_empty());

    let exclude = HashSet::new();
    let profile = UserProfile::default();
    let config = RecommenderConfig::default();
    let request = ScoringRequest {
        user_id: "ghost",
        interactions: &[],
        profile: &profile,
        config: &config,
        exclude: &exclude,
        limit: 10,
    };
    assert!(scorer.score(&request).await.unwrap().is_empty());
}

#[tokio::test]
async fn fewer_than_two_common_items_is_zero_similarity() {
    let scorer = CollaborativeScorer::default();
    scorer.update_user_interactions("a", vec![liked(1), liked(2)]).await;
    scorer.update_user_interactions("b", vec![liked(1), liked(3)]).await;

    assert_eq!(scorer.user_similarity("a", "b").await, 0.0);
    assert!(scorer.similar_users("a").await.is_empty());
    assert!(scorer.recommend("a", 10, &HashSet::new()).await.is_empty());
}

#[tokio::test]
async fn neighbors_are_above_floor_and_sorted() {
    let scorer = CollaborativeScorer::default();
    scorer.update_user_interactions("a", vec![liked(1), liked(2), liked(3)]).await;
    // Identical taste.
    scorer.update_user_interactions("b", vec![liked(1), liked(2), liked(3)]).await;
    // Opposite taste.
    scorer.update_user_interactions("c", vec![disliked(1), disliked(2)]).await;
    // Orthogonal on the shared items.
    scorer.update_user_interactions("d", vec![liked(1), disliked(2)]).await;
    // Mostly similar.
    scorer
        .update_user_interactions(
            "e",
            vec![
                liked(1),
                liked(2),
                UserInteraction::new(3, LikeStatus::Like, ReadingStatus::PlanToRead),
            ],
        )
        .await;

    let neighbors = scorer.similar_users("a").await;
    let ids: Vec<&str> = neighbors.iter().map(|n| n.user_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "e"]);
    assert!((neighbors[0].similarity - 1.0).abs() < 1e-10);
    assert!(neighbors[1].similarity < neighbors[0].similarity);
    assert!(neighbors.iter().all(|n| n.similarity > 0.1));
}

#[tokio::test]
async fn scores_are_mean_weighted_ratings() {
    let scorer = CollaborativeScorer::default();
    scorer.update_user_interactions("a", vec![liked(1), liked(2)]).await;
    scorer
        .update_user_interactions(
            "b",
            vec![
                liked(1),
                liked(2),
                UserInteraction::new(5, LikeStatus::Like, ReadingStatus::Reading),
            ],
        )
        .await;
    scorer.update_user_interactions("c", vec![liked(1), liked(2), disliked(5), liked(6)]).await;

    let recs = scorer.recommend("a", 10, &HashSet::new()).await;
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].item_id, 6);
    assert!((recs[0].score - 1.0).abs() < 1e-10);
    assert_eq!(recs[1].item_id, 5);
    assert!((recs[1].score - (0.8 - 1.0) / 2.0).abs() < 1e-10);
    assert_eq!(recs[1].neighbor_count, Some(2));

    let recs = scorer.recommend("a", 10, &HashSet::from([6])).await;
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].item_id, 5);

    assert_eq!(scorer.recommend("a", 1, &HashSet::new()).await.len(), 1);
}

#[tokio::test]
async fn similarity_info_reports_matrix_shape() {
    let scorer = CollaborativeScorer::default();
    scorer.update_user_interactions("a", vec![liked(1), liked(2), liked(3)]).await;
    scorer.update_user_interactions("b", vec![liked(1), liked(2)]).await;
    scorer.update_user_interactions("c", vec![liked(9)]).await;

    let info = scorer.user_similarity_info("a").await.unwrap();
    assert_eq!(info.total_users, 3);
    assert_eq!(info.user_item_count, 3);
    assert_eq!(info.similar_users.len(), 1);
    assert_eq!(info.similar_users[0].user_id, "b");

    let err = scorer.user_similarity_info("nobody").await.unwrap_err();
    assert!(matches!(err, RecError::NotFound { kind: "user", .. }));
}

#[tokio::test]
async fn bulk_load_replaces_previous_state() {
    let scorer = CollaborativeScorer::default();
    scorer.update_user_interactions("old", vec![liked(1), liked(2)]).await;

    let source = FlakyInteractions::new(
        vec![
            record("a", liked(1)),
            record("a", liked(2)),
            record("b", liked(1)),
            record("b", liked(2)),
            record("b", liked(3)),
        ],
        0,
    );
    assert_eq!(scorer.load_all(&source).await.unwrap(), 2);
    assert!(!scorer.contains_user("old").await);
    assert_eq!(scorer.user_count().await, 2);

    let recs = scorer.recommend("a", 10, &HashSet::new()).await;
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].item_id, 3);
    assert_eq!(recs[0].neighbor_count, Some(1));
}

#[tokio::test]
async fn failed_bulk_load_keeps_existing_matrix() {
    let scorer = CollaborativeScorer::default();
    scorer.update_user_interactions("a", vec![liked(1), liked(2)]).await;

    let source = FlakyInteractions::new(Vec::new(), 1);
    assert!(scorer.load_all(&source).await.is_err());
    assert!(scorer.contains_user("a").await);
}

#[test]
fn invalid_config_is_rejected() {
    let config = CollaborativeConfig { like_value: 0.0, ..Default::default() };
    assert!(matches!(CollaborativeScorer::new(config), Err(RecError::Config(_))));
}
