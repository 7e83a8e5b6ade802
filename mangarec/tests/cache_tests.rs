//! Integration tests for the recommendation cache.

mod common;

use chrono::TimeDelta;
use common::ManualClock;
use mangarec::{CacheConfig, RecommendationCache, RecommendationRequest, RequestSignature};

fn signature() -> RequestSignature {
    RecommendationRequest::new("user-1", Vec::new()).limit(5).signature().unwrap()
}

#[test]
fn entry_lives_until_ttl() {
    let clock = ManualClock::new();
    let config = CacheConfig::default();
    let cache: RecommendationCache<Vec<u64>> =
        RecommendationCache::with_clock(config, clock.clone());

    cache.set("user-1", &signature(), vec![7, 8]);
    clock.advance(config.ttl - TimeDelta::milliseconds(1));
    assert_eq!(cache.get("user-1", &signature()), Some(vec![7, 8]));

    clock.advance(TimeDelta::milliseconds(2));
    assert_eq!(cache.get("user-1", &signature()), None);
}

#[test]
fn expired_entry_stays_evicted() {
    let clock = ManualClock::new();
    let cache: RecommendationCache<u32> =
        RecommendationCache::with_clock(CacheConfig::default(), clock.clone());

    cache.set("user-1", &signature(), 1);
    clock.advance(TimeDelta::hours(1));
    assert_eq!(cache.get("user-1", &signature()), None);
    clock.advance(-TimeDelta::hours(1));
    assert_eq!(cache.get("user-1", &signature()), None);
}

#[test]
fn set_overwrites_and_restarts_ttl() {
    let clock = ManualClock::new();
    let cache: RecommendationCache<u32> =
        RecommendationCache::with_clock(CacheConfig::default(), clock.clone());

    cache.set("user-1", &signature(), 1);
    clock.advance(TimeDelta::minutes(20));
    cache.set("user-1", &signature(), 2);
    clock.advance(TimeDelta::minutes(20));
    assert_eq!(cache.get("user-1", &signature()), Some(2));
}

#[test]
fn history_is_a_union() {
    let cache: RecommendationCache<u32> = RecommendationCache::new(CacheConfig::default());
    cache.add_to_history("user-1", [5, 3]);
    cache.add_to_history("user-1", [3, 9]);
    assert_eq!(cache.get_history("user-1"), vec![3, 5, 9]);
    assert!(cache.get_history("user-2").is_empty());
}
