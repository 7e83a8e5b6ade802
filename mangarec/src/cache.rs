//! Per-user result cache and seen-item history.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::model::{ItemId, UserId};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A cached value with its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Whether the entry is still valid at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Cache key derived from a request's filter parameters.
///
/// Equal parameters always produce the same signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSignature(String);

impl RequestSignature {
    /// SHA-256 hex digest of the JSON encoding of `params`.
    ///
    /// Callers sort any sets inside `params` first so the encoding is canonical.
    ///
    /// # Errors
    ///
    /// Returns [`RecError::Serialization`](crate::RecError::Serialization) if
    /// `params` cannot be encoded.
    pub fn from_params<P: Serialize>(params: &P) -> Result<Self> {
        let encoded = serde_json::to_vec(params)?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct CacheState<T> {
    entries: HashMap<UserId, HashMap<RequestSignature, CacheEntry<T>>>,
    /// Item id to the time it was last shown, per user.
    history: HashMap<UserId, HashMap<ItemId, DateTime<Utc>>>,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self { entries: HashMap::new(), history: HashMap::new() }
    }
}

/// Result cache keyed by `(user, signature)` plus a per-user set of items
/// already shown.
///
/// Expired entries and stale history are dropped lazily when read.
///
/// # Example
///
/// ```rust,ignore
/// use mangarec::{CacheConfig, RecommendationCache};
///
/// let cache = RecommendationCache::new(CacheConfig::default());
/// cache.set("user-1", &signature, page.clone());
/// assert_eq!(cache.get("user-1", &signature), Some(page));
/// ```
pub struct RecommendationCache<T> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<T>>,
}

impl<T: Clone> RecommendationCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock, state: Mutex::new(CacheState::default()) }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `data` for `ttl` from now, replacing any previous entry.
    pub fn set(&self, user_id: &str, signature: &RequestSignature, data: T) {
        let now = self.clock.now();
        let entry = CacheEntry { data, created_at: now, expires_at: now + self.config.ttl };
        self.lock()
            .entries
            .entry(user_id.to_string())
            .or_default()
            .insert(signature.clone(), entry);
    }

    /// Return the cached value if it has not expired. Expired entries are evicted.
    pub fn get(&self, user_id: &str, signature: &RequestSignature) -> Option<T> {
        let now = self.clock.now();
        let mut state = self.lock();
        let entries = state.entries.get_mut(user_id)?;
        let entry = entries.get(signature)?;
        if entry.is_live(now) {
            return Some(entry.data.clone());
        }
        entries.remove(signature);
        if entries.is_empty() {
            state.entries.remove(user_id);
        }
        None
    }

    /// Drop one cached entry, if present.
    pub fn invalidate(&self, user_id: &str, signature: &RequestSignature) {
        let mut state = self.lock();
        let Some(entries) = state.entries.get_mut(user_id) else { return };
        entries.remove(signature);
        if entries.is_empty() {
            state.entries.remove(user_id);
        }
    }

    /// Mark `item_ids` as shown to the user now.
    pub fn add_to_history(&self, user_id: &str, item_ids: impl IntoIterator<Item = ItemId>) {
        let now = self.clock.now();
        let mut state = self.lock();
        let seen = state.history.entry(user_id.to_string()).or_default();
        for id in item_ids {
            seen.insert(id, now);
        }
    }

    /// Items shown to the user within the retention window, in ascending id order.
    pub fn get_history(&self, user_id: &str) -> Vec<ItemId> {
        let cutoff = self.clock.now() - self.config.history_retention;
        let mut state = self.lock();
        let Some(seen) = state.history.get_mut(user_id) else {
            return Vec::new();
        };
        seen.retain(|_, shown_at| *shown_at > cutoff);
        let mut ids: Vec<ItemId> = seen.keys().copied().collect();
        if ids.is_empty() {
            state.history.remove(user_id);
        }
        ids.sort_unstable();
        ids
    }

    /// Forget the user's history and every cached entry of theirs.
    pub fn clear_history(&self, user_id: &str) {
        let mut state = self.lock();
        state.history.remove(user_id);
        state.entries.remove(user_id);
    }
}

impl<T> fmt::Debug for RecommendationCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecommendationCache").field("config", &self.config).finish_non_exhaustive()
    }
}
