use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::models::user::User;

/// A cached user record.
#[derive(Clone)]
struct CachedUser {
    user: Arc<User>,
    stored_at: Instant,
}

/// An in-process cache of resolved users, keyed by session key.
///
/// Shared by all requests; concurrent writers to the same key race and the
/// last one wins.
#[derive(Clone, Default)]
pub struct UserCache {
    cache: Arc<RwLock<HashMap<String, CachedUser>>>,
    ttl: Option<Duration>,
}

impl UserCache {
    /// Creates a new `UserCache`. Entries older than `ttl` are treated as absent.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Gets a user from the cache by session key.
    pub async fn get(&self, key: &str) -> Option<Arc<User>> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|entry| !self.is_stale(entry))
            .map(|entry| entry.user.clone())
    }

    /// Inserts a user into the cache.
    pub async fn insert(&self, key: &str, user: Arc<User>) {
        let mut cache = self.cache.write().await;
        cache.insert(
            key.to_string(),
            CachedUser {
                user,
                stored_at: Instant::now(),
            },
        );
    }

    /// Removes a user from the cache.
    pub async fn remove(&self, key: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(key);
    }

    /// Returns the number of cached users, stale entries included.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    fn is_stale(&self, entry: &CachedUser) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }
}
