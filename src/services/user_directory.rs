use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::user::User;
use crate::repositories::user as user_repo;

/// Looks up user records by numeric id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns `Ok(None)` when no user has this id.
    async fn find_by_user_id(&self, user_id: i64) -> Result<Option<User>>;
}

/// A `UserDirectory` backed by the PostgreSQL `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: Pool,
}

impl PgUserDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_user_id(&self, user_id: i64) -> Result<Option<User>> {
        user_repo::find_by_user_id(&self.pool, user_id).await
    }
}

/// A `UserDirectory` held in memory, for local development and tests.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<i64, User>>>,
}

impl InMemoryUserDirectory {
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: Arc::new(RwLock::new(
                users.into_iter().map(|u| (u.user_id, u)).collect(),
            )),
        }
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.user_id, user);
    }

    pub async fn remove(&self, user_id: i64) -> Option<User> {
        self.users.write().await.remove(&user_id)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_user_id(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }
}
