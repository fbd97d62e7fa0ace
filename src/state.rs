use std::sync::Arc;

use crate::config::Config;
use crate::crypto::token::TokenSigner;
use crate::error::Result;
use crate::models::user::User;
use crate::services::{
    user_cache::UserCache,
    user_directory::{InMemoryUserDirectory, PgUserDirectory, UserDirectory},
    verifier::{MockVerifier, SessionVerifier, TokenVerifier},
};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Signs and verifies session tokens.
    pub signer: Arc<TokenSigner>,
    /// Where users are looked up by id.
    pub users: Arc<dyn UserDirectory>,
    /// Users resolved by earlier requests.
    pub user_cache: UserCache,
    /// The verifier every gate runs.
    pub verifier: Arc<dyn SessionVerifier>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let users: Arc<dyn UserDirectory> = match &config.database_url {
            Some(url) => {
                let pool = crate::db::create_pool(url)?;
                tracing::info!("✅ PostgreSQL Pool initialized for user lookups");
                Arc::new(PgUserDirectory::new(pool))
            }
            None if config.is_production() => {
                tracing::warn!("⚠️  DATABASE_URL not set, every user lookup will fail");
                Arc::new(InMemoryUserDirectory::default())
            }
            None => {
                tracing::warn!("⚠️  DATABASE_URL not set, using in-memory directory with a dev user");
                Arc::new(InMemoryUserDirectory::with_users([dev_user()]))
            }
        };

        let mut state = Self::with_directory(config, users);

        if config.mock_login {
            tracing::warn!("⚠️  MOCK_LOGIN enabled, every request is signed in as MOCK-USER");
            state = state.with_verifier(Arc::new(MockVerifier::default()));
        }

        Ok(state)
    }

    /// Builds the state around an existing user directory.
    pub fn with_directory(config: &Config, users: Arc<dyn UserDirectory>) -> Self {
        let signer = Arc::new(TokenSigner::new(&config.hmac_key));
        let user_cache = UserCache::new(config.user_cache_ttl);
        tracing::info!("✅ User cache initialized");

        let verifier = Arc::new(TokenVerifier::new(
            signer.clone(),
            users.clone(),
            user_cache.clone(),
        ));

        AppState {
            config: config.clone(),
            signer,
            users,
            user_cache,
            verifier,
        }
    }

    /// Replaces the verifier every gate runs.
    pub fn with_verifier(mut self, verifier: Arc<dyn SessionVerifier>) -> Self {
        self.verifier = verifier;
        self
    }
}

fn dev_user() -> User {
    User {
        user_id: 1,
        key: "DEV-USER".to_string(),
        username: "dev".to_string(),
        superuser: true,
    }
}
