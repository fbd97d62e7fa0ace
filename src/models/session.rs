use std::sync::Arc;

use crate::models::{claims::TokenClaims, user::User};

/// A verified identity, valid for the lifetime of one request.
///
/// Only the verifier constructs sessions, and only from claims that passed
/// signature, audience and expiry checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: i64,
    /// The user's key, or the legacy battletag for old tokens.
    pub key: String,
    /// Whether the token grants superuser access.
    pub superuser: bool,
    /// The full user record, when it was resolved or found in the cache.
    pub user: Option<Arc<User>>,
}

impl Session {
    /// Builds a session from verified claims. Returns `None` when the token
    /// carries neither `key` nor `battletag`.
    pub fn from_claims(claims: &TokenClaims) -> Option<Self> {
        Some(Self {
            user_id: claims.user_id,
            key: claims.session_key()?.to_string(),
            superuser: claims.is_superuser(),
            user: None,
        })
    }

    pub fn with_user(mut self, user: Arc<User>) -> Self {
        self.user = Some(user);
        self
    }

    /// The display name, or the key when no user record is attached.
    pub fn username(&self) -> &str {
        self.user
            .as_deref()
            .map(|u| u.username.as_str())
            .unwrap_or(&self.key)
    }

    /// Whether this session may edit content owned by `owner_user_id`.
    pub fn can_edit(&self, owner_user_id: i64) -> bool {
        self.superuser || self.user_id == owner_user_id
    }
}
