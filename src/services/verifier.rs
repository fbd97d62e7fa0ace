use std::sync::Arc;

use async_trait::async_trait;
use tracing::Span;

use crate::crypto::token::{self, TokenSigner};
use crate::error::{AuthError, Result};
use crate::models::{session::Session, user::User};
use crate::services::{user_cache::UserCache, user_directory::UserDirectory};

/// What a gate demands of a request's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// The `aud` claim tokens must carry.
    pub audience: String,
    /// Reject sessions whose token does not grant superuser.
    pub require_superuser: bool,
    /// Load the user record and reject tokens naming a missing user.
    pub resolve_user: bool,
}

impl VerifyPolicy {
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            require_superuser: false,
            resolve_user: false,
        }
    }

    pub fn superuser(mut self) -> Self {
        self.require_superuser = true;
        self
    }

    pub fn resolve_user(mut self) -> Self {
        self.resolve_user = true;
        self
    }
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self::new("webapp")
    }
}

/// Per-request verification state, passed explicitly through the gates.
///
/// Once a session is held, later gates on the same request reuse it instead
/// of decoding the token again.
#[derive(Debug, Clone)]
pub struct RequestContext {
    session: Option<Session>,
    user_resolved: bool,
    span: Span,
}

impl RequestContext {
    /// Creates an empty context whose diagnostics are recorded on `span`.
    pub fn new(span: Span) -> Self {
        Self {
            session: None,
            user_resolved: false,
            span,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn user_resolved(&self) -> bool {
        self.user_resolved
    }

    /// Stores a verified session and tags the diagnostic span with its user.
    pub fn set_session(&mut self, session: Session, user_resolved: bool) {
        self.span.record("user.id", session.user_id);
        self.span.record("user.key", session.key.as_str());
        self.user_resolved |= user_resolved;
        self.session = Some(session);
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(Span::none())
    }
}

/// Turns a request's session token into a verified `Session`.
///
/// On success the session is stored in `ctx`. Rejections are returned as
/// `AppError::Auth`; any other error is a server-side failure.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(
        &self,
        ctx: &mut RequestContext,
        token: Option<&str>,
        policy: &VerifyPolicy,
    ) -> Result<()>;
}

/// Verifies HS256 session tokens, optionally resolving the user record.
pub struct TokenVerifier {
    signer: Arc<TokenSigner>,
    users: Arc<dyn UserDirectory>,
    cache: UserCache,
}

impl TokenVerifier {
    pub fn new(signer: Arc<TokenSigner>, users: Arc<dyn UserDirectory>, cache: UserCache) -> Self {
        Self {
            signer,
            users,
            cache,
        }
    }

    /// Decodes and checks the token, overlaying any cached user record.
    async fn decode(&self, token: Option<&str>, policy: &VerifyPolicy) -> Result<Session> {
        let token = token.filter(|t| !t.is_empty()).ok_or_else(|| {
            tracing::info!("No session found");
            AuthError::NoSessionPresent
        })?;

        let claims = match self.signer.verify(token, &policy.audience) {
            Ok(claims) => claims,
            Err(e) => {
                let cause = token::describe(&e);
                match token::peek_payload(token) {
                    Some(payload) => tracing::warn!(%payload, %cause, "JWT token invalid"),
                    None => tracing::warn!(%cause, "JWT token invalid, payload unreadable"),
                }
                return Err(AuthError::TokenInvalid(cause).into());
            }
        };

        if claims.uses_legacy_key() {
            tracing::warn!(user_id = claims.user_id, "Got old style session (battletag instead of key)");
        }

        let session = Session::from_claims(&claims).ok_or_else(|| {
            tracing::warn!(user_id = claims.user_id, "Session token carries neither key nor battletag");
            AuthError::TokenInvalid("Token is missing the \"key\" claim".to_string())
        })?;

        tracing::info!(?claims, "Session valid");

        Ok(match self.cache.get(&session.key).await {
            Some(user) => session.with_user(user),
            None => session,
        })
    }

    /// Loads the user named by the session and caches it.
    async fn resolve(&self, session: Session) -> Result<Session> {
        match self.users.find_by_user_id(session.user_id).await? {
            Some(user) => {
                let user: Arc<User> = Arc::new(user);
                self.cache.insert(&session.key, user.clone()).await;
                Ok(session.with_user(user))
            }
            None => {
                tracing::error!(
                    user_id = session.user_id,
                    "Got valid session token, but user did not exist"
                );
                Err(AuthError::UserNotFound.into())
            }
        }
    }
}

#[async_trait]
impl SessionVerifier for TokenVerifier {
    async fn verify(
        &self,
        ctx: &mut RequestContext,
        token: Option<&str>,
        policy: &VerifyPolicy,
    ) -> Result<()> {
        let session = match ctx.session() {
            Some(held) => {
                tracing::debug!(user_id = held.user_id, "Session already verified for this request");
                held.clone()
            }
            None => self.decode(token, policy).await?,
        };

        let resolve = policy.resolve_user && !ctx.user_resolved();
        let session = if resolve {
            self.resolve(session).await?
        } else {
            session
        };

        if policy.require_superuser && !session.superuser {
            tracing::warn!(
                user_id = session.user_id,
                key = %session.key,
                "Got non-superuser session for endpoint with superuser_required"
            );
            return Err(AuthError::InsufficientPrivilege.into());
        }

        ctx.set_session(session, resolve);
        Ok(())
    }
}

/// Accepts every request as a fixed session, for local development without
/// a token issuer.
pub struct MockVerifier {
    session: Session,
}

impl MockVerifier {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl Default for MockVerifier {
    fn default() -> Self {
        let user = User {
            user_id: 0,
            key: "MOCK-USER".to_string(),
            username: "MOCK_USER".to_string(),
            superuser: true,
        };
        Self::new(Session {
            user_id: -1,
            key: "MOCK-USER".to_string(),
            superuser: false,
            user: Some(Arc::new(user)),
        })
    }
}

#[async_trait]
impl SessionVerifier for MockVerifier {
    async fn verify(
        &self,
        ctx: &mut RequestContext,
        _token: Option<&str>,
        _policy: &VerifyPolicy,
    ) -> Result<()> {
        if ctx.session().is_none() {
            ctx.set_session(self.session.clone(), true);
        }
        Ok(())
    }
}
