use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies};
use tower_cookies::cookie::time::Duration;

use crate::{
    error::{AppError, Result},
    models::session::Session,
    services::verifier::RequestContext,
    state::AppState,
};

/// The request payload for the development login.
#[derive(Deserialize, Debug)]
pub struct DevLoginRequest {
    pub user_id: i64,
    /// Overrides the configured audience.
    pub audience: Option<String>,
}

/// The response payload for login and logout.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// The verified session as seen by clients.
#[derive(Serialize)]
pub struct SessionView {
    pub user_id: i64,
    pub key: String,
    pub superuser: bool,
    pub username: String,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id,
            key: session.key.clone(),
            superuser: session.superuser,
            username: session.username().to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct AdminSessionView {
    #[serde(flatten)]
    pub session: SessionView,
    pub cached_users: usize,
}

#[derive(Serialize)]
pub struct PermissionsView {
    pub signed_in: bool,
    pub can_edit: bool,
}

/// Creates the session cookie carrying `token`.
fn create_session_cookie(
    name: String,
    token: String,
    max_age_secs: Option<u64>,
    is_production: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, token);

    cookie.set_http_only(true);

    if is_production {
        cookie.set_secure(true);
    }

    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    if let Some(secs) = max_age_secs {
        cookie.set_max_age(Duration::seconds(secs.min(i64::MAX as u64) as i64));
    }
    cookie.set_path("/");

    cookie
}

/// Returns the caller's session.
pub async fn current_session(Extension(session): Extension<Session>) -> Json<SessionView> {
    Json(SessionView::from(&session))
}

/// Returns the caller's resolved session along with cache occupancy.
pub async fn admin_session(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Json<AdminSessionView> {
    Json(AdminSessionView {
        session: SessionView::from(&session),
        cached_users: state.user_cache.len().await,
    })
}

/// A signed-in landing page.
pub async fn account(Extension(session): Extension<Session>) -> String {
    format!("Signed in as {}", session.username())
}

/// Tells the caller whether they may edit content owned by `owner_user_id`.
pub async fn permissions(
    Path(owner_user_id): Path<i64>,
    Extension(ctx): Extension<RequestContext>,
) -> Json<PermissionsView> {
    let session = ctx.session();
    Json(PermissionsView {
        signed_in: session.is_some(),
        can_edit: session.is_some_and(|s| s.can_edit(owner_user_id)),
    })
}

/// Issues a session cookie for a directory user without credentials.
/// Only routed outside production.
#[axum::debug_handler]
pub async fn dev_login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<DevLoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Dev login attempt for user: {}", payload.user_id);

    let user = state
        .users
        .find_by_user_id(payload.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let audience = payload
        .audience
        .unwrap_or_else(|| state.config.audience.clone());
    let token = state
        .signer
        .issue(&user, &audience, state.config.session_expire_secs)?;

    cookies.add(create_session_cookie(
        state.config.cookie_name.clone(),
        token,
        state.config.session_expire_secs,
        state.config.is_production(),
    ));

    tracing::info!("✅ Session cookie issued for user: {}", user.user_id);

    let response = AuthResponse {
        success: true,
        message: format!("Logged in as {}", user.username),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Clears the session cookie and forgets the cached user record.
pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    cookies: Cookies,
) -> Response {
    if let Some(session) = ctx.session() {
        state.user_cache.remove(&session.key).await;
        tracing::info!("👋 Logout for user: {}", session.user_id);
    }

    let mut session_cookie = Cookie::new(state.config.cookie_name.clone(), "");
    session_cookie.set_max_age(Duration::seconds(0));
    session_cookie.set_path("/");
    cookies.remove(session_cookie);

    tracing::info!("👋 Session cookie cleared");

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    (StatusCode::OK, Json(response)).into_response()
}
