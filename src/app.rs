use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers;
use crate::middleware_layer::{
    auth::{attach_session, require_authentication},
    cache_control::default_no_store,
    gate::AuthGate,
    login::require_login,
};
use crate::services::verifier::VerifyPolicy;
use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let settings = state.config.gate_settings();
    let policy = VerifyPolicy::new(state.config.audience.clone());

    let api_gate = AuthGate::new(state.verifier.clone(), policy.clone(), settings.clone());
    let admin_gate = AuthGate::new(
        state.verifier.clone(),
        policy.clone().superuser().resolve_user(),
        settings.clone(),
    );
    let soft_gate = AuthGate::new(state.verifier.clone(), policy.clone(), settings.clone());
    let login_gate = AuthGate::new(state.verifier.clone(), policy, settings);

    let api_routes = Router::new()
        .route("/api/session", get(handlers::session::current_session))
        .route(
            "/api/admin/session",
            get(handlers::session::admin_session).route_layer(from_fn_with_state(
                admin_gate,
                require_authentication,
            )),
        )
        .route_layer(from_fn_with_state(api_gate, require_authentication))
        .with_state(state.clone());

    let page_routes = Router::new()
        .route("/account", get(handlers::session::account))
        .route_layer(from_fn_with_state(login_gate, require_login))
        .with_state(state.clone());

    let mut open_routes = Router::new()
        .route(
            "/api/users/{user_id}/permissions",
            get(handlers::session::permissions),
        )
        .route("/logout", post(handlers::session::logout));

    if !state.config.is_production() {
        open_routes = open_routes.route("/dev/login", post(handlers::session::dev_login));
    }

    let open_routes = open_routes
        .route_layer(from_fn_with_state(soft_gate, attach_session))
        .with_state(state.clone());

    Router::new()
        .merge(api_routes)
        .merge(page_routes)
        .merge(open_routes)
        .layer(from_fn(default_no_store))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
}
