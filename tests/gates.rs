use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware::from_fn_with_state,
    routing::get,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use overtrack_session::{
    app,
    config::Config,
    error::{AuthError, Result},
    handlers,
    middleware_layer::{
        auth::require_authentication,
        gate::{AuthGate, GateSettings, TRACE_ID_HEADER},
        login::require_login,
    },
    models::{claims::TokenClaims, user::User},
    services::{
        user_directory::InMemoryUserDirectory,
        verifier::{RequestContext, SessionVerifier, VerifyPolicy},
    },
    state::AppState,
};

// base64("test-secret")
const HMAC_KEY: &str = "dGVzdC1zZWNyZXQ=";

fn config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("HMAC_KEY".into(), HMAC_KEY.into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

fn tracer() -> User {
    User {
        user_id: 7,
        key: "abc".into(),
        username: "Tracer".into(),
        superuser: false,
    }
}

fn admin() -> User {
    User {
        user_id: 1,
        key: "root".into(),
        username: "Admin".into(),
        superuser: true,
    }
}

struct TestContext {
    state: AppState,
    users: InMemoryUserDirectory,
}

impl TestContext {
    fn new(users: Vec<User>) -> Self {
        let users = InMemoryUserDirectory::with_users(users);
        let state = AppState::with_directory(&config(&[]), Arc::new(users.clone()));
        Self { state, users }
    }

    fn app(&self) -> Router {
        app::router(self.state.clone())
    }

    fn token_for(&self, user: &User) -> String {
        self.state.signer.issue(user, "webapp", Some(100)).unwrap()
    }

    fn claims_token(&self, claims: &TokenClaims) -> String {
        self.state.signer.sign(claims).unwrap()
    }
}

fn get_with_cookie(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header(header::HOST, "localhost");
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("session={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn api_gate_rejects_missing_cookie_with_structured_error() {
    let ctx = TestContext::new(vec![]);

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/session?x=1", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(TRACE_ID_HEADER));
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

    let body = json_body(response).await;
    assert_eq!(body["message"], "Forbidden: No session found");
    assert_eq!(body["authenticate_url"], "/login");
    assert_eq!(
        body["redirect"],
        "/login?next=http%3A%2F%2Flocalhost%2Fapi%2Fsession%3Fx%3D1"
    );
}

#[tokio::test]
async fn api_gate_accepts_valid_session() {
    let ctx = TestContext::new(vec![tracer()]);
    let token = ctx.token_for(&tracer());

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/session", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user_id"], 7);
    assert_eq!(body["key"], "abc");
    assert_eq!(body["superuser"], false);
}

#[tokio::test]
async fn api_gate_reports_token_failure_cause() {
    let ctx = TestContext::new(vec![]);
    let token = ctx.claims_token(&TokenClaims {
        key: Some("abc".into()),
        battletag: None,
        user_id: 7,
        superuser: None,
        iat: Some(1_000),
        exp: Some(2_000),
        aud: "webapp".into(),
    });

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/session", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Forbidden: Signature has expired");
}

#[tokio::test]
async fn admin_route_requires_superuser() {
    let ctx = TestContext::new(vec![tracer(), admin()]);

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/admin/session", Some(&ctx.token_for(&tracer()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["message"], "Forbidden: Not superuser");

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/admin/session", Some(&ctx.token_for(&admin()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["username"], "Admin");
    // The refused request still resolved its user before the privilege check.
    assert_eq!(body["cached_users"], 2);
}

#[tokio::test]
async fn admin_route_rejects_deleted_user() {
    let ctx = TestContext::new(vec![admin()]);
    let token = ctx.token_for(&admin());
    ctx.users.remove(1).await;

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/admin/session", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "Forbidden: User invalid");
}

#[tokio::test]
async fn login_gate_redirects_with_next() {
    let ctx = TestContext::new(vec![]);

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/account", Some("garbage")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/login?next=http%3A%2F%2Flocalhost%2Faccount"
    );
}

#[tokio::test]
async fn login_gate_lets_signed_in_users_through() {
    let ctx = TestContext::new(vec![tracer()]);

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/account", Some(&ctx.token_for(&tracer()))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "Signed in as abc");
}

#[tokio::test]
async fn soft_gate_never_rejects() {
    let ctx = TestContext::new(vec![tracer()]);

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/users/7/permissions", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["signed_in"], false);
    assert_eq!(body["can_edit"], false);

    let token = ctx.token_for(&tracer());
    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/users/7/permissions", Some(&token)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["signed_in"], true);
    assert_eq!(body["can_edit"], true);

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/users/8/permissions", Some(&token)))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["can_edit"], false);
}

#[tokio::test]
async fn dev_login_issues_a_usable_cookie() {
    let ctx = TestContext::new(vec![tracer()]);

    let response = ctx
        .app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dev/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"user_id":7}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));

    let token = set_cookie
        .trim_start_matches("session=")
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = ctx
        .app()
        .oneshot(get_with_cookie("/api/session", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn dev_login_is_not_routed_in_production() {
    let users = InMemoryUserDirectory::with_users(vec![tracer()]);
    let state = AppState::with_directory(&config(&[("APP_ENV", "production")]), Arc::new(users));

    let response = app::router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dev/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"user_id":7}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// A verifier that always refuses with a fixed reason.
struct Refuse(AuthError);

#[async_trait]
impl SessionVerifier for Refuse {
    async fn verify(
        &self,
        _ctx: &mut RequestContext,
        _token: Option<&str>,
        _policy: &VerifyPolicy,
    ) -> Result<()> {
        Err(self.0.clone().into())
    }
}

#[tokio::test]
async fn gates_use_the_injected_verifier() {
    let settings = GateSettings::new("session", "/signin");
    let gate = AuthGate::new(
        Arc::new(Refuse(AuthError::InsufficientPrivilege)),
        VerifyPolicy::default(),
        settings.clone(),
    );

    let api = Router::new()
        .route("/x", get(|| async { "reached" }))
        .route_layer(from_fn_with_state(gate.clone(), require_authentication))
        .layer(tower_cookies::CookieManagerLayer::new());
    let response = api.oneshot(get_with_cookie("/x", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["authenticate_url"], "/signin");

    let page = Router::new()
        .route("/x", get(|| async { "reached" }))
        .route_layer(from_fn_with_state(gate, require_login))
        .layer(tower_cookies::CookieManagerLayer::new());
    let response = page.oneshot(get_with_cookie("/x", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(
        response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .starts_with("/signin?next=")
    );
}

#[tokio::test]
async fn mock_verifier_signs_everyone_in() {
    let ctx = TestContext::new(vec![]);
    let state = ctx.state.clone().with_verifier(Arc::new(
        overtrack_session::services::verifier::MockVerifier::default(),
    ));

    let response = app::router(state)
        .oneshot(get_with_cookie("/api/session", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["key"], "MOCK-USER");
    assert_eq!(body["username"], "MOCK_USER");
}

#[tokio::test]
async fn handlers_can_be_gated_individually() {
    let ctx = TestContext::new(vec![tracer()]);
    let gate = AuthGate::new(
        ctx.state.verifier.clone(),
        VerifyPolicy::default().resolve_user(),
        ctx.state.config.gate_settings(),
    );

    let router = Router::new()
        .route(
            "/only-this",
            get(handlers::session::current_session)
                .route_layer(from_fn_with_state(gate, require_authentication)),
        )
        .layer(tower_cookies::CookieManagerLayer::new());

    let response = router
        .oneshot(get_with_cookie("/only-this", Some(&ctx.token_for(&tracer()))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["username"], "Tracer");
}
