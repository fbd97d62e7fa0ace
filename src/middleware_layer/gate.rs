use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderValue, Request, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower_cookies::Cookies;

use crate::error::AuthError;
use crate::middleware_layer::scope::DiagnosticScope;
use crate::services::verifier::{RequestContext, SessionVerifier, VerifyPolicy};

/// Response header carrying the diagnostic trace id of a gated request.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Cookie and login settings shared by every gate.
#[derive(Debug, Clone)]
pub struct GateSettings {
    cookie_name: Arc<str>,
    login_path: Arc<str>,
}

impl GateSettings {
    pub fn new(cookie_name: &str, login_path: &str) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            login_path: login_path.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// The login URL that forwards back to `original_url` afterwards.
    pub fn login_redirect(&self, original_url: &str) -> String {
        format!(
            "{}?next={}",
            self.login_path,
            urlencoding::encode(original_url)
        )
    }

    /// The structured rejection returned by API gates.
    pub fn rejection_response(&self, rejection: &AuthError, original_url: &str) -> Response {
        let body = RejectionBody {
            message: rejection.message(),
            authenticate_url: self.login_path(),
            redirect: self.login_redirect(original_url),
        };

        let json = sonic_rs::to_string(&body)
            .unwrap_or_else(|_| r#"{"message":"Forbidden"}"#.to_string());

        (
            rejection.status(),
            [(header::CONTENT_TYPE, "application/json")],
            json,
        )
            .into_response()
    }
}

/// The JSON body of an API gate rejection.
#[derive(Serialize)]
struct RejectionBody<'a> {
    message: String,
    authenticate_url: &'a str,
    redirect: String,
}

/// A verifier bound to a policy, used as middleware state.
///
/// The same gate type drives both the JSON-rejecting and the redirecting
/// middleware; only the failure rendering differs.
#[derive(Clone)]
pub struct AuthGate {
    pub(crate) verifier: Arc<dyn SessionVerifier>,
    pub(crate) policy: VerifyPolicy,
    pub(crate) settings: GateSettings,
}

impl AuthGate {
    pub fn new(
        verifier: Arc<dyn SessionVerifier>,
        policy: VerifyPolicy,
        settings: GateSettings,
    ) -> Self {
        Self {
            verifier,
            policy,
            settings,
        }
    }

    pub fn policy(&self) -> &VerifyPolicy {
        &self.policy
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }
}

/// Takes the request's context left by an outer gate, or opens a fresh
/// diagnostic scope and context when this is the outermost gate.
pub(crate) fn acquire_context(request: &mut Request<Body>) -> (RequestContext, Option<DiagnosticScope>) {
    match request.extensions_mut().remove::<RequestContext>() {
        Some(ctx) => (ctx, None),
        None => {
            let scope = DiagnosticScope::open(request.method(), request.uri().path());
            let ctx = RequestContext::new(scope.span().clone());
            (ctx, Some(scope))
        }
    }
}

/// Hands the context, and the session if one was verified, to inner layers
/// and the handler.
pub(crate) fn attach_context(request: &mut Request<Body>, ctx: RequestContext) {
    if let Some(session) = ctx.session() {
        request.extensions_mut().insert(session.clone());
    }
    request.extensions_mut().insert(ctx);
}

/// Closes the scope opened by this gate, tagging the response with its id.
pub(crate) fn release_scope(scope: Option<DiagnosticScope>, mut response: Response) -> Response {
    if let Some(scope) = scope {
        if let Ok(value) = HeaderValue::from_str(&scope.trace_id().to_string()) {
            response.headers_mut().insert(TRACE_ID_HEADER, value);
        }
        drop(scope);
    }
    response
}

/// Extracts the session token from the request cookies.
pub(crate) fn session_token(cookies: &Cookies, settings: &GateSettings) -> Option<String> {
    cookies
        .get(settings.cookie_name())
        .map(|cookie| cookie.value().to_string())
}

/// Reconstructs the URL the client asked for, for `next` parameters.
pub fn request_url(request: &Request<Body>) -> String {
    let uri = request.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let headers = request.headers();
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => {
            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|h| h.to_str().ok())
                .unwrap_or("http");
            format!("{}://{}{}", scheme, host, path)
        }
        None => path.to_string(),
    }
}
