use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;
use tracing::Instrument;

use crate::{
    error::AppError,
    middleware_layer::gate::{self, AuthGate},
};

/// A middleware that requires login for browser-facing pages.
///
/// Unlike `require_authentication`, any rejection sends the browser to the
/// login page with the original URL in `next`, so login can return there.
pub async fn require_login(
    State(gate): State<AuthGate>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let (mut ctx, scope) = gate::acquire_context(&mut request);
    let span = ctx.span().clone();
    let token = gate::session_token(&cookies, gate.settings());

    let outcome = gate
        .verifier
        .verify(&mut ctx, token.as_deref(), gate.policy())
        .instrument(span.clone())
        .await;

    let response = match outcome {
        Ok(()) => {
            gate::attach_context(&mut request, ctx);
            next.run(request).instrument(span).await
        }
        Err(AppError::Auth(rejection)) => {
            let url = gate::request_url(&request);
            tracing::info!(parent: &span, reason = %rejection, next = %url, "Redirecting to login");
            Redirect::to(&gate.settings().login_redirect(&url)).into_response()
        }
        Err(e) => e.into_response(),
    };

    gate::release_scope(scope, response)
}
