use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;
use tracing::Instrument;

use crate::{
    error::AppError,
    middleware_layer::gate::{self, AuthGate},
};

/// A middleware that requires a valid session to be present.
///
/// Rejections are answered with a JSON body naming the reason and the login
/// URL, with status 401 or 403. Intended for API routes.
///
/// # Arguments
///
/// * `gate` - The verifier and policy for this route.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's `Response`, or the rejection.
pub async fn require_authentication(
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
            gate.settings().rejection_response(&rejection, &url)
        }
        Err(e) => e.into_response(),
    };

    gate::release_scope(scope, response)
}

/// A middleware that attaches the session when the request carries a valid
/// one, and lets every request through regardless.
///
/// Handlers read the outcome from the `RequestContext` extension.
pub async fn attach_session(
    State(gate): State<AuthGate>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let (mut ctx, scope) = gate::acquire_context(&mut request);
    let span = ctx.span().clone();
    let token = gate::session_token(&cookies, gate.settings());

    match gate
        .verifier
        .verify(&mut ctx, token.as_deref(), gate.policy())
        .instrument(span.clone())
        .await
    {
        Ok(()) => {}
        Err(AppError::Auth(rejection)) => {
            tracing::debug!(parent: &span, reason = %rejection, "Continuing without session");
        }
        Err(e) => {
            tracing::error!(parent: &span, error = %e, "Session check failed, continuing without session");
        }
    }

    gate::attach_context(&mut request, ctx);
    let response = next.run(request).instrument(span).await;
    gate::release_scope(scope, response)
}
