use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Why a request was refused a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The request carried no session cookie.
    #[error("No session found")]
    NoSessionPresent,

    /// The token failed signature, audience, expiry or payload checks.
    #[error("{0}")]
    TokenInvalid(String),

    /// The token was valid but the user it names no longer exists.
    #[error("User invalid")]
    UserNotFound,

    /// The token was valid but the endpoint requires a superuser.
    #[error("Not superuser")]
    InsufficientPrivilege,
}

impl AuthError {
    /// The HTTP status a rejection maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPrivilege => StatusCode::FORBIDDEN,
            AuthError::NoSessionPresent | AuthError::TokenInvalid(_) | AuthError::UserNotFound => {
                StatusCode::UNAUTHORIZED
            }
        }
    }

    /// The client-facing message for this rejection.
    pub fn message(&self) -> String {
        format!("Forbidden: {}", self)
    }
}

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A connection pool construction error.
    #[error("Pool creation error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// A column was missing from a database row.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// A token could not be signed.
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// The request was refused a session.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::CreatePool(ref e) => {
                tracing::error!("Pool creation error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::MissingData(ref column) => {
                tracing::error!("Missing column in row: {}", column);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Token(ref e) => {
                tracing::error!("Token signing error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Token error".to_string())
            }

            AppError::Auth(ref rejection) => {
                tracing::warn!("Authentication failed: {}", rejection);
                (rejection.status(), rejection.message())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
