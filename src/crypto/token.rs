use base64::{Engine as _, engine::general_purpose};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::{Error as JwtError, ErrorKind},
};

use crate::error::Result;
use crate::models::{claims::TokenClaims, user::User};

/// Default token lifetime: four 30-day months, in seconds.
pub const SESSION_EXPIRE_TIME: u64 = 4 * 30 * 24 * 60 * 60;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Signs and verifies session tokens with the process-wide HMAC secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    /// Creates a new `TokenSigner` keyed by `secret`.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issues a session token for `user`, scoped to `audience`.
    ///
    /// # Arguments
    ///
    /// * `user` - The user the token identifies.
    /// * `audience` - The consumer the token is valid for.
    /// * `expiry` - Lifetime in seconds; `None` issues a token without `exp`.
    ///
    /// # Returns
    ///
    /// A `Result` containing the compact signed token.
    pub fn issue(&self, user: &User, audience: &str, expiry: Option<u64>) -> Result<String> {
        self.issue_at(user, audience, expiry, chrono::Utc::now().timestamp())
    }

    /// Issues a token as if the current time were `now` (seconds since epoch).
    pub fn issue_at(
        &self,
        user: &User,
        audience: &str,
        expiry: Option<u64>,
        now: i64,
    ) -> Result<String> {
        let claims = TokenClaims {
            key: Some(user.key.clone()),
            battletag: None,
            user_id: user.user_id,
            superuser: Some(user.superuser),
            iat: Some(now),
            exp: expiry.map(|secs| now.saturating_add_unsigned(secs)),
            aud: audience.to_string(),
        };
        self.sign(&claims)
    }

    /// Signs an arbitrary claim set.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String> {
        Ok(encode(&Header::new(ALGORITHM), claims, &self.encoding)?)
    }

    /// Verifies signature, audience and expiry, and returns the claims.
    pub fn verify(
        &self,
        token: &str,
        audience: &str,
    ) -> std::result::Result<TokenClaims, JwtError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["aud"]);

        decode::<TokenClaims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

/// Reads a token's payload without checking anything, for logging rejected
/// tokens. Returns `None` when the payload is not base64url-encoded JSON.
pub fn peek_payload(token: &str) -> Option<String> {
    let segment = token.split('.').nth(1)?;
    let raw = general_purpose::URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .ok()?;
    let value: sonic_rs::Value = sonic_rs::from_slice(&raw).ok()?;
    sonic_rs::to_string(&value).ok()
}

/// A short, client-safe description of why a token failed verification.
pub fn describe(err: &JwtError) -> String {
    match err.kind() {
        ErrorKind::ExpiredSignature => "Signature has expired".to_string(),
        ErrorKind::InvalidSignature => "Signature verification failed".to_string(),
        ErrorKind::InvalidAudience => "Invalid audience".to_string(),
        ErrorKind::InvalidAlgorithm => "The specified alg value is not allowed".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => {
            format!("Token is missing the \"{}\" claim", claim)
        }
        ErrorKind::InvalidToken => "Not enough segments".to_string(),
        ErrorKind::Base64(_) | ErrorKind::Utf8(_) => "Invalid token encoding".to_string(),
        ErrorKind::Json(e) => format!("Invalid payload: {}", e),
        _ => err.to_string(),
    }
}
