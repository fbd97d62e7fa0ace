use serde::{Deserialize, Serialize};

/// The signed payload of a session token.
///
/// `battletag` is the identifier older tokens carried before `key` existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battletag: Option<String>,
    #[serde(rename = "user-id")]
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superuser: Option<bool>,
    /// Issued-at (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiry (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub aud: String,
}

impl TokenClaims {
    /// The user key, falling back to the legacy `battletag` claim.
    pub fn session_key(&self) -> Option<&str> {
        non_empty(self.key.as_deref()).or_else(|| non_empty(self.battletag.as_deref()))
    }

    /// Whether this token predates the `key` claim.
    pub fn uses_legacy_key(&self) -> bool {
        non_empty(self.key.as_deref()).is_none()
    }

    pub fn is_superuser(&self) -> bool {
        self.superuser.unwrap_or(false)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
