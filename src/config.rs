use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::token::SESSION_EXPIRE_TIME;
use crate::middleware_layer::gate::GateSettings;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The symmetric secret used to sign and verify session tokens.
    pub hmac_key: Zeroizing<Vec<u8>>,
    /// The audience tokens issued by this service are scoped to.
    pub audience: String,
    /// Lifetime of issued tokens in seconds. `None` issues tokens without `exp`.
    pub session_expire_secs: Option<u64>,
    /// Name of the cookie carrying the session token.
    pub cookie_name: String,
    /// Path of the login page rejected browsers are sent to.
    pub login_path: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The URL of the PostgreSQL database holding users, if any.
    pub database_url: Option<String>,
    /// How long resolved users stay in the in-process cache.
    pub user_cache_ttl: Option<Duration>,
    /// Deployment environment name.
    pub app_env: String,
    /// Replace token verification with a fixed mock session.
    pub mock_login: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Creates a new `Config` reading each variable through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut hmac_key_b64 = lookup("HMAC_KEY")
            .context("HMAC_KEY must be set (generate with: openssl rand -base64 32)")?;

        let hmac_key_bytes = general_purpose::STANDARD
            .decode(hmac_key_b64.trim())
            .context("HMAC_KEY must be valid base64")?;

        hmac_key_b64.zeroize();

        if hmac_key_bytes.is_empty() {
            tracing::warn!("⚠️  HMAC_KEY is empty, session tokens are effectively unsigned");
        }

        let session_expire_secs = match lookup("SESSION_EXPIRE_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .context("Invalid SESSION_EXPIRE_SECS")?;
                (secs > 0).then_some(secs)
            }
            None => Some(SESSION_EXPIRE_TIME),
        };

        let user_cache_ttl = lookup("USER_CACHE_TTL_SECS")
            .map(|raw| raw.parse::<u64>().context("Invalid USER_CACHE_TTL_SECS"))
            .transpose()?
            .map(Duration::from_secs);

        let app_env = lookup("APP_ENV").unwrap_or_else(|| "development".to_string());

        let mock_login = lookup("MOCK_LOGIN")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        if mock_login && app_env == "production" {
            anyhow::bail!("MOCK_LOGIN cannot be enabled when APP_ENV=production");
        }

        Ok(Self {
            hmac_key: Zeroizing::new(hmac_key_bytes),
            audience: lookup("SESSION_AUDIENCE").unwrap_or_else(|| "webapp".to_string()),
            session_expire_secs,
            cookie_name: lookup("SESSION_COOKIE").unwrap_or_else(|| "session".to_string()),
            login_path: lookup("LOGIN_PATH").unwrap_or_else(|| "/login".to_string()),
            bind_addr: lookup("BIND_ADDR")
                .unwrap_or_else(|| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            user_cache_ttl,
            app_env,
            mock_login,
        })
    }

    /// Whether the service runs in production mode.
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// The cookie and login settings shared by every gate.
    pub fn gate_settings(&self) -> GateSettings {
        GateSettings::new(&self.cookie_name, &self.login_path)
    }
}
