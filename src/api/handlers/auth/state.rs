//! Auth state and configuration.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::password;
use super::rate_limit::RateLimiter;
use super::token::{self, KeyRegistry, SigningDomain, TokenClaims};

const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 60;
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Role required by the role-management endpoints and the admin-ops domain.
pub(super) const ADMIN_ROLE: &str = "Admin";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_token_ttl_minutes: i64,
    refresh_token_ttl_days: i64,
    issuer: Option<String>,
    audience: Option<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            issuer: None,
            audience: None,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_days(mut self, days: i64) -> Self {
        self.refresh_token_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub(super) fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_minutes * 60
    }

    pub(super) fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_days * 24 * 60 * 60
    }

    #[must_use]
    pub fn access_token_ttl_minutes(&self) -> i64 {
        self.access_token_ttl_minutes
    }

    #[must_use]
    pub fn refresh_token_ttl_days(&self) -> i64 {
        self.refresh_token_ttl_days
    }

    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    #[must_use]
    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AuthState {
    config: AuthConfig,
    keys: KeyRegistry,
    rate_limiter: Arc<dyn RateLimiter>,
    dummy_hash: String,
}

impl AuthState {
    /// Build the shared auth state.
    ///
    /// # Errors
    ///
    /// Fails when the dummy hash record cannot be generated.
    pub fn new(
        config: AuthConfig,
        keys: KeyRegistry,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self> {
        // Login burns the same derivation cost for unknown usernames.
        let dummy_hash = password::hash("aliro-unknown-principal")?;

        Ok(Self {
            config,
            keys,
            rate_limiter,
            dummy_hash,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    pub(super) fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }

    /// Mint an access token for one signing domain.
    pub(super) fn issue_token(
        &self,
        domain: SigningDomain,
        username: &str,
        roles: &[String],
    ) -> Result<String, token::Error> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: username.to_string(),
            jti: Uuid::new_v4().to_string(),
            roles: roles.to_vec(),
            iat: now,
            nbf: now,
            exp: now + self.config.access_token_ttl_seconds(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };
        self.keys.sign(domain, &claims)
    }

    /// Mint the access token plus, for Admin principals only, an admin-ops
    /// token.
    pub(super) fn issue_token_set(
        &self,
        username: &str,
        roles: &[String],
    ) -> Result<(String, Option<String>), token::Error> {
        let access = self.issue_token(SigningDomain::AccessApi, username, roles)?;
        let admin = if roles.iter().any(|role| role == ADMIN_ROLE) {
            Some(self.issue_token(SigningDomain::AdminOps, username, roles)?)
        } else {
            None
        };
        Ok((access, admin))
    }
}
