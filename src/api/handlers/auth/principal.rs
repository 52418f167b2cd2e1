//! Authenticated principal extraction for token-protected endpoints.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use chrono::Utc;

use super::error::ApiError;
use super::state::{ADMIN_ROLE, AuthState};
use super::token::SigningDomain;

/// Caller context derived from a verified bearer token.
#[derive(Clone, Debug)]
pub(super) struct Principal {
    pub(super) username: String,
    pub(super) roles: Vec<String>,
}

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the bearer token under a signing domain. Missing, malformed,
/// expired, and wrong-domain tokens all collapse to the uniform
/// authentication error.
pub(super) fn require_domain(
    state: &AuthState,
    headers: &HeaderMap,
    domain: SigningDomain,
) -> Result<Principal, ApiError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(ApiError::Authentication);
    };

    let now = Utc::now().timestamp();
    let claims = state
        .keys()
        .verify(domain, &token, now)
        .map_err(|_| ApiError::Authentication)?;

    Ok(Principal {
        username: claims.sub,
        roles: claims.roles,
    })
}

/// Admin-ops token carrying the Admin role, required by the role-management
/// endpoints.
pub(super) fn require_admin(state: &AuthState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let principal = require_domain(state, headers, SigningDomain::AdminOps)?;
    if !principal.roles.iter().any(|role| role == ADMIN_ROLE) {
        return Err(ApiError::Authorization);
    }
    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::AuthConfig;
    use super::super::token::KeyRegistry;
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use std::sync::Arc;

    fn state() -> AuthState {
        let keys = KeyRegistry::new(
            SecretString::from("access-domain-key-0123456789abcdef".to_string()),
            SecretString::from("admin-domain-key-0123456789abcdefg".to_string()),
        )
        .expect("valid registry");
        AuthState::new(AuthConfig::new(), keys, Arc::new(NoopRateLimiter)).expect("auth state")
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
        );
        headers
    }

    #[test]
    fn extract_bearer_token_variants() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc "));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn require_admin_accepts_admin_ops_token() -> Result<()> {
        let state = state();
        let roles = vec![ADMIN_ROLE.to_string(), "User".to_string()];
        let token = state.issue_token(SigningDomain::AdminOps, "alice", &roles)?;

        let principal = require_admin(&state, &bearer_headers(&token))
            .map_err(|err| anyhow::anyhow!("unexpected rejection: {err}"))?;
        assert_eq!(principal.username, "alice");
        Ok(())
    }

    #[test]
    fn require_admin_rejects_missing_role() -> Result<()> {
        let state = state();
        let token = state.issue_token(SigningDomain::AdminOps, "bob", &["User".to_string()])?;

        let result = require_admin(&state, &bearer_headers(&token));
        assert!(matches!(result, Err(ApiError::Authorization)));
        Ok(())
    }

    #[test]
    fn require_admin_rejects_access_api_token() -> Result<()> {
        let state = state();
        let roles = vec![ADMIN_ROLE.to_string()];
        let token = state.issue_token(SigningDomain::AccessApi, "alice", &roles)?;

        let result = require_admin(&state, &bearer_headers(&token));
        assert!(matches!(result, Err(ApiError::Authentication)));
        Ok(())
    }

    #[test]
    fn require_admin_rejects_missing_or_garbage_token() {
        let state = state();

        let result = require_admin(&state, &HeaderMap::new());
        assert!(matches!(result, Err(ApiError::Authentication)));

        let result = require_admin(&state, &bearer_headers("not-a-token"));
        assert!(matches!(result, Err(ApiError::Authentication)));
    }
}
