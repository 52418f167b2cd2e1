//! Login endpoint: password check, token pair issuance.

use anyhow::{Context, anyhow};
use axum::{
    Json,
    extract::{ConnectInfo, Extension},
    http::HeaderMap,
};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;

use super::error::ApiError;
use super::password;
use super::rate_limit::{RateLimitClass, RateLimitDecision};
use super::state::AuthState;
use super::storage::{create_refresh_token, lookup_credentials, role_names};
use super::types::{ErrorResponse, LoginRequest, TokenPairResponse};
use super::utils::client_ip;

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPairResponse),
        (status = 400, description = "Missing payload", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let ip = client_ip(&headers, peer);
    if auth_state
        .rate_limiter()
        .check_ip(Some(&ip), RateLimitClass::Login)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::RateLimited);
    }

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let record = lookup_credentials(&pool, request.username.trim()).await?;

    // Unknown usernames still pay for a full derivation so response timing
    // does not separate them from wrong passwords.
    let stored_hash = record.as_ref().map_or_else(
        || auth_state.dummy_hash().to_string(),
        |record| record.password_hash.clone(),
    );
    let password = request.password;
    let verified = tokio::task::spawn_blocking(move || password::verify(&password, &stored_hash))
        .await
        .context("password verification task failed")?;

    let Some(record) = record else {
        return Err(ApiError::Authentication);
    };
    if !verified {
        return Err(ApiError::Authentication);
    }

    let roles = role_names(&pool, record.user_id).await?;
    let (access_token, admin_token) = auth_state
        .issue_token_set(&record.username, &roles)
        .map_err(|err| ApiError::Internal(anyhow!("failed to issue tokens: {err}")))?;

    let refresh_token = create_refresh_token(
        &pool,
        record.user_id,
        auth_state.config().refresh_token_ttl_seconds(),
    )
    .await?;

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
        admin_token,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::{FixedWindowRateLimiter, NoopRateLimiter, WindowPolicy};
    use super::super::state::AuthConfig;
    use super::super::token::KeyRegistry;
    use super::*;
    use anyhow::Result;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;

    fn registry() -> KeyRegistry {
        KeyRegistry::new(
            SecretString::from("access-domain-key-0123456789abcdef".to_string()),
            SecretString::from("admin-domain-key-0123456789abcdefg".to_string()),
        )
        .expect("valid registry")
    }

    fn auth_state() -> Result<Arc<AuthState>> {
        Ok(Arc::new(AuthState::new(
            AuthConfig::new(),
            registry(),
            Arc::new(NoopRateLimiter),
        )?))
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo("10.0.0.1:52135".parse().expect("valid socket address"))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let response = login(
            HeaderMap::new(),
            peer(),
            Extension(lazy_pool()?),
            Extension(auth_state()?),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rate_limited_after_budget() -> Result<()> {
        let limiter = FixedWindowRateLimiter::new(
            WindowPolicy::new(1, Duration::from_secs(60)),
            WindowPolicy::new(10, Duration::from_secs(60)),
        );
        let state = Arc::new(AuthState::new(
            AuthConfig::new(),
            registry(),
            Arc::new(limiter),
        )?);

        // First request burns the only permit on the missing-payload path.
        let response = login(
            HeaderMap::new(),
            peer(),
            Extension(lazy_pool()?),
            Extension(state.clone()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = login(
            HeaderMap::new(),
            peer(),
            Extension(lazy_pool()?),
            Extension(state),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        Ok(())
    }
}
