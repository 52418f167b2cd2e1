//! Refresh endpoint: single-use rotation of the presented token.

use anyhow::anyhow;
use axum::{
    Json,
    extract::{ConnectInfo, Extension},
    http::HeaderMap,
};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;

use super::error::ApiError;
use super::rate_limit::{RateLimitClass, RateLimitDecision};
use super::state::AuthState;
use super::storage::{RotationOutcome, role_names, rotate_refresh_token};
use super::types::{ErrorResponse, RefreshTokenRequest, TokenPairResponse};
use super::utils::client_ip;

#[utoipa::path(
    post,
    path = "/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair issued", body = TokenPairResponse),
        (status = 400, description = "Missing payload", body = ErrorResponse),
        (status = 401, description = "Unknown, revoked, or expired token", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let ip = client_ip(&headers, peer);
    if auth_state
        .rate_limiter()
        .check_ip(Some(&ip), RateLimitClass::Refresh)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::RateLimited);
    }

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let presented = request.refresh_token.trim();
    if presented.is_empty() {
        return Err(ApiError::Validation("Missing refresh token".to_string()));
    }

    let rotated = rotate_refresh_token(
        &pool,
        presented,
        auth_state.config().refresh_token_ttl_seconds(),
    )
    .await?;

    // Unknown, revoked, and expired tokens are indistinguishable here.
    let RotationOutcome::Rotated {
        user_id,
        username,
        new_token,
    } = rotated
    else {
        return Err(ApiError::Authentication);
    };

    let roles = role_names(&pool, user_id).await?;
    let (access_token, admin_token) = auth_state
        .issue_token_set(&username, &roles)
        .map_err(|err| ApiError::Internal(anyhow!("failed to issue tokens: {err}")))?;

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token: new_token,
        admin_token,
    }))
}
