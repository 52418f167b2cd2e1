//! Logout endpoint: revoke one refresh token.

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
use super::storage::revoke_refresh_token;
use super::types::{ErrorResponse, LogoutRequest, MessageResponse};
use super::utils::client_ip;

#[utoipa::path(
    post,
    path = "/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Token revoked or already unusable", body = MessageResponse),
        (status = 400, description = "Missing payload", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
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

    // Unknown and already-revoked tokens land on the same answer, so a
    // caller cannot probe which tokens exist.
    revoke_refresh_token(&pool, request.refresh_token.trim()).await?;

    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}
