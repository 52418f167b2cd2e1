//! Role management endpoints, admin-ops domain only.

use axum::{
    Json,
    extract::{ConnectInfo, Extension},
    http::HeaderMap,
};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;

use super::error::ApiError;
use super::principal::require_admin;
use super::rate_limit::{RateLimitClass, RateLimitDecision};
use super::state::AuthState;
use super::storage::{AssignOutcome, RoleOutcome, assign_role as store_assignment, insert_role};
use super::types::{AddRoleRequest, AssignRoleRequest, ErrorResponse, MessageResponse};
use super::utils::{client_ip, valid_username};

#[utoipa::path(
    post,
    path = "/add-role",
    request_body = AddRoleRequest,
    responses(
        (status = 200, description = "Role created", body = MessageResponse),
        (status = 400, description = "Invalid role name or duplicate role", body = ErrorResponse),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse),
        (status = 403, description = "Token lacks the Admin role", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn add_role(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<AddRoleRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let ip = client_ip(&headers, peer);
    if auth_state
        .rate_limiter()
        .check_ip(Some(&ip), RateLimitClass::Refresh)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::RateLimited);
    }

    require_admin(&auth_state, &headers)?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let role = request.role.trim();
    if !valid_username(role) {
        return Err(ApiError::Validation("Invalid role name".to_string()));
    }

    match insert_role(&pool, role).await? {
        RoleOutcome::Created => Ok(Json(MessageResponse {
            message: "Role added successfully".to_string(),
        })),
        RoleOutcome::Exists => Err(ApiError::Duplicate("Role already exists".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/assign-role",
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role assigned", body = MessageResponse),
        (status = 400, description = "Unknown user or role, or duplicate grant", body = ErrorResponse),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse),
        (status = 403, description = "Token lacks the Admin role", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn assign_role(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<AssignRoleRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let ip = client_ip(&headers, peer);
    if auth_state
        .rate_limiter()
        .check_ip(Some(&ip), RateLimitClass::Refresh)
        == RateLimitDecision::Limited
    {
        return Err(ApiError::RateLimited);
    }

    require_admin(&auth_state, &headers)?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    match store_assignment(&pool, request.username.trim(), request.role.trim()).await? {
        AssignOutcome::Assigned => Ok(Json(MessageResponse {
            message: "Role assigned successfully".to_string(),
        })),
        AssignOutcome::UserMissing => Err(ApiError::NotFound("User not found".to_string())),
        AssignOutcome::RoleMissing => Err(ApiError::NotFound("Role does not exist".to_string())),
        AssignOutcome::AlreadyAssigned => {
            Err(ApiError::Duplicate("User already has this role".to_string()))
        }
    }
}
