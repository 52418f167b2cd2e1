//! Registration endpoint.

use anyhow::Context;
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
use super::storage::{RegisterOutcome, insert_user};
use super::types::{ErrorResponse, MessageResponse, RegisterRequest};
use super::utils::{client_ip, valid_email, valid_password, valid_username};

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered successfully", body = MessageResponse),
        (status = 400, description = "Validation error or duplicate user", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
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

    let username = request.username.trim().to_string();
    if !valid_username(&username) {
        return Err(ApiError::Validation(
            "Invalid username: use 2 to 50 letters, digits or underscores".to_string(),
        ));
    }

    let email = request.email.trim().to_string();
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }

    if !valid_password(&request.password) {
        return Err(ApiError::Validation(
            "Invalid password: use at least six characters with a digit, a lowercase and an uppercase letter"
                .to_string(),
        ));
    }

    // The derivation is CPU-bound; keep it off the async workers.
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash(&password))
        .await
        .context("password hashing task failed")??;

    match insert_user(&pool, &username, &email, &password_hash).await? {
        RegisterOutcome::Created => Ok(Json(MessageResponse {
            message: "User registered successfully".to_string(),
        })),
        RegisterOutcome::UsernameTaken => {
            Err(ApiError::Duplicate("User already exists".to_string()))
        }
        RegisterOutcome::EmailTaken => Err(ApiError::Duplicate("Email already in use".to_string())),
    }
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

    fn limited_auth_state() -> Result<Arc<AuthState>> {
        let limiter = FixedWindowRateLimiter::new(
            WindowPolicy::new(0, Duration::from_secs(60)),
            WindowPolicy::new(0, Duration::from_secs(60)),
        );
        Ok(Arc::new(AuthState::new(
            AuthConfig::new(),
            registry(),
            Arc::new(limiter),
        )?))
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo("10.0.0.1:52135".parse().expect("valid socket address"))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn register_missing_payload() -> Result<()> {
        let response = register(
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
    async fn register_rejects_invalid_fields() -> Result<()> {
        let pool = lazy_pool()?;
        let state = auth_state()?;

        let cases = [
            ("x", "alice@example.com", "Sup3rSecret"),
            ("alice", "not-an-email", "Sup3rSecret"),
            ("alice", "alice@example.com", "weak"),
        ];
        for (username, email, password) in cases {
            let payload = Json(RegisterRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            });
            let response = register(
                HeaderMap::new(),
                peer(),
                Extension(pool.clone()),
                Extension(state.clone()),
                Some(payload),
            )
            .await
            .into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        Ok(())
    }

    #[tokio::test]
    async fn register_rate_limited_before_validation() -> Result<()> {
        let response = register(
            HeaderMap::new(),
            peer(),
            Extension(lazy_pool()?),
            Extension(limited_auth_state()?),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        Ok(())
    }
}
